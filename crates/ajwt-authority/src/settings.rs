//! Engine options derived from the loaded configuration.

use std::time::Duration;

use ajwt_config::Config;
use ajwt_registry::RegistryOptions;
use ajwt_token::TokenOptions;

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn token_options(config: &Config) -> TokenOptions {
    TokenOptions {
        issuer: config.issuer.name.clone(),
        audience: config.issuer.audience.clone(),
        ttl_secs: secs(config.tokens.ttl_secs),
        leeway_secs: secs(config.tokens.leeway_secs),
        normalize_prompts: config.prompt.normalize,
    }
}

pub(crate) fn registry_options(config: &Config) -> RegistryOptions {
    RegistryOptions {
        require_activation: config.registry.require_activation,
        reject_checksum_collisions: config.registry.reject_checksum_collisions,
    }
}

pub(crate) fn proof_skew_secs(config: &Config) -> i64 {
    secs(config.possession.max_skew_secs)
}

pub(crate) fn key_lookup_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.possession.key_lookup_timeout_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = Config::default();
        assert_eq!(token_options(&config), TokenOptions::default());
        assert_eq!(registry_options(&config), RegistryOptions::default());
        assert_eq!(proof_skew_secs(&config), ajwt_pop::DEFAULT_PROOF_SKEW_SECS);
        assert_eq!(key_lookup_timeout(&config), Duration::from_secs(2));
    }

    #[test]
    fn test_overrides_flow_through() {
        let mut config = Config::default();
        config.issuer.audience = Some("tools.example".into());
        config.tokens.ttl_secs = 60;
        config.prompt.normalize = true;
        config.registry.require_activation = true;
        let options = token_options(&config);
        assert_eq!(options.audience.as_deref(), Some("tools.example"));
        assert_eq!(options.ttl_secs, 60);
        assert!(options.normalize_prompts);
        assert!(registry_options(&config).require_activation);
    }
}
