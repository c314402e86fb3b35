//! Post-merge validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Longest accepted token lifetime (one day).
const MAX_TTL_SECS: u64 = 86_400;

/// Longest accepted clock leeway or proof skew.
const MAX_SKEW_SECS: u64 = 600;

/// Deepest accepted delegation chain.
const MAX_DELEGATION_DEPTH: usize = 64;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_issuer(config)?;
    validate_tokens(config)?;
    validate_possession(config)?;
    validate_delegation(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_issuer(config: &Config) -> ConfigResult<()> {
    let issuer = &config.issuer;
    if issuer.name.trim().is_empty() {
        return Err(invalid("issuer.name", "issuer name must not be empty"));
    }
    if issuer.audience.as_deref().is_some_and(|a| a.trim().is_empty()) {
        return Err(invalid(
            "issuer.audience",
            "audience must be omitted or non-empty",
        ));
    }
    if issuer.key_path.as_deref().is_some_and(str::is_empty) {
        return Err(invalid(
            "issuer.key_path",
            "key path must be omitted or non-empty",
        ));
    }
    Ok(())
}

fn validate_tokens(config: &Config) -> ConfigResult<()> {
    let t = &config.tokens;
    if t.ttl_secs == 0 || t.ttl_secs > MAX_TTL_SECS {
        return Err(invalid(
            "tokens.ttl_secs",
            format!("ttl_secs must be between 1 and {MAX_TTL_SECS}"),
        ));
    }
    if t.leeway_secs > MAX_SKEW_SECS {
        return Err(invalid(
            "tokens.leeway_secs",
            format!("leeway_secs must be at most {MAX_SKEW_SECS}"),
        ));
    }
    Ok(())
}

fn validate_possession(config: &Config) -> ConfigResult<()> {
    let p = &config.possession;
    if p.max_skew_secs == 0 || p.max_skew_secs > MAX_SKEW_SECS {
        return Err(invalid(
            "possession.max_skew_secs",
            format!("max_skew_secs must be between 1 and {MAX_SKEW_SECS}"),
        ));
    }
    if p.key_lookup_timeout_ms == 0 {
        return Err(invalid(
            "possession.key_lookup_timeout_ms",
            "key lookup timeout must be positive",
        ));
    }
    Ok(())
}

fn validate_delegation(config: &Config) -> ConfigResult<()> {
    let depth = config.delegation.max_depth;
    if depth == 0 || depth > MAX_DELEGATION_DEPTH {
        return Err(invalid(
            "delegation.max_depth",
            format!("max_depth must be between 1 and {MAX_DELEGATION_DEPTH}"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    if !matches!(config.logging.target.as_str(), "stdout" | "stderr") {
        return Err(invalid(
            "logging.target",
            format!(
                "unsupported log target '{}'; expected stdout or stderr",
                config.logging.target
            ),
        ));
    }
    Ok(())
}
