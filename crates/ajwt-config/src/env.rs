//! Environment variable fallbacks.
//!
//! `AJWT_*` variables are fallbacks, not overrides: they only apply to
//! fields that no configuration file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// How a variable's string value becomes a TOML value.
#[derive(Clone, Copy)]
enum Kind {
    Str,
    Int,
    Bool,
}

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: Kind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "AJWT_ISSUER",
        field_path: "issuer.name",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "AJWT_AUDIENCE",
        field_path: "issuer.audience",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "AJWT_ISSUER_KEY_PATH",
        field_path: "issuer.key_path",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "AJWT_TOKEN_TTL_SECS",
        field_path: "tokens.ttl_secs",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "AJWT_TOKEN_LEEWAY_SECS",
        field_path: "tokens.leeway_secs",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "AJWT_POP_MAX_SKEW_SECS",
        field_path: "possession.max_skew_secs",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "AJWT_KEY_LOOKUP_TIMEOUT_MS",
        field_path: "possession.key_lookup_timeout_ms",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "AJWT_DELEGATION_MAX_DEPTH",
        field_path: "delegation.max_depth",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "AJWT_REQUIRE_ACTIVATION",
        field_path: "registry.require_activation",
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "AJWT_PROMPT_NORMALIZE",
        field_path: "prompt.normalize",
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "AJWT_LOG_LEVEL",
        field_path: "logging.level",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "AJWT_LOG_FORMAT",
        field_path: "logging.format",
        kind: Kind::Str,
    },
];

/// Every supported variable with the field it falls back to.
pub fn env_fallbacks() -> impl Iterator<Item = (&'static str, &'static str)> {
    ENV_MAPPINGS.iter().map(|m| (m.var_name, m.field_path))
}

/// Apply environment fallbacks to fields no file layer set.
///
/// Returns the number of variables applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if matches!(
            sources.get(mapping.field_path),
            Some(layer) if *layer != ConfigLayer::Defaults
        ) {
            continue;
        }
        let Some(val) = env_vars.get(mapping.var_name) else {
            continue;
        };
        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        if set_field(merged, mapping.field_path, coerce(mapping.kind, val)) {
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Collect the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Unparseable numbers and booleans stay strings so deserialization reports
/// the bad field.
fn coerce(kind: Kind, val: &str) -> toml::Value {
    match kind {
        Kind::Int => val
            .parse::<i64>()
            .map_or_else(|_| toml::Value::String(val.to_owned()), toml::Value::Integer),
        Kind::Bool => val
            .parse::<bool>()
            .map_or_else(|_| toml::Value::String(val.to_owned()), toml::Value::Boolean),
        Kind::Str => toml::Value::String(val.to_owned()),
    }
}

/// Set a dotted path, creating intermediate tables. Returns `false` if a
/// non-table value is in the way.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return true;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_fills_unset_fields() {
        let mut merged: toml::Value = toml::from_str("[tokens]\nttl_secs = 300\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("tokens.ttl_secs".into(), ConfigLayer::Defaults);

        let env = make_env(&[("AJWT_TOKEN_TTL_SECS", "120"), ("AJWT_AUDIENCE", "tools")]);
        let applied = apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(applied, 2);
        assert_eq!(merged["tokens"]["ttl_secs"].as_integer(), Some(120));
        assert_eq!(merged["issuer"]["audience"].as_str(), Some("tools"));
        assert_eq!(
            sources.get("issuer.audience"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_file_values_win_over_env() {
        let mut merged: toml::Value = toml::from_str("[tokens]\nttl_secs = 90\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("tokens.ttl_secs".into(), ConfigLayer::User);

        let env = make_env(&[("AJWT_TOKEN_TTL_SECS", "120")]);
        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 0);
        assert_eq!(merged["tokens"]["ttl_secs"].as_integer(), Some(90));
    }

    #[test]
    fn test_booleans_coerced() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        let env = make_env(&[("AJWT_PROMPT_NORMALIZE", "true")]);
        apply_env_fallbacks(&mut merged, &mut sources, &env);
        assert_eq!(merged["prompt"]["normalize"].as_bool(), Some(true));
    }

    #[test]
    fn test_set_field_refuses_scalar_parent() {
        let mut merged: toml::Value = toml::from_str("issuer = \"flat\"\n").unwrap();
        assert!(!set_field(
            &mut merged,
            "issuer.name",
            toml::Value::String("x".into())
        ));
    }
}
