//! Config file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`.
//! 2. Merge `/etc/ajwt/config.toml`.
//! 3. Merge `~/.ajwt/config.toml` (or `config.toml` in a home override).
//! 4. Merge the explicit file, if one was given.
//! 5. Apply `AJWT_*` fallbacks to fields no file set.
//! 6. Deserialize and validate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/ajwt/config.toml";

/// Maximum config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Where to look for configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding the user `config.toml`, replacing `~/.ajwt`.
    pub home_override: Option<PathBuf>,
    /// Highest-precedence file.
    pub explicit_file: Option<PathBuf>,
    /// Skip `/etc/ajwt/config.toml`.
    pub skip_system: bool,
    /// Environment to read fallbacks from. `None` reads the process
    /// environment.
    pub env: Option<HashMap<String, String>>,
}

/// Load configuration with full precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable, oversized, or
/// malformed, or if the merged configuration fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    let env_vars = options.env.clone().unwrap_or_else(collect_env_vars);

    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let mut layers: Vec<(PathBuf, ConfigLayer)> = Vec::new();
    if !options.skip_system {
        layers.push((PathBuf::from(SYSTEM_CONFIG_PATH), ConfigLayer::System));
    }
    let user_dir = match &options.home_override {
        Some(dir) => Some(dir.clone()),
        None => user_config_dir().ok(),
    };
    if let Some(dir) = user_dir {
        layers.push((dir.join("config.toml"), ConfigLayer::User));
    }

    for (path, layer) in layers {
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            info!(path = %path.display(), layer = %layer, "loaded config");
            loaded_files.push(path.display().to_string());
        }
    }

    if let Some(path) = &options.explicit_file {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::File,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.display().to_string());
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a single file with no layering.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or
/// validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// `~/.ajwt`.
///
/// # Errors
///
/// [`ConfigError::NoHomeDir`] if no home directory can be determined.
pub fn user_config_dir() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".ajwt"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Read and parse a file, returning `None` if it does not exist.
///
/// Reads once and checks the size afterwards, so there is no window between
/// a metadata check and the read.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}
