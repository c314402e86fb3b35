//! CLI handlers for the `ajwt config` subcommand.

use std::path::{Path, PathBuf};

use ajwt_config::loader::{SYSTEM_CONFIG_PATH, user_config_dir};
use ajwt_config::{Config, LoadOptions, ResolvedConfig, ShowFormat};
use anyhow::Result;

use crate::theme::Theme;

/// Load with full precedence and an optional explicit file.
pub(crate) fn resolve(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let options = LoadOptions {
        explicit_file: explicit.map(Path::to_path_buf),
        ..LoadOptions::default()
    };
    Ok(Config::load_with(&options)?)
}

/// Show the resolved configuration with source annotations.
pub(crate) fn show_config(explicit: Option<&Path>, format: &str, section: Option<&str>) -> Result<()> {
    let resolved = resolve(explicit)?;
    let show_format = match format {
        "json" => ShowFormat::Json,
        _ => ShowFormat::Toml,
    };
    let output = resolved
        .show(show_format, section)
        .map_err(|e| anyhow::anyhow!("failed to format config: {e}"))?;
    println!("{output}");
    Ok(())
}

/// Validate the current configuration.
pub(crate) fn validate_config(explicit: Option<&Path>) -> Result<()> {
    let resolved = resolve(explicit)?;
    println!("{}", Theme::success("Configuration is valid."));
    if !resolved.loaded_files.is_empty() {
        println!("\nLoaded files:");
        for path in &resolved.loaded_files {
            println!("  - {path}");
        }
    }
    Ok(())
}

/// Show every config file path that is checked, and the env fallbacks.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn show_paths(explicit: Option<&Path>) -> Result<()> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    if let Ok(dir) = user_config_dir() {
        paths.push(dir.join("config.toml"));
    }
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }

    println!("Configuration files checked (in precedence order):\n");
    for (i, path) in paths.iter().enumerate() {
        let status = if path.exists() { "found" } else { "not found" };
        println!("  {}. {}  [{status}]", i.saturating_add(1), path.display());
    }

    println!("\nEnvironment variable fallbacks:");
    for (var, field) in ajwt_config::env::env_fallbacks() {
        println!("  {var:<28} -> {field}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ajwt.toml");
        std::fs::write(&path, "[issuer]\nname = \"corp\"\n").unwrap();
        let resolved = resolve(Some(&path)).unwrap();
        assert_eq!(resolved.config.issuer.name, "corp");
        assert!(resolved.loaded_files.iter().any(|f| f.ends_with("ajwt.toml")));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(resolve(Some(Path::new("/nonexistent/ajwt.toml"))).is_err());
    }
}
