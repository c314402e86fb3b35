//! Source-annotated display for `config show`.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration with the layer that set each field.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Files loaded, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with a source comment on each value.
    Toml,
    /// JSON.
    Json,
}

impl ResolvedConfig {
    /// Render the configuration, or one section of it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or `section` does not exist.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(section),
            ShowFormat::Json => {
                let val = self.section_value(section)?;
                serde_json::to_string_pretty(&val).map_err(|_| fmt::Error)
            },
        }
    }

    fn section_value(&self, section: Option<&str>) -> Result<toml::Value, fmt::Error> {
        let val = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        match section {
            Some(name) => val.get(name).cloned().ok_or(fmt::Error),
            None => Ok(val),
        }
    }

    fn show_toml(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let toml_str =
            toml::to_string_pretty(&self.section_value(section)?).map_err(|_| fmt::Error)?;

        let mut output = String::new();
        output.push_str("# Resolved A-JWT configuration\n");
        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                writeln!(output, "#   {}. {path}", i.saturating_add(1))?;
            }
        }
        output.push('\n');

        let mut current_table = section.unwrap_or("").to_owned();
        for line in toml_str.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                current_table = match section {
                    Some(s) => format!("{s}.{header}"),
                    None => header.to_owned(),
                };
            }
            match self.annotation(trimmed, &current_table) {
                Some(layer) => writeln!(output, "{line}  # [{layer}]")?,
                None => writeln!(output, "{line}")?,
            }
        }
        Ok(output)
    }

    fn annotation(&self, line: &str, table: &str) -> Option<String> {
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            return None;
        }
        let key = line.split('=').next()?.trim();
        let path = if table.is_empty() {
            key.to_owned()
        } else {
            format!("{table}.{key}")
        };
        self.field_sources.get(&path).map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("tokens.ttl_secs".into(), ConfigLayer::Environment);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/home/user/.ajwt/config.toml".into()],
        }
    }

    #[test]
    fn test_show_toml_annotates_sources() {
        let output = resolved().show(ShowFormat::Toml, None).unwrap();
        assert!(output.contains("Resolved A-JWT configuration"));
        assert!(output.contains("1. /home/user/.ajwt/config.toml"));
        let ttl = output
            .lines()
            .find(|l| l.starts_with("ttl_secs"))
            .unwrap();
        assert!(ttl.ends_with("# [environment variable]"));
    }

    #[test]
    fn test_show_json_section() {
        let output = resolved().show(ShowFormat::Json, Some("tokens")).unwrap();
        let val: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(val["ttl_secs"], 300);
        assert!(val.get("issuer").is_none());
    }

    #[test]
    fn test_unknown_section_is_error() {
        assert!(resolved().show(ShowFormat::Toml, Some("nope")).is_err());
    }
}
