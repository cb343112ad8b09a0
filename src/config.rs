//! Engine settings.
//!
//! Settings are an explicit value handed to the I/O provider at
//! construction. They load from TOML, where every field is optional, and
//! a few fields can be overridden from the environment.
//!
//! ```toml
//! default_output_prefix = "output"
//!
//! [io]
//! upload_dir = "./uploads"
//! output_dir = "./outputs"
//! allowed_extensions = [".csv", ".json"]
//! confine_sources = true
//! ```

use crate::core::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`IoSettings::upload_dir`].
pub const ENV_UPLOAD_DIR: &str = "ETLGRAPH_UPLOAD_DIR";
/// Environment variable overriding [`IoSettings::output_dir`].
pub const ENV_OUTPUT_DIR: &str = "ETLGRAPH_OUTPUT_DIR";
/// Environment variable overriding [`IoSettings::allowed_extensions`], comma separated.
pub const ENV_ALLOWED_EXTENSIONS: &str = "ETLGRAPH_ALLOWED_EXTENSIONS";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// File and storage settings for [`LocalIo`](crate::io::LocalIo)
    pub io: IoSettings,
    /// Prefix of the default sink name, followed by `_{run_id}`
    pub default_output_prefix: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            io: IoSettings::default(),
            default_output_prefix: "output".to_string(),
        }
    }
}

/// Where file sources are read from and file sinks write to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSettings {
    /// Directory file sources resolve against
    pub upload_dir: PathBuf,
    /// Directory file sinks write into
    pub output_dir: PathBuf,
    /// Extensions (with the dot) file sources may have
    pub allowed_extensions: Vec<String>,
    /// Reject source paths outside `upload_dir` or with other extensions
    pub confine_sources: bool,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./outputs"),
            allowed_extensions: [".csv", ".xlsx", ".xls", ".json"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            confine_sources: true,
        }
    }
}

impl IoSettings {
    /// Check an extension against the allow list, ignoring case.
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let wanted = format!(".{}", extension.trim_start_matches('.').to_lowercase());
        self.allowed_extensions
            .iter()
            .any(|e| e.to_lowercase() == wanted)
    }
}

impl EngineSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults, or the file when given, with environment overrides applied.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a lookup function.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_UPLOAD_DIR).filter(|v| !v.is_empty()) {
            self.io.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.is_empty()) {
            self.io.output_dir = PathBuf::from(dir);
        }
        if let Some(list) = lookup(ENV_ALLOWED_EXTENSIONS) {
            self.io.allowed_extensions = list
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(|e| {
                    if e.starts_with('.') {
                        e.to_string()
                    } else {
                        format!(".{}", e)
                    }
                })
                .collect();
        }
    }

    /// Default sink name for a run.
    pub fn default_output_name(&self, run_id: &str) -> String {
        format!("{}_{}", self.default_output_prefix, run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.io.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(settings.io.allowed_extensions.len(), 4);
        assert!(settings.io.confine_sources);
        assert_eq!(settings.default_output_name("r1"), "output_r1");
    }

    #[test]
    fn test_partial_toml() {
        let settings = EngineSettings::from_toml_str(
            r#"
            [io]
            output_dir = "/tmp/out"
            confine_sources = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.io.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.io.upload_dir, PathBuf::from("./uploads"));
        assert!(!settings.io.confine_sources);
        assert_eq!(settings.default_output_prefix, "output");
    }

    #[test]
    fn test_invalid_toml() {
        let error = EngineSettings::from_toml_str("io = 3").unwrap_err();
        assert!(matches!(error, SettingsError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let error = EngineSettings::from_file("/nonexistent/etlgraph.toml").unwrap_err();
        assert!(matches!(error, SettingsError::Read { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_UPLOAD_DIR, "/data/in"),
            (ENV_ALLOWED_EXTENSIONS, "csv, .JSON"),
        ]
        .into_iter()
        .collect();
        let mut settings = EngineSettings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.io.upload_dir, PathBuf::from("/data/in"));
        assert_eq!(settings.io.output_dir, PathBuf::from("./outputs"));
        assert_eq!(settings.io.allowed_extensions, vec![".csv", ".JSON"]);
        assert!(settings.io.is_allowed_extension("json"));
        assert!(!settings.io.is_allowed_extension("xlsx"));
    }
}
