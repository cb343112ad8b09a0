//! The local provider: files under configured directories, SQLite and HTTP.

use crate::config::IoSettings;
use crate::core::context::NodeConfig;
use crate::core::dataset::Dataset;
use crate::core::error::{IoError, IoResult};
use crate::io::{database, delimited, http, json, DataFormat, TabularIo};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Request timeout for API sources and sinks.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Replace every character outside `[A-Za-z0-9._-]` with `_`, keeping only
/// the final path component.
pub fn sanitize_file_name(location: &str) -> String {
    let base = location
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(location);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Provider for local files, SQLite databases and HTTP endpoints.
///
/// File sources are read from the upload directory and file sinks always
/// write into the output directory, whatever path the node asks for.
pub struct LocalIo {
    settings: IoSettings,
    agent: ureq::Agent,
}

impl LocalIo {
    /// Create a provider over the given directories.
    pub fn new(settings: IoSettings) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
        Self { settings, agent }
    }

    /// Get the settings.
    pub fn settings(&self) -> &IoSettings {
        &self.settings
    }

    /// Resolve a source path, enforcing confinement when enabled.
    ///
    /// Relative paths are looked up under the upload directory first and
    /// then as given, so both `orders.csv` and `uploads/orders.csv` work.
    pub fn resolve_source(&self, location: &str) -> IoResult<PathBuf> {
        let requested = Path::new(location);
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            let under_upload = self.settings.upload_dir.join(requested);
            if under_upload.exists() {
                under_upload
            } else {
                requested.to_path_buf()
            }
        };

        if !self.settings.confine_sources {
            if !candidate.is_file() {
                return Err(IoError::NotFound(location.to_string()));
            }
            return Ok(candidate);
        }

        let base = self
            .settings
            .upload_dir
            .canonicalize()
            .map_err(|_| IoError::NotFound(self.settings.upload_dir.display().to_string()))?;
        let resolved = match candidate.canonicalize() {
            Ok(path) => path,
            Err(_) if location.contains("..") => {
                return Err(IoError::PathTraversal(location.to_string()))
            }
            Err(_) => return Err(IoError::NotFound(location.to_string())),
        };
        if !resolved.starts_with(&base) {
            return Err(IoError::PathTraversal(location.to_string()));
        }

        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !self.settings.is_allowed_extension(extension) {
            return Err(IoError::ExtensionNotAllowed {
                path: location.to_string(),
                allowed: self.settings.allowed_extensions.join(", "),
            });
        }
        if !resolved.is_file() {
            return Err(IoError::NotFound(location.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve a sink path inside the output directory, creating it.
    pub fn resolve_sink(&self, location: &str) -> IoResult<PathBuf> {
        let name = sanitize_file_name(location);
        if name.is_empty() || name.chars().all(|c| c == '.') {
            return Err(IoError::InvalidLocation {
                location: location.to_string(),
                reason: "output path has no file name".to_string(),
            });
        }
        std::fs::create_dir_all(&self.settings.output_dir)?;
        Ok(self.settings.output_dir.join(name))
    }

    fn unsupported(format: DataFormat, operation: &str) -> IoError {
        IoError::UnsupportedFormat {
            format: format.display_name().to_string(),
            operation: operation.to_string(),
        }
    }
}

impl Default for LocalIo {
    fn default() -> Self {
        Self::new(IoSettings::default())
    }
}

impl TabularIo for LocalIo {
    fn load(&self, location: &str, format: DataFormat, options: &NodeConfig) -> IoResult<Dataset> {
        log::debug!("loading {} from '{}'", format, location);
        match format {
            DataFormat::Csv => delimited::read(&self.resolve_source(location)?, options),
            DataFormat::Json => json::read(&self.resolve_source(location)?, options),
            DataFormat::Excel => Err(Self::unsupported(format, "reading")),
            DataFormat::Database => database::read(location, options),
            DataFormat::Api => http::read(&self.agent, location, options),
        }
    }

    fn write(
        &self,
        data: &Dataset,
        location: &str,
        format: DataFormat,
        options: &NodeConfig,
    ) -> IoResult<String> {
        log::debug!("writing {} rows as {} to '{}'", data.row_count(), format, location);
        match format {
            DataFormat::Csv | DataFormat::Json => {
                let path = self.resolve_sink(location)?;
                if format == DataFormat::Csv {
                    delimited::write(data, &path, options)?;
                } else {
                    json::write(data, &path, options)?;
                }
                Ok(path.display().to_string())
            }
            DataFormat::Excel => Err(Self::unsupported(format, "writing")),
            DataFormat::Database => database::write(data, location, options),
            DataFormat::Api => http::write(&self.agent, data, location, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn provider(root: &TempDir) -> LocalIo {
        let upload_dir = root.path().join("uploads");
        fs::create_dir_all(&upload_dir).unwrap();
        LocalIo::new(IoSettings {
            upload_dir,
            output_dir: root.path().join("outputs"),
            ..IoSettings::default()
        })
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my report (1).csv"), "my_report__1_.csv");
        assert_eq!(sanitize_file_name("C:\\data\\out.json"), "out.json");
    }

    #[test]
    fn test_load_from_upload_dir() {
        let root = tempfile::tempdir().unwrap();
        let io = provider(&root);
        fs::write(root.path().join("uploads/orders.csv"), "id,amt\n1,5\n").unwrap();

        let data = io.load("orders.csv", DataFormat::Csv, &NodeConfig::new()).unwrap();
        assert_eq!(data.row_count(), 1);
    }

    #[test]
    fn test_source_confinement() {
        let root = tempfile::tempdir().unwrap();
        let io = provider(&root);
        fs::write(root.path().join("secret.csv"), "a\n1\n").unwrap();
        fs::write(root.path().join("uploads/notes.txt"), "a\n1\n").unwrap();

        let outside = root.path().join("secret.csv").display().to_string();
        assert!(matches!(io.resolve_source(&outside), Err(IoError::PathTraversal(_))));
        assert!(matches!(io.resolve_source("../secret.csv"), Err(IoError::PathTraversal(_))));
        assert!(matches!(
            io.resolve_source("notes.txt"),
            Err(IoError::ExtensionNotAllowed { .. })
        ));
        assert!(matches!(io.resolve_source("missing.csv"), Err(IoError::NotFound(_))));
    }

    #[test]
    fn test_sink_writes_into_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let io = provider(&root);
        let data = Dataset::from_json_records(&[json!({"a": 1})]).unwrap();

        let location = io
            .write(&data, "../elsewhere/result file.json", DataFormat::Json, &NodeConfig::new())
            .unwrap();
        let expected = root.path().join("outputs").join("result_file.json");
        assert_eq!(location, expected.display().to_string());
        assert!(expected.is_file());
    }

    #[test]
    fn test_excel_unsupported() {
        let root = tempfile::tempdir().unwrap();
        let io = provider(&root);
        let error = io.load("book.xlsx", DataFormat::Excel, &NodeConfig::new()).unwrap_err();
        assert!(matches!(error, IoError::UnsupportedFormat { .. }));
        assert!(error.to_string().contains("Excel"));
    }
}
