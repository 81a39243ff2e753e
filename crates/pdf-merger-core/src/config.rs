use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Default aggregate upload cap per request (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Suggested filename for every merged document
pub const MERGED_FILENAME: &str = "merged_document.pdf";

/// What the merge pipeline does with requested ids that match no uploaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownIdPolicy {
    /// Drop unmatched ids and merge the rest
    #[default]
    Skip,
    /// Fail the whole merge with `InvalidInput`
    Reject,
}

/// Page-number overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNumberConfig {
    /// Select the working stamper (false selects the unavailable one)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Distance of the text baseline from the bottom of the page, in points
    #[serde(default = "default_bottom_margin")]
    pub bottom_margin: f32,
}

const fn default_true() -> bool {
    true
}

const fn default_font_size() -> f32 {
    9.0
}

const fn default_bottom_margin() -> f32 {
    20.0
}

impl Default for PageNumberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_size: default_font_size(),
            bottom_margin: default_bottom_margin(),
        }
    }
}

/// Application configuration.
///
/// Built once at startup and handed to each component; nothing reads
/// process-wide state after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergerConfig {
    /// Root directory under which each session gets its own scratch directory
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,

    /// Aggregate upload cap per request, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Accepted file extensions, compared case-insensitively
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Handling of merge ids that match no uploaded file
    #[serde(default)]
    pub unknown_ids: UnknownIdPolicy,

    /// Idle time after which an abandoned session is cleared (0 = never)
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,

    /// Page-number overlay settings
    #[serde(default)]
    pub page_numbers: PageNumberConfig,
}

fn default_upload_root() -> PathBuf {
    crate::util::default_upload_root()
}

const fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

const fn default_session_ttl_seconds() -> u64 {
    3600
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            unknown_ids: UnknownIdPolicy::default(),
            session_ttl_seconds: default_session_ttl_seconds(),
            page_numbers: PageNumberConfig::default(),
        }
    }
}

impl MergerConfig {
    /// Default configuration rooted at the given upload directory
    pub fn with_upload_root(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            ..Self::default()
        }
    }

    /// Whether a filename carries one of the allowed extensions.
    pub fn is_allowed(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .is_some_and(|(_, ext)| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    /// Session idle timeout, `None` when expiry is disabled
    pub const fn session_ttl(&self) -> Option<Duration> {
        if self.session_ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.session_ttl_seconds))
        }
    }

    /// Reject values the components cannot work with
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_upload_bytes == 0 {
            return Err(Error::ConfigInvalid {
                field: "max_upload_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.allowed_extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(Error::ConfigInvalid {
                field: "allowed_extensions".to_string(),
                reason: "at least one extension is required".to_string(),
            });
        }

        let font_size = self.page_numbers.font_size;
        if font_size.is_nan() || font_size <= 0.0 {
            return Err(Error::ConfigInvalid {
                field: "page_numbers.font_size".to_string(),
                reason: format!("must be positive, got {}", self.page_numbers.font_size),
            });
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/pdf-merger/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-merger").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let config = MergerConfig::default();
        assert!(config.is_allowed("report.pdf"));
        assert!(config.is_allowed("REPORT.PDF"));
        assert!(config.is_allowed("archive.tar.Pdf"));
        assert!(!config.is_allowed("notes.txt"));
        assert!(!config.is_allowed("pdf"));
        assert!(!config.is_allowed("report.pdf.exe"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: MergerConfig = toml::from_str(
            r#"
            upload_root = "/tmp/merger"
            unknown_ids = "reject"

            [page_numbers]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.upload_root, PathBuf::from("/tmp/merger"));
        assert_eq!(config.unknown_ids, UnknownIdPolicy::Reject);
        assert!(!config.page_numbers.enabled);
        assert!((config.page_numbers.font_size - 9.0).abs() < f32::EPSILON);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.allowed_extensions, vec!["pdf".to_string()]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MergerConfig::default();
        assert!(config.validate().is_ok());

        config.max_upload_bytes = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigInvalid { ref field, .. }) if field == "max_upload_bytes"
        ));

        let mut config = MergerConfig::default();
        config.page_numbers.font_size = 0.0;
        assert!(config.validate().is_err());

        let mut config = MergerConfig::default();
        config.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_ttl_zero_disables_expiry() {
        let mut config = MergerConfig::default();
        assert_eq!(config.session_ttl(), Some(Duration::from_secs(3600)));

        config.session_ttl_seconds = 0;
        assert_eq!(config.session_ttl(), None);
    }
}
