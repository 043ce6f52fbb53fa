//! Graph build configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs for dependency graph construction
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Also parse a restored snapshot every N Document/Copy operations
    pub snapshot_interval: Option<usize>,

    /// Link same-name constructs of adjacent snapshots when no
    /// offset-coincident candidate exists
    pub name_fallback: bool,

    /// Ordered edges from an earlier copy whose source overlaps a later edit
    pub link_copy_sources: bool,

    /// Trim clipboard and pasted text before comparing them
    pub ccp_trim: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            snapshot_interval: None,
            name_fallback: true,
            link_copy_sources: true,
            ccp_trim: true,
        }
    }
}

impl BuildConfig {
    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Whether two clipboard texts count as the same payload
    pub fn clipboard_matches(&self, clipboard: &str, pasted: &str) -> bool {
        if self.ccp_trim {
            clipboard.trim() == pasted.trim()
        } else {
            clipboard == pasted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: BuildConfig = serde_json::from_str(r#"{"snapshot_interval": 50}"#).unwrap();
        assert_eq!(config.snapshot_interval, Some(50));
        assert!(config.name_fallback);
        assert!(config.ccp_trim);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name_fallback": false}}"#).unwrap();
        let config = BuildConfig::from_file(file.path()).unwrap();
        assert!(!config.name_fallback);
        assert!(config.link_copy_sources);

        assert!(BuildConfig::from_file(Path::new("/nonexistent/edithist.json")).is_err());
    }

    #[test]
    fn test_clipboard_matching() {
        let config = BuildConfig::default();
        assert!(config.clipboard_matches(" foo\n", "foo"));
        let exact = BuildConfig {
            ccp_trim: false,
            ..BuildConfig::default()
        };
        assert!(!exact.clipboard_matches(" foo\n", "foo"));
    }
}
