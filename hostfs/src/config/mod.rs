// Config helpers
use crate::util::paths::DEFAULT_MAX_PATH_LEN;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_MAX_PATH_LEN: &str = "HOSTFS_MAX_PATH_LEN";
pub const ENV_RMDIR_STRICT: &str = "HOSTFS_RMDIR_STRICT";

/// What `rmdir` does when a directory it has emptied cannot itself be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmdirPolicy {
    /// Log a warning and carry on.
    #[default]
    BestEffort,
    /// Fail with `RmdirFailed`.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub max_path_len: usize,
    pub default_dir_mode: u32,
    pub mime_sample_len: usize,
    pub rmdir_policy: RmdirPolicy,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            max_path_len: DEFAULT_MAX_PATH_LEN,
            default_dir_mode: 0o777,
            mime_sample_len: 8192,
            rmdir_policy: RmdirPolicy::BestEffort,
        }
    }
}

impl FsConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Loads `<config dir>/hostfs/config.json` if present, defaults otherwise,
    /// then applies environment overrides.
    pub fn load_default() -> Result<Self> {
        let config = match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_env()
    }

    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(val) = std::env::var(ENV_MAX_PATH_LEN) {
            self.max_path_len = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_MAX_PATH_LEN}: {val:?}"))?;
        }
        if let Ok(val) = std::env::var(ENV_RMDIR_STRICT) {
            self.rmdir_policy = match val.trim() {
                "1" | "true" | "yes" => RmdirPolicy::Strict,
                "0" | "false" | "no" | "" => RmdirPolicy::BestEffort,
                other => anyhow::bail!("Invalid {ENV_RMDIR_STRICT}: {other:?}"),
            };
        }
        Ok(self)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hostfs").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"rmdir_policy":"strict","mime_sample_len":16}"#)?;

        let config = FsConfig::load(&path)?;
        assert_eq!(config.rmdir_policy, RmdirPolicy::Strict);
        assert_eq!(config.mime_sample_len, 16);
        assert_eq!(config.max_path_len, DEFAULT_MAX_PATH_LEN);
        assert_eq!(config.default_dir_mode, 0o777);
        Ok(())
    }

    #[test]
    fn test_invalid_json_reports_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json")?;

        let err = FsConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(FsConfig::load(Path::new("/definitely/not/here.json")).is_err());
    }
}
