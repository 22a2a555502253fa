//! Guard configuration
//!
//! The two ceilings are fixed before the guarded code runs. They can be
//! constructed directly, deserialized from JSON, or read from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{GuardError, Result};
use crate::util;

/// Default location of the usage artifact, relative to the working directory
pub const DEFAULT_USAGE_PATH: &str = "rusage.txt";

pub const ENV_MEMORY_LIMIT: &str = "REXE_MEMORY_LIMIT_MIB";
pub const ENV_TIME_LIMIT: &str = "REXE_TIME_LIMIT_SEC";
pub const ENV_USAGE_FILE: &str = "REXE_USAGE_FILE";

/// Ceilings applied by the guard and where its usage record goes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Memory ceiling in mebibytes (address space, data segment, stack)
    pub memory_limit_mib: u64,
    /// CPU time ceiling in seconds
    pub time_limit_sec: u64,
    /// Usage artifact path
    #[serde(default = "default_usage_path")]
    pub usage_path: PathBuf,
}

fn default_usage_path() -> PathBuf {
    PathBuf::from(DEFAULT_USAGE_PATH)
}

impl GuardConfig {
    pub fn new(memory_limit_mib: u64, time_limit_sec: u64) -> Self {
        Self {
            memory_limit_mib,
            time_limit_sec,
            usage_path: default_usage_path(),
        }
    }

    /// Set the usage artifact path
    pub fn usage_path(mut self, path: impl AsRef<Path>) -> Self {
        self.usage_path = path.as_ref().to_path_buf();
        self
    }

    /// Memory ceiling in bytes
    pub fn memory_limit_bytes(&self) -> Result<u64> {
        util::mib_to_bytes(self.memory_limit_mib)
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_limit_mib == 0 {
            return Err(GuardError::InvalidConfig(
                "Memory limit must be positive".to_string(),
            ));
        }
        if self.time_limit_sec == 0 {
            return Err(GuardError::InvalidConfig(
                "Time limit must be positive".to_string(),
            ));
        }
        self.memory_limit_bytes()?;
        if self.usage_path.as_os_str().is_empty() {
            return Err(GuardError::InvalidConfig(
                "Usage path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GuardError::InvalidConfig(format!("Invalid guard config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading guard config from {}", path.display());
        let json = fs::read_to_string(path).map_err(|e| {
            GuardError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Read `REXE_MEMORY_LIMIT_MIB`, `REXE_TIME_LIMIT_SEC` and optionally `REXE_USAGE_FILE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<u64> {
            let raw = lookup(key)
                .ok_or_else(|| GuardError::InvalidConfig(format!("{} is not set", key)))?;
            raw.trim().parse().map_err(|_| {
                GuardError::InvalidConfig(format!("{} is not an integer: {}", key, raw))
            })
        };

        let mut config = Self::new(required(ENV_MEMORY_LIMIT)?, required(ENV_TIME_LIMIT)?);
        if let Some(path) = lookup(ENV_USAGE_FILE) {
            config.usage_path = PathBuf::from(path);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay values present in the environment onto this config
    pub fn merge_env(self) -> Result<Self> {
        self.merge_lookup(|key| std::env::var(key).ok())
    }

    fn merge_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parse = |key: &str, raw: String| -> Result<u64> {
            raw.trim().parse().map_err(|_| {
                GuardError::InvalidConfig(format!("{} is not an integer: {}", key, raw))
            })
        };

        if let Some(raw) = lookup(ENV_MEMORY_LIMIT) {
            self.memory_limit_mib = parse(ENV_MEMORY_LIMIT, raw)?;
        }
        if let Some(raw) = lookup(ENV_TIME_LIMIT) {
            self.time_limit_sec = parse(ENV_TIME_LIMIT, raw)?;
        }
        if let Some(path) = lookup(ENV_USAGE_FILE) {
            self.usage_path = PathBuf::from(path);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_new_uses_default_usage_path() {
        let config = GuardConfig::new(256, 5);
        assert_eq!(config.usage_path, PathBuf::from("rusage.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_limit_bytes() {
        assert_eq!(
            GuardConfig::new(256, 5).memory_limit_bytes().unwrap(),
            268435456
        );
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(GuardConfig::new(0, 5).validate().is_err());
        assert!(GuardConfig::new(256, 0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_memory() {
        let err = GuardConfig::new(u64::MAX, 5).validate().unwrap_err();
        assert!(matches!(err, GuardError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json() {
        let config = GuardConfig::from_json(
            r#"{"memory_limit_mib": 128, "time_limit_sec": 2, "usage_path": "/tmp/u.txt"}"#,
        )
        .unwrap();
        assert_eq!(config.memory_limit_mib, 128);
        assert_eq!(config.time_limit_sec, 2);
        assert_eq!(config.usage_path, PathBuf::from("/tmp/u.txt"));
    }

    #[test]
    fn test_from_json_defaults_usage_path() {
        let config =
            GuardConfig::from_json(r#"{"memory_limit_mib": 64, "time_limit_sec": 1}"#).unwrap();
        assert_eq!(config.usage_path, PathBuf::from(DEFAULT_USAGE_PATH));
    }

    #[test]
    fn test_from_json_rejects_unknown_and_invalid() {
        let unknown_field = r#"{"memory_limit_mib": 64, "time_limit_sec": 1, "cpu": 3}"#;
        let zero_time = r#"{"memory_limit_mib": 64, "time_limit_sec": 0}"#;
        assert!(GuardConfig::from_json(unknown_field).is_err());
        assert!(GuardConfig::from_json(zero_time).is_err());
        assert!(GuardConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guard.json");
        fs::write(&path, r#"{"memory_limit_mib": 32, "time_limit_sec": 3}"#).unwrap();

        let config = GuardConfig::load(&path).unwrap();
        assert_eq!(config, GuardConfig::new(32, 3));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GuardConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = GuardConfig::from_lookup(lookup(&[
            (ENV_MEMORY_LIMIT, "256"),
            (ENV_TIME_LIMIT, " 5 "),
        ]))
        .unwrap();
        assert_eq!(config, GuardConfig::new(256, 5));
    }

    #[test]
    fn test_from_lookup_usage_file() {
        let config = GuardConfig::from_lookup(lookup(&[
            (ENV_MEMORY_LIMIT, "1"),
            (ENV_TIME_LIMIT, "1"),
            (ENV_USAGE_FILE, "out/usage.txt"),
        ]))
        .unwrap();
        assert_eq!(config.usage_path, PathBuf::from("out/usage.txt"));
    }

    #[test]
    fn test_from_lookup_missing_or_garbage() {
        assert!(GuardConfig::from_lookup(lookup(&[(ENV_MEMORY_LIMIT, "256")])).is_err());
        assert!(GuardConfig::from_lookup(lookup(&[
            (ENV_MEMORY_LIMIT, "lots"),
            (ENV_TIME_LIMIT, "5"),
        ]))
        .is_err());
    }

    #[test]
    fn test_merge_lookup_overrides_present_keys_only() {
        let config = GuardConfig::new(64, 1)
            .merge_lookup(lookup(&[(ENV_TIME_LIMIT, "9")]))
            .unwrap();
        assert_eq!(config.memory_limit_mib, 64);
        assert_eq!(config.time_limit_sec, 9);
    }
}
