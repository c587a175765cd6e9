use anyhow::{anyhow, Context, Result};
use nexus_core::DEFAULT_COLLECTION_KEY;
use nexus_errors::NexusError;
use nexus_memory::Memory;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageCfg {
    #[serde(default = "def_engine")]
    pub engine: String, // lmdb | memory
    #[serde(default = "def_path")]
    pub path: String,
    #[serde(default = "def_map_size_mb")]
    pub map_size_mb: usize,
    #[serde(default = "def_collection_key")]
    pub collection_key: String,
    /// Byte limit for the memory engine. Ignored by lmdb.
    #[serde(default)]
    pub quota_bytes: Option<usize>,
}
fn def_engine() -> String { "lmdb".into() }
fn def_path() -> String { "./.nexus".into() }
fn def_map_size_mb() -> usize { 64 }
fn def_collection_key() -> String { DEFAULT_COLLECTION_KEY.into() }

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            engine: def_engine(),
            path: def_path(),
            map_size_mb: def_map_size_mb(),
            collection_key: def_collection_key(),
            quota_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingCfg {
    #[serde(default = "def_mode")]
    pub mode: String, // json | pretty | compact
    #[serde(default = "def_level")]
    pub level: String,
}
fn def_mode() -> String { "compact".into() }
fn def_level() -> String { "warn".into() }

impl Default for LoggingCfg {
    fn default() -> Self {
        Self { mode: def_mode(), level: def_level() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingCfg {
    #[serde(default)]
    pub otlp_endpoint: String,
    #[serde(default = "def_service_name")]
    pub service_name: String,
}
fn def_service_name() -> String { "nexus".into() }

impl Default for TracingCfg {
    fn default() -> Self {
        Self { otlp_endpoint: String::new(), service_name: def_service_name() }
    }
}

impl TracingCfg {
    pub fn otlp_endpoint(&self) -> Option<&str> {
        Some(self.otlp_endpoint.as_str()).filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerCfg {
    #[serde(default = "def_delay_ms")]
    pub delay_ms: u64,
}
fn def_delay_ms() -> u64 { 1500 }

impl Default for CheckerCfg {
    fn default() -> Self {
        Self { delay_ms: def_delay_ms() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
    #[serde(default)]
    pub tracing: TracingCfg,
    #[serde(default)]
    pub checker: CheckerCfg,
}

impl FileConfig {
    /// Open the substrate named by `storage.engine`.
    pub fn open_memory(&self) -> Result<Memory> {
        match self.storage.engine.as_str() {
            "lmdb" => Memory::open_lmdb(&self.storage.path, self.storage.map_size_mb * 1024 * 1024),
            "memory" => Ok(match self.storage.quota_bytes {
                Some(quota) => Memory::memory_with_quota(quota),
                None => Memory::memory(),
            }),
            other => Err(anyhow!("Unknown storage engine: {} (expected lmdb or memory)", other)),
        }
    }
}

pub fn load_config(path: &str) -> Result<FileConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        Ok(serde_yml::from_str(&content)?)
    } else if path.ends_with(".json") {
        Ok(serde_json::from_str(&content)?)
    } else if path.ends_with(".toml") {
        Ok(toml::from_str(&content)?)
    } else {
        Err(anyhow!("Unknown config extension: {}", path))
    }
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &str) -> Result<FileConfig, NexusError> {
    if !Path::new(path).exists() {
        debug!(path, "config file not found, using defaults");
        return Ok(FileConfig::default());
    }
    load_config(path).map_err(|e| NexusError::Config(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(name: &str, body: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    #[test]
    fn yaml_overrides_and_defaults_mix() {
        let (_dir, path) = write_tmp(
            "nexus.yaml",
            "storage:\n  engine: memory\n  quota_bytes: 4096\nchecker:\n  delay_ms: 0\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.storage.engine, "memory");
        assert_eq!(cfg.storage.quota_bytes, Some(4096));
        assert_eq!(cfg.storage.collection_key, DEFAULT_COLLECTION_KEY);
        assert_eq!(cfg.checker.delay_ms, 0);
        assert_eq!(cfg.logging.mode, "compact");
        assert!(!cfg.open_memory().unwrap().is_persistent());
    }

    #[test]
    fn toml_and_json_are_supported() {
        let (_d1, toml_path) = write_tmp(
            "nexus.toml",
            "[tracing]\notlp_endpoint = \"http://collector:4317\"\n",
        );
        let cfg = load_config(&toml_path).unwrap();
        assert_eq!(cfg.tracing.otlp_endpoint(), Some("http://collector:4317"));
        assert_eq!(cfg.tracing.service_name, "nexus");

        let (_d2, json_path) = write_tmp("nexus.json", r#"{"logging": {"mode": "json"}}"#);
        let cfg = load_config(&json_path).unwrap();
        assert_eq!(cfg.logging.mode, "json");
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.tracing.otlp_endpoint(), None);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let (_dir, path) = write_tmp("nexus.ini", "engine=memory");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unknown config extension"));
    }

    #[test]
    fn missing_file_means_defaults() {
        let cfg = load_or_default("/definitely/not/here/nexus.yaml").unwrap();
        assert_eq!(cfg.storage.engine, "lmdb");
        assert_eq!(cfg.checker.delay_ms, 1500);
    }

    #[test]
    fn broken_file_is_a_config_error() {
        let (_dir, path) = write_tmp("nexus.yaml", "storage: [unterminated");
        assert!(matches!(load_or_default(&path), Err(NexusError::Config(_))));
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let mut cfg = FileConfig::default();
        cfg.storage.engine = "redis".into();
        assert!(cfg.open_memory().is_err());
    }

    #[test]
    fn lmdb_engine_opens_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = FileConfig::default();
        cfg.storage.path = dir.path().join("store").to_string_lossy().into_owned();
        cfg.storage.map_size_mb = 8;
        assert!(cfg.open_memory().unwrap().is_persistent());
    }
}
