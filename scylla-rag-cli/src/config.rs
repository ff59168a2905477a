//! Layered configuration for the `scylla-rag` binary.
//!
//! Values come from the TOML file first, then from the process environment
//! (after `.env` has been loaded), so a deployment can keep credentials out of
//! the file.

use std::path::Path;

use anyhow::{Context, Result};
use scylla_rag::{OllamaConfig, RagConfig, StoreConfig};
use serde::Deserialize;

/// File read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "scylla-rag.toml";

/// Table that holds chunks unless `--collection` says otherwise.
pub const DEFAULT_COLLECTION: &str = "rag.md_chunks";

/// Chunks used as context when neither the file nor `--top-k` choose.
pub const DEFAULT_TOP_K: usize = 3;

/// Everything the binary needs to build a pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub ollama: OllamaConfig,
    pub rag: RagConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            ollama: OllamaConfig::default(),
            rag: RagConfig { top_k: DEFAULT_TOP_K, ..RagConfig::default() },
        }
    }
}

impl AppConfig {
    /// Load `path` (or [`DEFAULT_CONFIG_FILE`] if present), then `.env`, then
    /// environment overrides, and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        // a missing .env is the common case
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.rag.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(text)?;
        // a [rag] section without top_k keeps the binary's default, not the library's
        if let Some(toml::Value::Table(rag)) = table.get_mut("rag") {
            rag.entry("top_k").or_insert(toml::Value::Integer(DEFAULT_TOP_K as i64));
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Override fields from `SCYLLA_*` and `OLLAMA_HOST` variables.
    ///
    /// Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(hosts) = var("SCYLLA_HOSTS") {
            self.store.hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(port) = var("SCYLLA_PORT") {
            self.store.port =
                port.trim().parse().with_context(|| format!("SCYLLA_PORT is not a port: {port}"))?;
        }
        if let Some(datacenter) = var("SCYLLA_DATACENTER") {
            self.store.datacenter = Some(datacenter);
        }
        if let Some(username) = var("SCYLLA_USERNAME") {
            self.store.username = Some(username);
        }
        if let Some(password) = var("SCYLLA_PASSWORD") {
            self.store.password = Some(password);
        }
        if let Some(keyspace) = var("SCYLLA_KEYSPACE") {
            self.store.keyspace = keyspace;
        }
        if let Some(host) = var("OLLAMA_HOST") {
            self.ollama.base_url = ollama_url(host.trim());
        }
        Ok(())
    }
}

/// `OLLAMA_HOST` is often given as a bare `host:port`.
fn ollama_url(host: &str) -> String {
    if host.contains("://") { host.to_string() } else { format!("http://{host}") }
}
