//! Layered configuration and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml` and
//! `APP_*` environment variables (`__` separates nested keys, so
//! `APP_STORE__URI` sets `store.uri`). `RUST_ENV` selects `<env>`, `dev` when
//! unset. Relative paths are resolved against the directory the config was
//! loaded from.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::error::Error;

pub struct Config {
    figment: Figment,
    env_name: String,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(dir, &env_name)
    }

    pub fn load_for_env(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name: env_name.to_string(), base_dir: dir.to_path_buf() };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed settings with relative paths resolved against the config directory.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(settings.resolve_paths(&self.base_dir))
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    fn validate_for_env(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        match self.env_name.as_str() {
            "prod" | "production" => {
                if settings.embedding.fake {
                    return Err(Error::InvalidConfig("fake embeddings are not allowed in production".into()).into());
                }
                if settings.store.backend == StoreBackend::Memory {
                    return Err(Error::InvalidConfig("the in-memory store is not allowed in production".into()).into());
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub docs: DocsConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        self.chunking.validate()?;
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(Error::InvalidConfig(format!(
                "search.default_limit must be in 1..={} (got {})",
                self.search.max_limit, self.search.default_limit
            )));
        }
        if self.timeouts.embed_ms == 0 || self.timeouts.store_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be positive".into()));
        }
        if self.docs.extension.is_empty() {
            return Err(Error::InvalidConfig("docs.extension must not be empty".into()));
        }
        if self.store.collection.is_empty() {
            return Err(Error::InvalidConfig("store.collection must not be empty".into()));
        }
        Ok(())
    }

    pub fn resolve_paths(mut self, base: &Path) -> Self {
        self.docs.root = resolve_with_base(base, self.docs.root.to_string_lossy());
        self.embedding.model_dir = self
            .embedding
            .model_dir
            .map(|dir| resolve_with_base(base, dir.to_string_lossy()));
        if self.store.backend == StoreBackend::Lancedb && !self.store.uri.contains("://") {
            self.store.uri = resolve_with_base(base, &self.store.uri).to_string_lossy().to_string();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub root: PathBuf,
    pub extension: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("docs"), extension: "md".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_id: String,
    /// Directory holding `config.json`, `tokenizer.json` and the weights.
    pub model_dir: Option<PathBuf>,
    pub dim: usize,
    /// Token window; longer inputs are truncated.
    pub max_len: usize,
    pub fake: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            dim: 384,
            max_len: 256,
            fake: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Lancedb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub uri: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Lancedb,
            uri: "data/lancedb".to_string(),
            collection: "physical_ai_book".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 5, max_limit: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on one embedding call, in milliseconds.
    pub embed_ms: u64,
    /// Bound on one vector store round trip, in milliseconds.
    pub store_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { embed_ms: 30_000, store_ms: 30_000 }
    }
}

impl TimeoutConfig {
    pub fn embed(&self) -> Duration {
        Duration::from_millis(self.embed_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
