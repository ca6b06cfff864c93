#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

/// Environment variable overriding the base data directory. Used by tests
/// and by deployments that keep the index outside the user's home.
pub const BASE_DIR_ENV: &str = "DEPT_CHAT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.1:latest".to_string(),
            batch_size: 16,
        }
    }
}

/// Retrieval and context-assembly knobs consumed by the query engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates returned from the index per query, before the permission
    /// filter runs. Larger than the context size since filtering is expected
    /// to discard some candidates.
    pub top_k: usize,
    /// Cosine pool size the diversity-aware selection draws from.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off for maximal-marginal-relevance
    /// selection; 1.0 degenerates to pure nearest-neighbor.
    pub mmr_lambda: f32,
    /// Retained passages concatenated into the generation context.
    pub context_passages: usize,
    /// Character budget for the combined context block.
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 5,
            fetch_k: 20,
            mmr_lambda: 0.5,
            context_passages: 3,
            max_context_chars: 4000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Data directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid chunk size: {0} (must be between 1 and 10000 words)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidOverlap(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("fetch_k ({0}) must be at least top_k ({1})")]
    InvalidFetchK(usize, usize),
    #[error("Invalid MMR lambda: {0} (must be between 0.0 and 1.0)")]
    InvalidMmrLambda(f32),
    #[error("context_passages ({0}) must be between 1 and top_k ({1})")]
    InvalidContextPassages(usize, usize),
    #[error("Invalid context budget: {0} (must be at least 200 characters)")]
    InvalidContextBudget(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from the default base directory.
    #[inline]
    pub fn load() -> Result<Self> {
        let base_dir = Self::default_base_dir().context("Failed to resolve data directory")?;
        Self::load_from(base_dir)
    }

    /// Load configuration from `config.toml` under the given directory,
    /// falling back to defaults when the file does not exist.
    #[inline]
    pub fn load_from<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                ollama: OllamaConfig::default(),
                chunking: ChunkingConfig::default(),
                retrieval: RetrievalConfig::default(),
                base_dir: base_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = base_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Resolve the base data directory: `DEPT_CHAT_DIR` if set, otherwise
    /// a `dept-chat` directory under the platform data dir.
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(BASE_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        dirs::data_local_dir()
            .map(|dir| dir.join("dept-chat"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.validate_chunking()?;
        self.validate_retrieval()?;
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;

        if !(1..=10_000).contains(&chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(chunking.chunk_size));
        }

        if chunking.overlap >= chunking.chunk_size {
            return Err(ConfigError::InvalidOverlap(
                chunking.overlap,
                chunking.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if !(1..=100).contains(&retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(retrieval.top_k));
        }

        if retrieval.fetch_k < retrieval.top_k {
            return Err(ConfigError::InvalidFetchK(
                retrieval.fetch_k,
                retrieval.top_k,
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.mmr_lambda) {
            return Err(ConfigError::InvalidMmrLambda(retrieval.mmr_lambda));
        }

        if retrieval.context_passages == 0 || retrieval.context_passages > retrieval.top_k {
            return Err(ConfigError::InvalidContextPassages(
                retrieval.context_passages,
                retrieval.top_k,
            ));
        }

        if retrieval.max_context_chars < 200 {
            return Err(ConfigError::InvalidContextBudget(
                retrieval.max_context_chars,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Path of the serving index bundle.
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join("index.json")
    }

    /// Path of the single-flight ingestion lock file.
    #[inline]
    pub fn ingest_lock_path(&self) -> PathBuf {
        self.base_dir.join(".ingest.lock")
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
