//! Configuration types for the docmind engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::DistanceMetric;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocmindConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Vector index configuration.
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Agent orchestration configuration.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Vector index configuration. Dimension and metric are fixed at
/// construction; changing either requires a full reindex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimensionality enforced at upsert.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Distance metric.
    #[serde(default = "default_metric")]
    pub metric: DistanceMetric,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            metric: default_metric(),
        }
    }
}

/// Embedding provider retry and timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Total attempts before surfacing EmbeddingUnavailable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds (doubles per attempt).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Token overlap between adjacent chunks. Must be < max_tokens.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fetch k * oversample_factor neighbors before filtering.
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    /// Keep only the best chunk per (document, page) group.
    #[serde(default = "default_true")]
    pub dedup_by_page: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            oversample_factor: default_oversample_factor(),
            dedup_by_page: default_true(),
        }
    }
}

/// Agent orchestration limits. Planning retries and tool retries are
/// independent budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum planning cycles before the session is truncated.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Retries for malformed or transiently failing planning calls.
    #[serde(default = "default_max_plan_retries")]
    pub max_plan_retries: u32,

    /// Per planning-call timeout in milliseconds. Elapse counts as a
    /// transient planning failure.
    #[serde(default = "default_plan_timeout_ms")]
    pub plan_timeout_ms: u64,

    /// Default retry budget for retryable tool failures.
    #[serde(default = "default_tool_max_retries")]
    pub tool_max_retries: u32,

    /// Per tool-call timeout in milliseconds.
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_plan_retries: default_max_plan_retries(),
            plan_timeout_ms: default_plan_timeout_ms(),
            tool_max_retries: default_tool_max_retries(),
            tool_timeout_ms: default_tool_timeout_ms(),
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_dimension() -> usize {
    384
}

fn default_metric() -> DistanceMetric {
    DistanceMetric::Cosine
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_cap_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_tokens() -> usize {
    300
}

fn default_overlap_tokens() -> usize {
    50
}

fn default_top_k() -> usize {
    5
}

fn default_oversample_factor() -> usize {
    4
}

fn default_max_steps() -> u32 {
    8
}

fn default_max_plan_retries() -> u32 {
    2
}

fn default_plan_timeout_ms() -> u64 {
    60_000
}

fn default_tool_max_retries() -> u32 {
    1
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docmind")
        .join("docmind.db")
}

impl DocmindConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::error::DocmindError::Config {
                message: format!("Failed to parse config: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths: user config dir first, then
    /// a local `docmind.toml`, falling back to defaults.
    pub fn load_default() -> crate::error::Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("docmind").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        let local_config = PathBuf::from("docmind.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.chunking.max_tokens == 0 {
            return Err(crate::error::DocmindError::Config {
                message: "chunking.max_tokens must be > 0".to_string(),
            });
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            return Err(crate::error::DocmindError::Config {
                message: "chunking.overlap_tokens must be < chunking.max_tokens".to_string(),
            });
        }
        if self.retrieval.oversample_factor == 0 {
            return Err(crate::error::DocmindError::Config {
                message: "retrieval.oversample_factor must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
