//! Environment configuration for the memory engine.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric environment variable failed to parse.
    #[error("failed to parse '{name}' ('{value}'): {source}")]
    ParseError {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    /// The database path's parent directory does not exist.
    #[error("database path parent does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// A required base URL is not a well-formed URL.
    #[error("invalid URL for '{name}': '{value}'")]
    InvalidUrl { name: &'static str, value: String },
}

/// Resolved configuration for a `memory-core` process, loaded from the
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,

    /// Base URL of the Ollama-shaped embedding HTTP endpoint.
    pub ollama_base_url: String,
    /// Model name passed to the embedding endpoint.
    pub ollama_model: String,

    /// Base URL of the remote vector index.
    pub chromadb_base_url: String,
    /// Name of the single collection this process owns.
    pub chromadb_collection: String,
    /// Tenant scoping the collection belongs to.
    pub chromadb_tenant: String,
    /// Database scoping the collection belongs to.
    pub chromadb_database: String,

    /// Embedding dimension locked in at startup. Chosen once; changing it
    /// for an existing collection requires the cleanup/re-embed flow.
    pub embedding_dimension: usize,

    /// Ranking weights for enhanced relevance, overridable so
    /// operators can retune without a rebuild.
    pub ranking_weights: RankingWeights,
}

/// Weights of the blended relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub similarity: f64,
    pub recency: f64,
    pub tag_overlap: f64,
    pub title_match: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            similarity: 0.7,
            recency: 0.15,
            tag_overlap: 0.1,
            title_match: 0.05,
        }
    }
}

pub const DEFAULT_DB_PATH: &str = "./memory_bank.db";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHROMADB_BASE_URL: &str = "http://localhost:6334";
pub const DEFAULT_CHROMADB_COLLECTION: &str = "memory_bank";
pub const DEFAULT_CHROMADB_TENANT: &str = "default";
pub const DEFAULT_CHROMADB_DATABASE: &str = "default";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            chromadb_base_url: DEFAULT_CHROMADB_BASE_URL.to_string(),
            chromadb_collection: DEFAULT_CHROMADB_COLLECTION.to_string(),
            chromadb_tenant: DEFAULT_CHROMADB_TENANT.to_string(),
            chromadb_database: DEFAULT_CHROMADB_DATABASE.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            ranking_weights: RankingWeights::default(),
        }
    }
}

impl Config {
    const ENV_DB_PATH: &'static str = "MEMORY_BANK_DB_PATH";
    const ENV_OLLAMA_BASE_URL: &'static str = "OLLAMA_BASE_URL";
    const ENV_OLLAMA_MODEL: &'static str = "OLLAMA_MODEL";
    const ENV_CHROMADB_BASE_URL: &'static str = "CHROMADB_BASE_URL";
    const ENV_CHROMADB_COLLECTION: &'static str = "CHROMADB_COLLECTION";
    const ENV_CHROMADB_TENANT: &'static str = "CHROMADB_TENANT";
    const ENV_CHROMADB_DATABASE: &'static str = "CHROMADB_DATABASE";
    const ENV_EMBEDDING_DIMENSION: &'static str = "MEMORY_BANK_EMBEDDING_DIMENSION";
    const ENV_WEIGHT_SIMILARITY: &'static str = "MEMORY_BANK_WEIGHT_SIMILARITY";
    const ENV_WEIGHT_RECENCY: &'static str = "MEMORY_BANK_WEIGHT_RECENCY";
    const ENV_WEIGHT_TAG_OVERLAP: &'static str = "MEMORY_BANK_WEIGHT_TAG_OVERLAP";
    const ENV_WEIGHT_TITLE_MATCH: &'static str = "MEMORY_BANK_WEIGHT_TITLE_MATCH";

    /// Loads configuration from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = Self::parse_path_from_env(Self::ENV_DB_PATH, defaults.db_path);
        let ollama_base_url =
            Self::parse_string_from_env(Self::ENV_OLLAMA_BASE_URL, defaults.ollama_base_url);
        let ollama_model =
            Self::parse_string_from_env(Self::ENV_OLLAMA_MODEL, defaults.ollama_model);
        let chromadb_base_url =
            Self::parse_string_from_env(Self::ENV_CHROMADB_BASE_URL, defaults.chromadb_base_url);
        let chromadb_collection = Self::parse_string_from_env(
            Self::ENV_CHROMADB_COLLECTION,
            defaults.chromadb_collection,
        );
        let chromadb_tenant =
            Self::parse_string_from_env(Self::ENV_CHROMADB_TENANT, defaults.chromadb_tenant);
        let chromadb_database =
            Self::parse_string_from_env(Self::ENV_CHROMADB_DATABASE, defaults.chromadb_database);
        let embedding_dimension = Self::parse_usize_from_env(
            Self::ENV_EMBEDDING_DIMENSION,
            defaults.embedding_dimension,
        );

        let ranking_weights = RankingWeights {
            similarity: Self::parse_f64_from_env(
                Self::ENV_WEIGHT_SIMILARITY,
                defaults.ranking_weights.similarity,
            )?,
            recency: Self::parse_f64_from_env(
                Self::ENV_WEIGHT_RECENCY,
                defaults.ranking_weights.recency,
            )?,
            tag_overlap: Self::parse_f64_from_env(
                Self::ENV_WEIGHT_TAG_OVERLAP,
                defaults.ranking_weights.tag_overlap,
            )?,
            title_match: Self::parse_f64_from_env(
                Self::ENV_WEIGHT_TITLE_MATCH,
                defaults.ranking_weights.title_match,
            )?,
        };

        Ok(Self {
            db_path,
            ollama_base_url,
            ollama_model,
            chromadb_base_url,
            chromadb_collection,
            chromadb_tenant,
            chromadb_database,
            embedding_dimension,
            ranking_weights,
        })
    }

    /// Validates the configuration is internally consistent and refers to
    /// filesystem paths that can plausibly be opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::PathNotFound {
                    path: parent.to_path_buf(),
                });
            }
        }

        for (name, value) in [
            ("OLLAMA_BASE_URL", &self.ollama_base_url),
            ("CHROMADB_BASE_URL", &self.chromadb_base_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    name: match name {
                        "OLLAMA_BASE_URL" => Self::ENV_OLLAMA_BASE_URL,
                        _ => Self::ENV_CHROMADB_BASE_URL,
                    },
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_f64_from_env(var_name: &'static str, default: f64) -> Result<f64, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value.parse().map_err(|source| ConfigError::ParseError {
                name: var_name,
                value,
                source,
            }),
            Err(_) => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = RankingWeights::default();
        let sum = w.similarity + w.recency + w.tag_overlap + w.title_match;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut config = Config::default();
        config.ollama_base_url = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_missing_db_parent_dir() {
        let mut config = Config::default();
        config.db_path = PathBuf::from("/definitely/not/a/real/path/memory.db");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PathNotFound { .. })
        ));
    }
}
