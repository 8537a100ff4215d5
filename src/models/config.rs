//! Configuration model loaded from external sources.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{DEFAULT_TOP_K, DESCRIPTION_LIMIT};

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_VAR: &str = "RECOMMENDER_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "config/default";
const ENV_PREFIX: &str = "RECOMMENDER";

#[derive(Clone, Debug, Deserialize)]
/// Settings shared by the server, the index builder and the evaluator.
pub struct ServerConfig {
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_zmq_address")]
    pub zmq_address: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,
    /// Capability flag for keyword re-ranking. Off unless configured.
    #[serde(default)]
    pub rerank_enabled: bool,
    #[serde(default = "default_rerank_triggers")]
    pub rerank_triggers: Vec<String>,
    #[serde(default = "default_rerank_label")]
    pub rerank_label: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_eval_cases_path")]
    pub eval_cases_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from the optional YAML file and `RECOMMENDER_*`
    /// environment variables, the latter taking precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(&file, Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(file: &str, environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                environment
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("rerank_triggers"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            index_path: default_index_path(),
            zmq_address: default_zmq_address(),
            embedding_model: default_embedding_model(),
            dimension: default_dimension(),
            max_input_chars: default_max_input_chars(),
            batch_size: default_batch_size(),
            top_k: default_top_k(),
            description_limit: default_description_limit(),
            rerank_enabled: false,
            rerank_triggers: default_rerank_triggers(),
            rerank_label: default_rerank_label(),
            request_timeout_ms: default_request_timeout_ms(),
            eval_cases_path: default_eval_cases_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/raw/assessments.json")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/vector_store")
}

fn default_zmq_address() -> String {
    "tcp://127.0.0.1:5555".to_string()
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_max_input_chars() -> usize {
    2000
}

fn default_batch_size() -> usize {
    32
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_description_limit() -> usize {
    DESCRIPTION_LIMIT
}

fn default_rerank_triggers() -> Vec<String> {
    vec!["personality".to_string(), "behavior".to_string()]
}

fn default_rerank_label() -> String {
    "Personality".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_eval_cases_path() -> PathBuf {
    PathBuf::from("data/train_labeled.csv")
}
