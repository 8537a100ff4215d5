use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

use crate::models::config::ServerConfig;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("input of {length} characters exceeds the limit of {limit}")]
    InputTooLong { length: usize, limit: usize },
    #[error("unsupported embedding model: {0}")]
    UnsupportedModel(String),
    #[error("embedding model failure: {0}")]
    Model(String),
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for a fixed model and must not
/// mutate state visible to other callers.
pub trait Embedder: Send + Sync {
    /// Length of every vector produced by [`Embedder::embed`].
    fn dimension(&self) -> usize;

    /// Longest input, in characters, accepted by [`Embedder::embed`].
    fn max_input_chars(&self) -> usize;

    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Embed several texts at once. The default embeds them one by one.
    fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Reject input the model cannot handle.
pub fn validate_input(text: &str, limit: usize) -> EmbeddingResult<()> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    let length = text.chars().count();
    if length > limit {
        return Err(EmbeddingError::InputTooLong { length, limit });
    }
    Ok(())
}

/// Normalize a vector to unit length.
///
/// Returns the original vector when the norm is zero.
pub fn normalize_embedding(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec.to_vec()
    } else {
        vec.iter().map(|x| x / norm).collect()
    }
}

/// Fail when a model vector does not have the configured length.
pub fn check_dimension(expected: usize, actual: usize) -> EmbeddingResult<()> {
    if actual != expected {
        return Err(EmbeddingError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Resolve a configured model name to a fastembed model.
pub fn resolve_model(name: &str) -> EmbeddingResult<EmbeddingModel> {
    let short = name.rsplit('/').next().unwrap_or(name);
    match short.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        _ => Err(EmbeddingError::UnsupportedModel(name.to_string())),
    }
}

const DIMENSION_CHECK_TEXT: &str = "dimension check";

/// Local ONNX embedder backed by fastembed.
///
/// fastembed needs exclusive access while embedding, so the model sits behind
/// a mutex and concurrent requests embed one at a time.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    dimension: usize,
    max_input_chars: usize,
}

impl FastEmbedder {
    pub fn try_new(model_name: &str, dimension: usize, max_input_chars: usize) -> EmbeddingResult<Self> {
        let model = resolve_model(model_name)?;
        let embedding = TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
            .map_err(|error| EmbeddingError::Model(format!("Failed to initialize embedder: {error:?}")))?;

        let embedder = Self {
            model: Mutex::new(embedding),
            dimension,
            max_input_chars,
        };
        // A wrong `dimension` setting must stop startup, not the first request.
        embedder.run(vec![DIMENSION_CHECK_TEXT.to_string()])?;

        log::info!("Loaded embedding model {model_name} ({dimension} dimensions)");

        Ok(embedder)
    }

    pub fn from_config(config: &ServerConfig) -> EmbeddingResult<Self> {
        Self::try_new(&config.embedding_model, config.dimension, config.max_input_chars)
    }

    fn run(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::Model("embedding model mutex poisoned".to_string()))?;

        let expected = texts.len();
        let vectors = model
            .embed(texts, None)
            .map_err(|error| EmbeddingError::Model(format!("Failed to generate embedding: {error:?}")))?;

        if vectors.len() != expected {
            return Err(EmbeddingError::Model(format!(
                "model returned {} embeddings for {expected} inputs",
                vectors.len()
            )));
        }

        vectors
            .into_iter()
            .map(|vector| {
                check_dimension(self.dimension, vector.len())?;
                Ok(normalize_embedding(&vector))
            })
            .collect()
    }
}

impl Embedder for FastEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        validate_input(text, self.max_input_chars)?;
        self.run(vec![text.to_string()])?
            .pop()
            .ok_or_else(|| EmbeddingError::Model("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        for text in texts {
            validate_input(text, self.max_input_chars)?;
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec())
    }
}
