//! Nearest-neighbour index over embedded catalog documents.
//!
//! The index is persisted as a directory holding the usearch graph
//! (`index.usearch`) next to a JSON manifest (`catalog.json`) carrying the
//! document metadata. Usearch keys are document positions. Searches scan
//! every vector exactly and break distance ties by position, so equal
//! embeddings always come back in insertion order.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::domain::assessment::CatalogDocument;

pub const INDEX_FILE: &str = "index.usearch";
pub const MANIFEST_FILE: &str = "catalog.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("catalog index has not been loaded")]
    NotLoaded,
    #[error("catalog index is corrupt: {0}")]
    Corrupt(String),
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector index failure: {0}")]
    Backend(String),
    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// A document returned by a search together with its cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub document: CatalogDocument,
    pub score: f32,
}

/// Read-only search over an embedded catalog.
pub trait CatalogSearch: Send + Sync {
    fn dimension(&self) -> usize;

    /// Return at most `k` documents ordered by decreasing similarity, ties in
    /// insertion order.
    fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<ScoredDocument>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    model: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    documents: Vec<CatalogDocument>,
}

fn index_options(dimension: usize) -> IndexOptions {
    IndexOptions {
        dimensions: dimension,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        ..Default::default()
    }
}

/// Immutable in-memory index, created by the builder or loaded from disk.
pub struct CatalogIndex {
    index: Index,
    documents: Vec<CatalogDocument>,
    dimension: usize,
    model: String,
    built_at: DateTime<Utc>,
}

impl CatalogIndex {
    /// Build an index from documents and their vectors, paired by position.
    pub fn from_embeddings(
        model: &str,
        dimension: usize,
        documents: Vec<CatalogDocument>,
        vectors: &[Vec<f32>],
    ) -> IndexResult<Self> {
        if documents.len() != vectors.len() {
            return Err(IndexError::Backend(format!(
                "{} documents but {} vectors",
                documents.len(),
                vectors.len()
            )));
        }

        let index = Index::new(&index_options(dimension))
            .map_err(|error| IndexError::Backend(error.to_string()))?;
        index
            .reserve(documents.len())
            .map_err(|error| IndexError::Backend(error.to_string()))?;

        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            index
                .add(position as u64, vector)
                .map_err(|error| IndexError::Backend(error.to_string()))?;
        }

        Ok(Self {
            index,
            documents,
            dimension,
            model: model.to_string(),
            built_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[CatalogDocument] {
        &self.documents
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Write the index to `dir`, replacing whatever was persisted there.
    pub fn save(&self, dir: &Path) -> IndexResult<()> {
        fs::create_dir_all(dir)?;

        let index_file = dir.join(INDEX_FILE);
        let index_path = index_file
            .to_str()
            .ok_or_else(|| IndexError::Backend("Invalid path encoding".to_string()))?;
        if index_file.exists() {
            fs::remove_file(&index_file)?;
        }
        self.index
            .save(index_path)
            .map_err(|error| IndexError::Backend(format!("Failed to save: {error}")))?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dimension: self.dimension,
            built_at: self.built_at,
            documents: self.documents.clone(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|error| IndexError::Backend(format!("Failed to encode manifest: {error}")))?;
        fs::write(dir.join(MANIFEST_FILE), json)?;

        log::info!(
            "Saved catalog index with {} documents to {}",
            self.documents.len(),
            dir.display()
        );
        Ok(())
    }

    /// Load an index persisted by [`CatalogIndex::save`].
    ///
    /// Fails with [`IndexError::Corrupt`] when the files are unreadable or the
    /// stored dimension differs from `expected_dimension`.
    pub fn load(dir: &Path, expected_dimension: usize) -> IndexResult<Self> {
        let manifest_file = dir.join(MANIFEST_FILE);
        let raw = fs::read(&manifest_file).map_err(|error| {
            IndexError::Corrupt(format!("cannot read {}: {error}", manifest_file.display()))
        })?;
        let manifest: Manifest = serde_json::from_slice(&raw).map_err(|error| {
            IndexError::Corrupt(format!("cannot parse {}: {error}", manifest_file.display()))
        })?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if manifest.dimension != expected_dimension {
            return Err(IndexError::Corrupt(format!(
                "index was built with {} dimensions, embedder produces {expected_dimension}",
                manifest.dimension
            )));
        }

        let index_file = dir.join(INDEX_FILE);
        if !index_file.is_file() {
            return Err(IndexError::Corrupt(format!(
                "missing {}",
                index_file.display()
            )));
        }
        let index_path = index_file
            .to_str()
            .ok_or_else(|| IndexError::Corrupt("Invalid path encoding".to_string()))?;
        let index = Index::new(&index_options(manifest.dimension))
            .map_err(|error| IndexError::Backend(error.to_string()))?;
        index
            .load(index_path)
            .map_err(|error| IndexError::Corrupt(format!("Failed to load: {error}")))?;

        if index.dimensions() != manifest.dimension {
            return Err(IndexError::Corrupt(format!(
                "graph has {} dimensions, manifest declares {}",
                index.dimensions(),
                manifest.dimension
            )));
        }
        if index.size() != manifest.documents.len() {
            return Err(IndexError::Corrupt(format!(
                "graph holds {} vectors for {} documents",
                index.size(),
                manifest.documents.len()
            )));
        }

        log::info!(
            "Loaded catalog index with {} documents from {}",
            manifest.documents.len(),
            dir.display()
        );

        Ok(Self {
            index,
            documents: manifest.documents,
            dimension: manifest.dimension,
            model: manifest.model,
            built_at: manifest.built_at,
        })
    }
}

impl CatalogSearch for CatalogIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<ScoredDocument>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        // The graph walk may return any subset of tied neighbours, so rank
        // the whole catalog by brute force before cutting to `k`.
        let neighbors = self
            .index
            .exact_search(query, self.documents.len())
            .map_err(|error| IndexError::Backend(error.to_string()))?;

        let mut hits: Vec<(u64, f32)> = neighbors
            .keys
            .iter()
            .zip(neighbors.distances.iter())
            .map(|(&key, &distance)| (key, distance))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);

        hits.into_iter()
            .map(|(key, distance)| {
                let document = usize::try_from(key)
                    .ok()
                    .and_then(|position| self.documents.get(position))
                    .ok_or_else(|| IndexError::Corrupt(format!("unknown key {key} in graph")))?;
                Ok(ScoredDocument {
                    document: document.clone(),
                    score: 1.0 - distance,
                })
            })
            .collect()
    }
}

/// Holder for the index that is filled once at startup.
///
/// Searching before [`IndexSlot::install`] fails with
/// [`IndexError::NotLoaded`].
pub struct IndexSlot {
    dimension: usize,
    inner: OnceLock<CatalogIndex>,
}

impl IndexSlot {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: OnceLock::new(),
        }
    }

    /// Install a loaded index. Returns the index back when the slot is
    /// already filled or the dimension disagrees.
    pub fn install(&self, index: CatalogIndex) -> Result<(), CatalogIndex> {
        if index.dimension != self.dimension {
            return Err(index);
        }
        self.inner.set(index)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

}

impl CatalogSearch for IndexSlot {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<ScoredDocument>> {
        self.inner.get().ok_or(IndexError::NotLoaded)?.search(query, k)
    }
}
