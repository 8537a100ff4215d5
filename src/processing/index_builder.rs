use std::path::Path;

use thiserror::Error;

use crate::domain::assessment::CatalogDocument;
use crate::processing::embedding::{Embedder, EmbeddingError};
use crate::repository::index::{CatalogIndex, IndexError};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot build an index from an empty catalog")]
    EmptyCatalog,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub documents: usize,
    pub batches: usize,
    pub truncated: usize,
}

/// Embed every document and assemble an in-memory index.
pub fn build_index<E>(
    documents: Vec<CatalogDocument>,
    embedder: &E,
    model: &str,
    batch_size: usize,
) -> Result<(CatalogIndex, BuildStats), BuildError>
where
    E: Embedder + ?Sized,
{
    if documents.is_empty() {
        return Err(BuildError::EmptyCatalog);
    }

    let mut stats = BuildStats {
        documents: documents.len(),
        ..Default::default()
    };

    let limit = embedder.max_input_chars();
    let texts: Vec<String> = documents
        .iter()
        .map(|document| {
            let text = document.embedding_text();
            match text.char_indices().nth(limit) {
                Some((cut, _)) => {
                    stats.truncated += 1;
                    text[..cut].to_string()
                }
                None => text,
            }
        })
        .collect();

    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        vectors.extend(embedder.embed_batch(chunk)?);
        stats.batches += 1;
        log::debug!("Embedded {}/{} documents", vectors.len(), texts.len());
    }

    let index = CatalogIndex::from_embeddings(model, embedder.dimension(), documents, &vectors)?;
    Ok((index, stats))
}

/// Full rebuild: embed the catalog and overwrite the index persisted at `dir`.
pub fn build_and_persist<E>(
    documents: Vec<CatalogDocument>,
    embedder: &E,
    model: &str,
    batch_size: usize,
    dir: &Path,
) -> Result<CatalogIndex, BuildError>
where
    E: Embedder + ?Sized,
{
    log::info!("Embedding {} documents...", documents.len());

    let (index, stats) = build_index(documents, embedder, model, batch_size)?;
    index.save(dir)?;

    log::info!(
        "Finished index build: documents={}, batches={}, truncated={}, path={}",
        stats.documents,
        stats.batches,
        stats.truncated,
        dir.display()
    );
    if stats.truncated > 0 {
        log::warn!(
            "{} documents exceeded {} characters and were truncated before embedding",
            stats.truncated,
            embedder.max_input_chars()
        );
    }

    Ok(index)
}
