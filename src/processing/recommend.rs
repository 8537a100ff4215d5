use std::sync::Arc;

use thiserror::Error;

use crate::domain::assessment::RecommendationResult;
use crate::models::config::ServerConfig;
use crate::processing::embedding::{Embedder, EmbeddingError};
use crate::processing::rerank::{KeywordReranker, Reranker};
use crate::repository::index::{CatalogSearch, IndexError};
use crate::{DEFAULT_TOP_K, DESCRIPTION_LIMIT};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("query must not be empty")]
    InvalidQuery,
    #[error("recommendation failed: {0}")]
    Failure(#[source] RetrievalError),
}

impl From<EmbeddingError> for RecommendError {
    fn from(error: EmbeddingError) -> Self {
        RecommendError::Failure(error.into())
    }
}

impl From<IndexError> for RecommendError {
    fn from(error: IndexError) -> Self {
        RecommendError::Failure(error.into())
    }
}

#[derive(Clone, Debug)]
pub struct RecommenderOptions {
    pub top_k: usize,
    pub description_limit: usize,
    /// Whether the configured re-ranker runs at all.
    pub rerank_enabled: bool,
}

impl Default for RecommenderOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            description_limit: DESCRIPTION_LIMIT,
            rerank_enabled: false,
        }
    }
}

impl From<&ServerConfig> for RecommenderOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            top_k: config.top_k,
            description_limit: config.description_limit,
            rerank_enabled: config.rerank_enabled,
        }
    }
}

/// Turns a free-text query into an ordered list of catalog recommendations.
///
/// Holds shared read-only handles to the embedder and the index, so one
/// instance can serve concurrent requests.
pub struct Recommender<E, I, R = KeywordReranker>
where
    E: ?Sized,
    I: ?Sized,
{
    embedder: Arc<E>,
    index: Arc<I>,
    reranker: R,
    options: RecommenderOptions,
}

impl<E, I> Recommender<E, I, KeywordReranker>
where
    E: Embedder + ?Sized,
    I: CatalogSearch + ?Sized,
{
    pub fn new(embedder: Arc<E>, index: Arc<I>, options: RecommenderOptions) -> Self {
        Self::with_reranker(embedder, index, KeywordReranker::default(), options)
    }
}

impl<E, I, R> Recommender<E, I, R>
where
    E: Embedder + ?Sized,
    I: CatalogSearch + ?Sized,
    R: Reranker,
{
    pub fn with_reranker(embedder: Arc<E>, index: Arc<I>, reranker: R, options: RecommenderOptions) -> Self {
        Self {
            embedder,
            index,
            reranker,
            options,
        }
    }

    pub fn recommend(&self, query: &str) -> Result<Vec<RecommendationResult>, RecommendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RecommendError::InvalidQuery);
        }
        log::debug!("Processing query: {query}");

        let text = truncate_query(query, self.embedder.max_input_chars());
        let vector = self.embedder.embed(text)?;
        let hits = self.index.search(&vector, self.options.top_k)?;

        let results: Vec<RecommendationResult> = hits
            .iter()
            .map(|hit| RecommendationResult::from_document(&hit.document, self.options.description_limit))
            .collect();

        if !self.options.rerank_enabled || results.is_empty() {
            return Ok(results);
        }

        match self.reranker.rerank(query, results.clone()) {
            Ok(reranked) if reranked.len() == results.len() => Ok(reranked),
            Ok(reranked) => {
                log::warn!(
                    "Re-ranking returned {} of {} results, keeping vector order",
                    reranked.len(),
                    results.len()
                );
                Ok(results)
            }
            Err(error) => {
                log::warn!("Re-ranking failed (ignored): {error}");
                Ok(results)
            }
        }
    }
}

fn truncate_query(query: &str, limit: usize) -> &str {
    match query.char_indices().nth(limit) {
        Some((cut, _)) => {
            log::debug!("Truncating query to {limit} characters before embedding");
            &query[..cut]
        }
        None => query,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::assessment::CatalogDocument;
    use crate::processing::embedding::{EmbeddingResult, validate_input};
    use crate::processing::rerank::RerankError;
    use crate::repository::index::{IndexResult, ScoredDocument};

    #[derive(Default)]
    struct FakeEmbedder {
        seen: Mutex<Vec<String>>,
    }

    impl Embedder for FakeEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn max_input_chars(&self) -> usize {
            32
        }

        fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            validate_input(text, self.max_input_chars())?;
            self.seen.lock().expect("seen mutex poisoned").push(text.to_string());
            Ok(vec![1.0, 0.0])
        }
    }

    struct FakeIndex {
        hits: Vec<ScoredDocument>,
    }

    impl FakeIndex {
        fn with(documents: Vec<CatalogDocument>) -> Self {
            let hits = documents
                .into_iter()
                .enumerate()
                .map(|(position, document)| ScoredDocument {
                    document,
                    score: 1.0 - position as f32 * 0.01,
                })
                .collect();
            Self { hits }
        }
    }

    impl CatalogSearch for FakeIndex {
        fn dimension(&self) -> usize {
            2
        }

        fn search(&self, _query: &[f32], k: usize) -> IndexResult<Vec<ScoredDocument>> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    struct BrokenIndex;

    impl CatalogSearch for BrokenIndex {
        fn dimension(&self) -> usize {
            2
        }

        fn search(&self, _query: &[f32], _k: usize) -> IndexResult<Vec<ScoredDocument>> {
            Err(IndexError::NotLoaded)
        }
    }

    struct FailingReranker;

    impl Reranker for FailingReranker {
        fn rerank(
            &self,
            _query: &str,
            _results: Vec<RecommendationResult>,
        ) -> Result<Vec<RecommendationResult>, RerankError> {
            Err(RerankError::Other("boom".to_string()))
        }
    }

    struct DroppingReranker;

    impl Reranker for DroppingReranker {
        fn rerank(
            &self,
            _query: &str,
            mut results: Vec<RecommendationResult>,
        ) -> Result<Vec<RecommendationResult>, RerankError> {
            results.pop();
            Ok(results)
        }
    }

    fn catalog() -> Vec<CatalogDocument> {
        vec![
            CatalogDocument::new("https://x.com/view/a/", "A", "a"),
            CatalogDocument::new("https://x.com/view/b/", "B", "b").with_test_types(["Personality"]),
            CatalogDocument::new("https://x.com/view/c/", "C", "c"),
        ]
    }

    fn enabled() -> RecommenderOptions {
        RecommenderOptions {
            rerank_enabled: true,
            ..Default::default()
        }
    }

    fn urls(results: &[RecommendationResult]) -> Vec<&str> {
        results.iter().map(|result| result.url.as_str()).collect()
    }

    #[test]
    fn blank_query_is_invalid() {
        let recommender = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(catalog())),
            RecommenderOptions::default(),
        );

        assert!(matches!(recommender.recommend(""), Err(RecommendError::InvalidQuery)));
        assert!(matches!(recommender.recommend(" \t\n"), Err(RecommendError::InvalidQuery)));
    }

    #[test]
    fn results_are_capped_at_top_k() {
        let documents = (0..15)
            .map(|i| CatalogDocument::new(format!("https://x.com/view/{i}/"), format!("{i}"), "d"))
            .collect();
        let recommender = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(documents)),
            RecommenderOptions::default(),
        );

        let results = recommender.recommend("java").expect("recommend should succeed");

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|result| !result.url.is_empty()));
    }

    #[test]
    fn empty_index_gives_empty_results() {
        let recommender = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(Vec::new())),
            enabled(),
        );

        let results = recommender.recommend("personality").expect("recommend should succeed");

        assert!(results.is_empty());
    }

    #[test]
    fn index_failure_is_wrapped() {
        let recommender = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(BrokenIndex),
            RecommenderOptions::default(),
        );

        let error = recommender.recommend("java").expect_err("index is broken");

        assert!(matches!(
            error,
            RecommendError::Failure(RetrievalError::Index(IndexError::NotLoaded))
        ));
    }

    #[test]
    fn long_query_is_truncated_before_embedding() {
        let embedder = Arc::new(FakeEmbedder::default());
        let recommender = Recommender::new(
            Arc::clone(&embedder),
            Arc::new(FakeIndex::with(catalog())),
            RecommenderOptions::default(),
        );

        recommender.recommend(&"java ".repeat(40)).expect("recommend should succeed");

        let seen = embedder.seen.lock().expect("seen mutex poisoned");
        assert_eq!(seen[0].chars().count(), 32);
    }

    #[test]
    fn descriptions_are_truncated() {
        let documents = vec![CatalogDocument::new("https://x.com/view/a/", "A", "x".repeat(250))];
        let recommender = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(documents)),
            RecommenderOptions::default(),
        );

        let results = recommender.recommend("java").expect("recommend should succeed");

        assert_eq!(results[0].description, format!("{}...", "x".repeat(200)));
    }

    #[test]
    fn rerank_runs_only_when_enabled() {
        let disabled = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(catalog())),
            RecommenderOptions::default(),
        );
        let active = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(catalog())),
            enabled(),
        );

        let plain = disabled.recommend("personality test").expect("recommend should succeed");
        let reranked = active.recommend("personality test").expect("recommend should succeed");

        assert_eq!(urls(&plain), vec!["https://x.com/view/a/", "https://x.com/view/b/", "https://x.com/view/c/"]);
        assert_eq!(urls(&reranked), vec!["https://x.com/view/b/", "https://x.com/view/a/", "https://x.com/view/c/"]);
    }

    #[test]
    fn failing_reranker_keeps_vector_order() {
        let recommender = Recommender::with_reranker(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(catalog())),
            FailingReranker,
            enabled(),
        );

        let results = recommender.recommend("personality").expect("recommend should succeed");

        assert_eq!(urls(&results), vec!["https://x.com/view/a/", "https://x.com/view/b/", "https://x.com/view/c/"]);
    }

    #[test]
    fn reranker_that_drops_results_is_ignored() {
        let recommender = Recommender::with_reranker(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(catalog())),
            DroppingReranker,
            enabled(),
        );

        let results = recommender.recommend("personality").expect("recommend should succeed");

        assert_eq!(results.len(), 3);
    }

    #[test]
    fn repeated_queries_give_identical_results() {
        let recommender = Recommender::new(
            Arc::new(FakeEmbedder::default()),
            Arc::new(FakeIndex::with(catalog())),
            enabled(),
        );

        let first = recommender.recommend("behavior").expect("recommend should succeed");
        let second = recommender.recommend("behavior").expect("recommend should succeed");

        assert_eq!(first, second);
    }
}
