//! Keyword-triggered re-ranking of recommendation results.
//!
//! Re-ranking is best effort: the recommender keeps the original ordering
//! whenever a [`Reranker`] reports an error.

use thiserror::Error;

use crate::domain::assessment::RecommendationResult;
use crate::models::config::ServerConfig;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("re-ranking failed: {0}")]
    Other(String),
}

/// Secondary ordering applied after vector search.
///
/// Implementations must return a permutation of `results`.
pub trait Reranker: Send + Sync {
    fn rerank(
        &self,
        query: &str,
        results: Vec<RecommendationResult>,
    ) -> Result<Vec<RecommendationResult>, RerankError>;
}

/// Moves results carrying `label` ahead of the rest when the query mentions
/// any trigger word. Relative order inside both groups is preserved.
#[derive(Clone, Debug)]
pub struct KeywordReranker {
    triggers: Vec<String>,
    label: String,
}

impl KeywordReranker {
    pub fn new<I, S>(triggers: I, label: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            triggers: triggers
                .into_iter()
                .map(|trigger| trigger.into().to_lowercase())
                .filter(|trigger| !trigger.is_empty())
                .collect(),
            label: label.into(),
        }
    }

    pub fn is_triggered(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.triggers.iter().any(|trigger| query.contains(trigger.as_str()))
    }
}

impl From<&ServerConfig> for KeywordReranker {
    fn from(config: &ServerConfig) -> Self {
        Self::new(config.rerank_triggers.iter().cloned(), config.rerank_label.clone())
    }
}

impl Default for KeywordReranker {
    fn default() -> Self {
        Self::new(["personality", "behavior"], "Personality")
    }
}

impl Reranker for KeywordReranker {
    fn rerank(
        &self,
        query: &str,
        results: Vec<RecommendationResult>,
    ) -> Result<Vec<RecommendationResult>, RerankError> {
        if !self.is_triggered(query) {
            return Ok(results);
        }

        log::info!("Behavioral intent detected, moving `{}` results first", self.label);

        let (mut matching, rest): (Vec<_>, Vec<_>) = results
            .into_iter()
            .partition(|result| result.has_test_type(&self.label));
        matching.extend(rest);
        Ok(matching)
    }
}
