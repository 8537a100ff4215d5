use crate::models::api::{
    ErrorKind, ErrorResponse, HealthRequest, HealthResponse, RecommendResponse, ServiceRequest,
};
use crate::processing::embedding::Embedder;
use crate::processing::recommend::{RecommendError, Recommender};
use crate::processing::rerank::Reranker;
use crate::repository::index::CatalogSearch;

/// Decode a request, run the recommender and encode the reply.
///
/// Every outcome, including malformed input, produces a JSON reply so the
/// request/reply socket never stalls.
pub fn handle_message<E, I, R>(recommender: &Recommender<E, I, R>, msg: &[u8]) -> Vec<u8>
where
    E: Embedder + ?Sized,
    I: CatalogSearch + ?Sized,
    R: Reranker,
{
    let request = match serde_json::from_slice::<ServiceRequest>(msg) {
        Ok(ServiceRequest::Recommend(request)) => request,
        Ok(ServiceRequest::Health(HealthRequest { health: true })) => {
            return encode(&HealthResponse {
                status: "healthy".to_string(),
            });
        }
        Ok(ServiceRequest::Health(_)) => {
            return error_reply(ErrorKind::BadRequest, "health must be true".to_string());
        }
        Err(e) => {
            log::error!("Failed to parse JSON: {e}");
            return error_reply(ErrorKind::BadRequest, format!("invalid request: {e}"));
        }
    };

    match recommender.recommend(&request.query) {
        Ok(recommended_assessments) => {
            log::info!("Returning {} recommendations", recommended_assessments.len());
            encode(&RecommendResponse {
                recommended_assessments,
            })
        }
        Err(RecommendError::InvalidQuery) => {
            error_reply(ErrorKind::InvalidQuery, RecommendError::InvalidQuery.to_string())
        }
        Err(error) => {
            log::error!("{error}");
            error_reply(ErrorKind::Failure, error.to_string())
        }
    }
}

pub fn error_reply(kind: ErrorKind, error: String) -> Vec<u8> {
    encode(&ErrorResponse { error, kind })
}

fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|e| {
        log::error!("Failed to encode reply: {e}");
        br#"{"error":"failed to encode reply","kind":"failure"}"#.to_vec()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::assessment::CatalogDocument;
    use crate::processing::embedding::{EmbeddingResult, validate_input};
    use crate::processing::recommend::RecommenderOptions;
    use crate::repository::index::{CatalogIndex, IndexSlot};

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn max_input_chars(&self) -> usize {
            100
        }

        fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            validate_input(text, self.max_input_chars())?;
            Ok(vec![1.0, 0.0])
        }
    }

    fn loaded_slot() -> Arc<IndexSlot> {
        let slot = IndexSlot::new(2);
        let index = CatalogIndex::from_embeddings(
            "test",
            2,
            vec![CatalogDocument::new("https://x.com/view/java/", "Java", "Core Java")],
            &[vec![1.0, 0.0]],
        )
        .expect("index should build");
        assert!(slot.install(index).is_ok());
        Arc::new(slot)
    }

    #[test]
    fn valid_request_returns_recommendations() {
        let recommender = Recommender::new(Arc::new(UnitEmbedder), loaded_slot(), RecommenderOptions::default());

        let reply = handle_message(&recommender, br#"{"query": "java developer"}"#);

        let response: RecommendResponse = serde_json::from_slice(&reply).expect("response json");
        assert_eq!(response.recommended_assessments.len(), 1);
        assert_eq!(response.recommended_assessments[0].url, "https://x.com/view/java/");
    }

    #[test]
    fn blank_query_maps_to_invalid_query() {
        let recommender = Recommender::new(Arc::new(UnitEmbedder), loaded_slot(), RecommenderOptions::default());

        let reply = handle_message(&recommender, br#"{"query": "   "}"#);

        let response: ErrorResponse = serde_json::from_slice(&reply).expect("error json");
        assert_eq!(response.kind, ErrorKind::InvalidQuery);
    }

    #[test]
    fn malformed_request_maps_to_bad_request() {
        let recommender = Recommender::new(Arc::new(UnitEmbedder), loaded_slot(), RecommenderOptions::default());

        let reply = handle_message(&recommender, b"query=java");

        let response: ErrorResponse = serde_json::from_slice(&reply).expect("error json");
        assert_eq!(response.kind, ErrorKind::BadRequest);
    }

    #[test]
    fn health_request_is_answered_without_an_index() {
        let recommender = Recommender::new(
            Arc::new(UnitEmbedder),
            Arc::new(IndexSlot::new(2)),
            RecommenderOptions::default(),
        );

        let reply = handle_message(&recommender, br#"{"health": true}"#);

        let response: HealthResponse = serde_json::from_slice(&reply).expect("health json");
        assert_eq!(response.status, "healthy");
    }

    #[test]
    fn unloaded_index_maps_to_failure() {
        let recommender = Recommender::new(
            Arc::new(UnitEmbedder),
            Arc::new(IndexSlot::new(2)),
            RecommenderOptions::default(),
        );

        let reply = handle_message(&recommender, br#"{"query": "java"}"#);

        let response: ErrorResponse = serde_json::from_slice(&reply).expect("error json");
        assert_eq!(response.kind, ErrorKind::Failure);
        assert!(response.error.contains("not been loaded"));
    }
}
