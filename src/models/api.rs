//! Wire structures exchanged with the serving boundary.

use serde::{Deserialize, Serialize};

use crate::domain::assessment::RecommendationResult;

#[derive(Debug, Deserialize, Serialize)]
pub struct RecommendRequest {
    pub query: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthRequest {
    pub health: bool,
}

/// Any message accepted on the request socket.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ServiceRequest {
    Health(HealthRequest),
    Recommend(RecommendRequest),
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RecommendResponse {
    pub recommended_assessments: Vec<RecommendationResult>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    InvalidQuery,
    Failure,
    Timeout,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}
