pub mod domain;
pub mod models;
pub mod processing;
pub mod repository;

/// Number of nearest documents returned per query.
pub const DEFAULT_TOP_K: usize = 10;

/// Maximum number of description characters kept in a recommendation.
pub const DESCRIPTION_LIMIT: usize = 200;

/// Marker appended to truncated descriptions.
pub const ELLIPSIS: &str = "...";
