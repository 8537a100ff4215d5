pub mod embedding;
pub mod evaluation;
pub mod index_builder;
pub mod recommend;
pub mod rerank;
pub mod service;
