//! Mean Recall@10 of the recommender over a labeled query set.

use std::sync::Arc;

use assessment_recommender::models::config::ServerConfig;
use assessment_recommender::processing::embedding::{Embedder, FastEmbedder};
use assessment_recommender::processing::evaluation::{evaluate, load_cases};
use assessment_recommender::processing::recommend::{Recommender, RecommenderOptions};
use assessment_recommender::processing::rerank::KeywordReranker;
use assessment_recommender::repository::index::CatalogIndex;

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let cases = match load_cases(&config.eval_cases_path) {
        Ok(cases) => cases,
        Err(e) => {
            log::error!("Failed to load evaluation cases: {e}");
            std::process::exit(1);
        }
    };

    let embedder = match FastEmbedder::from_config(&config) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            log::error!("Failed to initialize embedder: {e}");
            std::process::exit(1);
        }
    };

    let index = match CatalogIndex::load(&config.index_path, embedder.dimension()) {
        Ok(index) => Arc::new(index),
        Err(e) => {
            log::error!("Failed to load catalog index: {e}");
            std::process::exit(1);
        }
    };

    let recommender = Recommender::with_reranker(
        embedder,
        index,
        KeywordReranker::from(&config),
        RecommenderOptions::from(&config),
    );

    log::info!("Running slug evaluation on {} queries...", cases.len());
    let report = evaluate(&cases, |query| {
        recommender
            .recommend(query)
            .map(|results| results.into_iter().map(|result| result.url).collect())
    });

    log::info!(
        "Final mean Recall@10: {:.4} ({} queries, {} failed)",
        report.mean_recall(),
        report.scores.len(),
        report.failed
    );
}
