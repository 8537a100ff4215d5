//! Offline index build: embeds the scraped catalog and persists the index.

use assessment_recommender::models::config::ServerConfig;
use assessment_recommender::processing::embedding::FastEmbedder;
use assessment_recommender::processing::index_builder::build_and_persist;
use assessment_recommender::repository::catalog::load_catalog;

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

    let documents = match load_catalog(&config.catalog_path) {
        Ok(documents) => documents,
        Err(e) => {
            log::error!(
                "Failed to load catalog {}: {e}",
                config.catalog_path.display()
            );
            std::process::exit(1);
        }
    };

    let embedder = match FastEmbedder::from_config(&config) {
        Ok(embedder) => embedder,
        Err(e) => {
            log::error!("Failed to initialize embedder: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = build_and_persist(
        documents,
        &embedder,
        &config.embedding_model,
        config.batch_size,
        &config.index_path,
    ) {
        log::error!("Index build failed: {e}");
        std::process::exit(1);
    }
}
