use std::sync::Arc;

use assessment_recommender::models::api::ErrorKind;
use assessment_recommender::models::config::ServerConfig;
use assessment_recommender::processing::embedding::{Embedder, FastEmbedder};
use assessment_recommender::processing::recommend::{Recommender, RecommenderOptions};
use assessment_recommender::processing::rerank::KeywordReranker;
use assessment_recommender::processing::service::{error_reply, handle_message};
use assessment_recommender::repository::index::{CatalogIndex, IndexSlot};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
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

    // A missing or unreadable index must keep the service from starting.
    let slot = IndexSlot::new(embedder.dimension());
    match CatalogIndex::load(&config.index_path, embedder.dimension()) {
        Ok(index) => {
            if slot.install(index).is_err() {
                log::error!("Loaded index does not match the embedder");
                std::process::exit(1);
            }
        }
        Err(e) => {
            log::error!(
                "Failed to load catalog index from {}: {e}. Run build_index first.",
                config.index_path.display()
            );
            std::process::exit(1);
        }
    }

    let recommender = Arc::new(Recommender::with_reranker(
        embedder,
        Arc::new(slot),
        KeywordReranker::from(&config),
        RecommenderOptions::from(&config),
    ));
    if config.rerank_enabled {
        log::info!("Keyword re-ranking enabled");
    } else {
        log::info!("Running in retrieval-only mode");
    }

    let context = zmq::Context::new();
    let responder = match context.socket(zmq::REP) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("Cannot create zmq socket: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = responder.bind(&config.zmq_address) {
        log::error!("Cannot bind to {}: {e}", config.zmq_address);
        std::process::exit(1);
    }
    log::info!("Serving recommendations on {}", config.zmq_address);

    let timeout = config.request_timeout();
    loop {
        let msg = match responder.recv_bytes(0) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("Failed to receive message: {e}");
                continue;
            }
        };

        let recommender = Arc::clone(&recommender);
        let task = tokio::task::spawn_blocking(move || handle_message(&recommender, &msg));
        let reply = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                log::error!("Recommendation task failed: {e}");
                error_reply(ErrorKind::Failure, "recommendation task failed".to_string())
            }
            Err(_) => {
                log::warn!("Request exceeded {} ms", timeout.as_millis());
                error_reply(ErrorKind::Timeout, "request timed out".to_string())
            }
        };

        if let Err(e) = responder.send(reply, 0) {
            log::error!("Failed to send reply: {e}");
        }
    }
}
