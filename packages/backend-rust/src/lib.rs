pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::DbInitError;
use crate::services::bkt_remote::RemoteBktClient;
use crate::services::content::ContentGenerator;
use crate::services::llm_provider::LLMProvider;
use crate::services::mastery::MasteryService;
use crate::state::AppState;
use crate::store::MasteryStore;

/// Wires the services for `config` on top of an already connected store.
pub fn build_state(config: &Config, store: Arc<dyn MasteryStore>) -> AppState {
    let remote = config.remote_bkt.clone().map(RemoteBktClient::new);
    let mastery = MasteryService::new(store).with_remote(remote);
    let content = ContentGenerator::new(LLMProvider::new(config.content.clone()));
    AppState::new(mastery, Some(content))
}

pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app() -> Result<axum::Router, DbInitError> {
    let config = Config::from_env();
    let store = db::connect_store(&config.db).await?;
    Ok(app(build_state(&config, store)))
}
