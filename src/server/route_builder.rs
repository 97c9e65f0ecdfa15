use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::AppState;
use crate::config::{AppConfig, AssemblerKind};
use crate::database::{self, DbPool};
use crate::realtime::feed::ChangeFeed;
use crate::services::assembler::{ChatAssembler, FanOutAssembler, JoinedAssembler};
use crate::services::chat_creation::ChatCreator;
use crate::store::{ChatStore, SqliteStore};
use crate::utils::jwt::JwtService;
use crate::websocket::connection::ConnectionManager;

pub fn build_state(db: DbPool, config: &AppConfig) -> Arc<AppState> {
    let feed = Arc::new(ChangeFeed::new(config.change_feed_capacity));
    let store: Arc<dyn ChatStore> = Arc::new(SqliteStore::new(db.clone(), feed));

    let assembler: Arc<dyn ChatAssembler> = match config.assembler {
        AssemblerKind::FanOut => Arc::new(FanOutAssembler::new(
            store.clone(),
            config.assembly_failure,
        )),
        AssemblerKind::Joined => Arc::new(JoinedAssembler::new(db.clone())),
    };

    Arc::new(AppState {
        db,
        creator: Arc::new(ChatCreator::new(store.clone())),
        store,
        assembler,
        jwt_service: Arc::new(JwtService::new(&config.secret_key)),
        ws_manager: Arc::new(ConnectionManager::new()),
        poll_interval: config.message_poll_interval,
    })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", crate::api::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn register_routes(config: &AppConfig) -> anyhow::Result<Router> {
    let db = database::create_pool(&config.database_url).await?;
    tracing::info!("Database connected and migrations applied");

    tracing::info!(
        assembler = ?config.assembler,
        failure_policy = ?config.assembly_failure,
        poll_interval_secs = config.message_poll_interval.as_secs(),
        "chat services configured"
    );

    Ok(build_router(build_state(db, config)))
}
