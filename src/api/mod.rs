pub mod auth;
pub mod chats;
pub mod users;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::database::DbPool;
use crate::services::assembler::ChatAssembler;
use crate::services::chat_creation::ChatCreator;
use crate::store::ChatStore;
use crate::utils::jwt::JwtService;
use crate::websocket::connection::ConnectionManager;

pub struct AppState {
    pub db: DbPool,
    pub store: Arc<dyn ChatStore>,
    pub assembler: Arc<dyn ChatAssembler>,
    pub creator: Arc<ChatCreator>,
    pub jwt_service: Arc<JwtService>,
    pub ws_manager: Arc<ConnectionManager>,
    pub poll_interval: Duration,
}

pub fn routes(state: Arc<AppState>) -> Router {
    let ws_route = Router::new()
        .route(
            "/ws",
            axum::routing::get(crate::websocket::handlers::ws_handler),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .nest("/chats", chats::routes(state.clone()))
        .nest("/users", users::routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(ws_route)
        .nest("/auth", auth::routes(state.clone()))
        .merge(protected_routes)
}
