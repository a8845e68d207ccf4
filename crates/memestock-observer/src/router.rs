//! Axum router construction for the stocks API.
//!
//! Assembles the REST and `WebSocket` routes into a single [`Router`]
//! with CORS and request tracing. Paths no route matches fall through
//! to the static file directory when one is configured.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /api/stocks` -- all memes (`?trend=` filter)
/// - `GET /api/stocks/{name}` -- single meme
/// - `GET /api/status` -- tick counter and regime counts
/// - `GET /ws/ticks` -- `WebSocket` tick summary stream
/// - everything else -- static files from `state.static_dir`, if set
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/api/stocks", get(handlers::list_stocks))
        .route("/api/stocks/{name}", get(handlers::get_stock))
        .route("/api/status", get(handlers::get_status))
        .route("/ws/ticks", get(ws::ws_ticks));

    if let Some(dir) = &state.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
