mod error;
pub mod routes;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use common::{Notifier, RegistryStore, Timeouts};
use engine::{Evaluator, Refresher};
use strategy::StrategyRegistry;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RegistryStore>,
    pub refresher: Refresher,
    pub evaluator: Evaluator,
    pub strategies: Arc<StrategyRegistry>,
    pub notifier: Arc<dyn Notifier>,
    /// Chat that receives evaluation reports.
    pub chat_id: i64,
    pub timeouts: Timeouts,
}

/// The full HTTP surface with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the listener fails.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "HTTP API listening");
    axum::serve(listener, router(state)).await
}
