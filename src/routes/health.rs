use axum::{routing::get, Router};
use tracing::info;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

// Liveness only; never calls Nomad.
async fn health() -> &'static str {
    info!("GET /health - Health check");
    "OK"
}
