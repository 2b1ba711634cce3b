//! Liveness HTTP surface for external uptime pings.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::runtime::PassHistory;

pub const GREETING: &str = "Rollcall is running!";

#[derive(Clone)]
pub struct LivenessState {
    pub history: Arc<RwLock<PassHistory>>,
    pub started_at_unix: u64,
}

pub fn router(state: LivenessState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .with_state(state)
}

async fn root() -> &'static str {
    GREETING
}

async fn status(State(state): State<LivenessState>) -> Json<Value> {
    Json(build_status_payload(&state).await)
}

pub(crate) async fn build_status_payload(state: &LivenessState) -> Value {
    let history = state.history.read().await;
    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "passes": history.passes,
        "failures": history.failures,
        "last_pass": history.last_pass,
        "last_error": history.last_error,
    })
}
