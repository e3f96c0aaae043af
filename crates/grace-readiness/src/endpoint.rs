//! Health-check HTTP endpoint.
//!
//! Serves `GET /grace/health`: `200 ok` when ready, `500 not ready`
//! otherwise. Only GET is routed.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::debug;

use grace_core::{GRACE_FAILURE_MSG, GRACE_HEALTH_OK_MSG, HEALTH_CHECK_PATH, epoch_millis};

use crate::readiness::{Readiness, ReadinessEvaluator};

/// Build the router serving the health-check endpoint.
pub fn health_router(evaluator: Arc<ReadinessEvaluator>) -> Router {
    Router::new()
        .route(HEALTH_CHECK_PATH, get(health_check))
        .with_state(evaluator)
}

/// GET /grace/health
async fn health_check(State(evaluator): State<Arc<ReadinessEvaluator>>) -> impl IntoResponse {
    match evaluator.evaluate(epoch_millis()) {
        Readiness::Ready => (StatusCode::OK, GRACE_HEALTH_OK_MSG),
        Readiness::NotReady(reason) => {
            debug!(reason = reason.as_str(), "health check: not ready");
            (StatusCode::INTERNAL_SERVER_ERROR, GRACE_FAILURE_MSG)
        }
    }
}
