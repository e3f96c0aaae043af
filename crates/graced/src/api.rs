//! HTTP surface of the grace daemon.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/grace/health` | `200 ok` when ready, `500 not ready` otherwise |
//! | POST | `/grace/lifecycle/registered` | Registry finished registering this instance |
//! | POST | `/grace/lifecycle/registered-secondary` | Second registry finished (migration mode) |
//! | POST | `/grace/lifecycle/warm-up-started` | Warm-up began; returns the metadata to publish |
//! | POST | `/grace/notify` | A peer announces its shutdown through marker headers |
//! | POST | `/grace/select` | Warm-up weighted choice among candidate instances |
//! | POST | `/grace/config` | Apply `grace.rule.*` overrides to the live configuration |
//!
//! Every request is counted as in flight for its whole duration, and
//! responses served while draining carry the shutdown markers.

use std::collections::HashMap;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use grace_core::{GraceConfig, epoch_millis, rule_key};
use grace_readiness::health_router;
use grace_warmup::{Instance, warm_up_metadata};

use crate::context::GraceContext;

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Outcome of a lifecycle transition.
#[derive(Debug, Serialize, Deserialize)]
pub struct LifecycleMark {
    /// Whether this call recorded the time; `false` if it was already set.
    pub recorded: bool,
    pub at_ms: u64,
}

/// Warm-up start acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct WarmUpStarted {
    pub recorded: bool,
    pub at_ms: u64,
    /// Keys to publish to the registry; empty when warm-up is disabled.
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectRequest {
    pub candidates: Vec<Instance>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectResponse {
    pub selected: Option<Instance>,
    /// The caller should apply its own default selection.
    pub fallback: bool,
    /// Candidates dropped because their endpoint announced shutdown.
    pub excluded: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Number of fields whose value changed.
    pub changed: usize,
    pub config: GraceConfig,
}

/// Build the complete grace router.
pub fn build_router(ctx: GraceContext) -> Router {
    let lifecycle = Router::new()
        .route("/registered", post(mark_registered))
        .route("/registered-secondary", post(mark_registered_secondary))
        .route("/warm-up-started", post(mark_warm_up_started));

    Router::new()
        .nest("/grace/lifecycle", lifecycle)
        .route("/grace/notify", post(peer_notify))
        .route("/grace/select", post(select_instance))
        .route("/grace/config", post(update_config))
        .with_state(ctx.clone())
        .merge(health_router(ctx.readiness.clone()))
        .layer(middleware::from_fn_with_state(ctx, track_requests))
}

/// Counts the request as in flight and adds shutdown markers on the way out.
async fn track_requests(State(ctx): State<GraceContext>, request: Request, next: Next) -> Response {
    let mut response = {
        let _guard = ctx.shutdown.track();
        next.run(request).await
    };
    ctx.notifier.annotate_response(response.headers_mut());
    response
}

// ── Lifecycle ─────────────────────────────────────────────────

/// POST /grace/lifecycle/registered
async fn mark_registered(State(ctx): State<GraceContext>) -> impl IntoResponse {
    let at_ms = epoch_millis();
    let recorded = ctx.clock.mark_registry_finished(at_ms);
    ApiResponse::ok(LifecycleMark { recorded, at_ms })
}

/// POST /grace/lifecycle/registered-secondary
async fn mark_registered_secondary(State(ctx): State<GraceContext>) -> impl IntoResponse {
    let at_ms = epoch_millis();
    let recorded = ctx.clock.mark_second_registry_finished(at_ms);
    ApiResponse::ok(LifecycleMark { recorded, at_ms })
}

/// POST /grace/lifecycle/warm-up-started
async fn mark_warm_up_started(State(ctx): State<GraceContext>) -> impl IntoResponse {
    let at_ms = epoch_millis();
    let recorded = ctx.clock.mark_warm_up_started(at_ms);
    ApiResponse::ok(WarmUpStarted {
        recorded,
        at_ms,
        metadata: warm_up_metadata(&ctx.readiness.policy(), at_ms),
    })
}

// ── Peers ─────────────────────────────────────────────────────

/// POST /grace/notify
async fn peer_notify(State(ctx): State<GraceContext>, headers: HeaderMap) -> impl IntoResponse {
    if !ctx.config.grace_shutdown_enabled() {
        return error_response("graceful shutdown is disabled", StatusCode::CONFLICT).into_response();
    }
    match ctx.notifier.record_peer_response(&headers, None) {
        Some(endpoint) => ApiResponse::ok(NotifyResponse { endpoint }).into_response(),
        None => error_response("missing shutdown endpoint header", StatusCode::BAD_REQUEST)
            .into_response(),
    }
}

/// POST /grace/select
async fn select_instance(
    State(ctx): State<GraceContext>,
    Json(req): Json<SelectRequest>,
) -> impl IntoResponse {
    let (candidates, excluded): (Vec<Instance>, Vec<Instance>) = req
        .candidates
        .into_iter()
        .partition(|c| !ctx.shutdown.is_endpoint_shutting_down(&c.endpoint()));
    let excluded: Vec<String> = excluded.iter().map(Instance::endpoint).collect();
    if !excluded.is_empty() {
        debug!(count = excluded.len(), "skipping candidates that announced shutdown");
    }

    let selected = ctx.balancer.choose(&candidates, epoch_millis()).cloned();
    ApiResponse::ok(SelectResponse {
        fallback: selected.is_none(),
        selected,
        excluded,
    })
}

// ── Configuration ─────────────────────────────────────────────

/// POST /grace/config
///
/// Body is a flat map of override keys; the `grace.rule.` prefix is optional.
async fn update_config(
    State(ctx): State<GraceContext>,
    Json(overrides): Json<HashMap<String, String>>,
) -> impl IntoResponse {
    let overrides: HashMap<String, String> = overrides
        .into_iter()
        .map(|(key, value)| (rule_key(&key), value))
        .collect();
    let changed = ctx.config.apply_overrides(&overrides);
    ApiResponse::ok(ConfigUpdate {
        changed,
        config: ctx.config.snapshot(),
    })
}
