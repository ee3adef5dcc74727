//! HTTP API: routes, handlers and shared state

use crate::error::ApiError;
use crate::metrics::{ApiMetrics, Endpoint, MetricsSnapshot, Outcome};
use crate::service::ScoringService;
use crate::types::{
    ClientRequest, DistributionRequest, DistributionResponse, HealthResponse, PredictResponse,
};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn, Span};
use uuid::Uuid;

/// Header carrying the request id, kept when the caller sends one
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared by every handler
pub struct AppState {
    pub service: ScoringService,
    pub metrics: Arc<ApiMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: ScoringService, metrics: Arc<ApiMetrics>) -> Self {
        Self {
            service,
            metrics,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the API router. Every request gets an id, traced and echoed back.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/info", post(info))
        .route("/distribution", post(distribution))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(RequestUuid))
}

/// Mints a v4 uuid for requests arriving without an id
#[derive(Debug, Clone, Copy, Default)]
struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Time a handler body and record its outcome
fn observe<T>(
    state: &AppState,
    endpoint: Endpoint,
    started: Instant,
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    let outcome = match &result {
        Ok(_) => Outcome::Ok,
        Err(e) if e.status().is_client_error() => {
            warn!(
                endpoint = endpoint.as_str(),
                error = %e,
                "Request rejected"
            );
            Outcome::Rejected
        }
        Err(_) => Outcome::Failed,
    };
    state
        .metrics
        .record_request(endpoint, started.elapsed(), outcome);
    result
}

async fn predict(
    State(state): State<SharedState>,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let started = Instant::now();
    let result = payload
        .map_err(ApiError::from)
        .and_then(|Json(req)| state.service.predict(req.sk_id_curr));

    if let Ok(response) = &result {
        state.metrics.record_score(response.probability);
    }
    observe(&state, Endpoint::Predict, started, result).map(Json)
}

async fn info(
    State(state): State<SharedState>,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let started = Instant::now();
    let result = payload
        .map_err(ApiError::from)
        .and_then(|Json(req)| state.service.info(req.sk_id_curr));

    observe(&state, Endpoint::Info, started, result).map(Json)
}

async fn distribution(
    State(state): State<SharedState>,
    payload: Result<Json<DistributionRequest>, JsonRejection>,
) -> Result<Json<DistributionResponse>, ApiError> {
    let started = Instant::now();
    let result = payload
        .map_err(ApiError::from)
        .and_then(|Json(req)| state.service.distribution(req.sk_id_curr, &req.feature));

    observe(&state, Endpoint::Distribution, started, result).map(Json)
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let service = &state.service;
    Json(HealthResponse {
        status: "ok",
        model: service.classifier().name().to_string(),
        model_format: service.model_format().as_str(),
        feature_count: service.extractor().feature_count(),
        feature_rows: service.features().len(),
        personal_info_rows: service.attributes().len(),
        scaled: service.extractor().is_scaled(),
        attribution: service.has_attribution(),
        started_at: state.started_at,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

async fn metrics(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
