use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::dispatch::{dispatch, AssignmentService};
use crate::lead::{AlgorithmParams, AssignmentRequest};
use crate::response::AssignmentResult;
use crate::summary::{result_score_bars, summarize, ScoreBar, SubmissionContext, Summary, SummaryOptions};

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    service: Arc<dyn AssignmentService>,
    defaults: AlgorithmParams,
    summary: SummaryOptions,
    in_flight: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        service: Arc<dyn AssignmentService>,
        defaults: AlgorithmParams,
        summary: SummaryOptions,
    ) -> Self {
        Self {
            service,
            defaults,
            summary,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: error.to_string(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParamsResponse {
    defaults: AlgorithmParams,
    weight_sum: f64,
    balanced: bool,
    top_n: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignOutcome {
    result: AssignmentResult,
    summary: Summary,
    score_bars: Vec<ScoreBar>,
}

/// Marks a submission as pending for as long as it is held.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/params", get(params))
        .route("/api/assign", post(assign))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(state: AppState, bind: SocketAddr) -> Result<()> {
    let endpoint = state.service.endpoint().to_string();
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("assignment tester listening on http://{bind}, forwarding to {endpoint}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        endpoint: state.service.endpoint().to_string(),
    })
}

async fn params(State(state): State<AppState>) -> Json<ApiResponse<ParamsResponse>> {
    ok(ParamsResponse {
        defaults: state.defaults,
        weight_sum: state.defaults.weights.sum(),
        balanced: state.defaults.weights.is_balanced(),
        top_n: state.summary.top_n,
    })
}

async fn assign(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AssignmentRequest>, JsonRejection>,
) -> ApiResult<AssignOutcome> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    request.lead.validate().map_err(ApiError::bad_request)?;
    let Some(_guard) = InFlightGuard::acquire(&state.in_flight) else {
        warn!("rejecting submission while another is in flight");
        return Err(ApiError::conflict("a submission is already in progress"));
    };

    let result = dispatch(state.service.as_ref(), &request).await;
    let summary = summarize(
        SubmissionContext::from(&request),
        &result,
        &state.summary,
        Utc::now(),
    );
    let score_bars = result_score_bars(&result);
    Ok(ok(AssignOutcome {
        result,
        summary,
        score_bars,
    }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_blocks_until_dropped() {
        let flag = AtomicBool::new(false);
        let first = InFlightGuard::acquire(&flag).expect("first acquire");
        assert!(InFlightGuard::acquire(&flag).is_none());
        drop(first);
        assert!(InFlightGuard::acquire(&flag).is_some());
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn index_page_posts_to_assign_route() {
        assert!(INDEX_HTML.contains("/api/assign"));
    }
}
