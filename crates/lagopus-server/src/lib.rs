//! HTTP stats endpoint for Lagopus jobs.
//!
//! Serves per-job metric history in the shape the `lagopus-core` drivers
//! poll, and accepts new rows from analyzers (or the built-in synthetic feed).

pub mod feed;
mod store;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use lagopus_core::{Sample, parse_instant};

pub use store::{JobSummary, SinceBoundary, StatsStore, StoreError};

/// Store handle shared between the router and feeds.
pub type SharedStore = Arc<RwLock<StatsStore>>;

/// Wrap a store for sharing.
pub fn shared(store: StatsStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

struct AppState {
    store: SharedStore,
    started: Instant,
}

#[derive(Deserialize)]
struct JobParams {
    job: Option<String>,
}

#[derive(Deserialize)]
struct SinceParams {
    since: Option<String>,
}

/// POST body: a single row or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum Ingest {
    One(Sample),
    Many(Vec<Sample>),
}

impl Ingest {
    fn into_samples(self) -> Vec<Sample> {
        match self {
            Ingest::One(sample) => vec![sample],
            Ingest::Many(samples) => samples,
        }
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = state.store.read().await;
    let boundary = match store.boundary() {
        SinceBoundary::Inclusive => "inclusive",
        SinceBoundary::Exclusive => "exclusive",
    };
    Json(serde_json::json!({
        "name": "Lagopus stats endpoint",
        "version": lagopus_core::VERSION,
        "jobs": store.jobs().len(),
        "since": boundary,
        "endpoints": {
            "/": "This API index",
            "/health": "Health check",
            "/api/jobs": "List jobs with sample counts",
            "/api/jobs/stats?job=<id>": "Full stats history of a job",
            "/api/jobs/{id}/stats?since=<instant>": {
                "GET": "Stats rows of a job, optionally only those from `since` on",
                "POST": "Append one stats row or an array of rows",
            },
            "/api/jobs/{id}/stats/{column}?since=<instant>": "Rows of a single metric column",
        },
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = state.store.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "jobs": store.jobs().len(),
        "samples": store.total_samples(),
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

async fn handle_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSummary>> {
    Json(state.store.read().await.jobs())
}

async fn handle_stats_by_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Response {
    let Some(job) = params.job.filter(|j| !j.trim().is_empty()) else {
        return bad_request("missing 'job' query parameter");
    };
    let store = state.store.read().await;
    Json(store.history(&job).to_vec()).into_response()
}

impl SinceParams {
    fn instant(&self) -> Result<Option<DateTime<Utc>>, Response> {
        match self.since.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => parse_instant(raw)
                .map(Some)
                .ok_or_else(|| bad_request(format!("unparsable 'since' instant '{raw}'"))),
        }
    }
}

async fn handle_stats_by_path(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Query(params): Query<SinceParams>,
) -> Response {
    let since = match params.instant() {
        Ok(since) => since,
        Err(response) => return response,
    };
    let store = state.store.read().await;
    Json(store.since(&job_id, since).to_vec()).into_response()
}

/// Rows of one metric column; rows without it are left out.
async fn handle_column_stats(
    State(state): State<Arc<AppState>>,
    Path((job_id, column)): Path<(String, String)>,
    Query(params): Query<SinceParams>,
) -> Response {
    let since = match params.instant() {
        Ok(since) => since,
        Err(response) => return response,
    };
    let store = state.store.read().await;
    let rows: Vec<Sample> = store
        .since(&job_id, since)
        .iter()
        .filter_map(|s| {
            s.values
                .get(&column)
                .map(|v| Sample::new(s.time).with(column.as_str(), *v))
        })
        .collect();
    Json(rows).into_response()
}

async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Json(body): Json<Ingest>,
) -> Response {
    let samples = body.into_samples();
    let accepted = match state.store.write().await.insert_all(&job_id, samples) {
        Ok(n) => n,
        Err(e) => return bad_request(e.to_string()),
    };
    log::debug!("ingested {accepted} row(s) for '{job_id}'");
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "job": job_id, "accepted": accepted })),
    )
        .into_response()
}

/// Build the axum router over `store`.
pub fn build_router(store: SharedStore) -> Router {
    let state = Arc::new(AppState {
        store,
        started: Instant::now(),
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/jobs", get(handle_jobs))
        .route("/api/jobs/stats", get(handle_stats_by_query))
        .route("/api/jobs/{id}/stats/{column}", get(handle_column_stats))
        .route(
            "/api/jobs/{id}/stats",
            get(handle_stats_by_path).post(handle_ingest),
        )
        .with_state(state)
}

/// Serve the stats endpoint on `host:port` until the process exits.
pub async fn run_server(store: SharedStore, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(store);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("stats endpoint listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
