use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{JobSummary, ResolvedPeriodicJob};
use crate::services::ttl_cache::CacheStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/periodic-jobs", get(list_periodic_jobs))
        .route("/cache", get(cache_status))
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Arc<Vec<JobSummary>>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct PeriodicJobsResponse {
    pub jobs: Arc<Vec<ResolvedPeriodicJob>>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Set when the latest refresh failed; `jobs` then holds the last good set, if any.
    pub error: Option<String>,
    pub nomad_address: String,
    pub nomad_namespace: String,
}

#[derive(Serialize)]
pub struct CacheStatusResponse {
    pub job_list: CacheStatus,
    pub periodic_jobs: CacheStatus,
}

/// GET /api/jobs - Every job in the namespace
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<JobListResponse>, AppError> {
    info!("GET /api/jobs - Listing all jobs");
    let entry = state.job_list.get().await.map_err(|failure| {
        error!("Failed to list jobs: {}", failure);
        AppError::from(failure)
    })?;

    Ok(Json(JobListResponse {
        jobs: entry.value,
        fetched_at: entry.fetched_at,
    }))
}

/// GET /api/periodic-jobs - Periodic batch jobs with their next run
///
/// Always renders: a failed refresh falls back to whatever was resolved last.
pub async fn list_periodic_jobs(State(state): State<AppState>) -> Json<PeriodicJobsResponse> {
    info!("GET /api/periodic-jobs - Listing periodic jobs");
    let (entry, error) = match state.periodic_jobs.get().await {
        Ok(entry) => (Some(entry), None),
        Err(failure) => {
            warn!(
                "Periodic jobs refresh failed (serving last good: {}): {}",
                failure.last_good.is_some(),
                failure
            );
            (failure.last_good.clone(), Some(failure.error.to_string()))
        }
    };

    Json(PeriodicJobsResponse {
        jobs: entry.as_ref().map(|e| e.value.clone()).unwrap_or_default(),
        fetched_at: entry.as_ref().map(|e| e.fetched_at),
        error,
        nomad_address: state.nomad_address.clone(),
        nomad_namespace: state.nomad_namespace.clone(),
    })
}

/// GET /api/cache - Freshness of both caches
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    Json(CacheStatusResponse {
        job_list: state.job_list.status(),
        periodic_jobs: state.periodic_jobs.status(),
    })
}
