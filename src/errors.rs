use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::services::job_list_cache::JobListFailure;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Nomad request failed: {0}")]
    Upstream(String),
    #[error("Not found")]
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JobListFailure> for AppError {
    fn from(failure: JobListFailure) -> Self {
        AppError::Upstream(failure.error.to_string())
    }
}
