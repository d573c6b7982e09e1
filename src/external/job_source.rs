use async_trait::async_trait;
use thiserror::Error;

use crate::models::{JobDetail, JobSummary};

#[derive(Debug, Error)]
pub enum RemoteFetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid scheduler address: {0}")]
    InvalidAddress(String),
}

/// Read-only view of a remote scheduler. No caching happens behind this trait.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Every job visible in the configured namespace, in the order the scheduler returns them.
    async fn list_jobs(&self) -> Result<Vec<JobSummary>, RemoteFetchError>;

    async fn job_detail(&self, job_id: &str) -> Result<JobDetail, RemoteFetchError>;
}
