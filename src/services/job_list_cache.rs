use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::external::job_source::{JobSource, RemoteFetchError};
use crate::models::JobSummary;
use crate::services::ttl_cache::{CacheEntry, CacheStatus, RefreshFailure, TtlCache};

pub type JobListEntry = CacheEntry<Vec<JobSummary>>;
pub type JobListFailure = RefreshFailure<Vec<JobSummary>, RemoteFetchError>;

/// Shared, TTL-bound copy of the cluster's job listing.
pub struct JobListCache {
    source: Arc<dyn JobSource>,
    cache: TtlCache<Vec<JobSummary>, RemoteFetchError>,
}

impl JobListCache {
    pub fn new(source: Arc<dyn JobSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlCache::new("job-list", ttl),
        }
    }

    /// Cached listing, refreshed from the scheduler when older than the TTL.
    ///
    /// On a failed refresh the previous listing stays cached and is handed back
    /// inside the error.
    pub async fn get(&self) -> Result<JobListEntry, JobListFailure> {
        self.cache
            .get_or_refresh(|| async {
                let jobs = self.source.list_jobs().await;
                if let Ok(jobs) = &jobs {
                    info!("📋 Fetched {} jobs from Nomad", jobs.len());
                }
                jobs.map_err(Arc::new)
            })
            .await
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }
}
