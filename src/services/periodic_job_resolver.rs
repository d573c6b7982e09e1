//! Periodic batch jobs and their next launch times.
//!
//! The resolved set is cached separately from the plain job listing and on its
//! own TTL clock. A refresh walks the (cached) listing, fetches the detail of
//! every batch job and evaluates its cron spec in the job's own time zone.
//! Any per-job problem (detail fetch, time zone, schedule) drops that job
//! only; the refresh as a whole fails only when the listing itself can't be
//! obtained.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_DETAIL_FETCH_CONCURRENCY;
use crate::external::job_source::{JobSource, RemoteFetchError};
use crate::models::{JobDetail, JobSummary, JobType, ResolvedPeriodicJob};
use crate::services::cron_evaluator::{next_occurrence, parse_time_zone, InvalidScheduleError, InvalidTimeZoneError};
use crate::services::job_list_cache::JobListCache;
use crate::services::ttl_cache::{CacheEntry, CacheStatus, RefreshFailure, TtlCache};

pub type PeriodicJobsEntry = CacheEntry<Vec<ResolvedPeriodicJob>>;
pub type PeriodicJobsFailure = RefreshFailure<Vec<ResolvedPeriodicJob>, RemoteFetchError>;

/// Why a single job was left out of the periodic set.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("detail fetch failed: {0}")]
    Detail(#[from] RemoteFetchError),

    #[error(transparent)]
    TimeZone(#[from] InvalidTimeZoneError),

    #[error(transparent)]
    Schedule(#[from] InvalidScheduleError),
}

/// Computes the next run of a job, or `None` when the job isn't a usable periodic batch job.
pub fn resolve_job(detail: &JobDetail, now: DateTime<Utc>) -> Result<Option<ResolvedPeriodicJob>, SkipReason> {
    if detail.job_type != JobType::Batch {
        return Ok(None);
    }
    let spec = match &detail.periodic {
        Some(spec) if !spec.cron_expression.trim().is_empty() => spec,
        _ => return Ok(None),
    };

    let time_zone = parse_time_zone(&spec.time_zone)?;
    let next_run_local = next_occurrence(&spec.cron_expression, &now.with_timezone(&time_zone))?;

    Ok(Some(ResolvedPeriodicJob::new(detail, spec, time_zone, next_run_local)))
}

pub struct PeriodicJobResolver {
    job_list: Arc<JobListCache>,
    source: Arc<dyn JobSource>,
    cache: TtlCache<Vec<ResolvedPeriodicJob>, RemoteFetchError>,
    concurrency: usize,
}

impl PeriodicJobResolver {
    pub fn new(job_list: Arc<JobListCache>, source: Arc<dyn JobSource>, ttl: Duration) -> Self {
        Self {
            job_list,
            source,
            cache: TtlCache::new("periodic-jobs", ttl),
            concurrency: DEFAULT_DETAIL_FETCH_CONCURRENCY,
        }
    }

    /// Maximum number of detail requests in flight during a refresh.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Cached periodic jobs, re-resolved when older than the TTL.
    pub async fn get(&self) -> Result<PeriodicJobsEntry, PeriodicJobsFailure> {
        self.cache
            .get_or_refresh(|| async {
                let listing = self.job_list.get().await.map_err(|failure| failure.error);
                match listing {
                    Ok(entry) => Ok(self.resolve(&entry.value, Utc::now()).await),
                    Err(error) => Err(error),
                }
            })
            .await
    }

    /// Resolves `jobs` against `now` without touching the cache.
    ///
    /// Output keeps the listing order.
    pub async fn resolve(&self, jobs: &[JobSummary], now: DateTime<Utc>) -> Vec<ResolvedPeriodicJob> {
        let batch: Vec<String> = jobs
            .iter()
            .filter(|job| job.job_type == JobType::Batch)
            .map(|job| job.id.clone())
            .collect();
        let considered = batch.len();

        let outcomes: Vec<(String, Result<Option<ResolvedPeriodicJob>, SkipReason>)> = stream::iter(batch)
            .map(|job_id: String| async move {
                let outcome = match self.source.job_detail(&job_id).await {
                    Ok(detail) => resolve_job(&detail, now),
                    Err(e) => Err(SkipReason::from(e)),
                };
                (job_id, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut resolved = Vec::with_capacity(outcomes.len());
        let mut skipped = 0;
        for (job_id, outcome) in outcomes {
            match outcome {
                Ok(Some(periodic)) => resolved.push(periodic),
                Ok(None) => debug!("Job {} has no usable periodic spec", job_id),
                Err(reason) => {
                    skipped += 1;
                    warn!("⚠️ [PERIODIC] Skipping job {}: {}", job_id, reason);
                }
            }
        }

        info!(
            "⏰ [PERIODIC] Resolved {} periodic jobs ({} batch jobs considered, {} skipped)",
            resolved.len(),
            considered,
            skipped
        );
        resolved
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }
}
