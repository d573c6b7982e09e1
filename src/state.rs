use std::sync::Arc;

use crate::config::AppConfig;
use crate::external::job_source::JobSource;
use crate::services::{JobListCache, PeriodicJobResolver};

#[derive(Clone)]
pub struct AppState {
    pub job_list: Arc<JobListCache>,
    pub periodic_jobs: Arc<PeriodicJobResolver>,
    pub nomad_address: String,
    pub nomad_namespace: String,
}

impl AppState {
    /// Wires both caches onto one job source. Each cache keeps its own TTL clock.
    pub fn new(config: &AppConfig, source: Arc<dyn JobSource>) -> Self {
        let job_list = Arc::new(JobListCache::new(source.clone(), config.cache_ttl));
        let periodic_jobs = Arc::new(
            PeriodicJobResolver::new(job_list.clone(), source, config.cache_ttl)
                .with_concurrency(config.detail_fetch_concurrency),
        );

        Self {
            job_list,
            periodic_jobs,
            nomad_address: config.nomad.address.clone(),
            nomad_namespace: config.nomad.namespace.clone(),
        }
    }
}
