pub mod cron_evaluator;
pub mod job_list_cache;
pub mod periodic_job_resolver;
pub mod ttl_cache;

pub use job_list_cache::JobListCache;
pub use periodic_job_resolver::PeriodicJobResolver;
