mod job;

pub use job::{JobDetail, JobStatus, JobSummary, JobType, PeriodicSpec, ResolvedPeriodicJob};
