use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Nomad job type. Anything the dashboard doesn't know about maps to `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Batch,
    Service,
    System,
    Sysbatch,
    Unknown,
}

impl JobType {
    pub fn from_nomad(value: &str) -> Self {
        match value {
            "batch" => JobType::Batch,
            "service" => JobType::Service,
            "system" => JobType::System,
            "sysbatch" => JobType::Sysbatch,
            _ => JobType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Dead,
    Unknown,
}

impl JobStatus {
    pub fn from_nomad(value: &str) -> Self {
        match value {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "dead" => JobStatus::Dead,
            _ => JobStatus::Unknown,
        }
    }
}

/// One row of the cluster-wide job listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub status: JobStatus,
    pub job_type: JobType,
    /// Set by Nomad on the listing stub; the authoritative schedule only lives in the detail.
    pub periodic: bool,
    pub parameterized: bool,
    pub stop: bool,
    pub submit_time: Option<DateTime<Utc>>,
}

/// Periodic block of a job detail.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodicSpec {
    pub cron_expression: String,
    /// IANA zone name. Empty means UTC.
    pub time_zone: String,
    pub enabled: bool,
    pub prohibit_overlap: bool,
}

/// Full job as returned by the detail endpoint, reduced to what the dashboard uses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobDetail {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub status: JobStatus,
    pub job_type: JobType,
    pub periodic: Option<PeriodicSpec>,
}

/// A periodic batch job together with its next launch time.
///
/// `next_run_local` is expressed in the job's own zone, `next_run_utc` is the
/// same instant normalized to UTC.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedPeriodicJob {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub status: JobStatus,
    pub job_type: JobType,
    pub cron_expression: String,
    pub time_zone: Tz,
    pub enabled: bool,
    pub next_run_local: DateTime<Tz>,
    pub next_run_utc: DateTime<Utc>,
    /// RFC 1123 rendering of `next_run_local`, ready for display.
    pub next_run_text: String,
}

impl ResolvedPeriodicJob {
    pub fn new(detail: &JobDetail, spec: &PeriodicSpec, time_zone: Tz, next_run_local: DateTime<Tz>) -> Self {
        Self {
            id: detail.id.clone(),
            name: detail.name.clone(),
            namespace: detail.namespace.clone(),
            status: detail.status,
            job_type: detail.job_type,
            cron_expression: spec.cron_expression.clone(),
            time_zone,
            enabled: spec.enabled,
            next_run_utc: next_run_local.with_timezone(&Utc),
            next_run_text: next_run_local.format("%a, %d %b %Y %H:%M:%S %Z").to_string(),
            next_run_local,
        }
    }
}
