use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::NomadConfig;
use crate::external::job_source::{JobSource, RemoteFetchError};
use crate::models::{JobDetail, JobStatus, JobSummary, JobType, PeriodicSpec};

const TOKEN_HEADER: &str = "X-Nomad-Token";
const NEXT_TOKEN_HEADER: &str = "X-Nomad-NextToken";

/// Client for the Nomad HTTP API (`/v1/jobs` and `/v1/job/:id`).
pub struct NomadClient {
    client: reqwest::Client,
    base_url: Url,
    namespace: String,
    token: String,
}

impl NomadClient {
    pub fn new(config: &NomadConfig) -> Result<Self, RemoteFetchError> {
        let base_url = Url::parse(&config.address)
            .map_err(|e| RemoteFetchError::InvalidAddress(format!("{}: {}", config.address, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteFetchError::InvalidAddress(config.address.clone()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteFetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            namespace: config.namespace.clone(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new(), so path_segments_mut always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .query(&[("namespace", self.namespace.as_str())]);
        if self.token.is_empty() {
            request
        } else {
            request.header(TOKEN_HEADER, self.token.as_str())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NomadJobListStub {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(rename = "Type", default)]
    job_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    periodic: bool,
    #[serde(default)]
    parameterized_job: bool,
    #[serde(default)]
    stop: bool,
    #[serde(default)]
    submit_time: i64,
}

// Pointer fields on Nomad's Job struct come back as null when unset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NomadJob {
    #[serde(rename = "ID")]
    id: Option<String>,
    name: Option<String>,
    namespace: Option<String>,
    #[serde(rename = "Type")]
    job_type: Option<String>,
    status: Option<String>,
    periodic: Option<NomadPeriodicConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NomadPeriodicConfig {
    enabled: Option<bool>,
    spec: Option<String>,
    prohibit_overlap: Option<bool>,
    time_zone: Option<String>,
}

impl From<NomadJobListStub> for JobSummary {
    fn from(stub: NomadJobListStub) -> Self {
        Self {
            status: JobStatus::from_nomad(&stub.status),
            job_type: JobType::from_nomad(&stub.job_type),
            submit_time: (stub.submit_time > 0)
                .then(|| Utc.timestamp_nanos(stub.submit_time)),
            id: stub.id,
            name: stub.name,
            namespace: stub.namespace,
            periodic: stub.periodic,
            parameterized: stub.parameterized_job,
            stop: stub.stop,
        }
    }
}

impl NomadJob {
    fn into_detail(self, requested_id: &str) -> JobDetail {
        let id = self.id.unwrap_or_else(|| requested_id.to_string());
        JobDetail {
            name: self.name.unwrap_or_else(|| id.clone()),
            namespace: self.namespace.unwrap_or_default(),
            status: JobStatus::from_nomad(self.status.as_deref().unwrap_or_default()),
            job_type: JobType::from_nomad(self.job_type.as_deref().unwrap_or_default()),
            periodic: self.periodic.map(|p| PeriodicSpec {
                cron_expression: p.spec.unwrap_or_default(),
                time_zone: p.time_zone.unwrap_or_default(),
                enabled: p.enabled.unwrap_or(true),
                prohibit_overlap: p.prohibit_overlap.unwrap_or(false),
            }),
            id,
        }
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteFetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteFetchError::BadResponse(format!(
        "HTTP {}: {}",
        status,
        body.trim()
    )))
}

#[async_trait]
impl JobSource for NomadClient {
    async fn list_jobs(&self) -> Result<Vec<JobSummary>, RemoteFetchError> {
        let url = self.endpoint(&["v1", "jobs"]);
        let mut jobs = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self.get(url.clone());
            if let Some(token) = next_token.as_deref() {
                request = request.query(&[("next_token", token)]);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| RemoteFetchError::Network(e.to_string()))?;
            let resp = check_status(resp).await?;

            let following = resp
                .headers()
                .get(NEXT_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|v| !v.is_empty());

            let page: Vec<NomadJobListStub> = resp
                .json()
                .await
                .map_err(|e| RemoteFetchError::Parse(e.to_string()))?;
            debug!("Fetched page of {} jobs from Nomad", page.len());
            jobs.extend(page.into_iter().map(JobSummary::from));

            match following {
                Some(token) if next_token.as_deref() == Some(token.as_str()) => {
                    return Err(RemoteFetchError::BadResponse(format!(
                        "pagination token {} repeated",
                        token
                    )));
                }
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(jobs)
    }

    async fn job_detail(&self, job_id: &str) -> Result<JobDetail, RemoteFetchError> {
        let url = self.endpoint(&["v1", "job", job_id]);

        let resp = self
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteFetchError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteFetchError::NotFound(job_id.to_string()));
        }
        let resp = check_status(resp).await?;

        let job: NomadJob = resp
            .json()
            .await
            .map_err(|e| RemoteFetchError::Parse(e.to_string()))?;

        Ok(job.into_detail(job_id))
    }
}
