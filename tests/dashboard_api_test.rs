//! End-to-end: HTTP routes -> caches -> NomadClient -> fake Nomad.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Timelike, Utc};
use nomad_dashboard::app::create_app;
use nomad_dashboard::config::AppConfig;
use nomad_dashboard::external::NomadClient;
use nomad_dashboard::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stub(id: &str, job_type: &str) -> Value {
    json!({ "ID": id, "Name": id, "Namespace": "default", "Type": job_type, "Status": "running" })
}

fn detail(id: &str, job_type: &str, spec: Option<(&str, &str)>) -> Value {
    json!({
        "ID": id,
        "Name": id,
        "Namespace": "default",
        "Type": job_type,
        "Status": "running",
        "Periodic": spec.map(|(cron, tz)| json!({ "Enabled": true, "Spec": cron, "TimeZone": tz }))
    })
}

fn build_app(server: &MockServer, ttl_secs: &str) -> Router {
    let vars: HashMap<&str, String> = HashMap::from([
        ("NOMAD_ADDR", server.uri()),
        ("CACHE_TTL_SECS", ttl_secs.to_string()),
    ]);
    let config = AppConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
    let client = NomadClient::new(&config.nomad).unwrap();
    create_app(AppState::new(&config, Arc::new(client)))
}

async fn get_raw(app: &Router, uri: &str) -> (StatusCode, Bytes) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, bytes) = get_raw(app, uri).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn mount_cluster(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            stub("web", "service"),
            stub("cleanup", "batch"),
            stub("adhoc", "batch"),
            stub("broken", "batch"),
        ])))
        .mount(server)
        .await;

    for (id, body) in [
        ("web", detail("web", "service", Some(("*/5 * * * *", "UTC")))),
        ("cleanup", detail("cleanup", "batch", Some(("*/5 * * * *", "UTC")))),
        ("adhoc", detail("adhoc", "batch", None)),
        ("broken", detail("broken", "batch", Some(("every tuesday", "UTC")))),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/job/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let app = build_app(&server, "60");

    let (status, body) = get_raw(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_all_jobs_are_listed_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stub("web", "service"), stub("cleanup", "batch")])))
        .expect(1)
        .mount(&server)
        .await;
    let app = build_app(&server, "60");

    let (status, body) = get_json(&app, "/api/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(body["jobs"][0]["job_type"], "service");

    let (_, again) = get_json(&app, "/api/jobs").await;
    assert_eq!(again["fetched_at"], body["fetched_at"]);
}

#[tokio::test]
async fn test_all_jobs_error_is_json_500() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jobs"))
        .respond_with(ResponseTemplate::new(503).set_body_string("no cluster leader"))
        .mount(&server)
        .await;
    let app = build_app(&server, "60");

    let (status, body) = get_json(&app, "/api/jobs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("no cluster leader"));
}

#[tokio::test]
async fn test_periodic_jobs_resolution() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    let app = build_app(&server, "60");

    let before = Utc::now();
    let (status, body) = get_json(&app, "/api/periodic-jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["error"].is_null());
    assert_eq!(body["nomad_namespace"], "default");

    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], "cleanup");

    let next: DateTime<Utc> = jobs[0]["next_run_utc"].as_str().unwrap().parse().unwrap();
    assert!(next > before);
    assert_eq!(next.minute() % 5, 0);
    assert_eq!(next.second(), 0);

    // The index page renders the same view.
    let (status, index) = get_json(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["jobs"], body["jobs"]);
}

#[tokio::test]
async fn test_periodic_jobs_render_error_when_nothing_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jobs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = build_app(&server, "60");

    let (status, body) = get_json(&app, "/api/periodic-jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["jobs"].as_array().unwrap().is_empty());
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_periodic_jobs_keep_last_good_after_outage() {
    let server = MockServer::start().await;
    // TTL of zero: every request refreshes.
    Mock::given(method("GET"))
        .and(path("/v1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stub("cleanup", "batch")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/jobs"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/job/cleanup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("cleanup", "batch", Some(("@hourly", "")))))
        .mount(&server)
        .await;
    let app = build_app(&server, "0");

    let (_, first) = get_json(&app, "/api/periodic-jobs").await;
    assert_eq!(first["jobs"].as_array().unwrap().len(), 1);
    assert!(first["error"].is_null());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, second) = get_json(&app, "/api/periodic-jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["jobs"], first["jobs"]);
    assert_eq!(second["fetched_at"], first["fetched_at"]);
    assert!(second["error"].as_str().unwrap().contains("bad gateway"));

    let (_, cache) = get_json(&app, "/api/cache").await;
    assert_eq!(cache["periodic_jobs"]["state"], "stale");
    assert!(cache["periodic_jobs"]["last_error"].as_str().is_some());
}

#[tokio::test]
async fn test_cache_status_starts_empty() {
    let server = MockServer::start().await;
    let app = build_app(&server, "60");

    let (status, body) = get_json(&app, "/api/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_list"]["state"], "empty");
    assert_eq!(body["periodic_jobs"]["state"], "empty");
    assert_eq!(body["job_list"]["ttl_secs"], 60);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = MockServer::start().await;
    let app = build_app(&server, "60");

    let (status, body) = get_json(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}
