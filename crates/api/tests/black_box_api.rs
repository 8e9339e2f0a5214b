use std::time::Duration;

use offload_infra::OffloadConfig;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = OffloadConfig {
            workers: 2,
            worker_idle: Duration::from_millis(5),
            ..OffloadConfig::default()
        };

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = offload_api::app::build_app(&config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn submit(client: &reqwest::Client, url: &str, session: &str) -> (StatusCode, Value) {
    let res = client
        .post(url)
        .header("x-session-id", session)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn poll(
    client: &reqwest::Client,
    srv: &TestServer,
    handler: &str,
    session: &str,
    job_id: &str,
) -> (StatusCode, Value) {
    let res = client
        .get(srv.url(&format!("/work/{handler}")))
        .header("x-session-id", session)
        .query(&[("check_status", "true"), ("job_id", job_id)])
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn poll_until_terminal(
    client: &reqwest::Client,
    srv: &TestServer,
    handler: &str,
    session: &str,
    job_id: &str,
) -> (StatusCode, Value) {
    for _ in 0..200 {
        let (status, body) = poll(client, srv, handler, session, job_id).await;
        if body["status"] != "processing" {
            return (status, body);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("job {job_id} did not finish within timeout");
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_header_is_required() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .post(srv.url("/work/report"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_session");
}

#[tokio::test]
async fn report_is_deduplicated_then_completed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let url = srv.url("/work/report?delay_ms=300");

    let (status, first) = submit(&client, &url, "42").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(first["status"], "processing");
    let j1 = first["job_id"].as_str().unwrap().to_string();

    // Same session, job still running: same job.
    let (_, second) = submit(&client, &url, "42").await;
    assert_eq!(second["job_id"].as_str().unwrap(), j1);

    let (status, done) = poll_until_terminal(&client, &srv, "report", "42", &j1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done, json!({ "status": "completed", "payload": "report for 42 is ready" }));

    // Terminal reads are idempotent.
    let (_, again) = poll(&client, &srv, "report", "42", &j1).await;
    assert_eq!(again, done);

    let (_, third) = submit(&client, &url, "42").await;
    assert_ne!(third["job_id"].as_str().unwrap(), j1);
}

#[tokio::test]
async fn sessions_do_not_share_jobs() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let url = srv.url("/work/report?delay_ms=300");

    let (_, a) = submit(&client, &url, "alice").await;
    let (_, b) = submit(&client, &url, "bob").await;

    assert_ne!(a["job_id"], b["job_id"]);
}

#[tokio::test]
async fn work_failure_is_reported_and_cleared() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let url = srv.url("/work/fail?delay_ms=0&reason=divide%20by%20zero");

    let (_, first) = submit(&client, &url, "42").await;
    let j1 = first["job_id"].as_str().unwrap().to_string();

    let (status, body) = poll_until_terminal(&client, &srv, "fail", "42", &j1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "error", "error": "divide by zero" }));

    let (_, retry) = submit(&client, &url, "42").await;
    assert_ne!(retry["job_id"].as_str().unwrap(), j1);
}

#[tokio::test]
async fn poll_errors_have_stable_messages() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = poll(&client, &srv, "report", "42", "not-a-job").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "status": "error", "error": "unknown job" }));

    let res = client
        .get(srv.url("/work/report?check_status=true"))
        .header("x-session-id", "42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "error", "error": "missing job id" }));
}

#[tokio::test]
async fn malformed_poll_flag_gets_error_status() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/work/report?check_status=1&job_id=x"))
        .header("x-session-id", "42")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn blank_job_id_is_missing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = poll(&client, &srv, "report", "42", "").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "status": "error", "error": "missing job id" }));
}

#[tokio::test]
async fn unregistered_work_is_unavailable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = submit(&client, &srv.url("/work/nope"), "42").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "no handler registered for work: nope");
}

#[tokio::test]
async fn form_parameters_reach_the_handler() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/work/summary?delay_ms=0"))
        .header("x-session-id", "42")
        .json(&json!({ "values": [1.0, 2.0, 3.0] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: Value = res.json().await.unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (_, done) = poll_until_terminal(&client, &srv, "summary", "42", &job_id).await;
    assert_eq!(done["status"], "completed");
    let payload: Value = serde_json::from_str(done["payload"].as_str().unwrap()).unwrap();
    assert_eq!(payload, json!({ "count": 3, "total": 6.0, "mean": 2.0 }));
}

#[tokio::test]
async fn export_completes_with_redirect() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_, first) = submit(&client, &srv.url("/work/export?delay_ms=0&name=q3"), "42").await;
    let job_id = first["job_id"].as_str().unwrap().to_string();

    let (_, done) = poll_until_terminal(&client, &srv, "export", "42", &job_id).await;
    assert_eq!(done, json!({ "status": "completed", "redirect": "/files/q3.csv" }));
}

#[tokio::test]
async fn stats_count_processed_jobs() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_, first) = submit(&client, &srv.url("/work/report?delay_ms=0"), "42").await;
    let job_id = first["job_id"].as_str().unwrap().to_string();
    poll_until_terminal(&client, &srv, "report", "42", &job_id).await;

    // Counters are updated just after the result is stored; poll briefly.
    for _ in 0..50 {
        let stats: Value = client
            .get(srv.url("/stats"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if stats["executor"]["jobs_succeeded"] == 1 {
            assert_eq!(stats["jobs"]["succeeded"], 1);
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("executor stats never reported the finished job");
}
