use axum::http::StatusCode;
use axum_test::TestServer;
use crawler::{build_app, config::Config, jobs::JobManager, AppState};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

fn create_test_config() -> Config {
    Config {
        shared_secret: "test_secret".to_string(),
        port: 8080,
        max_concurrent_jobs: 1,
        state_dir_root: ".crawl-state-test".to_string(),
    }
}

fn compute_signature(body: &str, timestamp: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn test_create_and_check_job() {
    let config = Arc::new(create_test_config());
    let job_manager = Arc::new(JobManager::new(config.clone()));
    let state = AppState {
        config: config.clone(),
        job_manager,
    };

    let app = build_app(state);
    let server = TestServer::new(app).unwrap();

    let job_payload = json!({
        "job_id": "test-job-123",
        "seed_url": "http://127.0.0.1:1/",
        "callback_url": "http://127.0.0.1:1/callback",
        "options": {
            "max_pages": 1,
            "max_depth": 1,
            "respect_robots_txt": false,
            "user_agent": "TestBot",
            "delay_ms": 0,
        }
    });

    let body_str = serde_json::to_string(&job_payload).unwrap();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();
    let signature = compute_signature(&body_str, &timestamp, &config.shared_secret);

    let response = server
        .post("/api/v1/jobs")
        .add_header("X-Timestamp", timestamp)
        .add_header("X-Signature", signature)
        .json(&job_payload)
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["job_id"], "test-job-123");
    assert_eq!(json["status"], "queued");

    let timestamp_get = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();
    let signature_get = compute_signature("", &timestamp_get, &config.shared_secret);

    let status_response = server
        .get("/api/v1/jobs/test-job-123/status")
        .add_header("X-Timestamp", timestamp_get)
        .add_header("X-Signature", signature_get)
        .await;

    status_response.assert_status(StatusCode::OK);
    let status_json = status_response.json::<serde_json::Value>();
    assert_eq!(status_json["job_id"], "test-job-123");
    let status_str = status_json["status"].as_str().unwrap();
    assert!(["QUEUED", "CRAWLING", "FAILED", "PENDING", "COMPLETE"].contains(&status_str));
}

#[tokio::test]
async fn test_health_check_requires_no_auth() {
    let config = Arc::new(create_test_config());
    let job_manager = Arc::new(JobManager::new(config.clone()));
    let state = AppState { config, job_manager };

    let app = build_app(state);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/api/v1/health").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_unsigned_job_submission_is_rejected() {
    let config = Arc::new(create_test_config());
    let job_manager = Arc::new(JobManager::new(config.clone()));
    let state = AppState { config, job_manager };

    let app = build_app(state);
    let server = TestServer::new(app).unwrap();

    let response = server
        .post("/api/v1/jobs")
        .json(&json!({ "job_id": "x", "seed_url": "http://example.com", "callback_url": "http://example.com" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
