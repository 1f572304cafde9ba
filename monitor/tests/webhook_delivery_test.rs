//! Integration tests for report delivery.
//!
//! These tests verify the webhook contract: envelope shape, headers, the
//! single-attempt delivery and how failures are absorbed.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use wingman_monitor::config::{ConfigStore, ConfigUpdate, NewConfig};
use wingman_monitor::environment::{RuntimeEnvironment, StaticEnvironment};
use wingman_monitor::sender::{Sender, SenderConfig, SenderError};
use wingman_monitor::types::{ErrorReport, ErrorType, Severity};
use wingman_monitor::{Monitor, MonitorOptions};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

/// Writes an enabled production config into a fresh project directory.
fn create_project(enabled: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::new(dir.path());
    store.initialize(NewConfig {
        access_token: "tok_test".to_string(),
        project_id: Some("proj_42".to_string()),
        environment: "production".to_string(),
    });
    store.save(ConfigUpdate::enabled(enabled)).unwrap();
    dir
}

fn create_monitor(dir: &TempDir, server: &MockServer, environment: RuntimeEnvironment) -> Monitor {
    Monitor::new(
        MonitorOptions::new(dir.path())
            .with_webhook_url(format!("{}/hook", server.uri()))
            .with_probe(StaticEnvironment(environment))
            .without_panic_hook(),
    )
}

fn sample_report() -> ErrorReport {
    ErrorReport {
        message: "boom".to_string(),
        error_type: ErrorType::CustomError,
        severity: Severity::Medium,
        environment: "production".to_string(),
        access_token: "tok_test".to_string(),
        timestamp: Utc::now(),
        stack: None,
        project_info: None,
        metadata: None,
    }
}

async fn mount_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

// =============================================================================
// Sender
// =============================================================================

/// Verifies the envelope and headers of a delivered report.
#[tokio::test]
async fn test_deliver_posts_envelope_with_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer tok_test"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", "Wingman-Monitor/1.0.0"))
        .and(body_partial_json(json!({
            "event": "error.runtime",
            "source": "wingman-monitor",
            "data": {
                "message": "boom",
                "errorType": "customError",
                "severity": "medium",
                "environment": "production",
                "accessToken": "tok_test"
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sender = Sender::new(SenderConfig::new(format!("{}/hook", server.uri())));
    let result = sender.deliver(&sample_report()).await;
    assert!(result.is_ok(), "delivery should succeed: {result:?}");

    let bodies = received_bodies(&server).await;
    assert!(bodies[0]["data"]["timestamp"].is_i64());
    assert!(bodies[0]["timestamp"].is_string());
}

/// Verifies that a 500 is surfaced by `deliver` and absorbed by `report_error`.
#[tokio::test]
async fn test_server_error_is_logged_not_raised() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal server error"))
        .expect(2)
        .mount(&server)
        .await;

    let sender = Sender::new(SenderConfig::new(format!("{}/hook", server.uri())));

    let result = sender.deliver(&sample_report()).await;
    assert!(matches!(
        result,
        Err(SenderError::Status { status: 500, ref message }) if message == "Internal server error"
    ));

    // Single attempt, no retry.
    assert!(!sender.report_error(&sample_report()).await);
}

/// Verifies that an unreachable webhook is absorbed.
#[tokio::test]
async fn test_unreachable_webhook_is_absorbed() {
    let sender = Sender::new(
        SenderConfig::new("http://127.0.0.1:9/hook".to_string())
            .with_timeout(Duration::from_millis(500)),
    );

    assert!(!sender.report_error(&sample_report()).await);
}

/// Verifies that a slow webhook hits the request timeout.
#[tokio::test]
async fn test_slow_webhook_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let sender = Sender::new(
        SenderConfig::new(format!("{}/hook", server.uri()))
            .with_timeout(Duration::from_millis(200)),
    );

    let result = sender.deliver(&sample_report()).await;
    assert!(matches!(result, Err(SenderError::Http(ref e)) if e.is_timeout()));
}

/// Verifies that a token unusable as a header value is rejected before sending.
#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let sender = Sender::new(SenderConfig::new("http://127.0.0.1:9/hook".to_string()));
    let mut report = sample_report();
    report.access_token = "bad\ntoken".to_string();

    let result = sender.deliver(&report).await;
    assert!(matches!(result, Err(SenderError::InvalidHeader(_))));
}

/// Verifies that a blocking delivery works from inside a runtime context.
#[tokio::test]
async fn test_blocking_delivery_inside_runtime() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer tok_test"))
        .and(body_partial_json(json!({
            "event": "error.runtime",
            "data": { "message": "boom" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sender = Sender::new(SenderConfig::new(format!("{}/hook", server.uri())));
    let result = sender.deliver_blocking(&sample_report());
    assert!(result.is_ok(), "delivery should succeed: {result:?}");
}

/// Verifies that a failed blocking delivery is surfaced once and absorbed.
#[tokio::test]
async fn test_blocking_delivery_failure_is_absorbed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let sender = Sender::new(SenderConfig::new(format!("{}/hook", server.uri())));
    assert!(matches!(
        sender.deliver_blocking(&sample_report()),
        Err(SenderError::Status { status: 502, .. })
    ));
    assert!(!sender.report_error_blocking(&sample_report()));
}

// =============================================================================
// Manual reports
// =============================================================================

/// Verifies that manual reports bypass the development filter.
#[tokio::test]
async fn test_custom_error_sent_even_in_development() {
    let server = MockServer::start().await;
    mount_ok(&server).await;

    let dir = create_project(true);
    let monitor = create_monitor(&dir, &server, RuntimeEnvironment::Development);
    monitor.start();
    assert!(monitor.is_active());

    let error = std::io::Error::new(std::io::ErrorKind::NotFound, "settings.toml missing");
    let mut metadata = Map::new();
    metadata.insert("userId".to_string(), json!("u_1"));
    monitor.report_custom_error(&error, Some(metadata)).await;

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let data = &bodies[0]["data"];
    assert_eq!(data["errorType"], "customError");
    assert_eq!(data["severity"], "medium");
    assert_eq!(data["message"], "settings.toml missing");
    assert_eq!(data["metadata"]["userId"], "u_1");
    assert_eq!(data["projectInfo"], json!({}));

    monitor.stop();
}

/// Verifies that the source chain of a custom error becomes its stack.
#[tokio::test]
async fn test_custom_error_includes_source_chain() {
    let server = MockServer::start().await;
    mount_ok(&server).await;

    let dir = create_project(true);
    let monitor = create_monitor(&dir, &server, RuntimeEnvironment::Production);
    monitor.start();

    let error = anyhow::Error::new(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "access denied",
    ))
    .context("failed to open ledger");
    monitor.report_custom_error(&*error, None).await;

    let bodies = received_bodies(&server).await;
    let data = &bodies[0]["data"];
    assert_eq!(data["stack"], "Caused by:\n  0: access denied");
    assert!(data["message"]
        .as_str()
        .unwrap()
        .starts_with("failed to open ledger"));

    monitor.stop();
}

/// Verifies that nothing is sent before `start()` or with a disabled config.
#[tokio::test]
async fn test_inactive_monitor_sends_nothing() {
    let server = MockServer::start().await;
    mount_ok(&server).await;
    let error = std::io::Error::new(std::io::ErrorKind::Other, "ignored");

    let enabled = create_project(true);
    let monitor = create_monitor(&enabled, &server, RuntimeEnvironment::Production);
    monitor.report_custom_error(&error, None).await;

    let disabled = create_project(false);
    let monitor = create_monitor(&disabled, &server, RuntimeEnvironment::Production);
    monitor.start();
    assert!(!monitor.is_active());
    monitor.report_custom_error(&error, None).await;

    assert!(received_bodies(&server).await.is_empty());
}

/// Verifies that a failing webhook never surfaces to the caller.
#[tokio::test]
async fn test_custom_error_with_failing_webhook_returns_normally() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_project(true);
    let monitor = create_monitor(&dir, &server, RuntimeEnvironment::Production);
    monitor.start();

    let error = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    monitor.report_custom_error(&error, None).await;
    assert!(monitor.is_active());

    monitor.stop();
}

/// Verifies that the host project's manifest is attached to reports.
#[tokio::test]
async fn test_project_info_from_manifest() {
    let server = MockServer::start().await;
    mount_ok(&server).await;

    let dir = create_project(true);
    std::fs::write(
        dir.path().join("Cargo.toml"),
        "[package]\nname = \"ledger\"\nversion = \"0.3.1\"\nrepository = \"https://github.com/example/ledger\"\n",
    )
    .unwrap();

    let monitor = create_monitor(&dir, &server, RuntimeEnvironment::Production);
    monitor.start();
    let error = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    monitor.report_custom_error(&error, None).await;

    let bodies = received_bodies(&server).await;
    assert_eq!(
        bodies[0]["data"]["projectInfo"],
        json!({
            "name": "ledger",
            "version": "0.3.1",
            "url": "https://github.com/example/ledger"
        })
    );

    monitor.stop();
}
