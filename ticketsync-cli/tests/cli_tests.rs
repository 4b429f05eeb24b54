//! Integration tests for the ticketsync binary.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use assert_cmd::{Command, assert::OutputAssertExt, cargo::cargo_bin_cmd};
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use predicates::prelude::PredicateBooleanExt;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Runs the binary in an empty directory with no user config, `.env` file or
/// `TICKETSYNC_*` overrides leaking in from the host.
fn isolated(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("ticketsync");
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(20));
    for key in [
        "TICKETSYNC_PLATFORM_URL",
        "TICKETSYNC_LIVE_URL",
        "TICKETSYNC_FETCH_MODE",
        "TICKETSYNC_PAGE_SIZE",
        "TICKETSYNC_REQUEST_TIMEOUT_SECS",
        "TICKETSYNC_LOG_LEVEL",
        "TICKETSYNC_LOG_FORMAT",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("history"))
        .stdout(predicates::str::contains("follow"))
        .stdout(predicates::str::contains("config"))
        .stdout(predicates::str::contains("completion"))
        .stdout(predicates::str::contains("--config"));
}

#[test]
fn test_history_help_shows_options() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.arg("history").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("--conversation"))
        .stdout(predicates::str::contains("--mode"))
        .stdout(predicates::str::contains("--pages"))
        .stdout(predicates::str::contains("--json"));
}

#[test]
fn test_history_requires_conversation() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.arg("history");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains(
            "the following required arguments were not provided",
        ))
        .stderr(predicates::str::contains("--conversation <CONVERSATION>"));
}

#[test]
fn test_history_rejects_unknown_mode() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.args(["history", "--conversation", "ticket-1", "--mode", "carrier-pigeon"]);

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("invalid value"))
        .stderr(predicates::str::contains("--mode <MODE>"));
}

#[test]
fn test_config_prints_yaml_defaults() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.arg("config");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("platform_base_url:"))
        .stdout(predicates::str::contains("page_size: 50"))
        .stdout(predicates::str::contains("fetch_mode: live"));
}

#[test]
fn test_config_prints_json() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.args(["config", "--format", "json"]);

    let output = cmd.assert().success().get_output().stdout.clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["page_size"], 50);
    assert_eq!(parsed["log_format"], "pretty");
}

#[test]
fn test_completion_generates_script() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.args(["completion", "--shell", "bash"]);

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("ticketsync"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.args(["--config", "does-not-exist.yaml"])
        .args(["history", "--conversation", "ticket-1"]);

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("failed to load configuration"))
        .stderr(predicates::str::contains("does-not-exist.yaml"));
}

#[test]
fn test_invalid_page_size_override_fails() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.env("TICKETSYNC_PAGE_SIZE", "0")
        .args(["history", "--conversation", "ticket-1"]);

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("page_size"));
}

#[test]
fn test_history_connection_failure() {
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated(&dir);
    cmd.env("TICKETSYNC_PLATFORM_URL", "http://127.0.0.1:9/api/")
        .env("TICKETSYNC_REQUEST_TIMEOUT_SECS", "5")
        .args(["history", "--conversation", "ticket-1", "--mode", "platform"]);

    cmd.assert().failure().stderr(
        predicates::str::contains("failed to load conversation ticket-1")
            .and(predicates::str::contains("transport error")),
    );
}

type Requests = Arc<Mutex<Vec<String>>>;

async fn one_message_page(State(requests): State<Requests>, uri: Uri) -> Response {
    requests.lock().unwrap().push(uri.path().to_string());
    Json(json!({
        "messages": [{
            "id": "m-1",
            "timestamp": "2024-05-01T12:00:00.000Z",
            "payload": {"body": "hello"}
        }],
        "next_cursor": null
    }))
    .into_response()
}

async fn rejected_events(State(requests): State<Requests>, uri: Uri) -> Response {
    requests.lock().unwrap().push(uri.path().to_string());
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "no event stream"})),
    )
        .into_response()
}

/// Backend whose history works but whose event stream is always rejected.
async fn spawn_backend() -> (String, Requests) {
    let requests = Requests::default();
    let app = Router::new()
        .route("/api/conversations/{id}/messages", get(one_message_page))
        .route("/api/conversations/{id}/events", get(rejected_events))
        .with_state(Arc::clone(&requests));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/"), requests)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_follow_exits_when_event_stream_is_rejected() {
    let (base, requests) = spawn_backend().await;
    let dir = TempDir::new().unwrap();

    let output = tokio::task::spawn_blocking(move || {
        let mut cmd = isolated(&dir);
        cmd.env("TICKETSYNC_LIVE_URL", &base)
            .env("TICKETSYNC_PLATFORM_URL", &base)
            .args(["follow", "--conversation", "ticket-1", "--mode", "live"]);
        cmd.output().unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .failure()
        .stdout(predicates::str::contains("m-1"))
        .stderr(
            predicates::str::contains("stopped following ticket-1")
                .and(predicates::str::contains("404")),
        );
    assert!(
        requests
            .lock()
            .unwrap()
            .contains(&"/api/conversations/ticket-1/events".to_string())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_history_in_live_mode_does_not_open_event_stream() {
    let (base, requests) = spawn_backend().await;
    let dir = TempDir::new().unwrap();

    let output = tokio::task::spawn_blocking(move || {
        let mut cmd = isolated(&dir);
        cmd.env("TICKETSYNC_LIVE_URL", &base)
            .args(["history", "--conversation", "ticket-1", "--mode", "live"]);
        cmd.output().unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .success()
        .stdout(predicates::str::contains("m-1"))
        .stdout(predicates::str::contains("-- start of conversation --"));
    assert_eq!(
        *requests.lock().unwrap(),
        ["/api/conversations/ticket-1/messages"]
    );
}
