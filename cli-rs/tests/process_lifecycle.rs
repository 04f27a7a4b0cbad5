//! Runs the `great_expectations` binary against a mock collector.

use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BIN: &str = env!("CARGO_BIN_EXE_great_expectations");
const COLLECTOR_PATH: &str = "/great_expectations/v1/usage_statistics";

async fn collector() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COLLECTOR_PATH))
        .respond_with(|request: &wiremock::Request| {
            let accepted = request
                .body_json::<Value>()
                .map(|body| body.get("data_context_id").is_some_and(|id| id.is_string()))
                .unwrap_or(false);
            if accepted {
                ResponseTemplate::new(201)
            } else {
                ResponseTemplate::new(400)
            }
        })
        .mount(&server)
        .await;
    server
}

/// The binary, run in `dir` with a clean environment for its own variables
fn great_expectations(dir: &std::path::Path, collector_url: Option<String>) -> Command {
    let mut command = Command::new(BIN);
    command
        .current_dir(dir)
        .env_remove("GE_USAGE_STATS")
        .env_remove("GE_CONFIG_PATH")
        .env_remove("GE_USAGE_STATISTICS_URL")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(url) = collector_url {
        command.env("GE_USAGE_STATISTICS_URL", url);
    }
    command
}

fn collector_url(server: &MockServer) -> Option<String> {
    Some(format!("{}{}", server.uri(), COLLECTOR_PATH))
}

async fn run(command: &mut Command) -> Output {
    tokio::time::timeout(Duration::from_secs(30), command.output())
        .await
        .expect("process did not finish")
        .expect("failed to run great_expectations")
}

async fn received_events(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap()["event"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_successful_run_delivers_four_events() {
    let server = collector().await;
    let dir = tempfile::tempdir().unwrap();

    let output = run(great_expectations(dir.path(), collector_url(&server))
        .args(["project", "instantiate", "--nap-seconds", "0"]))
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stdout.contains("Done constructing a DataContext"));
    assert!(stdout.contains("Ending a long nap"));
    assert!(!stdout.contains("INFO"));
    assert!(!stdout.contains("DEBUG"));
    assert!(!stderr.contains("KeyboardInterrupt"));

    let events = received_events(&server).await;
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], "data_context.__init__");
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigint_during_nap_exits_promptly() {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

    let server = collector().await;
    let dir = tempfile::tempdir().unwrap();

    let mut child = great_expectations(dir.path(), collector_url(&server))
        .args(["project", "instantiate", "--nap-seconds", "30"])
        .spawn()
        .unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let mut stdout = Vec::new();
    tokio::time::timeout(Duration::from_secs(15), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            let done = line.contains("Done constructing a DataContext");
            stdout.push(line);
            if done {
                break;
            }
        }
    })
    .await
    .expect("context was never constructed");

    let pid = child.id().unwrap().to_string();
    let signalled = Instant::now();
    let kill = std::process::Command::new("kill")
        .args(["-INT", &pid])
        .status()
        .unwrap();
    assert!(kill.success());

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("process ignored SIGINT")
        .unwrap();
    let elapsed = signalled.elapsed();

    while let Some(line) = lines.next_line().await.unwrap() {
        stdout.push(line);
    }
    let mut stderr = String::new();
    child
        .stderr
        .take()
        .unwrap()
        .read_to_string(&mut stderr)
        .await
        .unwrap();

    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?} to exit");
    assert_eq!(status.code(), Some(130));
    assert!(stderr.contains("KeyboardInterrupt"), "stderr: {stderr}");
    assert!(!stdout.iter().any(|l| l.contains("Ending a long nap")));
    assert_eq!(received_events(&server).await.len(), 4);
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigint_during_send_to_slow_collector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COLLECTOR_PATH))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(4)))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("record.json"), r#"{"event": "data_context.__init__"}"#)
        .unwrap();

    let child = great_expectations(dir.path(), collector_url(&server))
        .args(["usage-statistics", "send", "record.json"])
        .spawn()
        .unwrap();
    let pid = child.id().unwrap().to_string();

    // Wait until the record is on the wire.
    tokio::time::timeout(Duration::from_secs(10), async {
        while server.received_requests().await.unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("record never reached the collector");

    let signalled = Instant::now();
    let kill = std::process::Command::new("kill")
        .args(["-INT", &pid])
        .status()
        .unwrap();
    assert!(kill.success());

    let output = tokio::time::timeout(Duration::from_secs(10), child.wait_with_output())
        .await
        .expect("process ignored SIGINT")
        .unwrap();
    let elapsed = signalled.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?} to exit");
    assert_eq!(output.status.code(), Some(130));
    assert!(stderr.contains("Aborted! KeyboardInterrupt (SIGINT)"), "stderr: {stderr}");
    assert!(!stdout.contains("201"), "stdout: {stdout}");
}

#[tokio::test]
async fn test_unreachable_collector_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let started = Instant::now();

    let output = run(great_expectations(dir.path(), None).args([
        "project",
        "instantiate",
        "--nap-seconds",
        "0",
        "--offline",
    ]))
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Done constructing a DataContext"));
    assert!(stdout.contains("Ending a long nap"));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_disabled_usage_statistics_send_nothing() {
    let server = collector().await;
    let dir = tempfile::tempdir().unwrap();

    let output = run(great_expectations(dir.path(), collector_url(&server))
        .env("GE_USAGE_STATS", "false")
        .args(["project", "instantiate"]))
    .await;

    assert!(output.status.success());
    assert!(received_events(&server).await.is_empty());
}

#[tokio::test]
async fn test_send_reports_collector_status() {
    let server = collector().await;
    let dir = tempfile::tempdir().unwrap();

    let valid = dir.path().join("valid.json");
    std::fs::write(
        &valid,
        r#"{"event": "data_context.__init__", "event_payload": {}, "success": true,
            "version": "1.0.0", "event_time": "2020-03-28T01:14:21.155Z",
            "data_context_id": "96c547fe-e809-4f2e-b122-0dc91bb7b3ad",
            "data_context_instance_id": "445a8ad1-2bd0-45ce-bb6b-d066afe996dd",
            "ge_version": "0.9.7"}"#,
    )
    .unwrap();
    let missing_id = dir.path().join("missing_id.json");
    std::fs::write(&missing_id, r#"{"event": "data_context.__init__"}"#).unwrap();

    let output = run(great_expectations(dir.path(), collector_url(&server))
        .args(["usage-statistics", "send", "valid.json"]))
    .await;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("201"));

    let output = run(great_expectations(dir.path(), collector_url(&server))
        .args(["usage-statistics", "send", "missing_id.json"]))
    .await;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("400"));
}

#[tokio::test]
async fn test_datasource_list_masks_passwords() {
    let server = collector().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("great_expectations.toml"),
        r#"
[datasources.warehouse]
class_name = "SqlAlchemyDatasource"
credentials = { drivername = "postgresql", password = "hunter2" }
"#,
    )
    .unwrap();

    let output = run(great_expectations(dir.path(), collector_url(&server))
        .args(["datasource", "list"]))
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("1 Datasource found:"));
    assert!(stdout.contains("warehouse"));
    assert!(stdout.contains("password: ******"));
    assert!(!stdout.contains("hunter2"));

    let events = received_events(&server).await;
    assert_eq!(
        events,
        vec![
            "data_context.__init__",
            "data_context.list_datasources",
            "cli.datasource.list"
        ]
    );
}

#[tokio::test]
async fn test_malformed_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("great_expectations.toml"), "[datasources.broken\n").unwrap();

    let output = run(great_expectations(dir.path(), None).args(["store", "list"])).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error: "));
}

#[tokio::test]
async fn test_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(great_expectations(dir.path(), None).arg("init")).await;
    assert!(output.status.success());
    assert!(dir.path().join("great_expectations.toml").exists());

    let output = run(great_expectations(dir.path(), None).arg("init")).await;
    assert_eq!(output.status.code(), Some(1));
}
