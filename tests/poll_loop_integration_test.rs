//! Integration tests for the trigger poll loop
//!
//! These tests run the loop against a mocked Transfer API:
//! 1. No trigger file: the loop stays Waiting and submits nothing else
//! 2. Trigger file present: the full workflow runs and the trigger is consumed
//! 3. Error events are logged during a run and the log is reset afterwards
//! 4. Status blocks accumulate across runs
//! 5. Cancellation ends the loop cleanly

use mockito::{Matcher, Mock, Server, ServerGuard};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use transfer_mule::auth::AccessTokenAuthorizer;
use transfer_mule::config::{Config, TimingConfig};
use transfer_mule::orchestrator::{ErrorLog, PollLoop, PollOutcome, PollState, TransferFacade};
use transfer_mule::transfer::TransferClient;

const TASK: &str = r#"{"task_id": "task-1", "type": "TRANSFER", "status": "SUCCEEDED",
    "source_endpoint_display_name": "ncsa#jyc",
    "destination_endpoint_display_name": "ncsa#BlueWaters",
    "request_time": "2024-03-01T12:00:00+00:00",
    "completion_time": "2024-03-01T12:00:30+00:00",
    "bytes_transferred": 10485760, "effective_bytes_per_second": 2097152,
    "files_transferred": 4}"#;

/// Helper to build a config pointing at the mock server and a scratch dir
fn test_config(server: &ServerGuard, local_dir: &Path) -> Config {
    let mut config = Config::default();
    config.service.transfer_base_url = server.url();
    config.paths.local_dir = local_dir.to_path_buf();
    config.status_task_count = 2;
    config.timing = TimingConfig {
        task_deadline_minutes: 5,
        poll_timeout_secs: 1,
        poll_interval_secs: 1,
        cooldown_secs: 0,
        idle_sleep_secs: 0,
    };
    config
}

fn poll_loop(config: &Config, cancel: CancellationToken) -> PollLoop {
    let client = TransferClient::new(
        reqwest::Client::new(),
        &config.service.transfer_base_url,
        Arc::new(AccessTokenAuthorizer::new("test-token")),
    );
    let facade = TransferFacade::new(
        client,
        ErrorLog::new(config.paths.error_file()),
        config.timing.clone(),
        cancel.clone(),
    );
    PollLoop::new(facade, config, cancel)
}

struct ApiMocks {
    transfers: Mock,
    deletes: Mock,
    task_list: Mock,
    /// Whether the local error file existed each time its upload was submitted
    error_file_at_upload: Arc<Mutex<Vec<bool>>>,
}

/// Mock every endpoint the loop touches; every task finishes at once
async fn mock_api(
    server: &mut ServerGuard,
    config: &Config,
    events: &str,
    transfers: usize,
    deletes: usize,
) -> ApiMocks {
    server
        .mock("GET", "/submission_id")
        .with_body(r#"{"value": "sub-1"}"#)
        .create_async()
        .await;
    let error_file_at_upload = Arc::new(Mutex::new(Vec::new()));
    let seen = error_file_at_upload.clone();
    let monitor_error = config.paths.monitor_error();
    let error_file = config.paths.error_file();
    let transfer_mock = server
        .mock("POST", "/transfer")
        .match_header("authorization", "Bearer test-token")
        .with_status(202)
        .with_body_from_request(move |request| {
            let body = String::from_utf8_lossy(request.body().unwrap()).to_string();
            if body.contains(&monitor_error) {
                seen.lock().unwrap().push(error_file.exists());
            }
            br#"{"task_id": "task-1", "code": "Accepted"}"#.to_vec()
        })
        .expect(transfers)
        .create_async()
        .await;
    let delete_mock = server
        .mock("POST", "/delete")
        .with_status(202)
        .with_body(r#"{"task_id": "task-1", "code": "Accepted"}"#)
        .expect(deletes)
        .create_async()
        .await;
    server
        .mock("GET", "/task/task-1")
        .with_body(TASK)
        .create_async()
        .await;
    server
        .mock("GET", "/task/task-1/event_list")
        .match_query(Matcher::Any)
        .with_body(format!(
            r#"{{"DATA": {}, "offset": 0, "limit": 100, "total": 1}}"#,
            events
        ))
        .create_async()
        .await;
    let task_list_mock = server
        .mock("GET", "/task_list")
        .match_query(Matcher::UrlEncoded("limit".into(), "2".into()))
        .with_body(format!(
            r#"{{"DATA": [{}, {}], "offset": 0, "limit": 2, "total": 2}}"#,
            TASK, TASK
        ))
        .expect(if transfers > 1 { 1 } else { 0 })
        .create_async()
        .await;

    ApiMocks {
        transfers: transfer_mock,
        deletes: delete_mock,
        task_list: task_list_mock,
        error_file_at_upload,
    }
}

#[tokio::test]
async fn test_no_trigger_stays_waiting() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let mocks = mock_api(&mut server, &config, "[]", 1, 0).await;

    let mut poll_loop = poll_loop(&config, CancellationToken::new());
    let outcome = poll_loop.poll_once().await.unwrap();

    assert!(matches!(outcome, PollOutcome::Idle));
    assert_eq!(poll_loop.state(), PollState::Waiting);
    mocks.transfers.assert_async().await;
    mocks.deletes.assert_async().await;
    mocks.task_list.assert_async().await;
    assert!(!config.paths.status_file().exists());
}

#[tokio::test]
async fn test_trigger_runs_workflow_and_is_consumed() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    // trigger check + 3 replication transfers + 2 uploads; 3 cleanups + trigger removal
    let mocks = mock_api(&mut server, &config, "[]", 6, 4).await;
    std::fs::write(config.paths.local_trigger(), "").unwrap();

    let mut poll_loop = poll_loop(&config, CancellationToken::new());
    let outcome = poll_loop.poll_once().await.unwrap();

    let report = match outcome {
        PollOutcome::Ran(report) => report,
        PollOutcome::Idle => panic!("trigger file was present, workflow should have run"),
    };
    assert_eq!(report.outcomes.len(), 8);
    assert_eq!(report.summarized, 2);
    assert_eq!(poll_loop.state(), PollState::Waiting);
    assert!(!config.paths.local_trigger().exists());

    mocks.transfers.assert_async().await;
    mocks.deletes.assert_async().await;
    mocks.task_list.assert_async().await;

    let status = std::fs::read_to_string(config.paths.status_file()).unwrap();
    assert_eq!(
        status
            .matches("task_id= ( task-1 ) ncsa#jyc -> ncsa#BlueWaters")
            .count(),
        2
    );
    assert!(status.contains("type=TRANSFER Mbytes=10.0 Mbytes/s=2.0 files=4"));

    // A clean run still uploads an (empty) error file
    assert_eq!(*mocks.error_file_at_upload.lock().unwrap(), vec![true]);
    assert_eq!(
        std::fs::read_to_string(config.paths.error_file()).unwrap(),
        ""
    );
}

#[tokio::test]
async fn test_status_file_accumulates_across_runs() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let mocks = mock_api(&mut server, &config, "[]", 12, 8).await;

    let mut poll_loop = poll_loop(&config, CancellationToken::new());
    for _ in 0..2 {
        std::fs::write(config.paths.local_trigger(), "").unwrap();
        assert!(matches!(
            poll_loop.poll_once().await.unwrap(),
            PollOutcome::Ran(_)
        ));
    }

    mocks.transfers.assert_async().await;
    let status = std::fs::read_to_string(config.paths.status_file()).unwrap();
    assert_eq!(status.matches("task_id= (").count(), 4);
}

#[tokio::test]
async fn test_error_events_logged_then_reset() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let events = r#"[
        {"code": "FILE_NOT_FOUND", "is_error": true, "description": "file not found",
         "details": "benign", "time": "t0"},
        {"code": "ENDPOINT_ERROR", "is_error": true, "description": "error on endpoint",
         "details": "storage offline", "time": "t1"}
    ]"#;
    mock_api(&mut server, &config, events, 6, 4).await;
    std::fs::write(config.paths.local_trigger(), "").unwrap();

    let mut poll_loop = poll_loop(&config, CancellationToken::new());
    let report = match poll_loop.poll_once().await.unwrap() {
        PollOutcome::Ran(report) => report,
        PollOutcome::Idle => panic!("workflow should have run"),
    };

    // One reportable event per replication and upload stage
    assert_eq!(report.reported_errors(), 8);
    // The uploaded log is truncated at the end of the run; only the
    // trigger removal that follows has written to it since
    let log = std::fs::read_to_string(config.paths.error_file()).unwrap();
    assert_eq!(log, "t1: storage offline\n");
}

#[tokio::test]
async fn test_cancelled_loop_returns_cleanly() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    mock_api(&mut server, &config, "[]", 1, 0).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut poll_loop = poll_loop(&config, cancel);

    assert!(poll_loop.run().await.is_ok());
    assert_eq!(poll_loop.state(), PollState::Waiting);
}
