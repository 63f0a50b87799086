//! Layer automation tests against the in-process mock scancard.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{JobProgress, LayerAutomation, LayerState, PollPolicy, run_job};
use crate::config::AutomationConfig;
use crate::console::Console;
use crate::error::AppError;
use crate::job::JobScan;
use crate::models::MarkParameters;
use crate::scancard::ScancardClient;
use crate::scancard::mock::{MockScancard, Reply};

fn fast_config(max_poll_attempts: u32) -> AutomationConfig {
    AutomationConfig {
        settle_delay_ms: 0,
        poll_interval_ms: 0,
        max_poll_attempts,
        ..Default::default()
    }
}

fn automation(mock: &MockScancard, config: &AutomationConfig, cancel: CancellationToken) -> LayerAutomation {
    let client = ScancardClient::new(&mock.config(), Console::silent()).unwrap();
    LayerAutomation::new(client, MarkParameters::default(), config, cancel)
}

/// Device that reports busy for `busy_polls` status requests after each start_mark.
async fn marking_device(busy_polls: u32) -> MockScancard {
    let mut remaining = 0;
    MockScancard::spawn(move |request: &Value| match request["cmd"].as_str() {
        Some("start_mark") => {
            remaining = busy_polls;
            Reply::code(0)
        }
        Some("get_working_status") if remaining > 0 => {
            remaining -= 1;
            Reply::code(1)
        }
        _ => Reply::code(0),
    })
    .await
}

fn opened_paths(mock: &MockScancard) -> Vec<String> {
    mock.requests()
        .iter()
        .filter(|r| r["cmd"] == "open_file")
        .map(|r| r["data"]["path"].as_str().unwrap().to_string())
        .collect()
}

fn layer_sequence(status_polls: usize) -> Vec<String> {
    let mut commands = vec![
        "open_file".to_string(),
        "set_markparameters_by_layer".to_string(),
        "download_parameters".to_string(),
        "start_mark".to_string(),
    ];
    commands.extend(std::iter::repeat_n("get_working_status".to_string(), status_polls));
    commands.push("stop_mark".to_string());
    commands
}

#[tokio::test]
async fn test_three_layer_job_runs_full_sequence_per_layer() {
    let mock = marking_device(2).await;
    let mut automation = automation(&mock, &fast_config(10), CancellationToken::new());
    let scan = JobScan {
        layer_count: 3,
        first_layer: Some(PathBuf::from("jobs/base1.ext")),
        rejected: Vec::new(),
    };

    let mut events = Vec::new();
    let report = run_job(&mut automation, &scan, |event| events.push(event))
        .await
        .unwrap();

    assert_eq!(report.layers.len(), 3);
    assert!(report.layers.iter().all(|l| l.poll_attempts == 3));
    assert_eq!(automation.state(), LayerState::Done);

    let base = Path::new("jobs");
    let expected_paths: Vec<String> = ["base1.ext", "base2.ext", "base3.ext"]
        .iter()
        .map(|name| base.join(name).to_string_lossy().into_owned())
        .collect();
    assert_eq!(opened_paths(&mock), expected_paths);

    let expected: Vec<String> = (0..3).flat_map(|_| layer_sequence(3)).collect();
    assert_eq!(mock.commands(), expected);

    assert!(matches!(events.first(), Some(JobProgress::LayerStarted { layer: 1, total: 3 })));
    assert!(matches!(events.last(), Some(JobProgress::Completed { layers: 3, .. })));
    assert!(report.summary().starts_with("Marked 3/3 layers, 9 status polls"));
}

#[tokio::test]
async fn test_parameters_sent_for_configured_layer() {
    let mock = marking_device(0).await;
    let config = AutomationConfig {
        parameter_layer: 2,
        ..fast_config(5)
    };
    let client = ScancardClient::new(&mock.config(), Console::silent()).unwrap();
    let params = MarkParameters {
        mark_speed: 777.0,
        ..Default::default()
    };
    let mut automation = LayerAutomation::new(client, params, &config, CancellationToken::new());

    automation.run_layer(Path::new("part1.emd"), 1).await.unwrap();

    let set = mock
        .requests()
        .into_iter()
        .find(|r| r["cmd"] == "set_markparameters_by_layer")
        .unwrap();
    assert_eq!(set["data"]["layer"], 2);
    assert_eq!(set["data"]["markSpeed"], 777.0);
}

#[tokio::test]
async fn test_poll_exhaustion_fails_and_stops_mark() {
    let mock = MockScancard::constant(1).await;
    let mut automation = automation(&mock, &fast_config(3), CancellationToken::new());

    let err = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap_err();

    assert!(matches!(err, AppError::PollTimeout { layer: 1, attempts: 3 }));
    assert_eq!(automation.state(), LayerState::Failed);
    assert_eq!(mock.commands(), layer_sequence(3));
}

#[tokio::test]
async fn test_poll_deadline_bounds_polling() {
    let mock = MockScancard::constant(1).await;
    let mut automation = automation(&mock, &fast_config(5), CancellationToken::new()).with_policy(PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: u32::MAX,
        deadline: Some(Duration::from_millis(100)),
    });

    let err = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap_err();

    assert!(matches!(err, AppError::PollTimeout { layer: 1, .. }));
    assert_eq!(mock.commands().last().map(String::as_str), Some("stop_mark"));
}

#[tokio::test]
async fn test_poll_deadline_covers_stalled_status_read() {
    let mock = MockScancard::spawn(|request: &Value| {
        if request["cmd"] == "get_working_status" {
            Reply::Silent
        } else {
            Reply::code(0)
        }
    })
    .await;
    let client = ScancardClient::new(&mock.config(), Console::silent())
        .unwrap()
        .with_timeout(Duration::from_secs(1));
    let mut automation = LayerAutomation::new(
        client,
        MarkParameters::default(),
        &fast_config(5),
        CancellationToken::new(),
    )
    .with_policy(PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: u32::MAX,
        deadline: Some(Duration::from_millis(100)),
    });

    let start = Instant::now();
    let err = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap_err();

    assert!(matches!(err, AppError::PollTimeout { layer: 1, attempts: 1 }));
    assert!(start.elapsed() < Duration::from_millis(800), "took {:?}", start.elapsed());
    assert_eq!(mock.commands().last().map(String::as_str), Some("stop_mark"));
}

#[tokio::test]
async fn test_rerun_after_dropped_run_stops_and_restarts() {
    let ready = Arc::new(AtomicBool::new(false));
    let device_ready = Arc::clone(&ready);
    let mock = MockScancard::spawn(move |request: &Value| {
        if request["cmd"] == "get_working_status" && !device_ready.load(Ordering::SeqCst) {
            Reply::code(1)
        } else {
            Reply::code(0)
        }
    })
    .await;
    let config = AutomationConfig {
        poll_interval_ms: 10,
        ..fast_config(10_000)
    };
    let mut automation = automation(&mock, &config, CancellationToken::new());

    let dropped = tokio::time::timeout(
        Duration::from_millis(100),
        automation.run_layer(Path::new("base1.emd"), 1),
    )
    .await;
    assert!(dropped.is_err());
    assert_eq!(automation.state(), LayerState::Polling);

    ready.store(true, Ordering::SeqCst);
    let report = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap();

    assert_eq!(report.poll_attempts, 1);
    assert_eq!(automation.state(), LayerState::Done);

    let commands = mock.commands();
    let reopen = commands.iter().rposition(|c| c == "open_file").unwrap();
    assert_eq!(commands[reopen - 1], "stop_mark");
    assert_eq!(commands[reopen..].to_vec(), layer_sequence(1));
}

#[tokio::test]
async fn test_no_safety_stop_when_disabled() {
    let mock = MockScancard::constant(1).await;
    let config = AutomationConfig {
        stop_on_failure: false,
        ..fast_config(2)
    };
    let mut automation = automation(&mock, &config, CancellationToken::new());

    let _ = automation.run_layer(Path::new("base1.emd"), 1).await;

    assert_eq!(mock.commands().last().map(String::as_str), Some("get_working_status"));
}

#[tokio::test]
async fn test_decode_failure_before_marking_fails_without_stop() {
    let mock = MockScancard::spawn(|request: &Value| {
        if request["cmd"] == "set_markparameters_by_layer" {
            Reply::Bytes(b"not json".to_vec())
        } else {
            Reply::code(0)
        }
    })
    .await;
    let mut automation = automation(&mock, &fast_config(5), CancellationToken::new());

    let err = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap_err();

    assert!(err.is_transaction_failure());
    assert_eq!(automation.state(), LayerState::Failed);
    assert_eq!(mock.commands(), vec!["open_file", "set_markparameters_by_layer"]);
}

#[tokio::test]
async fn test_status_timeout_counts_as_busy() {
    let mut polls = 0;
    let mock = MockScancard::spawn(move |request: &Value| {
        if request["cmd"] == "get_working_status" {
            polls += 1;
            if polls == 1 {
                return Reply::Silent;
            }
        }
        Reply::code(0)
    })
    .await;
    let client = ScancardClient::new(&mock.config(), Console::silent())
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let mut automation = LayerAutomation::new(
        client,
        MarkParameters::default(),
        &fast_config(5),
        CancellationToken::new(),
    );

    let report = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap();

    assert_eq!(report.poll_attempts, 2);
    assert_eq!(automation.state(), LayerState::Done);
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() {
    let mock = MockScancard::constant(0).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut automation = automation(&mock, &fast_config(5), cancel);

    let err = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
    assert_eq!(automation.state(), LayerState::Failed);
    assert!(mock.commands().is_empty());
}

#[tokio::test]
async fn test_cancel_while_polling_stops_mark() {
    let mock = MockScancard::constant(1).await;
    let config = AutomationConfig {
        poll_interval_ms: 20,
        ..fast_config(10_000)
    };
    let cancel = CancellationToken::new();
    let mut automation = automation(&mock, &config, cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let err = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
    let commands = mock.commands();
    assert!(commands.contains(&"get_working_status".to_string()));
    assert_eq!(commands.last().map(String::as_str), Some("stop_mark"));
}

#[tokio::test]
async fn test_layer_can_rerun_after_failure() {
    let mut fail_first = true;
    let mock = MockScancard::spawn(move |request: &Value| {
        if request["cmd"] == "open_file" && fail_first {
            fail_first = false;
            return Reply::Close;
        }
        Reply::code(0)
    })
    .await;
    let mut automation = automation(&mock, &fast_config(5), CancellationToken::new());

    assert!(automation.run_layer(Path::new("base1.emd"), 1).await.is_err());
    assert_eq!(automation.state(), LayerState::Failed);

    let report = automation.run_layer(Path::new("base1.emd"), 1).await.unwrap();
    assert_eq!(report.poll_attempts, 1);
    assert_eq!(automation.state(), LayerState::Done);
}

#[tokio::test]
async fn test_job_without_first_layer_is_rejected() {
    let mock = MockScancard::constant(0).await;
    let mut automation = automation(&mock, &fast_config(5), CancellationToken::new());
    let scan = JobScan {
        layer_count: 2,
        first_layer: None,
        rejected: Vec::new(),
    };

    let err = run_job(&mut automation, &scan, |_| {}).await.unwrap_err();

    assert!(matches!(err, AppError::FileFormat(_)));
    assert!(mock.commands().is_empty());
}

#[tokio::test]
async fn test_job_stops_at_failing_layer() {
    let mock = MockScancard::spawn(|request: &Value| {
        let second_layer = request["data"]["path"]
            .as_str()
            .is_some_and(|p| p.ends_with("base2.emd"));
        if second_layer { Reply::Close } else { Reply::code(0) }
    })
    .await;
    let mut automation = automation(&mock, &fast_config(5), CancellationToken::new());
    let scan = JobScan {
        layer_count: 3,
        first_layer: Some(PathBuf::from("base1.emd")),
        rejected: Vec::new(),
    };

    let mut failed_layer = None;
    let result = run_job(&mut automation, &scan, |event| {
        if let JobProgress::Failed { layer, .. } = event {
            failed_layer = Some(layer);
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(failed_layer, Some(2));
    assert_eq!(opened_paths(&mock).len(), 2);
}
