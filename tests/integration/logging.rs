//! Log output of the poller and the binary

use assert_cmd::Command;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use report_extractor::fetcher::AccessToken;
use report_extractor::poller::{PollPolicy, ReportPoller};
use report_extractor::{ReportId, ReportStatusSnapshot};

use crate::support::{gzip, in_progress, RecordingSleeper, ScriptedApi, StubResponse, StubServer};

/// Shared buffer the fmt layer writes into
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn json_lines(stderr: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stderr)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).unwrap_or_else(|e| panic!("not a JSON line ({e}): {line}"))
        })
        .collect()
}

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("report-extractor").unwrap();
    cmd.env_remove("SP_API_CLIENT")
        .env_remove("SP_API_SECRET")
        .env_remove("SP_API_REFRESH")
        .env_remove("REPORTS_BUCKET")
        .env_remove("RUST_LOG");
    cmd
}

#[tokio::test(flavor = "current_thread")]
async fn poller_logs_progress_for_each_pending_attempt() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("report_extractor=info"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let api = ScriptedApi::new(vec![
        ReportStatusSnapshot::with_status("IN_QUEUE"),
        in_progress(),
        ReportStatusSnapshot::done("DOC-9"),
    ]);
    let poller = ReportPoller::with_sleeper(
        PollPolicy::new(5, Duration::from_secs(30)),
        RecordingSleeper::new(),
    );

    poller
        .wait_for_document(&api, &AccessToken::new("Atza|test"), &ReportId::new("R-LOG"))
        .await
        .unwrap();

    let text = logs.text();
    assert_eq!(text.matches("Report not ready").count(), 2, "{text}");
    assert!(text.contains("[1/5] Report not ready; retrying in 30s"), "{text}");
    assert!(text.contains("[2/5] Report not ready; retrying in 30s"), "{text}");
    assert!(!text.contains("[3/5] Report not ready"), "{text}");
    assert!(text.contains("status=IN_QUEUE"), "{text}");
    assert!(text.contains("report_id=R-LOG"), "{text}");
    assert!(text.contains("Report ready"), "{text}");
}

#[tokio::test(flavor = "current_thread")]
async fn poller_logs_final_attempt_before_timeout() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("report_extractor=info"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let poller = ReportPoller::with_sleeper(
        PollPolicy::new(2, Duration::from_secs(30)),
        RecordingSleeper::new(),
    );
    poller
        .wait_for_document(
            &ScriptedApi::new(vec![]),
            &AccessToken::new("Atza|test"),
            &ReportId::new("R-SLOW"),
        )
        .await
        .unwrap_err();

    let text = logs.text();
    assert!(text.contains("[1/2] Report not ready; retrying in 30s"), "{text}");
    assert!(text.contains("[2/2] Report not ready; giving up after 30s"), "{text}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_log_format_emits_structured_lines() {
    let server = StubServer::start(vec![
        (
            "POST /auth/o2/token".to_string(),
            vec![StubResponse::json(200, r#"{"access_token":"Atza|stub"}"#)],
        ),
        (
            "POST /reports/2021-06-30/reports".to_string(),
            vec![StubResponse::json(202, r#"{"reportId":"ID323"}"#)],
        ),
        (
            "GET /reports/2021-06-30/reports/ID323".to_string(),
            vec![
                StubResponse::json(200, r#"{"processingStatus":"IN_QUEUE"}"#),
                StubResponse::json(200, r#"{"processingStatus":"DONE","reportDocumentId":"DOC-1"}"#),
            ],
        ),
        (
            "GET /reports/2021-06-30/documents/DOC-1".to_string(),
            vec![StubResponse::json(
                200,
                r#"{"url":"{base}/download/doc-1","compressionAlgorithm":"GZIP"}"#,
            )],
        ),
        (
            "GET /download/doc-1".to_string(),
            vec![StubResponse::bytes(gzip(br#"{"rows":[]}"#))],
        ),
    ])
    .await;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let output_dir = temp_dir.path().to_path_buf();
    let base_url = server.base_url.clone();
    let token_url = server.url("/auth/o2/token");

    let output = tokio::task::spawn_blocking(move || {
        cmd()
            .env("LOG_FORMAT", "json")
            .env("SP_API_CLIENT", "client")
            .env("SP_API_SECRET", "secret")
            .env("SP_API_REFRESH", "refresh")
            .args([
                "--api-base-url",
                base_url.as_str(),
                "--token-url",
                token_url.as_str(),
                "--output-dir",
                output_dir.to_str().unwrap(),
                "--poll-interval-secs",
                "0",
                "invoke",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());

    let lines = json_lines(&output.stderr);
    assert!(!lines.is_empty());

    let progress = lines
        .iter()
        .find(|line| {
            line["fields"]["message"]
                .as_str()
                .is_some_and(|m| m.contains("Report not ready"))
        })
        .expect("progress line");
    assert_eq!(progress["level"], "INFO");
    assert_eq!(progress["fields"]["report_id"], "ID323");
    assert_eq!(progress["fields"]["attempt"], 1);
    assert_eq!(progress["fields"]["status"], "IN_QUEUE");

    assert!(lines
        .iter()
        .any(|line| line["fields"]["message"] == "Report extracted"
            && line["fields"]["document_id"] == "DOC-1"));

    // stdout stays reserved for the trigger response
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["statusCode"], 200);
}

#[test]
fn json_log_format_tags_failures_with_class() {
    let output = cmd()
        .env("LOG_FORMAT", "json")
        .arg("invoke")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));

    let lines = json_lines(&output.stderr);
    let failure = lines
        .iter()
        .find(|line| line["level"] == "ERROR")
        .expect("error line");
    assert_eq!(failure["fields"]["error_class"], "config");
    assert!(failure["fields"]["message"]
        .as_str()
        .unwrap()
        .contains("SP_API_CLIENT"));
}
