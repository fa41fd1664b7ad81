//! Live client against a local HTTP stub

use std::sync::Arc;
use std::time::Duration;

use report_extractor::config::ExtractorConfig;
use report_extractor::extractor::ReportExtractor;
use report_extractor::fetcher::sp_config::SpApiEndpoints;
use report_extractor::fetcher::{FetcherError, ReportsApi, RequestFailure, SpReportsClient};
use report_extractor::output::MemoryBuckets;
use report_extractor::poller::PollPolicy;
use report_extractor::{ErrorClass, ReportId, ReportRequest};

use crate::support::{credentials, gzip, StubResponse, StubServer};

const TOKEN_PATH: &str = "/auth/o2/token";
const CREATE_PATH: &str = "/reports/2021-06-30/reports";
const REPORT_PATH: &str = "/reports/2021-06-30/reports/ID323";
const DOCUMENT_PATH: &str = "/reports/2021-06-30/documents/DOC-1";
const DOWNLOAD_PATH: &str = "/download/doc-1";

fn token_ok() -> StubResponse {
    StubResponse::json(
        200,
        r#"{"access_token":"Atza|stub","refresh_token":"Atzr|x","token_type":"bearer","expires_in":3600}"#,
    )
}

fn endpoints(server: &StubServer) -> SpApiEndpoints {
    SpApiEndpoints::new(server.url(TOKEN_PATH), server.base_url.clone())
}

fn request() -> ReportRequest {
    let now = chrono::DateTime::parse_from_rfc3339("2025-01-20T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    ReportRequest::for_previous_month(now).unwrap()
}

#[tokio::test]
async fn full_run_over_http() {
    let document = gzip(br#"{"reportSpecification":{"reportType":"GET_SALES_AND_TRAFFIC_REPORT"}}"#);
    let server = StubServer::start(vec![
        (format!("POST {TOKEN_PATH}"), vec![token_ok()]),
        (
            format!("POST {CREATE_PATH}"),
            vec![StubResponse::json(202, r#"{"reportId":"ID323"}"#)],
        ),
        (
            format!("GET {REPORT_PATH}"),
            vec![
                StubResponse::json(200, r#"{"reportId":"ID323","processingStatus":"IN_QUEUE"}"#),
                StubResponse::json(
                    200,
                    r#"{"reportId":"ID323","processingStatus":"DONE","reportDocumentId":"DOC-1"}"#,
                ),
            ],
        ),
        (
            format!("GET {DOCUMENT_PATH}"),
            vec![StubResponse::json(
                200,
                r#"{"reportDocumentId":"DOC-1","url":"{base}/download/doc-1?X-Amz-Signature=abc","compressionAlgorithm":"GZIP"}"#,
            )],
        ),
        (format!("GET {DOWNLOAD_PATH}"), vec![StubResponse::bytes(document.clone())]),
    ])
    .await;

    let config = ExtractorConfig::new(credentials())
        .with_endpoints(endpoints(&server))
        .with_bucket("reports")
        .with_poll(PollPolicy::new(3, Duration::ZERO));
    let buckets = Arc::new(MemoryBuckets::new());
    let extractor = ReportExtractor::with_stores(&config, buckets.clone()).unwrap();

    let summary = extractor.run(&request()).await.unwrap();

    assert_eq!(summary.report_id, ReportId::new("ID323"));
    assert_eq!(summary.document_id.as_str(), "DOC-1");
    assert_eq!(summary.raw_bytes, document.len());
    assert_eq!(summary.parsed_key.as_deref(), Some("parsed-reports/ID323.json"));
    assert_eq!(server.count("GET", REPORT_PATH), 2);

    let seen = server.seen();

    let token_call = seen.iter().find(|r| r.path == TOKEN_PATH).unwrap();
    assert!(token_call.body.contains("grant_type=refresh_token"));
    assert!(token_call.body.contains("client_id=amzn1.application-oa2-client.test"));

    let create_call = seen.iter().find(|r| r.path == CREATE_PATH).unwrap();
    assert_eq!(
        create_call.headers.get("x-amz-access-token").map(String::as_str),
        Some("Atza|stub")
    );
    let body: serde_json::Value = serde_json::from_str(&create_call.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "marketplaceIds": ["ATVPDKIKX0DER"],
            "reportType": "GET_SALES_AND_TRAFFIC_REPORT",
            "dataStartTime": "2024-12-01T00:00:00Z",
            "dataEndTime": "2024-12-31T23:59:59Z"
        })
    );

    let download_call = seen.iter().find(|r| r.path == DOWNLOAD_PATH).unwrap();
    assert!(!download_call.headers.contains_key("x-amz-access-token"));
}

#[tokio::test]
async fn rejected_token_is_auth_error_with_status() {
    let server = StubServer::start(vec![(
        format!("POST {TOKEN_PATH}"),
        vec![StubResponse::json(400, r#"{"error":"invalid_grant"}"#)],
    )])
    .await;
    let client = SpReportsClient::connect(endpoints(&server), 0).unwrap();

    let err = client.access_token(&credentials()).await.unwrap_err();

    match err {
        FetcherError::Auth(RequestFailure::Status { status, body, .. }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected auth status error, got {other:?}"),
    }
    assert_eq!(server.count("POST", TOKEN_PATH), 1);
}

#[tokio::test]
async fn submission_without_report_id_fails() {
    let server = StubServer::start(vec![
        (format!("POST {TOKEN_PATH}"), vec![token_ok()]),
        (format!("POST {CREATE_PATH}"), vec![StubResponse::json(202, "{}")]),
    ])
    .await;
    let config = ExtractorConfig::new(credentials()).with_endpoints(endpoints(&server));
    let extractor = ReportExtractor::with_stores(&config, Arc::new(MemoryBuckets::new())).unwrap();

    let err = extractor.run(&request()).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Submission);
}

#[tokio::test]
async fn server_errors_not_retried_by_default() {
    let server = StubServer::start(vec![
        (format!("POST {TOKEN_PATH}"), vec![token_ok()]),
        (
            format!("POST {CREATE_PATH}"),
            vec![StubResponse::json(503, r#"{"errors":[{"code":"ServiceUnavailable"}]}"#)],
        ),
    ])
    .await;
    let config = ExtractorConfig::new(credentials()).with_endpoints(endpoints(&server));
    let extractor = ReportExtractor::with_stores(&config, Arc::new(MemoryBuckets::new())).unwrap();

    let err = extractor.run(&request()).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Submission);
    assert_eq!(server.count("POST", CREATE_PATH), 1);
}

#[tokio::test]
async fn transport_retry_recovers_from_server_error() {
    let server = StubServer::start(vec![
        (format!("POST {TOKEN_PATH}"), vec![token_ok()]),
        (
            format!("POST {CREATE_PATH}"),
            vec![
                StubResponse::json(503, r#"{"errors":[]}"#),
                StubResponse::json(202, r#"{"reportId":"ID323"}"#),
            ],
        ),
    ])
    .await;
    let client = SpReportsClient::connect(endpoints(&server), 1).unwrap();

    let token = client.access_token(&credentials()).await.unwrap();
    let report_id = client.create_report(&token, &request()).await.unwrap();

    assert_eq!(report_id, ReportId::new("ID323"));
    assert_eq!(server.count("POST", CREATE_PATH), 2);
}

#[tokio::test]
async fn client_errors_never_retried() {
    let server = StubServer::start(vec![
        (format!("POST {TOKEN_PATH}"), vec![token_ok()]),
        (
            format!("POST {CREATE_PATH}"),
            vec![StubResponse::json(400, r#"{"errors":[{"code":"InvalidInput"}]}"#)],
        ),
    ])
    .await;
    let client = SpReportsClient::connect(endpoints(&server), 3).unwrap();

    let token = client.access_token(&credentials()).await.unwrap();
    let err = client.create_report(&token, &request()).await.unwrap_err();

    assert!(matches!(
        err,
        FetcherError::Submission(RequestFailure::Status { status: 400, .. })
    ));
    assert_eq!(server.count("POST", CREATE_PATH), 1);
}

#[tokio::test]
async fn failed_status_query_aborts_polling() {
    let server = StubServer::start(vec![
        (format!("POST {TOKEN_PATH}"), vec![token_ok()]),
        (
            format!("POST {CREATE_PATH}"),
            vec![StubResponse::json(202, r#"{"reportId":"ID323"}"#)],
        ),
        (
            format!("GET {REPORT_PATH}"),
            vec![StubResponse::json(500, r#"{"errors":[]}"#)],
        ),
    ])
    .await;
    let config = ExtractorConfig::new(credentials())
        .with_endpoints(endpoints(&server))
        .with_poll(PollPolicy::new(5, Duration::ZERO));
    let extractor = ReportExtractor::with_stores(&config, Arc::new(MemoryBuckets::new())).unwrap();

    let err = extractor.run(&request()).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Fetch);
    assert_eq!(server.count("GET", REPORT_PATH), 1);
}
