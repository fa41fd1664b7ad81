//! Shared test doubles: a scripted reports API, a recording sleeper and a
//! minimal HTTP stub server.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use report_extractor::config::Credentials;
use report_extractor::fetcher::{
    AccessToken, FetcherError, FetcherResult, ReportsApi, RequestFailure,
};
use report_extractor::poller::Sleeper;
use report_extractor::{
    Compression, ProcessingStatus, ReportDocument, ReportDocumentId, ReportId, ReportRequest,
    ReportStatusSnapshot,
};

pub const REPORT_ID: &str = "50038019673";
pub const DOCUMENT_ID: &str = "amzn1.tortuga.4.na.doc-1";

pub fn credentials() -> Credentials {
    Credentials::new("amzn1.application-oa2-client.test", "secret", "Atzr|refresh")
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn in_progress() -> ReportStatusSnapshot {
    ReportStatusSnapshot::with_status(ProcessingStatus::InProgress)
}

/// In-process [`ReportsApi`] that replays a status script
pub struct ScriptedApi {
    statuses: Mutex<VecDeque<ReportStatusSnapshot>>,
    compression: Option<Compression>,
    body: Bytes,
    token_error: Option<FetcherError>,
    download_error: Option<FetcherError>,
    requests: Mutex<Vec<ReportRequest>>,
    token_calls: AtomicU32,
    create_calls: AtomicU32,
    status_calls: AtomicU32,
    document_calls: AtomicU32,
    download_calls: AtomicU32,
}

impl ScriptedApi {
    /// Statuses are returned in order; once exhausted every query sees IN_PROGRESS
    pub fn new(statuses: Vec<ReportStatusSnapshot>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            compression: None,
            body: Bytes::new(),
            token_error: None,
            download_error: None,
            requests: Mutex::new(Vec::new()),
            token_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            document_calls: AtomicU32::new(0),
            download_calls: AtomicU32::new(0),
        }
    }

    /// Script that finishes on the first query with the given document
    pub fn ready(compression: Option<Compression>, body: impl Into<Bytes>) -> Self {
        Self::new(vec![ReportStatusSnapshot::done(DOCUMENT_ID)]).with_document(compression, body)
    }

    pub fn with_document(mut self, compression: Option<Compression>, body: impl Into<Bytes>) -> Self {
        self.compression = compression;
        self.body = body.into();
        self
    }

    pub fn with_token_error(mut self, status: u16) -> Self {
        self.token_error = Some(FetcherError::Auth(RequestFailure::Status {
            endpoint: "tokenExchange".to_string(),
            status,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        }));
        self
    }

    pub fn with_download_error(mut self, status: u16) -> Self {
        self.download_error = Some(FetcherError::Fetch(RequestFailure::Status {
            endpoint: "downloadDocument".to_string(),
            status,
            body: "AccessDenied".to_string(),
        }));
        self
    }

    pub fn token_calls(&self) -> u32 {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn document_calls(&self) -> u32 {
        self.document_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ReportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportsApi for ScriptedApi {
    async fn access_token(&self, _credentials: &Credentials) -> FetcherResult<AccessToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        match &self.token_error {
            Some(e) => Err(e.clone()),
            None => Ok(AccessToken::new("Atza|scripted")),
        }
    }

    async fn create_report(
        &self,
        _token: &AccessToken,
        request: &ReportRequest,
    ) -> FetcherResult<ReportId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok(ReportId::new(REPORT_ID))
    }

    async fn get_report(
        &self,
        _token: &AccessToken,
        _report_id: &ReportId,
    ) -> FetcherResult<ReportStatusSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(in_progress))
    }

    async fn get_document(
        &self,
        _token: &AccessToken,
        _document_id: &ReportDocumentId,
    ) -> FetcherResult<ReportDocument> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReportDocument {
            url: "https://tortuga-prod-na.s3.amazonaws.com/doc?X-Amz-Signature=abc".to_string(),
            compression_algorithm: self.compression.clone(),
        })
    }

    async fn download(&self, _document: &ReportDocument) -> FetcherResult<Bytes> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        match &self.download_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.body.clone()),
        }
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Canned HTTP response
#[derive(Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }
}

/// Request observed by the stub
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Single-threaded HTTP/1.1 stub keyed by `"METHOD /path"`
///
/// Each route holds a queue of responses; the last one repeats. Unknown
/// routes answer 404.
pub struct StubServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl StubServer {
    pub async fn start(routes: Vec<(String, Vec<StubResponse>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        // "{base}" in a body expands to the server's own URL
        let routes: HashMap<String, VecDeque<StubResponse>> = routes
            .into_iter()
            .map(|(route, responses)| {
                let responses = responses
                    .into_iter()
                    .map(|r| expand_base(r, &base_url))
                    .collect();
                (route, responses)
            })
            .collect();
        let routes = Arc::new(Mutex::new(routes));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_task = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let Some(request) = read_request(&mut socket).await else {
                    continue;
                };

                let route = format!("{} {}", request.method, request.path);
                let response = {
                    let mut routes = routes.lock().unwrap();
                    match routes.get_mut(&route) {
                        Some(queue) if queue.len() > 1 => queue.pop_front(),
                        Some(queue) => queue.front().cloned(),
                        None => None,
                    }
                }
                .unwrap_or_else(|| StubResponse::json(404, r#"{"errors":[]}"#));

                seen_task.lock().unwrap().push(request);

                let head = format!(
                    "HTTP/1.1 {} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&response.body).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { base_url, seen }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.seen()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

fn expand_base(response: StubResponse, base_url: &str) -> StubResponse {
    match String::from_utf8(response.body.clone()) {
        Ok(text) if text.contains("{base}") => StubResponse {
            status: response.status,
            body: text.replace("{base}", base_url).into_bytes(),
        },
        _ => response,
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (header_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    Some(SeenRequest {
        method,
        path,
        headers,
        body,
    })
}
