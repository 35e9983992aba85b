use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc,
};
use std::time::Duration;

use bytes::Bytes;
use engine_logging::{engine_debug, engine_warn};
use futures_util::{stream, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{BatchId, ClientError, EngineEvent, JobSummary, JobTicket, RemoteStatus, UploadFile};

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Origin of the conversion service, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub connect_timeout: Option<Duration>,
    /// Deadline for a whole request. `None` lets a hung request wait forever.
    pub request_timeout: Option<Duration>,
    pub poll_interval: Duration,
    /// `None` polls until the job settles.
    pub max_poll_attempts: Option<u32>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Some(Duration::from_secs(10)),
            request_timeout: None,
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: None,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Request/response surface of the conversion service.
#[async_trait::async_trait]
pub trait ConversionApi: Send + Sync {
    /// Sends every file in one multipart request. Job tickets come back in
    /// the order the files were sent.
    async fn upload(
        &self,
        batch: BatchId,
        files: &[UploadFile],
        output_format: &str,
        session_id: Option<&str>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Vec<JobTicket>, ClientError>;

    async fn job_status(&self, job_id: &str) -> Result<RemoteStatus, ClientError>;

    async fn fetch_artifact(&self, location: &str) -> Result<Bytes, ClientError>;

    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    jobs: Vec<JobTicket>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    settings: ClientSettings,
    client: reqwest::Client,
}

impl ReqwestApi {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        Url::parse(&settings.base_url).map_err(|err| {
            ClientError::Transport(format!("invalid server url {}: {err}", settings.base_url))
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        Ok(Self { settings, client })
    }

    /// Resolves a server-relative path against the configured origin.
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|err| ClientError::InvalidResponse(err.to_string()));
        }
        let base = self.settings.base_url.trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined)
            .map_err(|err| ClientError::Transport(format!("invalid url {joined}: {err}")))
    }
}

#[async_trait::async_trait]
impl ConversionApi for ReqwestApi {
    async fn upload(
        &self,
        batch: BatchId,
        files: &[UploadFile],
        output_format: &str,
        session_id: Option<&str>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Vec<JobTicket>, ClientError> {
        let url = self.endpoint("/api/upload/")?;

        let mut payloads = Vec::with_capacity(files.len());
        for file in files {
            let content = tokio::fs::read(&file.path)
                .await
                .map_err(|err| ClientError::LocalFile {
                    path: file.path.clone(),
                    message: err.to_string(),
                })?;
            payloads.push((file.file_name.clone(), Bytes::from(content)));
        }

        let total = payloads.iter().map(|(_, content)| content.len() as u64).sum();
        let tracker = Arc::new(UploadTracker::new(batch, total, sink));

        let mut form = Form::new();
        for (file_name, content) in payloads {
            let len = content.len() as u64;
            let body = Body::wrap_stream(counted_chunks(content, tracker.clone()));
            let part = Part::stream_with_length(body, len)
                .file_name(file_name)
                .mime_str("application/octet-stream")
                .map_err(map_reqwest_error)?;
            form = form.part("files", part);
        }
        form = form.text("output_format", output_format.to_string());
        if let Some(session_id) = session_id {
            form = form.text("session_id", session_id.to_string());
        }

        engine_debug!(
            "Uploading batch {} ({} files, {} bytes) as {}",
            batch,
            files.len(),
            total,
            output_format
        );
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }

        let parsed: UploadResponse = serde_json::from_slice(&body)
            .map_err(|err| ClientError::InvalidResponse(err.to_string()))?;
        if !parsed.success {
            let message = parsed
                .detail
                .as_ref()
                .and_then(detail_message)
                .or(parsed.message)
                .unwrap_or_else(|| "Upload was not accepted by the server".to_string());
            return Err(ClientError::ServerRejection {
                status: Some(status.as_u16()),
                message,
            });
        }
        if parsed.jobs.len() != files.len() {
            return Err(ClientError::InvalidResponse(format!(
                "server returned {} jobs for {} files",
                parsed.jobs.len(),
                files.len()
            )));
        }
        for (sent, ticket) in files.iter().zip(&parsed.jobs) {
            if sent.file_name != ticket.filename {
                engine_warn!(
                    "Batch {}: job {} names {:?} at the position of {:?}",
                    batch,
                    ticket.job_id,
                    ticket.filename,
                    sent.file_name
                );
            }
        }
        Ok(parsed.jobs)
    }

    async fn job_status(&self, job_id: &str) -> Result<RemoteStatus, ClientError> {
        let mut url = self.endpoint("/api/status")?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Transport(format!("cannot address job {job_id}")))?
            .pop_if_empty()
            .push(job_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }

        let parsed: StatusResponse = serde_json::from_slice(&body)
            .map_err(|err| ClientError::InvalidResponse(err.to_string()))?;
        Ok(RemoteStatus::from_poll(
            &parsed.status,
            parsed.output_path,
            parsed.error,
        ))
    }

    async fn fetch_artifact(&self, location: &str) -> Result<Bytes, ClientError> {
        let url = self
            .endpoint(location)
            .map_err(|err| ClientError::ArtifactUnavailable(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ClientError::ArtifactUnavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::ArtifactUnavailable(format!(
                "{location}: {status}"
            )));
        }
        let content = response
            .bytes()
            .await
            .map_err(|err| ClientError::ArtifactUnavailable(err.to_string()))?;
        if content.is_empty() {
            return Err(ClientError::ArtifactUnavailable(format!(
                "{location}: empty response"
            )));
        }
        Ok(content)
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ClientError> {
        let url = self.endpoint("/api/jobs")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        serde_json::from_slice(&body).map_err(|err| ClientError::InvalidResponse(err.to_string()))
    }
}

/// Reports batch-wide upload progress as body chunks are handed to the transport.
struct UploadTracker {
    batch: BatchId,
    total: u64,
    sent: AtomicU64,
    last_percent: AtomicU8,
    sink: Arc<dyn EventSink>,
}

impl UploadTracker {
    fn new(batch: BatchId, total: u64, sink: Arc<dyn EventSink>) -> Self {
        Self {
            batch,
            total,
            sent: AtomicU64::new(0),
            last_percent: AtomicU8::new(0),
            sink,
        }
    }

    fn advance(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let percent = upload_percent(sent, self.total);
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            self.sink.emit(EngineEvent::UploadProgress {
                batch: self.batch,
                percent,
            });
        }
    }
}

/// Rounded percentage of `sent` over `total`; an unknown total reports 0.
pub(crate) fn upload_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (sent.min(total) as f64 * 100.0 / total as f64).round();
    percent as u8
}

fn counted_chunks(
    content: Bytes,
    tracker: Arc<UploadTracker>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let len = content.len();
    let chunks: Vec<Bytes> = (0..len)
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| content.slice(start..(start + UPLOAD_CHUNK_BYTES).min(len)))
        .collect();
    stream::iter(chunks).map(move |chunk| {
        tracker.advance(chunk.len() as u64);
        Ok(chunk)
    })
}

/// Builds the user-facing rejection: `detail`, then `message`, then the status line.
fn rejection(status: StatusCode, body: &[u8]) -> ClientError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let structured = parsed.as_ref().and_then(|value| {
        value
            .get("detail")
            .and_then(detail_message)
            .or_else(|| {
                value
                    .get("message")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
            })
    });
    let message = structured
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
    ClientError::ServerRejection {
        status: Some(status.as_u16()),
        message,
    }
}

/// FastAPI puts either a string or a list of validation errors in `detail`.
fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        _ => None,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::Transport(format!("request timed out: {err}"));
    }
    ClientError::Transport(err.to_string())
}
