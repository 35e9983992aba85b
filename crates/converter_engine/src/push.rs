//! Shared push channel: one WebSocket per session carrying status for every job.
//!
//! Frames are JSON text of the shape
//! `{"type": "...", "job_id"?, "status"?, "output_path"?, "error"?, "session_id"?}`.
//! A `type == "session_id"` frame assigns the session; any frame with a
//! `job_id` is a job status report.

use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::EventSink;
use crate::source::StatusSource;
use crate::{ClientError, EngineEvent, RemoteStatus};

const SESSION_FRAME_TYPE: &str = "session_id";

#[derive(Debug, Clone, Deserialize)]
struct PushFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    Session(String),
    Job { job_id: String, status: RemoteStatus },
}

/// Parses one text frame. `Ok(None)` means a well-formed frame with nothing to apply.
pub fn parse_frame(text: &str) -> Result<Option<PushMessage>, serde_json::Error> {
    let frame: PushFrame = serde_json::from_str(text)?;
    if frame.kind == SESSION_FRAME_TYPE {
        return Ok(frame
            .session_id
            .filter(|id| !id.is_empty())
            .map(PushMessage::Session));
    }
    let Some(job_id) = frame.job_id else {
        return Ok(None);
    };
    Ok(Some(PushMessage::Job {
        job_id,
        status: RemoteStatus::from_push(frame.status.as_deref(), frame.output_path, frame.error),
    }))
}

/// `http(s)://host[/prefix]` becomes `ws(s)://host[/prefix]/ws`.
pub fn push_url(base_url: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(base_url)
        .map_err(|err| ClientError::Transport(format!("invalid server url {base_url}: {err}")))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::Transport(format!(
                "unsupported scheme {other} for push channel"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Transport(format!("cannot derive push url from {base_url}")))?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

pub struct PushSource {
    url: Url,
    cancel: CancellationToken,
}

impl PushSource {
    pub fn new(url: Url, cancel: CancellationToken) -> Self {
        Self { url, cancel }
    }
}

impl StatusSource for PushSource {
    fn start(&self, sink: Arc<dyn EventSink>) {
        let url = self.url.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = run_push_channel(url, sink, cancel).await {
                engine_error!("Push channel unavailable: {}", err);
            }
        });
    }

    fn track(&self, job_id: &str, _sink: Arc<dyn EventSink>) {
        engine_trace!("Job {} reports over the shared push channel", job_id);
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

/// Runs the push channel until the server closes it or `cancel` fires.
///
/// There is no reconnect; the connectivity flag goes false and stays false.
/// A failed connect also reports `connected: false` so the owner never waits
/// on a channel that will not open.
pub async fn run_push_channel(
    url: Url,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) -> Result<(), ClientError> {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        result = connect_async(url.as_str()) => result,
    };
    let (mut ws_stream, _response) = match connected {
        Ok(stream) => stream,
        Err(err) => {
            sink.emit(EngineEvent::PushConnection { connected: false });
            return Err(ClientError::Transport(format!(
                "failed to connect to {url}: {err}"
            )));
        }
    };

    engine_info!("Push channel connected to {}", url);
    sink.emit(EngineEvent::PushConnection { connected: true });

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => None,
            next = ws_stream.next() => Some(next),
        };
        let Some(next) = next else {
            engine_debug!("Closing push channel");
            let _ = ws_stream.close(None).await;
            break;
        };

        match next {
            Some(Ok(Message::Text(text))) => handle_text(&text, sink.as_ref()),
            Some(Ok(Message::Close(frame))) => {
                engine_info!("Push channel closed by server: {:?}", frame);
                break;
            }
            Some(Ok(Message::Binary(_))) => {
                engine_trace!("Ignoring binary push frame");
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                engine_warn!("Push channel receive error: {}", err);
                break;
            }
            None => break,
        }
    }

    sink.emit(EngineEvent::PushConnection { connected: false });
    Ok(())
}

fn handle_text(text: &str, sink: &dyn EventSink) {
    match parse_frame(text) {
        Ok(Some(PushMessage::Session(session_id))) => {
            engine_info!("Push channel assigned session {}", session_id);
            sink.emit(EngineEvent::SessionAssigned { session_id });
        }
        Ok(Some(PushMessage::Job { job_id, status })) => {
            sink.emit(EngineEvent::JobStatus { job_id, status });
        }
        Ok(None) => {
            engine_debug!("Push frame carries nothing to apply: {}", text);
        }
        Err(err) => {
            engine_warn!("Failed to parse push frame: {} raw={}", err, text);
        }
    }
}
