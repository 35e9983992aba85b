use std::path::PathBuf;

use serde::Deserialize;

pub type BatchId = u64;
pub type EntryId = u64;

/// Fixed message for a job whose status could not be fetched.
pub const POLL_FAILURE_MESSAGE: &str = "Failed to check conversion status";
/// Used when the server reports failure without a reason.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Conversion failed";
/// Used when the server reports completion without an artifact location.
pub const MISSING_OUTPUT_MESSAGE: &str = "Conversion finished without an output file";
/// Last-resort message when nothing more specific is known.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    UploadProgress {
        batch: BatchId,
        percent: u8,
    },
    UploadFinished {
        batch: BatchId,
        result: Result<Vec<JobTicket>, ClientError>,
    },
    JobStatus {
        job_id: String,
        status: RemoteStatus,
    },
    SessionAssigned {
        session_id: String,
    },
    PushConnection {
        connected: bool,
    },
    DownloadFinished {
        entry: EntryId,
        result: Result<PathBuf, ClientError>,
    },
}

/// A job status report normalized from either channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Any non-terminal discriminant, passed through unchanged.
    Running { status: String },
    Completed { output_path: String },
    Failed { error: String },
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteStatus::Running { .. })
    }

    /// Normalizes a `GET /api/status/{id}` body.
    pub(crate) fn from_poll(
        status: &str,
        output_path: Option<String>,
        error: Option<String>,
    ) -> Self {
        match status {
            "completed" => Self::completed(output_path),
            "failed" => Self::failed(error),
            other => RemoteStatus::Running {
                status: other.to_string(),
            },
        }
    }

    /// Normalizes a push-channel job frame. `error` is the push spelling of failure.
    pub(crate) fn from_push(
        status: Option<&str>,
        output_path: Option<String>,
        error: Option<String>,
    ) -> Self {
        match status {
            Some("completed") => Self::completed(output_path),
            Some("error") | Some("failed") => Self::failed(error),
            Some(other) => RemoteStatus::Running {
                status: other.to_string(),
            },
            None => RemoteStatus::Running {
                status: "unknown".to_string(),
            },
        }
    }

    fn completed(output_path: Option<String>) -> Self {
        match output_path.filter(|path| !path.is_empty()) {
            Some(output_path) => RemoteStatus::Completed { output_path },
            None => RemoteStatus::Failed {
                error: MISSING_OUTPUT_MESSAGE.to_string(),
            },
        }
    }

    fn failed(error: Option<String>) -> Self {
        RemoteStatus::Failed {
            error: error
                .filter(|msg| !msg.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        }
    }
}

/// One entry of the upload acknowledgment, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobTicket {
    pub job_id: String,
    pub filename: String,
}

/// Row of `GET /api/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A local file to send as one `files` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    ServerRejection { status: Option<u16>, message: String },
    #[error("invalid server response: {0}")]
    InvalidResponse(String),
    #[error("converted file unavailable: {0}")]
    ArtifactUnavailable(String),
    #[error("cannot read {}: {message}", .path.display())]
    LocalFile { path: PathBuf, message: String },
    #[error("cannot save converted file: {0}")]
    Persist(String),
}

impl ClientError {
    /// Message suitable for the batch banner.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}
