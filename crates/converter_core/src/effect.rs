use std::path::PathBuf;

use crate::{BatchId, EntryId, JobId, OutputFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    UploadBatch {
        batch: BatchId,
        files: Vec<UploadItem>,
        format: OutputFormat,
        session_id: Option<String>,
    },
    /// Start following a job on the active status source.
    TrackJob { job_id: JobId },
    DownloadArtifact {
        entry: EntryId,
        location: String,
        file_name: String,
    },
    PersistSession { session_id: String },
}

/// One file part of an upload, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub entry: EntryId,
    pub path: PathBuf,
    pub file_name: String,
}
