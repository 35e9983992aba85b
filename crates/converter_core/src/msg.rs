use std::path::PathBuf;

use crate::{BatchId, EntryId, JobId, JobOutcome, JobTicket, OutputFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User picked files to convert.
    FilesSelected(Vec<PathBuf>),
    /// User changed the output format selector.
    FormatSelected(OutputFormat),
    /// User submitted every queued file.
    SubmitClicked,
    /// Transfer progress for an in-flight upload, applied to the whole batch.
    UploadProgress { batch: BatchId, percent: u8 },
    /// Server acknowledged the upload; tickets are in submission order.
    UploadSucceeded { batch: BatchId, jobs: Vec<JobTicket> },
    /// Upload request failed or was rejected.
    UploadFailed { batch: BatchId, message: String },
    /// Status report from either the polling or the push source.
    JobUpdate { job_id: JobId, outcome: JobOutcome },
    /// Session id loaded from local storage at startup.
    SessionRestored(String),
    /// Session id issued by the server over the push channel.
    SessionAssigned(String),
    /// Push channel opened or closed.
    PushConnectionChanged { connected: bool },
    /// User removed an entry from the list.
    RemoveClicked(EntryId),
    /// User asked to save a converted file.
    DownloadClicked(EntryId),
    /// Artifact fetch finished; `Err` holds the detailed reason.
    DownloadFinished {
        entry: EntryId,
        result: Result<PathBuf, String>,
    },
    /// User dismissed the batch error banner.
    BannerDismissed,
    /// Render tick.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
