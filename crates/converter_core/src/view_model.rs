use crate::{EntryId, JobId, JobStatus, OutputFormat, TrackedEntry};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub output_format: OutputFormat,
    pub session_id: Option<String>,
    pub push_connected: bool,
    /// Batch-level error; dismissable.
    pub banner: Option<String>,
    /// Transient message such as a failed download.
    pub notice: Option<String>,
    /// Entries without a job id yet, including batches that failed to upload.
    pub to_upload: Vec<EntryRowView>,
    pub uploaded: Vec<EntryRowView>,
    pub completed: usize,
    pub failed: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRowView {
    pub entry: EntryId,
    pub name: String,
    pub status: JobStatus,
    pub progress: u8,
    pub job_id: Option<JobId>,
    pub remote_status: Option<String>,
    /// Inline per-entry error.
    pub error: Option<String>,
    pub downloadable: bool,
}

impl From<&TrackedEntry> for EntryRowView {
    fn from(entry: &TrackedEntry) -> Self {
        Self {
            entry: entry.id,
            name: entry.display_name.clone(),
            status: entry.status,
            progress: entry.progress,
            job_id: entry.job_id.clone(),
            remote_status: entry.remote_status.clone(),
            error: entry.error_detail.clone(),
            downloadable: entry.status == JobStatus::Completed
                && entry.converted_location.is_some(),
        }
    }
}
