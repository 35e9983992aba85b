//! Converter core: job registry, pure state machine and view-model helpers.
mod effect;
mod format;
mod msg;
mod registry;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, UploadItem};
pub use format::{converted_file_name, OutputFormat, UnknownFormat};
pub use msg::Msg;
pub use registry::{
    ApplyResult, AssignError, BatchId, EntryId, JobId, JobOutcome, JobRegistry, JobStatus,
    JobTicket, TrackedEntry,
};
pub use state::AppState;
pub use update::{update, ARTIFACT_NOT_READY_MESSAGE, DOWNLOAD_FAILED_MESSAGE};
pub use view_model::{AppViewModel, EntryRowView};
