//! Converter engine: network I/O against the conversion service.
mod api;
mod artifact;
mod engine;
mod filename;
mod persist;
mod poll;
mod push;
mod session;
mod source;
mod types;

pub use api::{ChannelSink, ClientSettings, ConversionApi, EventSink, ReqwestApi};
pub use artifact::download_artifact;
pub use engine::{EngineConfig, EngineHandle};
pub use filename::sanitize_file_name;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poll::{poll_job, PollEnd, PollSchedule, PollingSource, POLL_GAVE_UP_MESSAGE};
pub use push::{parse_frame, push_url, run_push_channel, PushMessage, PushSource};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionError, SessionStore, SESSION_FILENAME,
};
pub use source::{StatusSource, SyncStrategy};
pub use types::{
    BatchId, ClientError, EngineEvent, EntryId, JobSummary, JobTicket, RemoteStatus, UploadFile,
    DEFAULT_FAILURE_MESSAGE, GENERIC_ERROR_MESSAGE, MISSING_OUTPUT_MESSAGE, POLL_FAILURE_MESSAGE,
};
