use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::EventSink;

/// How job status reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncStrategy {
    /// One request per job every poll interval.
    #[default]
    Poll,
    /// One shared event stream for every job of the session.
    Push,
}

/// A channel that reports job status as [`crate::EngineEvent::JobStatus`].
///
/// Both strategies feed the same sink, so the registry applies their
/// reports through one code path.
pub trait StatusSource: Send + Sync {
    /// Opens any session-wide channel. Must be called inside a Tokio runtime.
    fn start(&self, _sink: Arc<dyn EventSink>) {}

    /// Follows one job until it settles.
    fn track(&self, job_id: &str, sink: Arc<dyn EventSink>);

    /// Stops every background task this source owns.
    fn close(&self);
}
