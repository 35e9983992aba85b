use std::path::PathBuf;

use converter_core::{Effect, JobId, JobOutcome, JobTicket, Msg};
use converter_engine::{
    EngineEvent, EngineHandle, RemoteStatus, SessionError, SessionStore, UploadFile,
};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

/// Executes effects against the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    sessions: Box<dyn SessionStore>,
    output_dir: PathBuf,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, sessions: Box<dyn SessionStore>, output_dir: PathBuf) -> Self {
        Self {
            engine,
            sessions,
            output_dir,
        }
    }

    pub fn restore_session(&self) -> Result<Option<String>, SessionError> {
        self.sessions.load()
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::UploadBatch {
                    batch,
                    files,
                    format,
                    session_id,
                } => {
                    engine_info!(
                        "UploadBatch batch={} files={} format={} session={:?}",
                        batch,
                        files.len(),
                        format,
                        session_id
                    );
                    let files = files
                        .into_iter()
                        .map(|item| UploadFile {
                            path: item.path,
                            file_name: item.file_name,
                        })
                        .collect();
                    self.engine.upload(batch, files, format.as_str(), session_id);
                }
                Effect::TrackJob { job_id } => {
                    engine_debug!("TrackJob job_id={}", job_id);
                    self.engine.track(job_id.as_str());
                }
                Effect::DownloadArtifact {
                    entry,
                    location,
                    file_name,
                } => {
                    engine_info!("DownloadArtifact entry={} location={}", entry, location);
                    self.engine
                        .download(entry, location, self.output_dir.clone(), file_name);
                }
                Effect::PersistSession { session_id } => {
                    if let Err(err) = self.sessions.persist(&session_id) {
                        engine_error!("Failed to persist session {}: {}", session_id, err);
                    }
                }
            }
        }
    }

    /// Waits for the next engine event. `None` once the engine is gone.
    pub async fn next_msg(&mut self) -> Option<Msg> {
        self.engine.recv().await.map(map_event)
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::UploadProgress { batch, percent } => Msg::UploadProgress { batch, percent },
        EngineEvent::UploadFinished { batch, result } => match result {
            Ok(tickets) => Msg::UploadSucceeded {
                batch,
                jobs: tickets
                    .into_iter()
                    .map(|ticket| JobTicket {
                        job_id: JobId::new(ticket.job_id),
                        filename: ticket.filename,
                    })
                    .collect(),
            },
            Err(err) => {
                engine_warn!("Upload of batch {} failed: {}", batch, err);
                Msg::UploadFailed {
                    batch,
                    message: err.user_message(),
                }
            }
        },
        EngineEvent::JobStatus { job_id, status } => Msg::JobUpdate {
            job_id: JobId::new(job_id),
            outcome: map_status(status),
        },
        EngineEvent::SessionAssigned { session_id } => Msg::SessionAssigned(session_id),
        EngineEvent::PushConnection { connected } => Msg::PushConnectionChanged { connected },
        EngineEvent::DownloadFinished { entry, result } => Msg::DownloadFinished {
            entry,
            result: result.map_err(|err| {
                engine_warn!("Download for entry {} failed: {}", entry, err);
                err.to_string()
            }),
        },
    }
}

fn map_status(status: RemoteStatus) -> JobOutcome {
    match status {
        RemoteStatus::Running { status } => JobOutcome::Running {
            remote_status: status,
        },
        RemoteStatus::Completed { output_path } => JobOutcome::Completed { output_path },
        RemoteStatus::Failed { error } => JobOutcome::Failed { error },
    }
}
