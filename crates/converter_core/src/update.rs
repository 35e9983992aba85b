use engine_logging::engine_debug;

use crate::format::converted_file_name;
use crate::{AppState, ApplyResult, AssignError, Effect, JobStatus, Msg, UploadItem};

/// Shown when an artifact fetch fails; the entry keeps its status.
pub const DOWNLOAD_FAILED_MESSAGE: &str = "Failed to download converted file";
/// Shown when a download is requested for an entry without an artifact.
pub const ARTIFACT_NOT_READY_MESSAGE: &str = "Converted file is not available yet";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesSelected(paths) => {
            if !paths.is_empty() {
                state.registry_mut().enqueue(paths);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::FormatSelected(format) => {
            state.set_output_format(format);
            Vec::new()
        }
        Msg::SubmitClicked => {
            state.set_banner(None);
            let Some((batch, members)) = state.registry_mut().begin_upload() else {
                return (state, Vec::new());
            };
            state.mark_dirty();
            let files = members
                .iter()
                .filter_map(|id| state.registry().get(*id))
                .map(|entry| UploadItem {
                    entry: entry.id,
                    path: entry.source.clone(),
                    file_name: entry.display_name.clone(),
                })
                .collect();
            vec![Effect::UploadBatch {
                batch,
                files,
                format: state.output_format(),
                session_id: state.session_id().map(ToOwned::to_owned),
            }]
        }
        Msg::UploadProgress { batch, percent } => {
            if state.registry_mut().set_batch_progress(batch, percent) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::UploadSucceeded { batch, jobs } => {
            match state.registry_mut().assign_job_ids(batch, &jobs) {
                Ok(assigned) => {
                    state.mark_dirty();
                    assigned
                        .into_iter()
                        .map(|(_, job_id)| Effect::TrackJob { job_id })
                        .collect()
                }
                Err(AssignError::UnknownBatch(_)) => Vec::new(),
                Err(err) => {
                    fail_batch(&mut state, batch, &err.to_string());
                    Vec::new()
                }
            }
        }
        Msg::UploadFailed { batch, message } => {
            fail_batch(&mut state, batch, &message);
            Vec::new()
        }
        Msg::JobUpdate { job_id, outcome } => {
            match state.registry_mut().apply_update(&job_id, &outcome) {
                ApplyResult::Applied => state.mark_dirty(),
                ApplyResult::Unchanged => {}
                ApplyResult::AlreadyTerminal => {
                    engine_debug!("Ignoring update for settled job {}", job_id);
                }
                ApplyResult::UnknownJob => {
                    engine_debug!("Ignoring update for unknown job {}", job_id);
                }
            }
            Vec::new()
        }
        Msg::SessionRestored(session_id) => {
            state.set_session_id(session_id);
            Vec::new()
        }
        Msg::SessionAssigned(session_id) => {
            if state.set_session_id(session_id.clone()) {
                vec![Effect::PersistSession { session_id }]
            } else {
                Vec::new()
            }
        }
        Msg::PushConnectionChanged { connected } => {
            state.set_push_connected(connected);
            Vec::new()
        }
        Msg::RemoveClicked(entry) => {
            if state.registry_mut().remove(entry).is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::DownloadClicked(entry) => {
            let ready = state.registry().get(entry).and_then(|tracked| {
                match (&tracked.status, &tracked.converted_location) {
                    (JobStatus::Completed, Some(location)) => {
                        Some((location.clone(), tracked.display_name.clone()))
                    }
                    _ => None,
                }
            });
            match ready {
                Some((location, display_name)) => {
                    if state.start_download(entry) {
                        state.set_notice(None);
                        vec![Effect::DownloadArtifact {
                            entry,
                            location,
                            file_name: converted_file_name(&display_name, state.output_format()),
                        }]
                    } else {
                        Vec::new()
                    }
                }
                None => {
                    state.set_notice(Some(ARTIFACT_NOT_READY_MESSAGE.to_string()));
                    Vec::new()
                }
            }
        }
        Msg::DownloadFinished { entry, result } => {
            state.finish_download(entry);
            match result {
                Ok(path) => state.set_notice(Some(format!("Saved {}", path.display()))),
                Err(_) => state.set_notice(Some(DOWNLOAD_FAILED_MESSAGE.to_string())),
            }
            state.mark_dirty();
            Vec::new()
        }
        Msg::BannerDismissed => {
            state.set_banner(None);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn fail_batch(state: &mut AppState, batch: crate::BatchId, message: &str) {
    if state.registry().batch_members(batch).is_none() {
        return;
    }
    state.registry_mut().fail_batch(batch, message);
    state.set_banner(Some(message.to_string()));
    state.mark_dirty();
}
