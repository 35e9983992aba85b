use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::api::{ClientSettings, ConversionApi, EventSink};
use crate::source::StatusSource;
use crate::{EngineEvent, RemoteStatus, POLL_FAILURE_MESSAGE};

/// Reported when `max_poll_attempts` runs out before the job settles.
pub const POLL_GAVE_UP_MESSAGE: &str = "Gave up waiting for conversion status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl From<&ClientSettings> for PollSchedule {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            interval: settings.poll_interval,
            max_attempts: settings.max_poll_attempts,
        }
    }
}

/// Why a poll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEnd {
    Settled,
    TransportFailure,
    GaveUp,
    Cancelled,
}

pub struct PollingSource {
    api: Arc<dyn ConversionApi>,
    schedule: PollSchedule,
    cancel: CancellationToken,
    /// Job ids with a running poll loop; an id leaves the set when its loop ends.
    tracked: Arc<Mutex<HashSet<String>>>,
}

impl PollingSource {
    pub fn new(
        api: Arc<dyn ConversionApi>,
        schedule: PollSchedule,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            schedule,
            cancel,
            tracked: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl StatusSource for PollingSource {
    fn track(&self, job_id: &str, sink: Arc<dyn EventSink>) {
        let newly_tracked = match self.tracked.lock() {
            Ok(mut tracked) => tracked.insert(job_id.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(job_id.to_string()),
        };
        if !newly_tracked {
            engine_debug!("Job {} is already being polled", job_id);
            return;
        }

        let api = self.api.clone();
        let job_id = job_id.to_string();
        let schedule = self.schedule;
        let cancel = self.cancel.child_token();
        let tracked = self.tracked.clone();
        tokio::spawn(async move {
            let end = poll_job(api, job_id.clone(), schedule, sink, cancel).await;
            engine_debug!("Stopped polling job {}: {:?}", job_id, end);
            match tracked.lock() {
                Ok(mut tracked) => tracked.remove(&job_id),
                Err(poisoned) => poisoned.into_inner().remove(&job_id),
            };
        });
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

/// Polls one job until it reaches a terminal status.
///
/// Every report is forwarded to the sink. A transport failure ends the loop
/// with a terminal failure rather than retrying.
pub async fn poll_job(
    api: Arc<dyn ConversionApi>,
    job_id: String,
    schedule: PollSchedule,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) -> PollEnd {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => return PollEnd::Cancelled,
            result = api.job_status(&job_id) => result,
        };

        match result {
            Ok(status) => {
                let settled = status.is_terminal();
                sink.emit(EngineEvent::JobStatus {
                    job_id: job_id.clone(),
                    status,
                });
                if settled {
                    engine_info!("Job {} settled after {} polls", job_id, attempts);
                    return PollEnd::Settled;
                }
            }
            Err(err) => {
                engine_warn!("Status check for job {} failed: {}", job_id, err);
                sink.emit(EngineEvent::JobStatus {
                    job_id,
                    status: RemoteStatus::Failed {
                        error: POLL_FAILURE_MESSAGE.to_string(),
                    },
                });
                return PollEnd::TransportFailure;
            }
        }

        if schedule.max_attempts.is_some_and(|max| attempts >= max) {
            engine_warn!("Job {} still running after {} polls", job_id, attempts);
            sink.emit(EngineEvent::JobStatus {
                job_id,
                status: RemoteStatus::Failed {
                    error: POLL_GAVE_UP_MESSAGE.to_string(),
                },
            });
            return PollEnd::GaveUp;
        }

        tokio::select! {
            _ = cancel.cancelled() => return PollEnd::Cancelled,
            _ = tokio::time::sleep(schedule.interval) => {}
        }
    }
}
