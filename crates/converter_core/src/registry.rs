use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Locally generated handle for a tracked file; stable for the entry's lifetime.
pub type EntryId = u64;

/// Identifies one upload request and the entries it carried.
pub type BatchId = u64;

/// Server-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Client-side record for one submitted file.
///
/// Entries are only ever handed out by shared reference; the registry replaces
/// them whole on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    pub id: EntryId,
    pub source: PathBuf,
    pub display_name: String,
    /// Upload percentage, 0..=100. Only meaningful while uploading.
    pub progress: u8,
    pub status: JobStatus,
    pub job_id: Option<JobId>,
    /// Server-relative artifact path; set iff `status == Completed`.
    pub converted_location: Option<String>,
    /// Set iff `status == Failed`.
    pub error_detail: Option<String>,
    /// Last non-terminal status label reported by the server, if any.
    pub remote_status: Option<String>,
}

impl TrackedEntry {
    fn queued(id: EntryId, source: PathBuf) -> Self {
        let display_name = display_name_for(&source);
        Self {
            id,
            source,
            display_name,
            progress: 0,
            status: JobStatus::Queued,
            job_id: None,
            converted_location: None,
            error_detail: None,
            remote_status: None,
        }
    }
}

fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Normalized status report for a job, whichever channel delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Still in flight; carries the server's raw status label.
    Running { remote_status: String },
    Completed { output_path: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Applied,
    /// The update matched the entry's current state.
    Unchanged,
    AlreadyTerminal,
    UnknownJob,
}

/// One job descriptor from the upload acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: JobId,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("unknown upload batch {0}")]
    UnknownBatch(BatchId),
    #[error("server returned {actual} jobs for {expected} files")]
    CountMismatch { expected: usize, actual: usize },
    #[error("server returned job id {0} more than once")]
    DuplicateJobId(JobId),
}

/// Ordered source of truth for every tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobRegistry {
    entries: BTreeMap<EntryId, TrackedEntry>,
    by_job: HashMap<JobId, EntryId>,
    batches: BTreeMap<BatchId, Vec<EntryId>>,
    last_entry_id: EntryId,
    last_batch_id: BatchId,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&TrackedEntry> {
        self.entries.get(&id)
    }

    pub fn find_by_job(&self, job_id: &JobId) -> Option<&TrackedEntry> {
        self.by_job.get(job_id).and_then(|id| self.entries.get(id))
    }

    /// Entries in handle order, which is also the order they were enqueued.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntry> {
        self.entries.values()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    pub fn batch_members(&self, batch: BatchId) -> Option<&[EntryId]> {
        self.batches.get(&batch).map(Vec::as_slice)
    }

    pub fn has_open_batches(&self) -> bool {
        !self.batches.is_empty()
    }

    pub fn enqueue<I>(&mut self, files: I) -> Vec<EntryId>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        files
            .into_iter()
            .map(|source| {
                self.last_entry_id += 1;
                let id = self.last_entry_id;
                self.entries.insert(id, TrackedEntry::queued(id, source));
                id
            })
            .collect()
    }

    /// Moves every queued entry into a new batch. Returns `None` when nothing is queued.
    pub fn begin_upload(&mut self) -> Option<(BatchId, Vec<EntryId>)> {
        let members: Vec<EntryId> = self
            .entries
            .values()
            .filter(|e| e.status == JobStatus::Queued)
            .map(|e| e.id)
            .collect();
        if members.is_empty() {
            return None;
        }

        for id in &members {
            self.replace_with(*id, |current| TrackedEntry {
                status: JobStatus::Uploading,
                progress: 0,
                ..current.clone()
            });
        }

        self.last_batch_id += 1;
        let batch = self.last_batch_id;
        self.batches.insert(batch, members.clone());
        Some((batch, members))
    }

    /// Applies batch-wide upload progress; progress never moves backwards.
    pub fn set_batch_progress(&mut self, batch: BatchId, percent: u8) -> bool {
        let Some(members) = self.batches.get(&batch).cloned() else {
            return false;
        };
        let percent = percent.min(100);
        let mut changed = false;
        for id in members {
            let Some(current) = self.entries.get(&id) else {
                continue;
            };
            if current.status != JobStatus::Uploading || current.progress >= percent {
                continue;
            }
            self.replace_with(id, |current| TrackedEntry {
                progress: percent,
                ..current.clone()
            });
            changed = true;
        }
        changed
    }

    /// Zips the acknowledged job ids onto the batch by position.
    ///
    /// Either every member gets its id or none does. Members removed while the
    /// upload was in flight still consume their position.
    pub fn assign_job_ids(
        &mut self,
        batch: BatchId,
        tickets: &[JobTicket],
    ) -> Result<Vec<(EntryId, JobId)>, AssignError> {
        let members = self
            .batches
            .get(&batch)
            .ok_or(AssignError::UnknownBatch(batch))?;
        if members.len() != tickets.len() {
            return Err(AssignError::CountMismatch {
                expected: members.len(),
                actual: tickets.len(),
            });
        }
        let mut seen = HashSet::with_capacity(tickets.len());
        for ticket in tickets {
            if !seen.insert(&ticket.job_id) || self.by_job.contains_key(&ticket.job_id) {
                return Err(AssignError::DuplicateJobId(ticket.job_id.clone()));
            }
        }

        let members = self.batches.remove(&batch).unwrap_or_default();
        let mut assigned = Vec::with_capacity(members.len());
        for (id, ticket) in members.into_iter().zip(tickets) {
            let Some(current) = self.entries.get(&id) else {
                continue;
            };
            if current.status != JobStatus::Uploading || current.job_id.is_some() {
                continue;
            }
            self.replace_with(id, |current| TrackedEntry {
                status: JobStatus::Processing,
                progress: 100,
                job_id: Some(ticket.job_id.clone()),
                ..current.clone()
            });
            self.by_job.insert(ticket.job_id.clone(), id);
            assigned.push((id, ticket.job_id.clone()));
        }
        Ok(assigned)
    }

    /// Fails every still-uploading member of the batch with the same message.
    pub fn fail_batch(&mut self, batch: BatchId, message: &str) -> usize {
        let members = self.batches.remove(&batch).unwrap_or_default();
        let mut failed = 0;
        for id in members {
            let Some(current) = self.entries.get(&id) else {
                continue;
            };
            if current.status.is_terminal() {
                continue;
            }
            self.replace_with(id, |current| TrackedEntry {
                status: JobStatus::Failed,
                progress: 0,
                error_detail: Some(message.to_string()),
                ..current.clone()
            });
            failed += 1;
        }
        failed
    }

    /// Folds a status report into the entry that owns `job_id`.
    pub fn apply_update(&mut self, job_id: &JobId, outcome: &JobOutcome) -> ApplyResult {
        let Some(&id) = self.by_job.get(job_id) else {
            return ApplyResult::UnknownJob;
        };
        let Some(current) = self.entries.get(&id) else {
            return ApplyResult::UnknownJob;
        };
        if current.status.is_terminal() {
            return ApplyResult::AlreadyTerminal;
        }

        let next = match outcome {
            JobOutcome::Running { remote_status } => {
                if current.remote_status.as_deref() == Some(remote_status.as_str()) {
                    return ApplyResult::Unchanged;
                }
                TrackedEntry {
                    remote_status: Some(remote_status.clone()),
                    ..current.clone()
                }
            }
            JobOutcome::Completed { output_path } => TrackedEntry {
                status: JobStatus::Completed,
                converted_location: Some(output_path.clone()),
                error_detail: None,
                remote_status: None,
                ..current.clone()
            },
            JobOutcome::Failed { error } => TrackedEntry {
                status: JobStatus::Failed,
                converted_location: None,
                error_detail: Some(error.clone()),
                remote_status: None,
                ..current.clone()
            },
        };
        self.entries.insert(id, next);
        ApplyResult::Applied
    }

    /// Drops an entry. Later updates for its job id become unknown references.
    pub fn remove(&mut self, id: EntryId) -> Option<TrackedEntry> {
        let removed = self.entries.remove(&id)?;
        if let Some(job_id) = &removed.job_id {
            self.by_job.remove(job_id);
        }
        Some(removed)
    }

    fn replace_with(&mut self, id: EntryId, f: impl FnOnce(&TrackedEntry) -> TrackedEntry) {
        if let Some(current) = self.entries.get(&id) {
            let next = f(current);
            self.entries.insert(id, next);
        }
    }
}
