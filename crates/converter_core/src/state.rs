use std::collections::BTreeSet;

use crate::view_model::{AppViewModel, EntryRowView};
use crate::{EntryId, JobRegistry, JobStatus, OutputFormat};

/// Everything the client tracks for one UI session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    registry: JobRegistry,
    output_format: OutputFormat,
    session_id: Option<String>,
    push_connected: bool,
    banner: Option<String>,
    notice: Option<String>,
    downloads_in_flight: BTreeSet<EntryId>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn push_connected(&self) -> bool {
        self.push_connected
    }

    /// True once every entry is terminal and no download is in flight.
    pub fn is_settled(&self) -> bool {
        self.downloads_in_flight.is_empty()
            && !self.registry.has_open_batches()
            && self.registry.iter().all(|entry| entry.status.is_terminal())
    }

    pub fn view(&self) -> AppViewModel {
        let (uploaded, to_upload): (Vec<_>, Vec<_>) = self
            .registry
            .iter()
            .map(EntryRowView::from)
            .partition(|row| row.job_id.is_some());

        AppViewModel {
            output_format: self.output_format,
            session_id: self.session_id.clone(),
            push_connected: self.push_connected,
            banner: self.banner.clone(),
            notice: self.notice.clone(),
            to_upload,
            uploaded,
            completed: self.registry.count_with_status(JobStatus::Completed),
            failed: self.registry.count_with_status(JobStatus::Failed),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn registry_mut(&mut self) -> &mut JobRegistry {
        &mut self.registry
    }

    pub(crate) fn set_output_format(&mut self, format: OutputFormat) {
        if self.output_format != format {
            self.output_format = format;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_session_id(&mut self, session_id: String) -> bool {
        if self.session_id.as_deref() == Some(session_id.as_str()) {
            return false;
        }
        self.session_id = Some(session_id);
        self.mark_dirty();
        true
    }

    pub(crate) fn set_push_connected(&mut self, connected: bool) {
        if self.push_connected != connected {
            self.push_connected = connected;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_banner(&mut self, banner: Option<String>) {
        if self.banner != banner {
            self.banner = banner;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_notice(&mut self, notice: Option<String>) {
        if self.notice != notice {
            self.notice = notice;
            self.mark_dirty();
        }
    }

    pub(crate) fn start_download(&mut self, entry: EntryId) -> bool {
        self.downloads_in_flight.insert(entry)
    }

    pub(crate) fn finish_download(&mut self, entry: EntryId) {
        self.downloads_in_flight.remove(&entry);
    }
}
