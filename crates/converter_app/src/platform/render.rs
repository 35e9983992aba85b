use std::collections::HashMap;

use converter_core::{AppViewModel, EntryId, EntryRowView, JobStatus};
use converter_engine::JobSummary;

/// Remembers what was last printed so each render only emits what changed.
#[derive(Debug, Default)]
pub struct RenderCache {
    header: Option<String>,
    rows: HashMap<EntryId, String>,
    banner: Option<String>,
    notice: Option<String>,
}

impl RenderCache {
    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut lines = Vec::new();

        let header = format_header(view);
        if self.header.as_ref() != Some(&header) {
            lines.push(header.clone());
            self.header = Some(header);
        }

        if view.banner != self.banner {
            if let Some(banner) = &view.banner {
                lines.push(format!("Upload failed: {banner}"));
            }
            self.banner = view.banner.clone();
        }

        for row in view.to_upload.iter().chain(&view.uploaded) {
            let text = format_entry_row(row);
            if self.rows.get(&row.entry) != Some(&text) {
                lines.push(text.clone());
                self.rows.insert(row.entry, text);
            }
        }

        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                lines.push(notice.clone());
            }
            self.notice = view.notice.clone();
        }

        lines
    }
}

fn format_header(view: &AppViewModel) -> String {
    let mut header = format!(
        "Format: {} | To upload: {} | Uploaded: {} | Completed: {} | Failed: {}",
        view.output_format,
        view.to_upload.len(),
        view.uploaded.len(),
        view.completed,
        view.failed
    );
    if view.push_connected {
        header.push_str(" | Live");
    }
    header
}

pub fn format_entry_row(row: &EntryRowView) -> String {
    let detail = match row.status {
        JobStatus::Queued => String::new(),
        JobStatus::Uploading => format!(" {}%", row.progress),
        JobStatus::Processing => row
            .remote_status
            .as_ref()
            .map(|status| format!(" ({status})"))
            .unwrap_or_default(),
        JobStatus::Completed if row.downloadable => " (ready)".to_string(),
        JobStatus::Completed => String::new(),
        JobStatus::Failed => row
            .error
            .as_ref()
            .map(|error| format!(": {error}"))
            .unwrap_or_default(),
    };
    match &row.job_id {
        Some(job_id) => format!(
            "[#{}] {} {}{} (job {})",
            row.entry,
            row.status.label(),
            row.name,
            detail,
            job_id
        ),
        None => format!("[#{}] {} {}{}", row.entry, row.status.label(), row.name, detail),
    }
}

pub fn format_job_summary(job: &JobSummary) -> String {
    let mut line = format!("{} {}", job.job_id, job.status);
    if let Some(format) = &job.output_format {
        line.push_str(&format!(" -> {format}"));
    }
    if let Some(created_at) = &job.created_at {
        line.push_str(&format!(" created {created_at}"));
    }
    if let Some(output) = &job.output_path {
        line.push_str(&format!(" at {output}"));
    }
    if let Some(error) = &job.error {
        line.push_str(&format!(": {error}"));
    }
    line
}
