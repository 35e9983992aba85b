use std::path::PathBuf;
use std::sync::Once;

use converter_core::{
    update, AppState, Effect, JobId, JobStatus, JobTicket, Msg, OutputFormat, UploadItem,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn select(state: AppState, names: &[&str]) -> AppState {
    let files = names.iter().map(PathBuf::from).collect();
    update(state, Msg::FilesSelected(files)).0
}

fn ticket(id: &str, filename: &str) -> JobTicket {
    JobTicket {
        job_id: JobId::from(id),
        filename: filename.to_string(),
    }
}

fn submit(state: AppState) -> (AppState, u64, Vec<UploadItem>) {
    let (state, effects) = update(state, Msg::SubmitClicked);
    match effects.into_iter().next() {
        Some(Effect::UploadBatch { batch, files, .. }) => (state, batch, files),
        other => panic!("expected upload effect, got {other:?}"),
    }
}

#[test]
fn selected_files_are_queued_in_order() {
    init_logging();
    let mut state = select(AppState::new(), &["b.png", "a.png"]);

    let view = state.view();
    let names: Vec<_> = view.to_upload.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["b.png", "a.png"]);
    assert!(view
        .to_upload
        .iter()
        .all(|row| row.status == JobStatus::Queued && row.progress == 0));
    assert!(view.uploaded.is_empty());
    assert!(state.consume_dirty());
}

#[test]
fn submit_without_queued_files_does_nothing() {
    init_logging();
    let (mut state, effects) = update(AppState::new(), Msg::SubmitClicked);
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
}

#[test]
fn submit_moves_whole_batch_to_uploading() {
    init_logging();
    let state = select(AppState::new(), &["a.png", "b.png"]);
    let (state, _) = update(state, Msg::FormatSelected(OutputFormat::Png));
    let (state, effects) = update(state, Msg::SubmitClicked);

    assert_eq!(effects.len(), 1);
    let Effect::UploadBatch {
        files,
        format,
        session_id,
        ..
    } = &effects[0]
    else {
        panic!("expected upload effect");
    };
    let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
    assert_eq!(*format, OutputFormat::Png);
    assert_eq!(*session_id, None);
    assert!(state
        .view()
        .to_upload
        .iter()
        .all(|row| row.status == JobStatus::Uploading));
}

#[test]
fn upload_progress_applies_to_every_entry_in_batch() {
    init_logging();
    let state = select(AppState::new(), &["a.png", "b.png"]);
    let (state, batch, _) = submit(state);

    let (state, _) = update(state, Msg::UploadProgress { batch, percent: 60 });
    let (state, _) = update(state, Msg::UploadProgress { batch, percent: 20 });

    let progress: Vec<_> = state.view().to_upload.iter().map(|r| r.progress).collect();
    assert_eq!(progress, vec![60, 60]);
}

#[test]
fn acknowledged_jobs_are_assigned_by_position() {
    init_logging();
    let state = select(AppState::new(), &["a.png", "b.png"]);
    let (state, batch, _) = submit(state);

    let (state, effects) = update(
        state,
        Msg::UploadSucceeded {
            batch,
            jobs: vec![ticket("J1", "a.png"), ticket("J2", "b.png")],
        },
    );

    let view = state.view();
    assert!(view.to_upload.is_empty());
    let rows: Vec<_> = view
        .uploaded
        .iter()
        .map(|row| (row.name.as_str(), row.job_id.clone(), row.status))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("a.png", Some(JobId::from("J1")), JobStatus::Processing),
            ("b.png", Some(JobId::from("J2")), JobStatus::Processing),
        ]
    );
    assert_eq!(
        effects,
        vec![
            Effect::TrackJob {
                job_id: JobId::from("J1")
            },
            Effect::TrackJob {
                job_id: JobId::from("J2")
            },
        ]
    );
}

#[test]
fn entry_count_matches_submitted_file_count() {
    init_logging();
    let names: Vec<String> = (0..7).map(|i| format!("img{i}.png")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let state = select(AppState::new(), &refs);
    let (state, batch, files) = submit(state);
    let jobs = files
        .iter()
        .enumerate()
        .map(|(i, f)| ticket(&format!("J{i}"), &f.file_name))
        .collect();

    let (state, _) = update(state, Msg::UploadSucceeded { batch, jobs });

    let registry = state.registry();
    assert_eq!(registry.len(), 7);
    for (i, name) in names.iter().enumerate() {
        let entry = registry
            .find_by_job(&JobId::new(format!("J{i}")))
            .expect("entry for job");
        assert_eq!(&entry.display_name, name);
    }
}

#[test]
fn upload_failure_fails_whole_batch_with_one_message() {
    init_logging();
    let state = select(AppState::new(), &["a.png", "b.png"]);
    let (state, batch, _) = submit(state);
    let (state, _) = update(state, Msg::UploadProgress { batch, percent: 45 });

    let (state, effects) = update(
        state,
        Msg::UploadFailed {
            batch,
            message: "Network Error".to_string(),
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.banner.as_deref(), Some("Network Error"));
    assert_eq!(view.to_upload.len(), 2);
    for row in &view.to_upload {
        assert_eq!(row.status, JobStatus::Failed);
        assert_eq!(row.progress, 0);
        assert_eq!(row.error.as_deref(), Some("Network Error"));
    }
}

#[test]
fn failed_upload_entries_are_not_resubmitted() {
    init_logging();
    let state = select(AppState::new(), &["a.png"]);
    let (state, batch, _) = submit(state);
    let (state, _) = update(
        state,
        Msg::UploadFailed {
            batch,
            message: "boom".to_string(),
        },
    );
    let state = select(state, &["c.png"]);

    let (state, _, files) = submit(state);
    let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["c.png"]);
    assert_eq!(state.view().banner, None);
}

#[test]
fn short_job_list_fails_the_batch() {
    init_logging();
    let state = select(AppState::new(), &["a.png", "b.png"]);
    let (state, batch, _) = submit(state);

    let (state, effects) = update(
        state,
        Msg::UploadSucceeded {
            batch,
            jobs: vec![ticket("J1", "a.png")],
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(
        view.banner.as_deref(),
        Some("server returned 1 jobs for 2 files")
    );
    assert!(view.to_upload.iter().all(|r| r.status == JobStatus::Failed));
    assert!(view.uploaded.is_empty());
}

#[test]
fn late_acknowledgment_for_failed_batch_is_ignored() {
    init_logging();
    let state = select(AppState::new(), &["a.png"]);
    let (state, batch, _) = submit(state);
    let (state, _) = update(
        state,
        Msg::UploadFailed {
            batch,
            message: "timeout".to_string(),
        },
    );
    let before = state.registry().clone();

    let (state, effects) = update(
        state,
        Msg::UploadSucceeded {
            batch,
            jobs: vec![ticket("J1", "a.png")],
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.registry(), &before);
}

#[test]
fn banner_can_be_dismissed() {
    init_logging();
    let state = select(AppState::new(), &["a.png"]);
    let (state, batch, _) = submit(state);
    let (state, _) = update(
        state,
        Msg::UploadFailed {
            batch,
            message: "rejected".to_string(),
        },
    );
    let (state, _) = update(state, Msg::BannerDismissed);
    assert_eq!(state.view().banner, None);
}

#[test]
fn removed_entry_disappears_from_view() {
    init_logging();
    let state = select(AppState::new(), &["a.png", "b.png"]);
    let first = state.view().to_upload[0].entry;

    let (state, _) = update(state, Msg::RemoveClicked(first));

    let names: Vec<_> = state
        .view()
        .to_upload
        .iter()
        .map(|r| r.name.clone())
        .collect();
    assert_eq!(names, vec!["b.png".to_string()]);
}
