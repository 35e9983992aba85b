use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use converter_core::{update, AppState, EntryId, JobStatus, Msg};
use converter_engine::{
    ConversionApi, EngineConfig, EngineHandle, FileSessionStore, ReqwestApi, SyncStrategy,
};
use engine_logging::{engine_info, engine_warn};

use super::config::AppConfig;
use super::effects::EffectRunner;
use super::render::{format_job_summary, RenderCache};
use crate::cli::ConvertArgs;

const TICK_INTERVAL: Duration = Duration::from_millis(250);
/// How long a push-mode run waits for the server to assign a session before uploading.
const SESSION_WAIT: Duration = Duration::from_secs(5);

/// Uploads the given files as one batch and follows every job until it settles.
pub async fn run_convert(config: AppConfig, args: ConvertArgs) -> Result<()> {
    let push = config.strategy == SyncStrategy::Push;
    let engine = EngineHandle::new(EngineConfig {
        client: config.client_settings(),
        strategy: config.strategy,
    })
    .with_context(|| format!("cannot reach conversion service at {}", config.server_url))?;
    let sessions = Box::new(FileSessionStore::new(config.session_file.clone()));

    let mut session = ConvertSession {
        state: AppState::with_format(args.format),
        runner: EffectRunner::new(engine, sessions, config.output_dir.clone()),
        renderer: RenderCache::default(),
        auto_download: args.download,
        requested_downloads: BTreeSet::new(),
        push_lost: false,
    };

    match session.runner.restore_session() {
        Ok(Some(session_id)) => {
            engine_info!("Restored session {}", session_id);
            session.dispatch(Msg::SessionRestored(session_id));
        }
        Ok(None) => {}
        Err(err) => engine_warn!("Ignoring stored session: {}", err),
    }

    if push {
        session.await_push_session().await;
        if session.push_lost {
            session.runner.shutdown();
            bail!("push channel to {} is unavailable", config.server_url);
        }
    }
    session.dispatch(Msg::FilesSelected(args.files));
    session.dispatch(Msg::SubmitClicked);

    let outcome = session.run_until_settled(push).await;
    session.runner.shutdown();
    outcome?;

    let view = session.state.view();
    let total = session.state.registry().len();
    println!("{} of {} converted, {} failed", view.completed, total, view.failed);
    if view.failed > 0 {
        bail!("{} of {} conversions failed", view.failed, total);
    }
    Ok(())
}

/// Prints every job the server knows about, in server order.
pub async fn run_jobs(config: AppConfig) -> Result<()> {
    let api = ReqwestApi::new(config.client_settings()).context("cannot create http client")?;
    let jobs = api
        .list_jobs()
        .await
        .with_context(|| format!("cannot list jobs on {}", config.server_url))?;
    if jobs.is_empty() {
        println!("No jobs");
    }
    for job in &jobs {
        println!("{}", format_job_summary(job));
    }
    Ok(())
}

struct ConvertSession {
    state: AppState,
    runner: EffectRunner,
    renderer: RenderCache,
    auto_download: bool,
    requested_downloads: BTreeSet<EntryId>,
    /// Set once the push channel reports it is closed or never opened.
    push_lost: bool,
}

impl ConvertSession {
    fn dispatch(&mut self, msg: Msg) {
        if matches!(msg, Msg::PushConnectionChanged { connected: false }) {
            self.push_lost = true;
        }
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;
        self.runner.enqueue(effects);

        if was_dirty {
            for line in self.renderer.render(&self.state.view()) {
                println!("{line}");
            }
        }
    }

    /// Asks for every completed artifact exactly once.
    fn request_downloads(&mut self) {
        if !self.auto_download {
            return;
        }
        let ready: Vec<EntryId> = self
            .state
            .registry()
            .iter()
            .filter(|entry| {
                entry.status == JobStatus::Completed && entry.converted_location.is_some()
            })
            .map(|entry| entry.id)
            .filter(|id| !self.requested_downloads.contains(id))
            .collect();
        for entry in ready {
            self.requested_downloads.insert(entry);
            self.dispatch(Msg::DownloadClicked(entry));
        }
    }

    async fn await_push_session(&mut self) {
        let waited = tokio::time::timeout(SESSION_WAIT, async {
            while let Some(msg) = self.runner.next_msg().await {
                let done = matches!(
                    msg,
                    Msg::SessionAssigned(_) | Msg::PushConnectionChanged { connected: false }
                );
                self.dispatch(msg);
                if done {
                    break;
                }
            }
        })
        .await;
        if waited.is_err() {
            engine_warn!("No session assigned within {:?}; uploading anyway", SESSION_WAIT);
        }
    }

    async fn run_until_settled(&mut self, push: bool) -> Result<()> {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        while !self.state.is_settled() {
            let msg = tokio::select! {
                msg = self.runner.next_msg() => match msg {
                    Some(msg) => msg,
                    None => bail!("engine stopped before every job settled"),
                },
                _ = ticker.tick() => Msg::Tick,
            };
            self.dispatch(msg);
            self.request_downloads();
            if push && self.push_lost && !self.state.is_settled() {
                bail!("push channel closed before every job settled");
            }
        }
        engine_info!("All jobs settled");
        Ok(())
    }
}
