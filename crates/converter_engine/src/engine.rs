use std::path::PathBuf;
use std::sync::Arc;

use engine_logging::engine_info;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ChannelSink, ClientSettings, ConversionApi, EventSink, ReqwestApi};
use crate::artifact::download_artifact;
use crate::poll::{PollSchedule, PollingSource};
use crate::push::{push_url, PushSource};
use crate::source::{StatusSource, SyncStrategy};
use crate::{BatchId, ClientError, EngineEvent, EntryId, UploadFile};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub client: ClientSettings,
    pub strategy: SyncStrategy,
}

/// Runs every network operation as a task on the current Tokio runtime and
/// funnels the results into one event queue.
///
/// Must be created and used inside a runtime. The owner drains events with
/// [`EngineHandle::recv`] and applies them to its state one at a time.
pub struct EngineHandle {
    api: Arc<dyn ConversionApi>,
    source: Box<dyn StatusSource>,
    sink: Arc<dyn EventSink>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, ClientError> {
        let api: Arc<dyn ConversionApi> = Arc::new(ReqwestApi::new(config.client.clone())?);
        let source: Box<dyn StatusSource> = match config.strategy {
            SyncStrategy::Poll => Box::new(PollingSource::new(
                api.clone(),
                PollSchedule::from(&config.client),
                CancellationToken::new(),
            )),
            SyncStrategy::Push => Box::new(PushSource::new(
                push_url(&config.client.base_url)?,
                CancellationToken::new(),
            )),
        };
        engine_info!(
            "Engine targeting {} with {:?} status updates",
            config.client.base_url,
            config.strategy
        );
        Ok(Self::with_parts(api, source))
    }

    /// Assembles an engine from explicit parts and starts the status source.
    pub fn with_parts(api: Arc<dyn ConversionApi>, source: Box<dyn StatusSource>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelSink::new(event_tx));
        source.start(sink.clone());
        Self {
            api,
            source,
            sink,
            event_rx,
        }
    }

    pub fn upload(
        &self,
        batch: BatchId,
        files: Vec<UploadFile>,
        output_format: impl Into<String>,
        session_id: Option<String>,
    ) {
        let api = self.api.clone();
        let sink = self.sink.clone();
        let output_format = output_format.into();
        tokio::spawn(async move {
            let result = api
                .upload(
                    batch,
                    &files,
                    &output_format,
                    session_id.as_deref(),
                    sink.clone(),
                )
                .await;
            sink.emit(EngineEvent::UploadFinished { batch, result });
        });
    }

    pub fn track(&self, job_id: &str) {
        self.source.track(job_id, self.sink.clone());
    }

    pub fn download(
        &self,
        entry: EntryId,
        location: String,
        output_dir: PathBuf,
        file_name: String,
    ) {
        let api = self.api.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let result = download_artifact(api.as_ref(), &location, &output_dir, &file_name).await;
            sink.emit(EngineEvent::DownloadFinished { entry, result });
        });
    }

    /// Returns an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    /// Stops status polling or closes the push channel.
    pub fn shutdown(&self) {
        self.source.close();
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.source.close();
    }
}
