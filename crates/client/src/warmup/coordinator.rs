//! Background warm-up coordinator.
//!
//! A single tokio task owns the download session. The foreground talks to it
//! only through channels: commands in, events out, plus a `watch` channel
//! exposing the session state.
//!
//! # Session rules
//!
//! - Pictures download before TTS models, one URL at a time.
//! - Each attempt, failed or not, is followed by a `Progress` event; a failure
//!   is announced by an `Error` event first.
//! - `Cancel` trips the session's token. It is checked before every fetch,
//!   so an in-flight download finishes but nothing else starts, and neither
//!   `PhaseComplete` nor `AllComplete` follows.
//! - `StartDownloads` while a session runs cancels it and starts over once
//!   its in-flight download has settled. The state reads `Running` from the
//!   moment the restart is queued; the replaced session never reports
//!   `Cancelled`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use pictoh_core::{Error, Request};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::messages::{DownloadPhase, PhaseProgress, WarmUpCommand, WarmUpEvent};
use crate::fetch::{Fetcher, resolve};

/// Observable state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmUpState {
    Idle,
    Running { phase: DownloadPhase, index: usize },
    Cancelled,
    Completed,
}

impl WarmUpState {
    /// Whether the last session has stopped for good.
    pub fn is_settled(self) -> bool {
        matches!(self, WarmUpState::Cancelled | WarmUpState::Completed)
    }
}

/// Resolves to the session's final state, `Cancelled` or `Completed`.
type SessionFuture = Pin<Box<dyn Future<Output = WarmUpState> + Send>>;

/// Everything a download session needs; cloned into each session.
#[derive(Clone)]
struct SessionContext {
    fetcher: Arc<dyn Fetcher>,
    base: Url,
    events: mpsc::UnboundedSender<WarmUpEvent>,
    state: Arc<watch::Sender<WarmUpState>>,
}

impl SessionContext {
    fn begin(&self, pictures: Vec<String>, tts: Vec<String>) -> (CancellationToken, SessionFuture) {
        let cancel = CancellationToken::new();
        let session = Session { ctx: self.clone(), cancel: cancel.clone() };
        (cancel, Box::pin(session.run(pictures, tts)))
    }
}

struct Session {
    ctx: SessionContext,
    cancel: CancellationToken,
}

impl Session {
    /// Publishes `Completed` itself, ahead of `AllComplete`. A cancelled
    /// session leaves publishing to the coordinator, which knows whether a
    /// restart replaces it.
    async fn run(self, pictures: Vec<String>, tts: Vec<String>) -> WarmUpState {
        tracing::info!(pictures = pictures.len(), tts = tts.len(), "warm-up started");

        for (phase, urls) in [(DownloadPhase::Pictures, pictures), (DownloadPhase::Tts, tts)] {
            if !self.download_phase(phase, &urls).await {
                tracing::info!(%phase, "warm-up cancelled");
                return WarmUpState::Cancelled;
            }
        }

        self.ctx.state.send_replace(WarmUpState::Completed);
        self.emit(WarmUpEvent::AllComplete);
        tracing::info!("warm-up complete");
        WarmUpState::Completed
    }

    /// Download one phase. Returns false when the session was cancelled.
    async fn download_phase(&self, phase: DownloadPhase, urls: &[String]) -> bool {
        let mut progress = PhaseProgress::new(phase, urls.len());

        for (index, url) in urls.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return false;
            }
            self.ctx.state.send_replace(WarmUpState::Running { phase, index });

            if let Err(e) = self.download(url).await {
                tracing::warn!(%phase, url = %url, error = %e, "warm-up download failed");
                self.emit(WarmUpEvent::Error { phase, error: format!("failed to download {url}: {e}") });
            }
            progress.record_attempt();
            self.emit(progress.event());
        }

        if self.cancel.is_cancelled() {
            return false;
        }
        self.emit(WarmUpEvent::PhaseComplete { phase });
        true
    }

    async fn download(&self, url: &str) -> Result<(), Error> {
        let url = resolve(url, &self.ctx.base).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let response = self.ctx.fetcher.fetch(&Request::get(url)).await?;
        if !response.is_success() {
            return Err(Error::HttpError(format!("status {}", response.status)));
        }
        Ok(())
    }

    fn emit(&self, event: WarmUpEvent) {
        // A foreground that stopped listening is not an error.
        let _ = self.ctx.events.send(event);
    }
}

async fn next_settled(running: &mut Option<(CancellationToken, SessionFuture)>) -> WarmUpState {
    match running {
        Some((_, session)) => session.await,
        None => std::future::pending().await,
    }
}

/// Coordinator main loop. Exits once the command channel is closed and the
/// current session has finished.
async fn drive(mut commands: mpsc::UnboundedReceiver<WarmUpCommand>, ctx: SessionContext) {
    let mut running: Option<(CancellationToken, SessionFuture)> = None;
    let mut queued: Option<(Vec<String>, Vec<String>)> = None;
    let mut inbound_open = true;

    loop {
        if running.is_none() {
            if let Some((pictures, tts)) = queued.take() {
                running = Some(ctx.begin(pictures, tts));
            } else if !inbound_open {
                break;
            }
        }

        tokio::select! {
            command = commands.recv(), if inbound_open => match command {
                Some(WarmUpCommand::StartDownloads { picture_urls, tts_model_urls }) => {
                    if let Some((cancel, _)) = &running {
                        tracing::debug!("restarting warm-up");
                        cancel.cancel();
                    }
                    queued = Some((picture_urls, tts_model_urls));
                    ctx.state.send_replace(WarmUpState::Running { phase: DownloadPhase::Pictures, index: 0 });
                }
                Some(WarmUpCommand::Cancel) => {
                    if let Some((cancel, _)) = &running {
                        cancel.cancel();
                    }
                    queued = None;
                }
                None => inbound_open = false,
            },
            outcome = next_settled(&mut running) => {
                running = None;
                if outcome == WarmUpState::Cancelled && queued.is_none() {
                    ctx.state.send_replace(WarmUpState::Cancelled);
                }
            }
        }
    }

    tracing::debug!("warm-up coordinator stopped");
}

/// Foreground side of a running coordinator.
pub struct WarmUpHandle {
    commands: mpsc::UnboundedSender<WarmUpCommand>,
    events: mpsc::UnboundedReceiver<WarmUpEvent>,
    state: watch::Receiver<WarmUpState>,
    task: JoinHandle<()>,
}

impl WarmUpHandle {
    /// Spawn a coordinator downloading through `fetcher`. Relative URLs are
    /// resolved against `base`.
    pub fn spawn(fetcher: Arc<dyn Fetcher>, base: Url) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WarmUpState::Idle);

        let ctx = SessionContext { fetcher, base, events: event_tx, state: Arc::new(state_tx) };
        let task = tokio::spawn(drive(command_rx, ctx));

        Self { commands: command_tx, events: event_rx, state: state_rx, task }
    }

    pub fn send(&self, command: WarmUpCommand) -> Result<(), Error> {
        self.commands
            .send(command)
            .map_err(|_| Error::InvalidState("warm-up coordinator has stopped".to_string()))
    }

    pub fn start(&self, picture_urls: Vec<String>, tts_model_urls: Vec<String>) -> Result<(), Error> {
        self.send(WarmUpCommand::StartDownloads { picture_urls, tts_model_urls })
    }

    pub fn cancel(&self) -> Result<(), Error> {
        self.send(WarmUpCommand::Cancel)
    }

    pub fn state(&self) -> WarmUpState {
        *self.state.borrow()
    }

    /// Wait until the current session is cancelled or completed.
    ///
    /// A restart marks the coordinator `Running` as soon as it is queued, so
    /// this never resolves on the `Cancelled` of the session it replaced.
    pub async fn settled(&mut self) -> WarmUpState {
        let settled = self.state.wait_for(|state| state.is_settled()).await.map(|state| *state);
        match settled {
            Ok(state) => state,
            Err(_) => *self.state.borrow(),
        }
    }

    pub async fn next_event(&mut self) -> Option<WarmUpEvent> {
        self.events.recv().await
    }

    /// Close the command channel, wait for the running session, and return
    /// every event not consumed yet.
    pub async fn finish(self) -> Vec<WarmUpEvent> {
        let WarmUpHandle { commands, mut events, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "warm-up coordinator ended abnormally");
        }

        let mut remaining = Vec::new();
        while let Some(event) = events.recv().await {
            remaining.push(event);
        }
        remaining
    }

    /// Stop the coordinator without waiting for it.
    pub fn terminate(self) {
        let _ = self.commands.send(WarmUpCommand::Cancel);
        self.task.abort();
    }

    /// Split into the raw command sender, event receiver and task handle,
    /// for hosts that route commands and events from separate tasks.
    pub fn into_parts(
        self,
    ) -> (mpsc::UnboundedSender<WarmUpCommand>, mpsc::UnboundedReceiver<WarmUpEvent>, JoinHandle<()>) {
        (self.commands, self.events, self.task)
    }
}
