//! Routes inbound messages to the agent and the warm-up coordinator.
//!
//! Replies and warm-up events are pushed as encoded lines onto one outbound
//! channel; a single writer task owns stdout.

use std::sync::Arc;

use pictoh_client::{Agent, WarmUpCommand, WarmUpEvent, WarmUpHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ProtocolError;
use crate::protocol::{self, FetchMessage, Inbound, Reply};

pub struct Host {
    agent: Arc<Agent>,
    warmup: mpsc::UnboundedSender<WarmUpCommand>,
    warmup_task: JoinHandle<()>,
    forwarder: JoinHandle<()>,
    out: mpsc::UnboundedSender<String>,
}

impl Host {
    /// Spawn the warm-up coordinator (fetching through `agent`) and the task
    /// forwarding its events to `out`.
    pub fn spawn(agent: Arc<Agent>, out: mpsc::UnboundedSender<String>) -> Self {
        let handle = WarmUpHandle::spawn(agent.clone(), agent.origin().clone());
        let (warmup, events, warmup_task) = handle.into_parts();
        let forwarder = tokio::spawn(forward_events(agent.clone(), events, out.clone()));
        Self { agent, warmup, warmup_task, forwarder, out }
    }

    /// Tell the foreground the agent is up and whether first-launch warm-up
    /// is still pending.
    pub async fn announce(&self) {
        let state = self.agent.state().await;
        let first_launch = self.agent.db().is_first_launch().await;
        tracing::info!(%state, first_launch, "agent ready");
        self.send(&Reply::Ready { state, first_launch });
    }

    /// Handle one inbound line, writing the reply if there is one.
    pub async fn handle_line(&self, line: &str) {
        if let Some(reply) = self.dispatch(line).await {
            self.send(&reply);
        }
    }

    pub async fn dispatch(&self, line: &str) -> Option<Reply> {
        let inbound = match protocol::parse(line) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "rejected inbound message");
                return Some(Reply::from(e).with_id(protocol::peek_id(line)));
            }
        };

        match inbound {
            Inbound::Fetch(message) => Some(self.fetch(message).await),
            Inbound::Control { id, message } => Some(match self.agent.handle_message(message).await {
                Ok(outcome) => {
                    Reply::Ack { id, message: outcome.message(), stored: outcome.stored(), failed: outcome.failed() }
                }
                Err(e) => Reply::rejected(id, &e),
            }),
            Inbound::WarmUp { id, command } => match self.warmup.send(command) {
                Ok(()) => None,
                Err(_) => Some(Reply::from(ProtocolError::WarmUpStopped).with_id(id)),
            },
        }
    }

    async fn fetch(&self, message: FetchMessage) -> Reply {
        let FetchMessage { id, url, method } = message;
        let request = match self.agent.request(&method, &url) {
            Ok(request) => request,
            Err(e) => return Reply::fetch_failed(id, &e),
        };

        match self.agent.serve(request).await {
            Ok(served) => Reply::response(id, served),
            Err(e) => {
                tracing::debug!(id = %id, url = %url, error = %e, "fetch failed");
                Reply::fetch_failed(id, &e)
            }
        }
    }

    fn send(&self, reply: &Reply) {
        if self.out.send(protocol::encode(reply)).is_err() {
            tracing::warn!("stdout writer has stopped");
        }
    }

    /// Stop warm-up and wait for its last events to be forwarded.
    pub async fn shutdown(self) {
        let Host { warmup, warmup_task, forwarder, .. } = self;
        let _ = warmup.send(WarmUpCommand::Cancel);
        warmup_task.abort();
        if let Err(e) = forwarder.await {
            tracing::warn!(error = %e, "event forwarder ended abnormally");
        }
    }
}

/// Forward warm-up events; record first-launch completion when everything
/// has been downloaded.
async fn forward_events(
    agent: Arc<Agent>, mut events: mpsc::UnboundedReceiver<WarmUpEvent>, out: mpsc::UnboundedSender<String>,
) {
    while let Some(event) = events.recv().await {
        if event == WarmUpEvent::AllComplete {
            agent.db().mark_first_launch_complete().await;
        }
        if out.send(protocol::encode(&event)).is_err() {
            break;
        }
    }
}
