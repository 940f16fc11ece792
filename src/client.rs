//! Client runtime: the single event queue that drives the controller.
//!
//! DESIGN
//! ======
//! One tokio task owns the [`ChatController`] and drains an unbounded mpsc
//! queue of [`ClientEvent`]s, handling each to completion. Session tasks,
//! the reconnect timer and every [`ChatHandle`] only post events, so all
//! state changes are serialized without locks.
//!
//! Session tasks and the timer hold weak senders. Once every handle is
//! dropped the queue closes and the runtime stops the controller.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::controller::{ChatController, ChatUpdate, ReconnectTimer, SendOutcome};
use crate::error::ChatError;
use crate::message_log::MessageEntry;
use crate::reconnect::{ConnectionState, Generation};
use crate::transport::{SessionNotice, WsTransport};
use crate::upload::UploadResult;

type Reply<T> = oneshot::Sender<T>;

/// Everything the runtime task reacts to.
#[derive(Debug)]
pub enum ClientEvent {
    Session(SessionNotice),
    ReconnectDue(Generation),
    SendText(String, Reply<SendOutcome>),
    Upload(UploadResult, Reply<Result<SendOutcome, ChatError>>),
    Snapshot(Reply<Vec<MessageEntry>>),
    State(Reply<ConnectionState>),
    Subscribe(Reply<broadcast::Receiver<ChatUpdate>>),
    Stop(Reply<()>),
}

impl From<SessionNotice> for ClientEvent {
    fn from(notice: SessionNotice) -> Self {
        Self::Session(notice)
    }
}

/// [`ReconnectTimer`] backed by a sleeping tokio task.
struct TokioReconnectTimer {
    events: mpsc::WeakUnboundedSender<ClientEvent>,
    pending: Option<JoinHandle<()>>,
}

impl ReconnectTimer for TokioReconnectTimer {
    fn schedule(&mut self, generation: Generation, delay: Duration) {
        self.cancel();
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(ClientEvent::ReconnectDue(generation));
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

/// A running chat client.
pub struct ChatClient {
    pub handle: ChatHandle,
    /// Subscribed before `start()`, so it sees the welcome entry.
    pub updates: broadcast::Receiver<ChatUpdate>,
    pub task: JoinHandle<()>,
}

impl ChatClient {
    /// Build the controller, start it, and spawn the runtime task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(config: &ClientConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = WsTransport::new(config.ws_url.clone(), config.connect_timeout, tx.downgrade());
        let timer = TokioReconnectTimer { events: tx.downgrade(), pending: None };

        let mut controller = ChatController::new(transport, timer, config.reconnect);
        let updates = controller.subscribe();
        controller.start();

        let task = tokio::spawn(run(controller, rx));
        Self { handle: ChatHandle { events: tx }, updates, task }
    }
}

async fn run(
    mut controller: ChatController<WsTransport<ClientEvent>, TokioReconnectTimer>,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Session(SessionNotice { generation, event }) => controller.on_session_event(generation, event),
            ClientEvent::ReconnectDue(generation) => controller.on_reconnect_due(generation),
            ClientEvent::SendText(text, reply) => {
                let _ = reply.send(controller.send_user_text(&text));
            }
            ClientEvent::Upload(result, reply) => {
                let _ = reply.send(controller.report_upload_result(result));
            }
            ClientEvent::Snapshot(reply) => {
                let _ = reply.send(controller.snapshot().to_vec());
            }
            ClientEvent::State(reply) => {
                let _ = reply.send(controller.connection_state());
            }
            ClientEvent::Subscribe(reply) => {
                let _ = reply.send(controller.subscribe());
            }
            ClientEvent::Stop(reply) => {
                controller.stop();
                let _ = reply.send(());
                return;
            }
        }
    }
    controller.stop();
}

/// Cloneable front door for the presentation layer.
#[derive(Clone, Debug)]
pub struct ChatHandle {
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl ChatHandle {
    pub async fn send_user_text(&self, text: impl Into<String>) -> Result<SendOutcome, ChatError> {
        let text = text.into();
        self.request(|reply| ClientEvent::SendText(text, reply)).await
    }

    pub async fn report_upload_result(&self, result: UploadResult) -> Result<SendOutcome, ChatError> {
        self.request(|reply| ClientEvent::Upload(result, reply)).await?
    }

    pub async fn snapshot(&self) -> Result<Vec<MessageEntry>, ChatError> {
        self.request(ClientEvent::Snapshot).await
    }

    pub async fn connection_state(&self) -> Result<ConnectionState, ChatError> {
        self.request(ClientEvent::State).await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<ChatUpdate>, ChatError> {
        self.request(ClientEvent::Subscribe).await
    }

    /// Stop the controller and end the runtime task.
    pub async fn stop(&self) -> Result<(), ChatError> {
        self.request(ClientEvent::Stop).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> ClientEvent) -> Result<T, ChatError> {
        let (reply, response) = oneshot::channel();
        self.events.send(make(reply)).map_err(|_| ChatError::ClientStopped)?;
        response.await.map_err(|_| ChatError::ClientStopped)
    }
}
