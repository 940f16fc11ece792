//! WebSocket transport sessions.
//!
//! DESIGN
//! ======
//! Each session is one tokio task owning one `tokio-tungstenite` stream. The
//! task never touches chat state: it only posts [`SessionNotice`]s, tagged
//! with the session's generation, into the client event queue. Outbound
//! payloads reach the task through a per-session unbounded channel.
//!
//! A session is terminal. It does not retry; once it reports `Closed` the
//! task has exited and the controller opens a new session if it wants one.
//!
//! ERROR HANDLING
//! ==============
//! Connect failures and timeouts are reported as `Error` followed by
//! `Closed`, mirroring what a browser WebSocket does. Dropping the session's
//! sender (via [`Transport::close`]) ends the task quietly, without events.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ChatError;
use crate::reconnect::Generation;

/// Lifecycle event reported by a transport session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// A [`SessionEvent`] tagged with the generation of the session that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionNotice {
    pub generation: Generation,
    pub event: SessionEvent,
}

/// Connection factory and session operations, keyed by generation.
pub trait Transport {
    /// Start opening a new session. Completion arrives later as an event.
    fn open(&mut self, generation: Generation);
    /// Send one text frame on session `generation`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TransportUnavailable`] when the session is gone.
    fn send(&mut self, generation: Generation, payload: String) -> Result<(), ChatError>;
    /// Release session `generation`. Unknown generations are ignored.
    fn close(&mut self, generation: Generation);
}

/// [`Transport`] backed by `tokio-tungstenite`.
///
/// Events are posted through a weak sender so live sessions do not keep the
/// client event queue open on their own.
pub struct WsTransport<E> {
    url: String,
    connect_timeout: Duration,
    events: mpsc::WeakUnboundedSender<E>,
    sessions: HashMap<Generation, mpsc::UnboundedSender<String>>,
}

impl<E> WsTransport<E>
where
    E: From<SessionNotice> + Send + 'static,
{
    #[must_use]
    pub fn new(url: impl Into<String>, connect_timeout: Duration, events: mpsc::WeakUnboundedSender<E>) -> Self {
        Self { url: url.into(), connect_timeout, events, sessions: HashMap::new() }
    }
}

impl<E> Transport for WsTransport<E>
where
    E: From<SessionNotice> + Send + 'static,
{
    fn open(&mut self, generation: Generation) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.insert(generation, tx);
        tracing::info!(generation, url = %self.url, "opening websocket session");
        tokio::spawn(run_session(self.url.clone(), self.connect_timeout, generation, rx, self.events.clone()));
    }

    fn send(&mut self, generation: Generation, payload: String) -> Result<(), ChatError> {
        let tx = self.sessions.get(&generation).ok_or(ChatError::TransportUnavailable)?;
        tx.send(payload).map_err(|_| ChatError::TransportUnavailable)
    }

    fn close(&mut self, generation: Generation) {
        if self.sessions.remove(&generation).is_some() {
            tracing::debug!(generation, "websocket session released");
        }
    }
}

/// Drive one session from handshake to close.
async fn run_session<E>(
    url: String,
    connect_timeout: Duration,
    generation: Generation,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::WeakUnboundedSender<E>,
) where
    E: From<SessionNotice>,
{
    let emit = |event: SessionEvent| {
        if let Some(tx) = events.upgrade() {
            let _ = tx.send(E::from(SessionNotice { generation, event }));
        }
    };

    let connected = tokio::select! {
        result = tokio::time::timeout(connect_timeout, connect_async(url.as_str())) => result,
        () = released(&mut outbound) => {
            tracing::debug!(generation, "session released before handshake completed");
            return;
        }
    };

    let stream = match connected {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            tracing::warn!(generation, error = %e, "websocket connect failed");
            emit(SessionEvent::Error(e.to_string()));
            emit(SessionEvent::Closed);
            return;
        }
        Err(_) => {
            tracing::warn!(generation, timeout_ms = u64::try_from(connect_timeout.as_millis()).unwrap_or(u64::MAX), "websocket connect timed out");
            emit(SessionEvent::Error(format!("connect timed out after {connect_timeout:?}")));
            emit(SessionEvent::Closed);
            return;
        }
    };

    emit(SessionEvent::Opened);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                let Some(payload) = outgoing else {
                    let _ = write.send(Message::Close(None)).await;
                    tracing::debug!(generation, "session closed locally");
                    return;
                };
                if let Err(e) = write.send(Message::Text(payload.into())).await {
                    tracing::warn!(generation, error = %e, "websocket send failed");
                    emit(SessionEvent::Error(e.to_string()));
                    break;
                }
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => emit(SessionEvent::Message(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(generation, ?frame, "server closed websocket");
                    break;
                }
                Some(Ok(_)) => {
                    tracing::debug!(generation, "ignoring non-text frame");
                }
                Some(Err(e)) => {
                    tracing::warn!(generation, error = %e, "websocket recv error");
                    emit(SessionEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            }
        }
    }

    emit(SessionEvent::Closed);
}

/// Resolves once every sender for this session has been dropped.
async fn released(outbound: &mut mpsc::UnboundedReceiver<String>) {
    while outbound.recv().await.is_some() {}
}
