//! Chat controller: owns the transport session, reconnection policy and log.
//!
//! DESIGN
//! ======
//! The controller is a synchronous state machine. Every method runs to
//! completion and is called from a single event queue (see `client`), so no
//! locking is needed. Side effects leave through two seams:
//! - [`Transport`] opens, feeds and releases sessions.
//! - [`ReconnectTimer`] delivers a delayed `on_reconnect_due` call.
//!
//! Observers subscribe to [`ChatUpdate`]s over a broadcast channel and read
//! the full log through `snapshot()`.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here fails the caller except an upload failure, which is handed
//! back instead of being written to the log. Every other problem becomes a
//! status entry, a dropped event, or a scheduled retry.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::classify::classify;
use crate::error::ChatError;
use crate::message_log::{MessageEntry, MessageLog, STATUS_SENDER, SYSTEM_SENDER, Severity, USER_SENDER};
use crate::reconnect::{
    ConnectionState, Generation, ReconnectPolicy, ReconnectSettings, STATUS_CONNECTED, STATUS_DISCONNECTED,
    STATUS_TRANSPORT_ERROR,
};
use crate::transport::{SessionEvent, Transport};
use crate::upload::{UploadResult, upload_prompt};
use crate::wire::{decode_inbound, encode_outbound};

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

pub const WELCOME_TEXT: &str = "Hello! How can I assist you today?";
pub const NOT_DELIVERED_TEXT: &str = "Not connected to backend. Please wait for reconnection.";

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Schedules a single delayed reconnection attempt.
pub trait ReconnectTimer {
    /// Arrange for `on_reconnect_due(generation)` after `delay`, replacing any
    /// pending attempt.
    fn schedule(&mut self, generation: Generation, delay: Duration);
    /// Drop the pending attempt, if any.
    fn cancel(&mut self);
}

/// Change notification for observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatUpdate {
    Appended(MessageEntry),
    ConnectionChanged(ConnectionState),
}

/// What happened to a user turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was recorded.
    Ignored,
    /// Recorded and handed to the transport.
    Sent,
    /// Recorded locally, but no session was open to carry it.
    NotConnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

pub struct ChatController<T, R> {
    transport: T,
    timer: R,
    policy: ReconnectPolicy,
    log: MessageLog,
    updates: broadcast::Sender<ChatUpdate>,
    phase: Phase,
}

impl<T: Transport, R: ReconnectTimer> ChatController<T, R> {
    #[must_use]
    pub fn new(transport: T, timer: R, settings: ReconnectSettings) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            transport,
            timer,
            policy: ReconnectPolicy::new(settings),
            log: MessageLog::new(),
            updates,
            phase: Phase::Idle,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> &[MessageEntry] {
        self.log.snapshot()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.policy.state()
    }

    /// Seed the welcome entry and open the first session. Only the first call
    /// has an effect.
    pub fn start(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        self.phase = Phase::Running;
        self.append(WELCOME_TEXT, SYSTEM_SENDER, Severity::Normal);
        self.connect();
    }

    /// Record a user turn and forward it when a session is open. Ignored
    /// before [`ChatController::start`] so the welcome entry keeps id 1.
    pub fn send_user_text(&mut self, text: &str) -> SendOutcome {
        if self.phase == Phase::Idle || text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        self.append(text, USER_SENDER, Severity::Normal);

        if self.policy.state() == ConnectionState::Connected {
            match self.transport.send(self.policy.generation(), encode_outbound(text)) {
                Ok(()) => return SendOutcome::Sent,
                Err(e) => tracing::warn!(error = %e, "transport refused outbound message"),
            }
        }

        self.append(NOT_DELIVERED_TEXT, STATUS_SENDER, Severity::Error);
        SendOutcome::NotConnected
    }

    /// Turn a finished upload into a user turn.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UploadFailed`] for failed uploads; the log is left
    /// untouched in that case.
    pub fn report_upload_result(&mut self, result: UploadResult) -> Result<SendOutcome, ChatError> {
        match result {
            UploadResult::Uploaded { filename, media, .. } => Ok(self.send_user_text(&upload_prompt(&filename, media))),
            UploadResult::Failed { error } => {
                tracing::warn!(%error, "upload failed");
                Err(ChatError::UploadFailed(error))
            }
        }
    }

    /// Handle a lifecycle event from session `generation`.
    pub fn on_session_event(&mut self, generation: Generation, event: SessionEvent) {
        if self.phase != Phase::Running || !self.policy.is_current(generation) {
            tracing::debug!(generation, current = self.policy.generation(), "dropping stale session event");
            return;
        }

        match event {
            SessionEvent::Opened => {
                if self.policy.on_open(generation) {
                    tracing::info!(generation, "connected to backend");
                    self.notify_state();
                    self.append(STATUS_CONNECTED, STATUS_SENDER, Severity::Success);
                }
            }
            SessionEvent::Message(raw) => self.on_inbound(&raw),
            SessionEvent::Error(detail) => {
                if self.policy.state() == ConnectionState::Disconnected {
                    return;
                }
                tracing::warn!(generation, %detail, "transport error");
                self.append(STATUS_TRANSPORT_ERROR, STATUS_SENDER, Severity::Error);
                self.on_lost(generation, &detail);
            }
            SessionEvent::Closed => self.on_lost(generation, "closed"),
        }
    }

    /// Decode, classify and record one inbound payload.
    pub fn on_inbound(&mut self, raw: &str) {
        let event = match decode_inbound(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping inbound payload");
                return;
            }
        };

        match classify(event) {
            Some(entry) => {
                self.append(entry.text, entry.sender, entry.severity);
            }
            None => tracing::debug!("control sender event filtered"),
        }
    }

    /// Timer callback for a reconnection scheduled when session `generation` was lost.
    pub fn on_reconnect_due(&mut self, generation: Generation) {
        if self.phase != Phase::Running || !self.policy.should_retry(generation) {
            tracing::debug!(generation, "ignoring stale reconnect");
            return;
        }
        self.connect();
    }

    /// Release the current session, cancel any pending retry, and ignore all
    /// later session events.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        let previous = self.policy.state();
        self.transport.close(self.policy.generation());
        self.timer.cancel();
        self.policy.halt();
        self.phase = Phase::Stopped;
        tracing::info!("chat controller stopped");
        if previous != ConnectionState::Disconnected {
            self.notify_state();
        }
    }

    fn connect(&mut self) {
        let generation = self.policy.begin_attempt();
        self.notify_state();
        self.transport.open(generation);
    }

    fn on_lost(&mut self, generation: Generation, reason: &str) {
        let Some(delay) = self.policy.on_lost(generation) else {
            return;
        };
        let lost = ChatError::ConnectionLost(reason.to_owned());
        let retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(generation, error = %lost, retry_in_ms, "disconnected from backend");
        self.transport.close(generation);
        self.notify_state();
        self.append(STATUS_DISCONNECTED, STATUS_SENDER, Severity::Error);
        self.timer.schedule(generation, delay);
    }

    fn append(&mut self, text: impl Into<String>, sender: impl Into<String>, severity: Severity) {
        let entry = self.log.append(text, sender, severity).clone();
        // No subscribers is fine.
        let _ = self.updates.send(ChatUpdate::Appended(entry));
    }

    fn notify_state(&self) {
        let _ = self.updates.send(ChatUpdate::ConnectionChanged(self.policy.state()));
    }
}
