//! Reconnection policy.
//!
//! DESIGN
//! ======
//! A small state machine over [`ConnectionState`]. Every session the policy
//! starts gets a fresh [`Generation`]; lifecycle events are only accepted
//! for the current one, which is how late events from a replaced session
//! get discarded.
//!
//! Losing a session yields exactly one retry delay. The default is a fixed
//! delay retried forever. `Backoff::Exponential` doubles the delay per
//! consecutive failure up to a cap and resets after a successful open.

use std::time::Duration;

use serde::Serialize;

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod tests;

/// Tag distinguishing the current transport session from superseded ones.
pub type Generation = u64;

pub const STATUS_CONNECTED: &str = "Connected to backend";
pub const STATUS_DISCONNECTED: &str = "Disconnected from backend";
pub const STATUS_TRANSPORT_ERROR: &str = "Connection error with backend";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session is open. A retry may be pending.
    #[default]
    Disconnected,
    /// A session was created and its handshake is in progress.
    Connecting,
    /// The current session is open.
    Connected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential {
        max: Duration,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectSettings {
    /// Delay before the first retry after a loss.
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self { delay: Duration::from_secs(3), backoff: Backoff::Fixed }
    }
}

#[derive(Debug)]
pub struct ReconnectPolicy {
    settings: ReconnectSettings,
    state: ConnectionState,
    generation: Generation,
    /// Losses since the last successful open.
    failures: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(settings: ReconnectSettings) -> Self {
        Self { settings, state: ConnectionState::Disconnected, generation: 0, failures: 0 }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    /// Move to `Connecting` under a new generation and return it.
    pub fn begin_attempt(&mut self) -> Generation {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.generation
    }

    /// Record that session `generation` opened. Returns `false` for stale or
    /// duplicate events.
    pub fn on_open(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.failures = 0;
        true
    }

    /// Record that session `generation` closed or errored.
    ///
    /// Returns the delay before the next attempt, or `None` when the event is
    /// stale or the loss was already recorded.
    pub fn on_lost(&mut self, generation: Generation) -> Option<Duration> {
        if !self.is_current(generation) || self.state == ConnectionState::Disconnected {
            return None;
        }
        self.state = ConnectionState::Disconnected;
        let delay = self.retry_delay();
        self.failures = self.failures.saturating_add(1);
        Some(delay)
    }

    /// Whether a retry scheduled for lost session `generation` should run.
    #[must_use]
    pub fn should_retry(&self, generation: Generation) -> bool {
        self.is_current(generation) && self.state == ConnectionState::Disconnected
    }

    /// Drop the current session without scheduling anything. Every event
    /// tagged with an older generation becomes stale.
    pub fn halt(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
    }

    fn retry_delay(&self) -> Duration {
        match self.settings.backoff {
            Backoff::Fixed => self.settings.delay,
            Backoff::Exponential { max } => {
                let factor = 1_u32 << self.failures.min(16);
                self.settings.delay.saturating_mul(factor).min(max)
            }
        }
    }
}
