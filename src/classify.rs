//! Inbound event classification.

use crate::message_log::Severity;
use crate::wire::InboundEvent;

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;

/// Backend role that prompts for human input. Its events are never shown.
pub const CONTROL_SENDER: &str = "UserProxy";

/// A log entry that has not been appended yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub sender: String,
    pub text: String,
    pub severity: Severity,
}

/// Map an inbound event to at most one log entry.
#[must_use]
pub fn classify(event: InboundEvent) -> Option<Classified> {
    if event.sender == CONTROL_SENDER {
        return None;
    }

    let severity = if event.requires_input { Severity::Warning } else { Severity::Normal };
    Some(Classified { sender: event.sender, text: event.text, severity })
}
