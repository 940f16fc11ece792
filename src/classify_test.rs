use super::*;

fn event(sender: &str, text: &str, requires_input: bool) -> InboundEvent {
    InboundEvent { sender: sender.to_owned(), text: text.to_owned(), requires_input }
}

#[test]
fn control_sender_is_dropped() {
    assert!(classify(event(CONTROL_SENDER, "Enter your response:", false)).is_none());
}

#[test]
fn control_sender_is_dropped_even_when_requesting_input() {
    assert!(classify(event(CONTROL_SENDER, "anything", true)).is_none());
}

#[test]
fn control_sender_match_is_case_sensitive() {
    let classified = classify(event("userproxy", "hello", false)).expect("lowercase sender is not the control role");
    assert_eq!(classified.sender, "userproxy");
}

#[test]
fn requires_input_maps_to_warning_and_keeps_sender() {
    let classified = classify(event("ScientistAgent", "Which topic?", true)).unwrap();
    assert_eq!(classified.severity, Severity::Warning);
    assert_eq!(classified.sender, "ScientistAgent");
    assert_eq!(classified.text, "Which topic?");
}

#[test]
fn plain_event_maps_to_normal() {
    let classified = classify(event("MagenticOneOrchestrator", "Plan:\n1. ...", false)).unwrap();
    assert_eq!(
        classified,
        Classified {
            sender: "MagenticOneOrchestrator".to_owned(),
            text: "Plan:\n1. ...".to_owned(),
            severity: Severity::Normal,
        }
    );
}
