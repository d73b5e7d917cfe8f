// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use super::*;
use crate::time::FakeClock;
use crate::trace::RecordingTraceSink;

fn sinks() -> (Rc<RecordingTraceSink>, Rc<dyn TraceSink>) {
    let recorder = Rc::new(RecordingTraceSink::new());
    let sink: Rc<dyn TraceSink> = recorder.clone();
    (recorder, sink)
}

#[test]
fn test_trigger_now_uses_clock_and_opens_span() {
    let clock = FakeClock::at_millis(250);
    let (recorder, sink) = sinks();
    let trigger = InteractionTrigger::now("refresh", &clock, &sink);

    assert_eq!(trigger.start_uptime(), Duration::from_millis(250));
    assert_eq!(
        trigger.kind(),
        &TriggerKind::Custom {
            name: "refresh".into()
        }
    );
    assert_eq!(trigger.name(), "refresh");
    assert!(trigger.has_trace());
    assert_eq!(recorder.open_sections(), vec!["refresh".to_string()]);
}

#[test]
fn test_input_trigger_starts_at_event_time() {
    let clock = FakeClock::at_millis(120);
    let (_, sink) = sinks();
    let trigger = InteractionTrigger::from_input(
        InputEvent::Motion {
            action: MotionAction::Up,
            x: 1.0,
            y: 2.0,
        },
        Duration::from_millis(100),
        &clock,
        &sink,
    );

    assert_eq!(trigger.start_uptime(), Duration::from_millis(100));
    match trigger.kind() {
        TriggerKind::Input(delivered) => {
            assert_eq!(delivered.delivery_uptime, Duration::from_millis(120));
            assert_eq!(delivered.delivery_latency(), Duration::from_millis(20));
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(trigger.name(), "motion Up");
}

#[test]
fn test_identity_differs_for_equal_contents() {
    let a = InteractionTrigger::unknown(Duration::from_millis(5));
    let b = InteractionTrigger::unknown(Duration::from_millis(5));
    assert_ne!(a.id(), b.id());
    assert_eq!(a.kind(), b.kind());
}

#[test]
fn test_trace_taken_over_once() {
    let clock = FakeClock::at_zero();
    let (recorder, sink) = sinks();
    let trigger = InteractionTrigger::from_input(
        InputEvent::Key {
            key_code: 66,
            action: KeyAction::Down,
        },
        Duration::ZERO,
        &clock,
        &sink,
    );

    let span = trigger.take_over_trace();
    assert!(span.is_some());
    assert!(trigger.take_over_trace().is_none());
    assert!(!trigger.has_trace());

    drop(span);
    drop(trigger);
    assert_eq!(recorder.end_count("key Down 66"), 1);
}

#[test]
fn test_unknown_trigger_has_no_trace() {
    let trigger = InteractionTrigger::unknown(Duration::ZERO);
    assert!(!trigger.has_trace());
    assert_eq!(trigger.name(), "unknown");
}
