// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use super::*;
use crate::event::InteractionEvent;

#[derive(Debug)]
struct OpenProfile;
impl Interaction for OpenProfile {}

#[derive(Debug)]
struct Checkout {
    items: usize,
}
impl Interaction for Checkout {
    fn description(&self) -> String {
        format!("checkout ({} items)", self.items)
    }
}

#[derive(Debug)]
struct Tap;
impl InteractionEvent for Tap {}

fn snapshot(events_at: &[u64]) -> InteractionSnapshot {
    InteractionSnapshot {
        id: InteractionId::next(),
        interaction: Rc::new(OpenProfile),
        trigger: None,
        sent_events: events_at
            .iter()
            .map(|ms| SentEvent::new(Rc::new(Tap), Duration::from_millis(*ms)))
            .collect(),
    }
}

#[test]
fn test_default_description_is_debug() {
    assert_eq!(OpenProfile.description(), "OpenProfile");
    assert_eq!(Checkout { items: 2 }.description(), "checkout (2 items)");
}

#[test]
fn test_downcast_interaction() {
    let interaction: Rc<dyn Interaction> = Rc::new(Checkout { items: 3 });
    assert_eq!(interaction.downcast_ref::<Checkout>().unwrap().items, 3);
    assert!(!interaction.is::<OpenProfile>());
}

#[test]
fn test_ids_are_unique_and_ordered() {
    let a = InteractionId::next();
    let b = InteractionId::next();
    assert!(b > a);
    assert_eq!(format!("{a}"), format!("#{}", a.get()));
}

#[test]
fn test_snapshot_first_and_last_events() {
    let snap = snapshot(&[10, 20, 30]);
    assert_eq!(snap.first_event().unwrap().uptime(), Duration::from_millis(10));
    assert_eq!(snap.last_event().unwrap().uptime(), Duration::from_millis(30));
}

#[test]
fn test_display_duration_from_first_event() {
    let snap = snapshot(&[100, 150]);
    assert_eq!(
        snap.display_duration(Duration::from_millis(216)),
        Some(Duration::from_millis(116))
    );
    assert_eq!(snapshot(&[]).display_duration(Duration::from_millis(5)), None);
}

#[test]
fn test_trigger_duration() {
    let mut snap = snapshot(&[100]);
    assert_eq!(snap.trigger_duration(Duration::from_millis(200)), None);
    snap.trigger = Some(crate::trigger::InteractionTrigger::unknown(
        Duration::from_millis(40),
    ));
    assert_eq!(
        snap.trigger_duration(Duration::from_millis(200)),
        Some(Duration::from_millis(160))
    );
}

#[test]
fn test_update_accessors() {
    let snap = snapshot(&[0]);
    let event = snap.first_event().unwrap().clone();
    let start = InteractionUpdate::Start {
        interaction: snap.clone(),
        event,
    };
    assert_eq!(start.kind(), "start");
    assert!(!start.is_terminal());
    assert!(start.event().is_some());

    let rendered = InteractionUpdate::Rendered {
        interaction: snap.clone(),
        frame_uptime: Duration::from_millis(16),
    };
    assert!(rendered.is_terminal());
    assert!(rendered.event().is_none());
    assert_eq!(rendered.display_duration(), Some(Duration::from_millis(16)));
    assert_eq!(rendered.interaction().id, snap.id);

    let timeout = InteractionUpdate::CancelOnTimeout {
        interaction: snap,
        timeout: Duration::from_secs(1),
    };
    assert!(timeout.is_terminal());
    assert_eq!(timeout.display_duration(), None);
}

#[test]
fn test_usage_error_messages() {
    let err = UsageError::MissingKey {
        key: "checkout".into(),
    };
    assert_eq!(err.to_string(), "no running interaction for key 'checkout'");
}
