// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Causal origins of interactions.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::time::Clock;
use crate::trace::{TakeOverTrace, TraceSink, TraceSpan};

/// Identity of a trigger instance.
///
/// Two triggers with equal contents are still distinct instances; the trigger
/// stack pushes and pops by this token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(u64);

static NEXT_TRIGGER: AtomicU64 = AtomicU64::new(1);

impl TriggerId {
    fn next() -> Self {
        Self(NEXT_TRIGGER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Key action of a delivered key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

/// Action of a delivered pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// Raw input as delivered by the platform.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Key { key_code: u32, action: KeyAction },
    Motion { action: MotionAction, x: f32, y: f32 },
}

impl InputEvent {
    fn trace_name(&self) -> String {
        match self {
            Self::Key { key_code, action } => format!("key {action:?} {key_code}"),
            Self::Motion { action, .. } => format!("motion {action:?}"),
        }
    }
}

/// An input event together with its timing.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveredInput {
    pub input: InputEvent,
    /// When the platform produced the input.
    pub event_uptime: Duration,
    /// When the application started dispatching it.
    pub delivery_uptime: Duration,
}

impl DeliveredInput {
    /// Time the input spent queued before dispatch started.
    pub fn delivery_latency(&self) -> Duration {
        self.delivery_uptime.saturating_sub(self.event_uptime)
    }
}

/// What kind of cause a trigger represents.
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerKind {
    Input(DeliveredInput),
    Custom { name: String },
    Unknown,
}

/// The causal origin of an interaction.
pub struct InteractionTrigger {
    id: TriggerId,
    start_uptime: Duration,
    kind: TriggerKind,
    trace: TakeOverTrace,
}

impl InteractionTrigger {
    /// Build a trigger from its parts.
    pub fn new(start_uptime: Duration, kind: TriggerKind, trace: Option<TraceSpan>) -> Rc<Self> {
        Rc::new(Self {
            id: TriggerId::next(),
            start_uptime,
            kind,
            trace: trace.map(TakeOverTrace::new).unwrap_or_default(),
        })
    }

    /// A custom trigger starting now, with an open trace span named after it.
    pub fn now(name: impl Into<String>, clock: &dyn Clock, sink: &Rc<dyn TraceSink>) -> Rc<Self> {
        let name = name.into();
        let span = TraceSpan::begin(sink, name.clone());
        Self::new(clock.now(), TriggerKind::Custom { name }, Some(span))
    }

    /// A trigger for input whose dispatch is starting now.
    ///
    /// The trigger starts at the input's event time and owns a dispatch span
    /// that ends either when dispatch completes or when an interaction takes
    /// it over, whichever claims it first.
    pub fn from_input(
        input: InputEvent,
        event_uptime: Duration,
        clock: &dyn Clock,
        sink: &Rc<dyn TraceSink>,
    ) -> Rc<Self> {
        let span = TraceSpan::begin(sink, input.trace_name());
        let delivered = DeliveredInput {
            input,
            event_uptime,
            delivery_uptime: clock.now(),
        };
        Self::new(event_uptime, TriggerKind::Input(delivered), Some(span))
    }

    /// A trigger with no known cause.
    pub fn unknown(start_uptime: Duration) -> Rc<Self> {
        Self::new(start_uptime, TriggerKind::Unknown, None)
    }

    /// Identity token.
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// When the cause happened.
    pub fn start_uptime(&self) -> Duration {
        self.start_uptime
    }

    /// The cause.
    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    /// Short human-readable name.
    pub fn name(&self) -> String {
        match &self.kind {
            TriggerKind::Input(delivered) => delivered.input.trace_name(),
            TriggerKind::Custom { name } => name.clone(),
            TriggerKind::Unknown => "unknown".to_string(),
        }
    }

    /// Claim this trigger's trace span. Only the first caller gets it.
    pub fn take_over_trace(&self) -> Option<TraceSpan> {
        self.trace.take_over()
    }

    /// Whether the trace span is still unclaimed.
    pub fn has_trace(&self) -> bool {
        self.trace.is_available()
    }
}

impl fmt::Debug for InteractionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionTrigger")
            .field("id", &self.id)
            .field("start_uptime", &self.start_uptime)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
