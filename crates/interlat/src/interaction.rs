// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Interactions and the lifecycle updates emitted for them.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::event::SentEvent;
use crate::trigger::InteractionTrigger;

/// An application-defined marker for a unit of user-observable work.
///
/// The value carries no lifecycle state; the engine tracks that.
pub trait Interaction: Any + fmt::Debug {
    /// Human-readable description, used for trace labels and reports.
    fn description(&self) -> String {
        format!("{self:?}")
    }
}

impl dyn Interaction {
    /// Downcast to a concrete interaction type.
    pub fn downcast_ref<T: Interaction>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Whether the interaction is of type `T`.
    pub fn is<T: Interaction>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }
}

/// Engine-assigned identity of a tracked interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionId(u64);

static NEXT_INTERACTION: AtomicU64 = AtomicU64::new(1);

impl InteractionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INTERACTION.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of a tracked interaction at the moment an update was emitted.
#[derive(Clone)]
pub struct InteractionSnapshot {
    pub id: InteractionId,
    pub interaction: Rc<dyn Interaction>,
    pub trigger: Option<Rc<InteractionTrigger>>,
    pub sent_events: Vec<SentEvent>,
}

impl InteractionSnapshot {
    /// The event that started the interaction.
    pub fn first_event(&self) -> Option<&SentEvent> {
        self.sent_events.first()
    }

    /// The most recently recorded event.
    pub fn last_event(&self) -> Option<&SentEvent> {
        self.sent_events.last()
    }

    /// Description of the interaction value.
    pub fn description(&self) -> String {
        self.interaction.description()
    }

    /// Time from the starting event to `frame_uptime`.
    pub fn display_duration(&self, frame_uptime: Duration) -> Option<Duration> {
        self.first_event()
            .map(|event| frame_uptime.saturating_sub(event.uptime()))
    }

    /// Time from the trigger's cause to `frame_uptime`.
    pub fn trigger_duration(&self, frame_uptime: Duration) -> Option<Duration> {
        self.trigger
            .as_ref()
            .map(|trigger| frame_uptime.saturating_sub(trigger.start_uptime()))
    }
}

impl fmt::Debug for InteractionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionSnapshot")
            .field("id", &self.id)
            .field("interaction", &self.interaction)
            .field("trigger", &self.trigger.as_ref().map(|t| t.name()))
            .field("sent_events", &self.sent_events.len())
            .finish()
    }
}

/// Lifecycle update delivered to the client listener.
///
/// Every tracked interaction gets one `Start`, any number of `RecordEvent`s,
/// at most one `Finish`, and then exactly one terminal update
/// (`CancelOnEvent`, `CancelOnTimeout`, `CancelOnRuleRemoved` or `Rendered`).
#[derive(Clone, Debug)]
pub enum InteractionUpdate {
    Start {
        interaction: InteractionSnapshot,
        event: SentEvent,
    },
    RecordEvent {
        interaction: InteractionSnapshot,
        event: SentEvent,
    },
    CancelOnEvent {
        interaction: InteractionSnapshot,
        event: SentEvent,
        reason: String,
    },
    CancelOnTimeout {
        interaction: InteractionSnapshot,
        timeout: Duration,
    },
    CancelOnRuleRemoved {
        interaction: InteractionSnapshot,
    },
    Finish {
        interaction: InteractionSnapshot,
        event: SentEvent,
    },
    Rendered {
        interaction: InteractionSnapshot,
        frame_uptime: Duration,
    },
}

impl InteractionUpdate {
    /// The interaction this update is about.
    pub fn interaction(&self) -> &InteractionSnapshot {
        match self {
            Self::Start { interaction, .. }
            | Self::RecordEvent { interaction, .. }
            | Self::CancelOnEvent { interaction, .. }
            | Self::CancelOnTimeout { interaction, .. }
            | Self::CancelOnRuleRemoved { interaction }
            | Self::Finish { interaction, .. }
            | Self::Rendered { interaction, .. } => interaction,
        }
    }

    /// The event that caused this update, when one did.
    pub fn event(&self) -> Option<&SentEvent> {
        match self {
            Self::Start { event, .. }
            | Self::RecordEvent { event, .. }
            | Self::CancelOnEvent { event, .. }
            | Self::Finish { event, .. } => Some(event),
            Self::CancelOnTimeout { .. }
            | Self::CancelOnRuleRemoved { .. }
            | Self::Rendered { .. } => None,
        }
    }

    /// Whether no further updates follow for this interaction.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CancelOnEvent { .. }
                | Self::CancelOnTimeout { .. }
                | Self::CancelOnRuleRemoved { .. }
                | Self::Rendered { .. }
        )
    }

    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::RecordEvent { .. } => "record_event",
            Self::CancelOnEvent { .. } => "cancel_on_event",
            Self::CancelOnTimeout { .. } => "cancel_on_timeout",
            Self::CancelOnRuleRemoved { .. } => "cancel_on_rule_removed",
            Self::Finish { .. } => "finish",
            Self::Rendered { .. } => "rendered",
        }
    }

    /// For `Rendered`, time from the starting event to the frame.
    pub fn display_duration(&self) -> Option<Duration> {
        match self {
            Self::Rendered {
                interaction,
                frame_uptime,
            } => interaction.display_duration(*frame_uptime),
            _ => None,
        }
    }
}

/// Rule-authoring mistakes that happen in production and are reported rather
/// than thrown.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("interaction key '{key}' is already running ({previous}); the previous interaction was canceled")]
    DuplicateKey {
        key: String,
        previous: InteractionId,
    },

    #[error("no running interaction for key '{key}'")]
    MissingKey { key: String },

    #[error("rule has {limit} running interactions; canceled the oldest ({canceled})")]
    CapacityExceeded {
        limit: usize,
        canceled: InteractionId,
    },
}

#[cfg(test)]
#[path = "interaction_tests.rs"]
mod tests;
