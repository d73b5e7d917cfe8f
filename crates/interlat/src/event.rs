// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Application events fed to interaction rules.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// An application-defined event.
///
/// The concrete type decides which rule callbacks see the event. Model a
/// family of related events as an enum and subscribe to the enum.
pub trait InteractionEvent: Any + fmt::Debug {}

impl dyn InteractionEvent {
    /// Downcast to a concrete event type.
    pub fn downcast_ref<T: InteractionEvent>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Whether the event is of type `T`.
    pub fn is<T: InteractionEvent>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// Runtime type id of the concrete event.
    pub fn concrete_type_id(&self) -> TypeId {
        (self as &dyn Any).type_id()
    }
}

/// An event together with the time it was sent.
///
/// The send time is captured once at the client boundary. Clones share the
/// same event instance, so recording a clone counts as the same event.
#[derive(Clone)]
pub struct SentEvent {
    event: Rc<dyn InteractionEvent>,
    uptime: Duration,
}

impl SentEvent {
    /// Pair an event with its send time.
    pub fn new(event: Rc<dyn InteractionEvent>, uptime: Duration) -> Self {
        Self { event, uptime }
    }

    /// The event.
    pub fn event(&self) -> &(dyn InteractionEvent + 'static) {
        &*self.event
    }

    /// Downcast the event to a concrete type.
    pub fn get<T: InteractionEvent>(&self) -> Option<&T> {
        self.event().downcast_ref::<T>()
    }

    /// When the event was sent.
    pub fn uptime(&self) -> Duration {
        self.uptime
    }

    /// Whether both refer to the same event instance.
    pub fn same_event(&self, other: &SentEvent) -> bool {
        Rc::ptr_eq(&self.event, &other.event)
    }

    /// Debug rendering of the event, for logs and captures.
    pub fn describe(&self) -> String {
        format!("{:?}", self.event)
    }
}

impl fmt::Debug for SentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentEvent")
            .field("event", &self.event)
            .field("uptime", &self.uptime)
            .finish()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
