// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery of lifecycle updates to the client listener.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::interaction::{InteractionUpdate, UsageError};

/// Receives the update stream of one client, on the looper thread.
///
/// Implementations must not block. They may call back into the client; any
/// updates that causes are delivered after the current call returns.
pub trait InteractionUpdateListener {
    /// Called for every lifecycle update, in emission order.
    fn on_update(&self, update: &InteractionUpdate);

    /// Called for rule-authoring mistakes reported as data.
    fn on_usage_error(&self, error: &UsageError) {
        tracing::warn!(%error, "interaction usage error");
    }
}

impl<F> InteractionUpdateListener for F
where
    F: Fn(&InteractionUpdate),
{
    fn on_update(&self, update: &InteractionUpdate) {
        self(update)
    }
}

/// Listener used when none is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingListener;

impl InteractionUpdateListener for LoggingListener {
    fn on_update(&self, update: &InteractionUpdate) {
        tracing::debug!(
            kind = update.kind(),
            id = %update.interaction().id,
            interaction = %update.interaction().description(),
            "interaction update"
        );
    }
}

enum Notification {
    Update(InteractionUpdate),
    UsageError(UsageError),
}

/// FIFO in front of the listener.
///
/// The outermost `emit` drains the queue; nested emits only enqueue, so the
/// listener sees updates in emission order and is never re-entered.
pub(crate) struct Notifier {
    listener: Rc<dyn InteractionUpdateListener>,
    queue: RefCell<VecDeque<Notification>>,
    delivering: Cell<bool>,
}

impl Notifier {
    pub(crate) fn new(listener: Rc<dyn InteractionUpdateListener>) -> Self {
        Self {
            listener,
            queue: RefCell::new(VecDeque::new()),
            delivering: Cell::new(false),
        }
    }

    pub(crate) fn update(&self, update: InteractionUpdate) {
        tracing::debug!(
            kind = update.kind(),
            id = %update.interaction().id,
            interaction = %update.interaction().description(),
            "emit"
        );
        self.emit(Notification::Update(update));
    }

    pub(crate) fn usage_error(&self, error: UsageError) {
        self.emit(Notification::UsageError(error));
    }

    fn emit(&self, notification: Notification) {
        self.queue.borrow_mut().push_back(notification);
        if self.delivering.replace(true) {
            return;
        }
        let _delivering = Delivering {
            flag: &self.delivering,
        };
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(Notification::Update(update)) => self.listener.on_update(&update),
                Some(Notification::UsageError(error)) => self.listener.on_usage_error(&error),
                None => break,
            }
        }
    }
}

/// Clears the delivering flag even if the listener unwinds.
struct Delivering<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
