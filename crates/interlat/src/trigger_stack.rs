// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Stack of causes active during nested dispatch.
//!
//! The stack is a list, not a set: distinct trigger instances with equal
//! contents coexist. Entries are removed by identity ([`TriggerId`]).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::trigger::{InteractionTrigger, TriggerId};

/// Per-context stack of active triggers. Clones share the same stack.
#[derive(Clone, Default)]
pub struct TriggerStack {
    entries: Rc<RefCell<Vec<Rc<InteractionTrigger>>>>,
}

impl TriggerStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `block` with `trigger` pushed, popping it afterwards.
    ///
    /// The pop runs on every exit path, including unwinding out of `block`.
    /// When `end_trace_after_block` is set, the trigger's trace span is ended
    /// at the same time unless something already took it over.
    ///
    /// # Panics
    ///
    /// Panics if this exact instance is already on the stack.
    pub fn triggered_by<T>(
        &self,
        trigger: Rc<InteractionTrigger>,
        end_trace_after_block: bool,
        block: impl FnOnce() -> T,
    ) -> T {
        self.push_triggered_by(Rc::clone(&trigger));
        let _scope = ScopedTrigger {
            stack: self,
            trigger,
            end_trace: end_trace_after_block,
        };
        block()
    }

    /// Push without a scope, for causes that must outlive the current call.
    ///
    /// # Panics
    ///
    /// Panics if this exact instance is already on the stack: a trigger has a
    /// single active scope.
    pub fn push_triggered_by(&self, trigger: Rc<InteractionTrigger>) {
        let mut entries = self.entries.borrow_mut();
        assert!(
            !entries.iter().any(|t| t.id() == trigger.id()),
            "trigger {:?} ({}) is already on the trigger stack",
            trigger.id(),
            trigger.name()
        );
        entries.push(trigger);
    }

    /// Pop a trigger pushed with [`push_triggered_by`](Self::push_triggered_by).
    ///
    /// Popping a trigger that is not on the stack is a no-op.
    pub fn pop_triggered_by(&self, trigger: &InteractionTrigger) {
        self.remove(trigger.id());
    }

    /// The active trigger with the smallest start time.
    ///
    /// Ties resolve to the outermost entry.
    pub fn earliest_interaction_trigger(&self) -> Option<Rc<InteractionTrigger>> {
        let entries = self.entries.borrow();
        let mut earliest: Option<&Rc<InteractionTrigger>> = None;
        for trigger in entries.iter() {
            if earliest.is_none_or(|e| trigger.start_uptime() < e.start_uptime()) {
                earliest = Some(trigger);
            }
        }
        earliest.cloned()
    }

    /// Snapshot of the stack, outermost first. Not live.
    pub fn current_triggers(&self) -> Vec<Rc<InteractionTrigger>> {
        self.entries.borrow().clone()
    }

    /// Whether no trigger is active.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of active triggers.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    fn remove(&self, id: TriggerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().rposition(|t| t.id() == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TriggerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.borrow().iter().map(|t| t.name()))
            .finish()
    }
}

struct ScopedTrigger<'a> {
    stack: &'a TriggerStack,
    trigger: Rc<InteractionTrigger>,
    end_trace: bool,
}

impl Drop for ScopedTrigger<'_> {
    fn drop(&mut self) {
        self.stack.remove(self.trigger.id());
        if self.end_trace {
            if let Some(span) = self.trigger.take_over_trace() {
                span.end();
            }
        }
    }
}

#[cfg(test)]
#[path = "trigger_stack_tests.rs"]
mod tests;
