// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Interaction rule engine.
//!
//! One [`RuleEngine`] runs per registered rule. It owns the rule's running and
//! finishing interactions and drives each through its lifecycle:
//!
//! ```text
//! (none) --start--> Running --finish--> Finishing --frame rendered--> Rendered
//! Running --cancel / timeout--> Canceled
//! Running | Finishing --rule removed--> Canceled
//! ```
//!
//! Leaving `Running` by any path disarms the cancel timer first, so a late
//! timeout can never cancel an interaction twice.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::event::{InteractionEvent, SentEvent};
use crate::frame::FrameSynchronizer;
use crate::interaction::{
    Interaction, InteractionId, InteractionSnapshot, InteractionUpdate, UsageError,
};
use crate::listener::Notifier;
use crate::looper::{Looper, TimerToken};
use crate::trace::{TraceSink, TraceSpan};
use crate::trigger::InteractionTrigger;
use crate::trigger_stack::TriggerStack;

/// Cancel reason used when a keyed start replaces a running interaction.
pub const REPLACED_REASON: &str = "replaced";

/// Cancel reason used when a rule is over its running-interaction limit.
pub const CAPACITY_REASON: &str = "capacity exceeded";

/// Collaborators shared by every engine of a client.
pub(crate) struct EngineContext {
    pub(crate) looper: Looper,
    pub(crate) frames: FrameSynchronizer,
    pub(crate) trace_sink: Rc<dyn TraceSink>,
    pub(crate) trigger_stack: TriggerStack,
    pub(crate) notifier: Notifier,
    pub(crate) default_cancel_timeout: Duration,
    pub(crate) max_running_per_rule: Option<usize>,
    pub(crate) trace_interactions: bool,
}

type Callback = Rc<dyn Fn(&EventScope<'_>)>;

struct RuleCallback {
    /// `None` matches every event.
    event_type: Option<TypeId>,
    event_type_name: &'static str,
    callback: Callback,
}

/// Declarations of one interaction rule.
///
/// Passed to [`InteractionClient::add_interaction_rule`](crate::InteractionClient::add_interaction_rule).
#[derive(Default)]
pub struct RuleBuilder {
    name: Option<String>,
    callbacks: Vec<RuleCallback>,
}

impl RuleBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Name used in logs.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// React to events whose concrete type is `E`.
    ///
    /// Callbacks run in declaration order. Subscribe to an enum to react to a
    /// family of events.
    pub fn on_event<E: InteractionEvent>(
        &mut self,
        callback: impl Fn(&EventScope<'_>, &E) + 'static,
    ) -> &mut Self {
        self.callbacks.push(RuleCallback {
            event_type: Some(TypeId::of::<E>()),
            event_type_name: std::any::type_name::<E>(),
            callback: Rc::new(move |scope: &EventScope<'_>| {
                if let Some(event) = scope.event.get::<E>() {
                    callback(scope, event);
                }
            }),
        });
        self
    }

    /// React to every event.
    pub fn on_any_event(&mut self, callback: impl Fn(&EventScope<'_>) + 'static) -> &mut Self {
        self.callbacks.push(RuleCallback {
            event_type: None,
            event_type_name: "*",
            callback: Rc::new(callback),
        });
        self
    }
}

impl fmt::Debug for RuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleBuilder")
            .field("name", &self.name)
            .field(
                "events",
                &self
                    .callbacks
                    .iter()
                    .map(|c| c.event_type_name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Engine-side state of a running or finishing interaction.
///
/// Reached only through [`TrackedInteraction`] handles.
pub struct TrackedState {
    id: InteractionId,
    interaction: Rc<dyn Interaction>,
    trigger: Option<Rc<InteractionTrigger>>,
    key: Option<String>,
    cancel_timeout: Duration,
    sent_events: RefCell<Vec<SentEvent>>,
    timer: Cell<Option<TimerToken>>,
    trace: RefCell<Option<TraceSpan>>,
    trigger_trace: RefCell<Option<TraceSpan>>,
}

impl TrackedState {
    fn snapshot(&self) -> InteractionSnapshot {
        InteractionSnapshot {
            id: self.id,
            interaction: Rc::clone(&self.interaction),
            trigger: self.trigger.clone(),
            sent_events: self.sent_events.borrow().clone(),
        }
    }

    fn end_trigger_trace(&self) {
        let span = self.trigger_trace.borrow_mut().take();
        if let Some(span) = span {
            span.end();
        }
    }

    fn end_traces(&self) {
        self.end_trigger_trace();
        let span = self.trace.borrow_mut().take();
        if let Some(span) = span {
            span.end();
        }
    }

    fn describe_event(event: Option<&SentEvent>) -> String {
        match event {
            Some(event) => format!("{} at {:?}", event.describe(), event.uptime()),
            None => "none".to_string(),
        }
    }

    fn not_running_message(&self, rule: &str, operation: &str) -> String {
        let events = self.sent_events.borrow();
        format!(
            "cannot {operation} interaction {} ({}) of rule '{rule}': it is not running \
             (first event: {}, last event: {})",
            self.id,
            self.interaction.description(),
            Self::describe_event(events.first()),
            Self::describe_event(events.last()),
        )
    }
}

impl fmt::Debug for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedState")
            .field("id", &self.id)
            .field("interaction", &self.interaction)
            .field("key", &self.key)
            .field("sent_events", &self.sent_events.borrow().len())
            .finish_non_exhaustive()
    }
}

mod private {
    pub trait Sealed {
        fn state(&self) -> &std::rc::Rc<super::TrackedState>;
    }
}

/// Read access shared by [`RunningInteraction`] and [`FinishingInteraction`].
///
/// Handles are references: they stay valid after the interaction reaches a
/// terminal state, but the engine no longer acts on them.
pub trait TrackedInteraction: private::Sealed {
    /// Engine-assigned identity.
    fn id(&self) -> InteractionId {
        self.state().id
    }

    /// The interaction value.
    fn interaction(&self) -> &Rc<dyn Interaction> {
        &self.state().interaction
    }

    /// Description of the interaction value.
    fn description(&self) -> String {
        self.state().interaction.description()
    }

    /// The cause the interaction was attributed to.
    fn trigger(&self) -> Option<&Rc<InteractionTrigger>> {
        self.state().trigger.as_ref()
    }

    /// Key the interaction was started under.
    fn key(&self) -> Option<&str> {
        self.state().key.as_deref()
    }

    /// Timeout armed when the interaction started.
    fn cancel_timeout(&self) -> Duration {
        self.state().cancel_timeout
    }

    /// Copy of the recorded events, oldest first.
    fn sent_events(&self) -> Vec<SentEvent> {
        self.state().sent_events.borrow().clone()
    }

    /// Point-in-time copy of the interaction.
    fn snapshot(&self) -> InteractionSnapshot {
        self.state().snapshot()
    }
}

/// Handle to an interaction in the `Running` state.
#[derive(Clone)]
pub struct RunningInteraction {
    state: Rc<TrackedState>,
}

impl RunningInteraction {
    /// Downcast the interaction value.
    pub fn get<T: Interaction>(&self) -> Option<&T> {
        self.state.interaction.downcast_ref::<T>()
    }
}

impl private::Sealed for RunningInteraction {
    fn state(&self) -> &Rc<TrackedState> {
        &self.state
    }
}

impl TrackedInteraction for RunningInteraction {}

impl fmt::Debug for RunningInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RunningInteraction").field(&self.state).finish()
    }
}

/// Handle to an interaction waiting for its frame to render.
#[derive(Clone)]
pub struct FinishingInteraction {
    state: Rc<TrackedState>,
}

impl FinishingInteraction {
    /// Downcast the interaction value.
    pub fn get<T: Interaction>(&self) -> Option<&T> {
        self.state.interaction.downcast_ref::<T>()
    }
}

impl private::Sealed for FinishingInteraction {
    fn state(&self) -> &Rc<TrackedState> {
        &self.state
    }
}

impl TrackedInteraction for FinishingInteraction {}

impl fmt::Debug for FinishingInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FinishingInteraction").field(&self.state).finish()
    }
}

#[derive(Debug, Default)]
enum TraceChoice {
    #[default]
    Default,
    Span(TraceSpan),
    Disabled,
}

/// Overrides for [`EventScope::start_interaction_with`].
#[derive(Debug, Default)]
pub struct StartOptions {
    trigger: Option<Option<Rc<InteractionTrigger>>>,
    trace: TraceChoice,
    cancel_timeout: Option<Duration>,
}

impl StartOptions {
    /// Start from the defaults: earliest trigger on the stack, a trace span
    /// named after the interaction, and the configured cancel timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute the interaction to `trigger`.
    pub fn trigger(mut self, trigger: Rc<InteractionTrigger>) -> Self {
        self.trigger = Some(Some(trigger));
        self
    }

    /// Start with no trigger, whatever is on the stack.
    pub fn no_trigger(mut self) -> Self {
        self.trigger = Some(None);
        self
    }

    /// Use `span` as the interaction's trace span.
    pub fn trace(mut self, span: TraceSpan) -> Self {
        self.trace = TraceChoice::Span(span);
        self
    }

    /// Start without an interaction trace span.
    pub fn no_trace(mut self) -> Self {
        self.trace = TraceChoice::Disabled;
        self
    }

    /// Cancel the interaction if it is still running after `timeout`.
    pub fn cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = Some(timeout);
        self
    }
}

/// Engine for a single rule.
pub(crate) struct RuleEngine {
    name: String,
    this: Weak<RuleEngine>,
    context: Rc<EngineContext>,
    callbacks: Vec<RuleCallback>,
    matches: RefCell<HashMap<TypeId, Rc<[usize]>>>,
    running: RefCell<Vec<Rc<TrackedState>>>,
    finishing: RefCell<Vec<Rc<TrackedState>>>,
    removed: Cell<bool>,
}

impl RuleEngine {
    pub(crate) fn new(
        default_name: String,
        context: Rc<EngineContext>,
        rule: RuleBuilder,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            name: rule.name.unwrap_or(default_name),
            this: this.clone(),
            context,
            callbacks: rule.callbacks,
            matches: RefCell::new(HashMap::new()),
            running: RefCell::new(Vec::new()),
            finishing: RefCell::new(Vec::new()),
            removed: Cell::new(false),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub(crate) fn running_count(&self) -> usize {
        self.running.borrow().len()
    }

    pub(crate) fn finishing_count(&self) -> usize {
        self.finishing.borrow().len()
    }

    /// Run every matching callback of this rule for `event`.
    ///
    /// A callback that panics unwinds to the caller; later callbacks for the
    /// same event do not run.
    pub(crate) fn send_event(self: &Rc<Self>, event: &SentEvent) {
        if self.removed.get() {
            return;
        }
        let matching = self.matching_callbacks(event.event().concrete_type_id());
        if matching.is_empty() {
            return;
        }
        let scope = EventScope {
            engine: self,
            event,
        };
        for &index in matching.iter() {
            if self.removed.get() {
                break;
            }
            (self.callbacks[index].callback)(&scope);
        }
    }

    fn matching_callbacks(&self, type_id: TypeId) -> Rc<[usize]> {
        let cached = self.matches.borrow().get(&type_id).cloned();
        if let Some(indices) = cached {
            return indices;
        }
        let indices: Rc<[usize]> = self
            .callbacks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.event_type.is_none_or(|t| t == type_id))
            .map(|(index, _)| index)
            .collect();
        self.matches
            .borrow_mut()
            .insert(type_id, Rc::clone(&indices));
        indices
    }

    /// Cancel everything this rule tracks and stop reacting to events.
    pub(crate) fn remove(&self) {
        if self.removed.replace(true) {
            return;
        }
        let running = std::mem::take(&mut *self.running.borrow_mut());
        let finishing = std::mem::take(&mut *self.finishing.borrow_mut());
        tracing::debug!(
            rule = %self.name,
            running = running.len(),
            finishing = finishing.len(),
            "rule removed"
        );
        for state in running.iter().chain(finishing.iter()) {
            self.disarm(state);
            let interaction = state.snapshot();
            state.end_traces();
            self.context
                .notifier
                .update(InteractionUpdate::CancelOnRuleRemoved { interaction });
        }
    }

    fn remove_running(&self, id: InteractionId) -> Option<Rc<TrackedState>> {
        let mut running = self.running.borrow_mut();
        let index = running.iter().position(|s| s.id == id)?;
        Some(running.remove(index))
    }

    fn remove_finishing(&self, id: InteractionId) -> Option<Rc<TrackedState>> {
        let mut finishing = self.finishing.borrow_mut();
        let index = finishing.iter().position(|s| s.id == id)?;
        Some(finishing.remove(index))
    }

    fn is_tracked(&self, id: InteractionId) -> bool {
        self.running.borrow().iter().any(|s| s.id == id)
            || self.finishing.borrow().iter().any(|s| s.id == id)
    }

    fn running_by_key(&self, key: &str) -> Option<Rc<TrackedState>> {
        self.running
            .borrow()
            .iter()
            .find(|s| s.key.as_deref() == Some(key))
            .cloned()
    }

    fn disarm(&self, state: &TrackedState) {
        if let Some(token) = state.timer.take() {
            self.context.looper.cancel(token);
        }
    }

    /// Take `state` out of the running set for `operation`.
    ///
    /// Returns `false` when the rule was removed underneath the caller, in
    /// which case the interaction has already been canceled by the removal.
    fn take_running(&self, state: &TrackedState, operation: &str) -> bool {
        if self.remove_running(state.id).is_some() {
            return true;
        }
        assert!(
            self.removed.get(),
            "{}",
            state.not_running_message(&self.name, operation)
        );
        tracing::debug!(rule = %self.name, id = %state.id, operation, "rule already removed");
        false
    }

    fn cancel_on_event(&self, state: &Rc<TrackedState>, event: &SentEvent, reason: String) {
        if self.take_running(state, "cancel") {
            self.emit_cancel_on_event(state, event, reason);
        }
    }

    /// Cancel `state` if it is still running. Returns whether it was.
    fn cancel_if_running(&self, state: &Rc<TrackedState>, event: &SentEvent, reason: String) -> bool {
        if self.remove_running(state.id).is_none() {
            return false;
        }
        self.emit_cancel_on_event(state, event, reason);
        true
    }

    fn emit_cancel_on_event(&self, state: &Rc<TrackedState>, event: &SentEvent, reason: String) {
        self.disarm(state);
        tracing::debug!(rule = %self.name, id = %state.id, %reason, "canceled");
        let interaction = state.snapshot();
        state.end_traces();
        self.context.notifier.update(InteractionUpdate::CancelOnEvent {
            interaction,
            event: event.clone(),
            reason,
        });
    }

    fn on_timeout(&self, id: InteractionId) {
        let Some(state) = self.remove_running(id) else {
            return;
        };
        state.timer.set(None);
        tracing::debug!(rule = %self.name, id = %state.id, timeout = ?state.cancel_timeout, "timed out");
        let interaction = state.snapshot();
        state.end_traces();
        self.context.notifier.update(InteractionUpdate::CancelOnTimeout {
            interaction,
            timeout: state.cancel_timeout,
        });
    }

    fn on_rendered(&self, id: InteractionId, frame_uptime: Duration) {
        // Already gone when the rule was removed while waiting for the frame.
        let Some(state) = self.remove_finishing(id) else {
            return;
        };
        tracing::debug!(rule = %self.name, id = %state.id, ?frame_uptime, "rendered");
        let interaction = state.snapshot();
        state.end_traces();
        self.context.notifier.update(InteractionUpdate::Rendered {
            interaction,
            frame_uptime,
        });
    }
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("name", &self.name)
            .field("running", &self.running_count())
            .field("finishing", &self.finishing_count())
            .field("removed", &self.removed.get())
            .finish()
    }
}

/// What a rule callback sees while reacting to one event.
pub struct EventScope<'a> {
    engine: &'a Rc<RuleEngine>,
    event: &'a SentEvent,
}

impl EventScope<'_> {
    /// The event being dispatched.
    pub fn event(&self) -> &SentEvent {
        self.event
    }

    /// The event downcast to `E`.
    pub fn get<E: InteractionEvent>(&self) -> Option<&E> {
        self.event.get::<E>()
    }

    /// The client's trigger stack.
    pub fn trigger_stack(&self) -> &TriggerStack {
        &self.engine.context.trigger_stack
    }

    /// Copy of this rule's running interactions, oldest first.
    pub fn running_interactions(&self) -> Vec<RunningInteraction> {
        self.engine
            .running
            .borrow()
            .iter()
            .map(|state| RunningInteraction {
                state: Rc::clone(state),
            })
            .collect()
    }

    /// Copy of this rule's finishing interactions, oldest first.
    pub fn finishing_interactions(&self) -> Vec<FinishingInteraction> {
        self.engine
            .finishing
            .borrow()
            .iter()
            .map(|state| FinishingInteraction {
                state: Rc::clone(state),
            })
            .collect()
    }

    /// Start tracking `interaction` with default options.
    pub fn start_interaction(&self, interaction: impl Interaction) -> RunningInteraction {
        self.start(None, Rc::new(interaction), StartOptions::default())
    }

    /// Start tracking `interaction` with explicit trigger, trace or timeout.
    pub fn start_interaction_with(
        &self,
        interaction: impl Interaction,
        options: StartOptions,
    ) -> RunningInteraction {
        self.start(None, Rc::new(interaction), options)
    }

    /// Start tracking `interaction` under `key`.
    ///
    /// A running interaction already holding the key is canceled with reason
    /// [`REPLACED_REASON`] and a [`UsageError::DuplicateKey`] is reported.
    pub fn start_keyed_interaction(
        &self,
        key: impl Into<String>,
        interaction: impl Interaction,
    ) -> RunningInteraction {
        self.start_keyed_interaction_with(key, interaction, StartOptions::default())
    }

    /// [`start_keyed_interaction`](Self::start_keyed_interaction) with options.
    pub fn start_keyed_interaction_with(
        &self,
        key: impl Into<String>,
        interaction: impl Interaction,
        options: StartOptions,
    ) -> RunningInteraction {
        let key = key.into();
        if let Some(previous) = self.engine.running_by_key(&key) {
            self.engine
                .context
                .notifier
                .usage_error(UsageError::DuplicateKey {
                    key: key.clone(),
                    previous: previous.id,
                });
            self.engine
                .cancel_on_event(&previous, self.event, REPLACED_REASON.to_string());
        }
        self.start(Some(key), Rc::new(interaction), options)
    }

    /// The running interaction started under `key`.
    ///
    /// Reports [`UsageError::MissingKey`] when there is none.
    pub fn running_interaction(&self, key: &str) -> Option<RunningInteraction> {
        let found = self.engine.running_by_key(key);
        if found.is_none() {
            self.engine
                .context
                .notifier
                .usage_error(UsageError::MissingKey {
                    key: key.to_string(),
                });
        }
        found.map(|state| RunningInteraction { state })
    }

    /// Cancel a running interaction, emitting `CancelOnEvent`.
    ///
    /// # Panics
    ///
    /// Panics if the interaction is not running, e.g. when it was already
    /// canceled or finished. Once the rule has been removed this is a no-op.
    pub fn cancel(&self, running: &RunningInteraction, reason: impl Into<String>) {
        self.engine
            .cancel_on_event(&running.state, self.event, reason.into());
    }

    /// Cancel every running interaction of this rule. Returns how many.
    ///
    /// Interactions that stop running while earlier ones are being canceled,
    /// e.g. because a listener removed the rule, are skipped.
    pub fn cancel_running_interactions(&self, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        let mut canceled = 0;
        for interaction in self.running_interactions() {
            if self
                .engine
                .cancel_if_running(&interaction.state, self.event, reason.clone())
            {
                canceled += 1;
            }
        }
        canceled
    }

    /// Declare the interaction done; it is reported `Rendered` once the next
    /// frame is visible.
    ///
    /// # Panics
    ///
    /// Panics if the interaction is not running. Once the rule has been
    /// removed this is a no-op and no frame is awaited.
    pub fn finish(&self, running: &RunningInteraction) -> FinishingInteraction {
        let engine = self.engine;
        let state = Rc::clone(&running.state);
        if !engine.take_running(&state, "finish") {
            return FinishingInteraction { state };
        }
        engine.disarm(&state);
        state.end_trigger_trace();
        engine.finishing.borrow_mut().push(Rc::clone(&state));
        tracing::debug!(rule = %engine.name, id = %state.id, "finishing");
        engine.context.notifier.update(InteractionUpdate::Finish {
            interaction: state.snapshot(),
            event: self.event.clone(),
        });

        let weak = engine.this.clone();
        let id = state.id;
        engine
            .context
            .frames
            .on_next_render_completed(move |frame_uptime| {
                if let Some(engine) = weak.upgrade() {
                    engine.on_rendered(id, frame_uptime);
                }
            });
        FinishingInteraction { state }
    }

    /// Append the current event to a tracked interaction, emitting
    /// `RecordEvent`.
    ///
    /// Recording the event that was recorded last is a no-op, as is recording
    /// onto an interaction that is no longer tracked. Returns whether the
    /// event was appended.
    pub fn record_event(&self, interaction: &impl TrackedInteraction) -> bool {
        let state = interaction.state();
        if !self.engine.is_tracked(state.id) {
            tracing::debug!(rule = %self.engine.name, id = %state.id, "record on untracked interaction");
            return false;
        }
        {
            let mut events = state.sent_events.borrow_mut();
            if events.last().is_some_and(|last| last.same_event(self.event)) {
                return false;
            }
            events.push(self.event.clone());
        }
        self.engine
            .context
            .notifier
            .update(InteractionUpdate::RecordEvent {
                interaction: state.snapshot(),
                event: self.event.clone(),
            });
        true
    }

    fn start(
        &self,
        key: Option<String>,
        interaction: Rc<dyn Interaction>,
        options: StartOptions,
    ) -> RunningInteraction {
        let engine = self.engine;
        let context = &engine.context;

        if let Some(limit) = context.max_running_per_rule {
            if engine.running_count() >= limit {
                let oldest = engine.running.borrow().first().cloned();
                if let Some(oldest) = oldest {
                    context.notifier.usage_error(UsageError::CapacityExceeded {
                        limit,
                        canceled: oldest.id,
                    });
                    engine.cancel_on_event(&oldest, self.event, CAPACITY_REASON.to_string());
                }
            }
        }

        let description = interaction.description();
        let trigger = match options.trigger {
            Some(trigger) => trigger,
            None => context.trigger_stack.earliest_interaction_trigger(),
        };
        let trace = match options.trace {
            TraceChoice::Default => context
                .trace_interactions
                .then(|| TraceSpan::begin(&context.trace_sink, description.clone())),
            TraceChoice::Span(span) => Some(span),
            TraceChoice::Disabled => None,
        };
        // Starting an interaction claims any dispatch span the trigger still owns.
        let trigger_trace = trigger.as_ref().and_then(|t| t.take_over_trace());
        let cancel_timeout = options
            .cancel_timeout
            .unwrap_or(context.default_cancel_timeout);

        let state = Rc::new(TrackedState {
            id: InteractionId::next(),
            interaction,
            trigger,
            key,
            cancel_timeout,
            sent_events: RefCell::new(vec![self.event.clone()]),
            timer: Cell::new(None),
            trace: RefCell::new(trace),
            trigger_trace: RefCell::new(trigger_trace),
        });

        let id = state.id;
        if engine.removed.get() {
            // A removed rule tracks nothing; end the interaction right away.
            tracing::debug!(rule = %engine.name, %id, interaction = %description, "started on removed rule");
            context.notifier.update(InteractionUpdate::Start {
                interaction: state.snapshot(),
                event: self.event.clone(),
            });
            let interaction = state.snapshot();
            state.end_traces();
            context
                .notifier
                .update(InteractionUpdate::CancelOnRuleRemoved { interaction });
            return RunningInteraction { state };
        }

        let weak = engine.this.clone();
        let token = context.looper.post_delayed(cancel_timeout, move || {
            if let Some(engine) = weak.upgrade() {
                engine.on_timeout(id);
            }
        });
        state.timer.set(Some(token));
        engine.running.borrow_mut().push(Rc::clone(&state));

        tracing::debug!(
            rule = %engine.name,
            %id,
            interaction = %description,
            trigger = ?state.trigger.as_ref().map(|t| t.name()),
            ?cancel_timeout,
            "started"
        );
        context.notifier.update(InteractionUpdate::Start {
            interaction: state.snapshot(),
            event: self.event.clone(),
        });
        RunningInteraction { state }
    }
}

impl fmt::Debug for EventScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventScope")
            .field("rule", &self.engine.name)
            .field("event", self.event)
            .finish()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
