// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The interaction client: rule registration and event fan-out.
//!
//! The client lives on the looper thread. Events sent there are dispatched
//! synchronously; an event sent while another is being dispatched (from a
//! rule callback or the listener) waits until the in-progress dispatch
//! returns, so every event is evaluated from the top of the stack. Events
//! from other threads go through an [`EventSender`], which timestamps them at
//! the call site and marshals them through the looper in send order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{ConfigError, InteractionConfig};
use crate::engine::{EngineContext, RuleBuilder, RuleEngine};
use crate::event::{InteractionEvent, SentEvent};
use crate::frame::{FrameScheduler, FrameSynchronizer};
use crate::listener::{InteractionUpdateListener, LoggingListener, Notifier};
use crate::looper::{Looper, LooperHandle, PumpId, PumpRegistration};
use crate::time::{Clock, ClockHandle};
use crate::trace::{TraceSink, TracingTraceSink};
use crate::trigger::{InputEvent, InteractionTrigger};
use crate::trigger_stack::TriggerStack;

type MakeEvent = Box<dyn FnOnce() -> Rc<dyn InteractionEvent> + Send>;

struct RemoteEvent {
    uptime: Duration,
    make: MakeEvent,
}

type Inbox = Arc<Mutex<VecDeque<RemoteEvent>>>;

/// Builder for [`InteractionClient`].
pub struct InteractionClientBuilder {
    looper: Looper,
    frame_scheduler: Rc<dyn FrameScheduler>,
    clock: Option<ClockHandle>,
    trace_sink: Option<Rc<dyn TraceSink>>,
    config: InteractionConfig,
    listener: Option<Rc<dyn InteractionUpdateListener>>,
}

impl InteractionClientBuilder {
    /// Clock for event, trigger and frame timestamps. Defaults to the
    /// looper's clock.
    pub fn clock(mut self, clock: ClockHandle) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Trace backend. Defaults to [`TracingTraceSink`].
    pub fn trace_sink(mut self, sink: Rc<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    /// Client configuration.
    pub fn config(mut self, config: InteractionConfig) -> Self {
        self.config = config;
        self
    }

    /// Receiver of the update stream. Defaults to logging each update.
    pub fn listener(mut self, listener: impl InteractionUpdateListener + 'static) -> Self {
        self.listener = Some(Rc::new(listener));
        self
    }

    /// Shared receiver of the update stream.
    pub fn shared_listener(mut self, listener: Rc<dyn InteractionUpdateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Build the client on the looper thread.
    pub fn build(self) -> Result<InteractionClient, ConfigError> {
        self.config.validate()?;
        self.looper.assert_current("InteractionClient::build");

        let clock = self
            .clock
            .unwrap_or_else(|| self.looper.clock().clone());
        let trace_sink = self
            .trace_sink
            .unwrap_or_else(|| Rc::new(TracingTraceSink));
        let listener = self
            .listener
            .unwrap_or_else(|| Rc::new(LoggingListener));
        let context = Rc::new(EngineContext {
            looper: self.looper.clone(),
            frames: FrameSynchronizer::new(self.frame_scheduler, clock.clone()),
            trace_sink,
            trigger_stack: TriggerStack::new(),
            notifier: Notifier::new(listener),
            default_cancel_timeout: self.config.default_cancel_timeout(),
            max_running_per_rule: self.config.max_running_per_rule,
            trace_interactions: self.config.trace_interactions,
        });

        let looper = self.looper;
        let inner = Rc::new_cyclic(|this: &Weak<ClientInner>| {
            let weak = this.clone();
            let pump = looper.register_pump(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.drain_inbox();
                }
            });
            ClientInner {
                name: self.config.name,
                clock,
                context,
                engines: RefCell::new(Vec::new()),
                next_rule: Cell::new(1),
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                inbox: Arc::new(Mutex::new(VecDeque::new())),
                pump,
            }
        });
        tracing::debug!(client = %inner.name, "interaction client ready");
        Ok(InteractionClient { inner })
    }
}

impl fmt::Debug for InteractionClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionClientBuilder")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct ClientInner {
    name: String,
    clock: ClockHandle,
    context: Rc<EngineContext>,
    engines: RefCell<Vec<Rc<RuleEngine>>>,
    next_rule: Cell<u64>,
    pending: RefCell<VecDeque<SentEvent>>,
    dispatching: Cell<bool>,
    inbox: Inbox,
    pump: PumpRegistration,
}

impl ClientInner {
    fn dispatch(&self, event: SentEvent) {
        self.pending.borrow_mut().push_back(event);
        if self.dispatching.replace(true) {
            tracing::trace!(client = %self.name, "event deferred behind in-progress dispatch");
            return;
        }
        let _dispatching = Dispatching { inner: self };
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            tracing::trace!(client = %self.name, event = %event.describe(), "dispatch");
            let engines = self.engines.borrow().clone();
            for engine in &engines {
                engine.send_event(&event);
            }
        }
    }

    fn drain_inbox(&self) {
        let remote = std::mem::take(&mut *self.inbox.lock());
        for RemoteEvent { uptime, make } in remote {
            self.dispatch(SentEvent::new(make(), uptime));
        }
    }
}

/// Clears the dispatching flag even if a rule unwinds.
///
/// Events deferred behind a dispatch that unwinds are dropped, so they never
/// run ahead of a later, unrelated send.
struct Dispatching<'a> {
    inner: &'a ClientInner,
}

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let dropped = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if !dropped.is_empty() {
                tracing::warn!(
                    client = %self.inner.name,
                    dropped = dropped.len(),
                    "dropped deferred events after a rule panicked"
                );
            }
        }
        self.inner.dispatching.set(false);
    }
}

/// Registers interaction rules and feeds them events.
///
/// Bound to the looper thread it was built on. Use [`event_sender`] to send
/// events from other threads.
///
/// [`event_sender`]: InteractionClient::event_sender
pub struct InteractionClient {
    inner: Rc<ClientInner>,
}

impl InteractionClient {
    /// Start building a client on `looper`, rendering through `frame_scheduler`.
    pub fn builder(
        looper: Looper,
        frame_scheduler: Rc<dyn FrameScheduler>,
    ) -> InteractionClientBuilder {
        InteractionClientBuilder {
            looper,
            frame_scheduler,
            clock: None,
            trace_sink: None,
            config: InteractionConfig::default(),
            listener: None,
        }
    }

    /// Register a rule. The returned handle removes it.
    pub fn add_interaction_rule(&self, declare: impl FnOnce(&mut RuleBuilder)) -> RuleHandle {
        let mut rule = RuleBuilder::new();
        declare(&mut rule);
        let number = self.inner.next_rule.get();
        self.inner.next_rule.set(number + 1);
        let engine = RuleEngine::new(
            format!("rule-{number}"),
            Rc::clone(&self.inner.context),
            rule,
        );
        tracing::debug!(client = %self.inner.name, rule = %engine.name(), "rule added");
        self.inner.engines.borrow_mut().push(Rc::clone(&engine));
        RuleHandle {
            client: Rc::downgrade(&self.inner),
            engine: Rc::downgrade(&engine),
        }
    }

    /// Send an event from the looper thread.
    ///
    /// The timestamp is taken now. Dispatch is synchronous unless another
    /// event is being dispatched, in which case this one follows it.
    pub fn send_event(&self, event: impl InteractionEvent) {
        let uptime = self.inner.clock.now();
        self.inner.dispatch(SentEvent::new(Rc::new(event), uptime));
    }

    /// Send a shared event instance from the looper thread.
    pub fn send_shared_event(&self, event: Rc<dyn InteractionEvent>) {
        let uptime = self.inner.clock.now();
        self.inner.dispatch(SentEvent::new(event, uptime));
    }

    /// A `Send + Sync` sender for events from any thread.
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            inbox: Arc::clone(&self.inner.inbox),
            looper: self.inner.context.looper.handle(),
            pump: self.inner.pump.id(),
            clock: self.inner.clock.clone(),
        }
    }

    /// The causal trigger stack consulted when interactions start.
    pub fn trigger_stack(&self) -> &TriggerStack {
        &self.inner.context.trigger_stack
    }

    /// A custom trigger starting now, owning a trace span named after it.
    pub fn trigger_now(&self, name: impl Into<String>) -> Rc<InteractionTrigger> {
        InteractionTrigger::now(name, &self.inner.clock, &self.inner.context.trace_sink)
    }

    /// A trigger for input produced at `event_uptime` whose dispatch starts now.
    pub fn input_trigger(&self, input: InputEvent, event_uptime: Duration) -> Rc<InteractionTrigger> {
        InteractionTrigger::from_input(
            input,
            event_uptime,
            &self.inner.clock,
            &self.inner.context.trace_sink,
        )
    }

    /// Run the dispatch of `input` with its trigger on the stack.
    ///
    /// The trigger's dispatch span ends when `dispatch` returns, unless an
    /// interaction started during dispatch took it over.
    pub fn dispatch_input<T>(
        &self,
        input: InputEvent,
        event_uptime: Duration,
        dispatch: impl FnOnce() -> T,
    ) -> T {
        let trigger = self.input_trigger(input, event_uptime);
        self.trigger_stack().triggered_by(trigger, true, dispatch)
    }

    /// The clock timestamps are taken from.
    pub fn clock(&self) -> &ClockHandle {
        &self.inner.clock
    }

    /// The looper this client runs on.
    pub fn looper(&self) -> &Looper {
        &self.inner.context.looper
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.inner.engines.borrow().len()
    }

    /// Running interactions across all rules.
    pub fn running_count(&self) -> usize {
        self.inner
            .engines
            .borrow()
            .iter()
            .map(|e| e.running_count())
            .sum()
    }

    /// Interactions waiting for a frame, across all rules.
    pub fn finishing_count(&self) -> usize {
        self.inner
            .engines
            .borrow()
            .iter()
            .map(|e| e.finishing_count())
            .sum()
    }
}

impl fmt::Debug for InteractionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionClient")
            .field("name", &self.inner.name)
            .field("rules", &self.inner.engines.borrow())
            .field("trigger_stack", self.trigger_stack())
            .finish()
    }
}

/// Disposable registration of one rule.
pub struct RuleHandle {
    client: Weak<ClientInner>,
    engine: Weak<RuleEngine>,
}

impl RuleHandle {
    /// Remove the rule.
    ///
    /// Its running and finishing interactions are canceled with
    /// `CancelOnRuleRemoved` before it stops receiving events. Returns `false`
    /// if it was already removed.
    pub fn remove(&self) -> bool {
        let Some(engine) = self.engine.upgrade() else {
            return false;
        };
        if engine.is_removed() {
            return false;
        }
        engine.remove();
        if let Some(client) = self.client.upgrade() {
            client
                .engines
                .borrow_mut()
                .retain(|e| !Rc::ptr_eq(e, &engine));
        }
        true
    }

    /// Whether the rule still receives events.
    pub fn is_active(&self) -> bool {
        self.engine.upgrade().is_some_and(|e| !e.is_removed())
    }
}

impl fmt::Debug for RuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Sends events to a client from any thread.
///
/// Events are timestamped when [`send`](Self::send) is called and dispatched
/// on the looper in the order they were sent from each thread.
#[derive(Clone)]
pub struct EventSender {
    inbox: Inbox,
    looper: LooperHandle,
    pump: PumpId,
    clock: ClockHandle,
}

impl EventSender {
    /// Send an event. On the looper thread this behaves like
    /// [`InteractionClient::send_event`].
    pub fn send<E: InteractionEvent + Send>(&self, event: E) {
        let uptime = self.clock.now();
        self.inbox.lock().push_back(RemoteEvent {
            uptime,
            make: Box::new(move || Rc::new(event) as Rc<dyn InteractionEvent>),
        });
        self.looper.wake_pump(self.pump);
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("looper", &self.looper)
            .field("queued", &self.inbox.lock().len())
            .finish()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
