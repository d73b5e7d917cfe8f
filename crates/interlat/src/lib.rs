// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Interaction latency correlation
//!
//! Measures how long it takes from a user-visible cause (an input event, or an
//! application-defined trigger) until the screen reflects the result.
//!
//! Applications register interaction rules on an [`InteractionClient`] and
//! feed it their own events. Rules start, finish and cancel interactions; the
//! client reports every lifecycle step to an [`InteractionUpdateListener`].
//! A finished interaction is reported as [`InteractionUpdate::Rendered`] once
//! the next frame has been committed, with the frame's timestamp.
//!
//! ```
//! use interlat::{
//!     ClockHandle, Interaction, InteractionClient, InteractionEvent, InteractionUpdate, Looper,
//!     SimulatedFrameScheduler,
//! };
//!
//! #[derive(Debug)]
//! struct OpenCart;
//! impl Interaction for OpenCart {}
//!
//! #[derive(Debug)]
//! enum CartEvent {
//!     Tapped,
//!     Loaded,
//! }
//! impl InteractionEvent for CartEvent {}
//!
//! let looper = Looper::new(ClockHandle::fake_at(1_000));
//! let frames = SimulatedFrameScheduler::manual(looper.clone());
//! let client = InteractionClient::builder(looper.clone(), frames.clone())
//!     .listener(|update: &InteractionUpdate| {
//!         if let Some(latency) = update.display_duration() {
//!             println!("{} rendered after {latency:?}", update.interaction().description());
//!         }
//!     })
//!     .build()
//!     .unwrap();
//!
//! client.add_interaction_rule(|rule| {
//!     rule.on_event::<CartEvent>(|scope, event| match event {
//!         CartEvent::Tapped => {
//!             scope.start_interaction(OpenCart);
//!         }
//!         CartEvent::Loaded => {
//!             for running in scope.running_interactions() {
//!                 scope.finish(&running);
//!             }
//!         }
//!     });
//! });
//!
//! client.send_event(CartEvent::Tapped);
//! client.send_event(CartEvent::Loaded);
//! frames.render_frame();
//! looper.run_pending();
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod event;
pub mod frame;
pub mod interaction;
pub mod listener;
pub mod looper;
pub mod time;
pub mod trace;
pub mod trigger;
pub mod trigger_stack;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::{EventSender, InteractionClient, InteractionClientBuilder, RuleHandle};
pub use config::{ConfigError, InteractionConfig};
pub use engine::{
    EventScope, FinishingInteraction, RuleBuilder, RunningInteraction, StartOptions,
    TrackedInteraction,
};
pub use event::{InteractionEvent, SentEvent};
pub use frame::{FrameScheduler, FrameSynchronizer, SimulatedFrameScheduler};
pub use interaction::{
    Interaction, InteractionId, InteractionSnapshot, InteractionUpdate, UsageError,
};
pub use listener::{InteractionUpdateListener, LoggingListener};
pub use looper::{Looper, LooperHandle};
pub use time::{Clock, ClockHandle, FakeClock, SystemClock};
pub use trace::{NoopTraceSink, RecordingTraceSink, TraceSink, TraceSpan, TracingTraceSink};
pub use trigger::{
    DeliveredInput, InputEvent, InteractionTrigger, KeyAction, MotionAction, TriggerKind,
};
pub use trigger_stack::TriggerStack;
