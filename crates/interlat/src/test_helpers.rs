// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client testing utilities.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::client::InteractionClient;
use crate::config::InteractionConfig;
use crate::frame::SimulatedFrameScheduler;
use crate::interaction::{InteractionId, InteractionUpdate, UsageError};
use crate::listener::InteractionUpdateListener;
use crate::looper::Looper;
use crate::time::{ClockHandle, FakeClock};
use crate::trace::RecordingTraceSink;

/// Collects updates and usage errors
#[derive(Default)]
pub struct Recorder {
    pub updates: RefCell<Vec<InteractionUpdate>>,
    pub errors: RefCell<Vec<UsageError>>,
}

impl InteractionUpdateListener for Recorder {
    fn on_update(&self, update: &InteractionUpdate) {
        self.updates.borrow_mut().push(update.clone());
    }

    fn on_usage_error(&self, error: &UsageError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

/// A client on a fake clock with manually rendered frames
pub struct ClientHarness {
    pub clock: FakeClock,
    pub looper: Looper,
    pub frames: Rc<SimulatedFrameScheduler>,
    pub traces: Rc<RecordingTraceSink>,
    pub recorder: Rc<Recorder>,
    pub client: InteractionClient,
}

impl ClientHarness {
    /// Harness with default configuration, starting at uptime 1000ms
    pub fn new() -> Self {
        Self::with_config(InteractionConfig::default())
    }

    pub fn with_config(config: InteractionConfig) -> Self {
        let clock = FakeClock::at_millis(1000);
        let looper = Looper::new(ClockHandle::from(clock.clone()));
        let frames = SimulatedFrameScheduler::manual(looper.clone());
        let traces = Rc::new(RecordingTraceSink::new());
        let recorder = Rc::new(Recorder::default());
        let client = InteractionClient::builder(looper.clone(), frames.clone())
            .trace_sink(traces.clone())
            .shared_listener(recorder.clone())
            .config(config)
            .build()
            .unwrap();
        Self {
            clock,
            looper,
            frames,
            traces,
            recorder,
            client,
        }
    }

    /// Render one frame and run the post-render continuation
    pub fn render(&self) {
        self.frames.render_frame();
        self.looper.run_pending();
    }

    /// Move virtual time forward, firing due timers
    pub fn advance_ms(&self, ms: u64) {
        self.looper.advance_by(Duration::from_millis(ms));
    }

    pub fn updates(&self) -> Vec<InteractionUpdate> {
        self.recorder.updates.borrow().clone()
    }

    pub fn errors(&self) -> Vec<UsageError> {
        self.recorder.errors.borrow().clone()
    }

    /// Update kinds in emission order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.recorder
            .updates
            .borrow()
            .iter()
            .map(|u| u.kind())
            .collect()
    }

    /// Update kinds for one interaction
    pub fn kinds_for(&self, id: InteractionId) -> Vec<&'static str> {
        self.recorder
            .updates
            .borrow()
            .iter()
            .filter(|u| u.interaction().id == id)
            .map(|u| u.kind())
            .collect()
    }

    pub fn last_update(&self) -> InteractionUpdate {
        self.recorder.updates.borrow().last().cloned().unwrap()
    }
}
