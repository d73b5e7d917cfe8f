// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Shared helpers for client integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use interlat::{
    ClockHandle, FakeClock, InteractionClient, InteractionConfig, InteractionId,
    InteractionUpdate, InteractionUpdateListener, Looper, RecordingTraceSink,
    SimulatedFrameScheduler, UsageError,
};

/// One frame every 16ms, like a 60Hz display.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Default)]
pub struct Updates {
    pub updates: RefCell<Vec<InteractionUpdate>>,
    pub errors: RefCell<Vec<UsageError>>,
}

impl InteractionUpdateListener for Updates {
    fn on_update(&self, update: &InteractionUpdate) {
        self.updates.borrow_mut().push(update.clone());
    }

    fn on_usage_error(&self, error: &UsageError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

impl Updates {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.updates.borrow().iter().map(|u| u.kind()).collect()
    }

    pub fn for_interaction(&self, id: InteractionId) -> Vec<InteractionUpdate> {
        self.updates
            .borrow()
            .iter()
            .filter(|u| u.interaction().id == id)
            .cloned()
            .collect()
    }
}

/// A client whose frames render on the looper every [`FRAME_INTERVAL`]
pub struct App {
    pub clock: FakeClock,
    pub looper: Looper,
    pub frames: Rc<SimulatedFrameScheduler>,
    pub traces: Rc<RecordingTraceSink>,
    pub updates: Rc<Updates>,
    pub client: InteractionClient,
}

impl App {
    pub fn new(config: InteractionConfig) -> Self {
        let clock = FakeClock::at_millis(10_000);
        let looper = Looper::new(ClockHandle::from(clock.clone()));
        let frames = SimulatedFrameScheduler::with_frame_interval(looper.clone(), FRAME_INTERVAL);
        let traces = Rc::new(RecordingTraceSink::new());
        let updates = Rc::new(Updates::default());
        let client = InteractionClient::builder(looper.clone(), frames.clone())
            .trace_sink(traces.clone())
            .shared_listener(updates.clone())
            .config(config)
            .build()
            .unwrap();
        Self {
            clock,
            looper,
            frames,
            traces,
            updates,
            client,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.looper.advance_by(Duration::from_millis(ms));
    }
}
