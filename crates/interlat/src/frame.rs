// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Frame-render synchronization.
//!
//! [`FrameSynchronizer::on_next_render_completed`] runs a callback once the
//! next rendering pass has been fully committed, with the uptime at which that
//! happened. It is built on two host primitives, in this order:
//!
//! 1. a per-vsync frame callback, which fires at the *start* of a rendering
//!    pass, and
//! 2. a post to the front of the execution context's queue, which runs right
//!    after the pass commits and before any other queued work.
//!
//! Taking the timestamp in the second step is what makes it a "visible to the
//! user" time rather than a "started rendering" time. When the caller is
//! already inside a rendering pass, the first step is skipped and the current
//! pass is the one waited for.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::looper::Looper;
use crate::time::{Clock, ClockHandle};

/// Host frame primitives.
pub trait FrameScheduler {
    /// Whether a rendering pass is running right now.
    fn is_rendering_frame(&self) -> bool;

    /// Run `callback` at the start of the next rendering pass.
    fn post_frame_callback(&self, callback: Box<dyn FnOnce()>);

    /// Run `callback` on the execution context before any other queued work.
    fn post_at_front_of_queue(&self, callback: Box<dyn FnOnce()>);
}

type RenderCallback = Box<dyn FnOnce(Duration)>;

struct SyncInner {
    scheduler: Rc<dyn FrameScheduler>,
    clock: ClockHandle,
    pending: RefCell<Vec<RenderCallback>>,
    scheduled: Cell<bool>,
}

impl SyncInner {
    fn complete(&self) {
        let callbacks = std::mem::take(&mut *self.pending.borrow_mut());
        // Cleared before firing so registrations from a callback wait for the
        // following frame.
        self.scheduled.set(false);
        let frame_uptime = self.clock.now();
        tracing::trace!(callbacks = callbacks.len(), ?frame_uptime, "render completed");
        for callback in callbacks {
            callback(frame_uptime);
        }
    }
}

/// Coalescing "after the next frame is visible" scheduler. Clones share state.
#[derive(Clone)]
pub struct FrameSynchronizer {
    inner: Rc<SyncInner>,
}

impl FrameSynchronizer {
    /// Build on a host frame scheduler; timestamps come from `clock`.
    pub fn new(scheduler: Rc<dyn FrameScheduler>, clock: ClockHandle) -> Self {
        Self {
            inner: Rc::new(SyncInner {
                scheduler,
                clock,
                pending: RefCell::new(Vec::new()),
                scheduled: Cell::new(false),
            }),
        }
    }

    /// Run `callback` once, after the next full rendering pass has completed.
    ///
    /// Callbacks registered before the same frame share one scheduled pass and
    /// fire in registration order with the same timestamp.
    pub fn on_next_render_completed(&self, callback: impl FnOnce(Duration) + 'static) {
        self.inner.pending.borrow_mut().push(Box::new(callback));
        if self.inner.scheduled.replace(true) {
            return;
        }
        let inner = Rc::clone(&self.inner);
        let scheduler = &self.inner.scheduler;
        if scheduler.is_rendering_frame() {
            scheduler.post_at_front_of_queue(Box::new(move || inner.complete()));
        } else {
            let front = Rc::clone(scheduler);
            scheduler.post_frame_callback(Box::new(move || {
                front.post_at_front_of_queue(Box::new(move || inner.complete()));
            }));
        }
    }

    /// Number of callbacks waiting for a frame.
    pub fn pending_callbacks(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

impl fmt::Debug for FrameSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSynchronizer")
            .field("pending", &self.pending_callbacks())
            .field("scheduled", &self.inner.scheduled.get())
            .finish()
    }
}

/// A [`FrameScheduler`] driven by a [`Looper`], for tests and headless hosts.
///
/// Frames are rendered by calling [`render_frame`](Self::render_frame), or
/// automatically on the looper every `frame_interval` while frame callbacks
/// are waiting.
pub struct SimulatedFrameScheduler {
    looper: Looper,
    frame_interval: Option<Duration>,
    this: Weak<SimulatedFrameScheduler>,
    frame_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
    rendering: Cell<bool>,
    vsync_scheduled: Cell<bool>,
    frames: Cell<u64>,
}

impl SimulatedFrameScheduler {
    /// Frames render only when [`render_frame`](Self::render_frame) is called.
    pub fn manual(looper: Looper) -> Rc<Self> {
        Self::build(looper, None)
    }

    /// Frames render on the looper `frame_interval` after a callback is posted.
    pub fn with_frame_interval(looper: Looper, frame_interval: Duration) -> Rc<Self> {
        Self::build(looper, Some(frame_interval))
    }

    fn build(looper: Looper, frame_interval: Option<Duration>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            looper,
            frame_interval,
            this: this.clone(),
            frame_callbacks: RefCell::new(Vec::new()),
            rendering: Cell::new(false),
            vsync_scheduled: Cell::new(false),
            frames: Cell::new(0),
        })
    }

    /// Run one rendering pass.
    pub fn render_frame(&self) -> usize {
        self.render_frame_with(|| {})
    }

    /// Run one rendering pass, calling `draw` after the frame callbacks and
    /// while the pass is still in progress.
    ///
    /// Callbacks posted during the pass wait for the next one. Front-of-queue
    /// continuations run when the looper next runs.
    pub fn render_frame_with(&self, draw: impl FnOnce()) -> usize {
        self.looper.assert_current("render_frame");
        let callbacks = std::mem::take(&mut *self.frame_callbacks.borrow_mut());
        let count = callbacks.len();
        let _pass = RenderingPass::start(&self.rendering);
        for callback in callbacks {
            callback();
        }
        draw();
        self.frames.set(self.frames.get() + 1);
        count
    }

    /// Whether frame callbacks are waiting for the next pass.
    pub fn has_pending_frame_callbacks(&self) -> bool {
        !self.frame_callbacks.borrow().is_empty()
    }

    /// Number of passes rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames.get()
    }

    fn schedule_vsync(&self) {
        let Some(interval) = self.frame_interval else {
            return;
        };
        if self.vsync_scheduled.replace(true) {
            return;
        }
        let this = self.this.clone();
        self.looper.post_delayed(interval, move || {
            if let Some(this) = this.upgrade() {
                this.vsync_scheduled.set(false);
                this.render_frame();
            }
        });
    }
}

impl FrameScheduler for SimulatedFrameScheduler {
    fn is_rendering_frame(&self) -> bool {
        self.rendering.get()
    }

    fn post_frame_callback(&self, callback: Box<dyn FnOnce()>) {
        self.frame_callbacks.borrow_mut().push(callback);
        self.schedule_vsync();
    }

    fn post_at_front_of_queue(&self, callback: Box<dyn FnOnce()>) {
        self.looper.post_at_front(callback);
    }
}

impl fmt::Debug for SimulatedFrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedFrameScheduler")
            .field("frame_interval", &self.frame_interval)
            .field("rendering", &self.rendering.get())
            .field("frames", &self.frames.get())
            .finish()
    }
}

/// Marks a rendering pass; cleared even if a callback unwinds.
struct RenderingPass<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> RenderingPass<'a> {
    fn start(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for RenderingPass<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
