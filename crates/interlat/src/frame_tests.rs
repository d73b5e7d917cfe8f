// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use super::*;
use crate::time::FakeClock;

struct Harness {
    clock: FakeClock,
    looper: Looper,
    frames: Rc<SimulatedFrameScheduler>,
    sync: FrameSynchronizer,
}

fn harness() -> Harness {
    let clock = FakeClock::at_millis(1000);
    let looper = Looper::new(ClockHandle::from(clock.clone()));
    let frames = SimulatedFrameScheduler::manual(looper.clone());
    let sync = FrameSynchronizer::new(frames.clone(), ClockHandle::from(clock.clone()));
    Harness {
        clock,
        looper,
        frames,
        sync,
    }
}

type Log = Rc<RefCell<Vec<(&'static str, Duration)>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn push(log: &Log, name: &'static str) -> impl FnOnce(Duration) + 'static {
    let log = Rc::clone(log);
    move |uptime| log.borrow_mut().push((name, uptime))
}

#[test]
fn test_callback_waits_for_frame_and_front_continuation() {
    let h = harness();
    let seen = log();
    h.sync.on_next_render_completed(push(&seen, "a"));

    h.looper.run_pending();
    assert!(seen.borrow().is_empty());
    assert!(h.frames.has_pending_frame_callbacks());

    h.clock.advance_ms(16);
    h.frames.render_frame();
    // The vsync callback only posts the continuation.
    assert!(seen.borrow().is_empty());

    h.looper.run_pending();
    assert_eq!(*seen.borrow(), vec![("a", Duration::from_millis(1016))]);
}

#[test]
fn test_continuation_runs_before_other_queued_work() {
    let h = harness();
    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = Rc::clone(&order);
        h.sync
            .on_next_render_completed(move |_| order.borrow_mut().push("render"));
    }
    {
        let order = Rc::clone(&order);
        h.looper.post(move || order.borrow_mut().push("queued"));
    }

    h.frames.render_frame();
    h.looper.run_pending();
    assert_eq!(*order.borrow(), vec!["render", "queued"]);
}

#[test]
fn test_callbacks_coalesce_in_registration_order() {
    let h = harness();
    let seen = log();
    h.sync.on_next_render_completed(push(&seen, "first"));
    h.sync.on_next_render_completed(push(&seen, "second"));
    h.sync.on_next_render_completed(push(&seen, "third"));
    assert_eq!(h.sync.pending_callbacks(), 3);

    h.frames.render_frame();
    h.looper.run_pending();

    let seen = seen.borrow();
    let names: Vec<_> = seen.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert!(seen.iter().all(|(_, uptime)| *uptime == seen[0].1));
    assert_eq!(h.frames.frames_rendered(), 1);
}

#[test]
fn test_single_frame_callback_for_coalesced_registrations() {
    let h = harness();
    let seen = log();
    h.sync.on_next_render_completed(push(&seen, "a"));
    h.sync.on_next_render_completed(push(&seen, "b"));
    assert_eq!(h.frames.render_frame(), 1);
}

#[test]
fn test_registration_inside_rendering_pass_uses_current_pass() {
    let h = harness();
    let seen = log();
    let sync = h.sync.clone();
    let cb = push(&seen, "during");

    h.frames.render_frame_with(move || {
        assert!(!sync.inner.scheduled.get());
        sync.on_next_render_completed(cb);
    });
    assert!(!h.frames.has_pending_frame_callbacks());

    h.looper.run_pending();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_reentrant_registration_waits_for_following_frame() {
    let h = harness();
    let seen = log();
    {
        let sync = h.sync.clone();
        let seen_inner = Rc::clone(&seen);
        h.sync.on_next_render_completed(move |uptime| {
            seen_inner.borrow_mut().push(("outer", uptime));
            sync.on_next_render_completed(push(&seen_inner, "inner"));
        });
    }

    h.frames.render_frame();
    h.looper.run_pending();
    assert_eq!(seen.borrow().len(), 1);
    assert!(h.frames.has_pending_frame_callbacks());

    h.clock.advance_ms(16);
    h.frames.render_frame();
    h.looper.run_pending();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].0, "inner");
    assert_eq!(seen[1].1, seen[0].1 + Duration::from_millis(16));
}

#[test]
fn test_rendering_flag_only_during_pass() {
    let h = harness();
    assert!(!h.frames.is_rendering_frame());
    let frames = Rc::clone(&h.frames);
    h.frames
        .render_frame_with(move || assert!(frames.is_rendering_frame()));
    assert!(!h.frames.is_rendering_frame());
}

#[test]
fn test_auto_frames_render_on_interval() {
    let clock = FakeClock::at_zero();
    let looper = Looper::new(ClockHandle::from(clock.clone()));
    let frames = SimulatedFrameScheduler::with_frame_interval(looper.clone(), Duration::from_millis(16));
    let sync = FrameSynchronizer::new(frames.clone(), ClockHandle::from(clock.clone()));
    let seen = log();

    sync.on_next_render_completed(push(&seen, "auto"));
    looper.advance_by(Duration::from_millis(15));
    assert!(seen.borrow().is_empty());

    looper.advance_by(Duration::from_millis(1));
    assert_eq!(*seen.borrow(), vec![("auto", Duration::from_millis(16))]);
    assert_eq!(frames.frames_rendered(), 1);

    // Idle: no further frames are scheduled.
    looper.advance_by(Duration::from_millis(100));
    assert_eq!(frames.frames_rendered(), 1);
}
