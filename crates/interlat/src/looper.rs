// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The single execution context.
//!
//! A [`Looper`] is a cooperative message loop bound to the thread that created
//! it. All engine, trigger-stack and tracked-interaction state lives on that
//! thread and is only touched from jobs the looper runs, so none of it needs
//! locking. The only shared state is the remote queue behind [`LooperHandle`],
//! which other threads use to marshal work onto the looper.
//!
//! Ordering contract:
//! - `post` appends to the queue; `post_at_front` jumps ahead of everything
//!   already queued.
//! - Remote messages join the back of the queue in arrival order.
//! - Delayed jobs join the back of the queue once their deadline has passed,
//!   earliest deadline first.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::time::{Clock, ClockHandle};

type Job = Box<dyn FnOnce()>;
type RemoteJob = Box<dyn FnOnce() + Send>;

/// Token identifying a delayed job so it can be canceled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Identifier of a registered pump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PumpId(u64);

enum RemoteMessage {
    Job(RemoteJob),
    Pump(PumpId),
}

struct Remote {
    thread: ThreadId,
    messages: Mutex<VecDeque<RemoteMessage>>,
    wakeup: Condvar,
}

impl Remote {
    fn push(&self, message: RemoteMessage) {
        self.messages.lock().push_back(message);
        self.wakeup.notify_one();
    }
}

thread_local! {
    static PUMPS: RefCell<HashMap<PumpId, Rc<dyn Fn()>>> = RefCell::new(HashMap::new());
}

static NEXT_PUMP: AtomicU64 = AtomicU64::new(1);

fn run_pump(id: PumpId) {
    // Clone out of the registry so the pump may register or drop pumps itself.
    let pump = PUMPS.with(|pumps| pumps.borrow().get(&id).cloned());
    if let Some(pump) = pump {
        pump();
    }
}

struct Inner {
    clock: ClockHandle,
    remote: Arc<Remote>,
    queue: RefCell<VecDeque<Job>>,
    timers: RefCell<BTreeMap<(Duration, u64), Job>>,
    deadlines: RefCell<HashMap<u64, Duration>>,
    next_timer: Cell<u64>,
}

/// Cooperative message loop owning the single execution context.
///
/// Cloning yields another handle to the same loop.
#[derive(Clone)]
pub struct Looper {
    inner: Rc<Inner>,
}

impl Looper {
    /// Create a looper bound to the current thread.
    pub fn new(clock: ClockHandle) -> Self {
        let remote = Arc::new(Remote {
            thread: thread::current().id(),
            messages: Mutex::new(VecDeque::new()),
            wakeup: Condvar::new(),
        });
        Self {
            inner: Rc::new(Inner {
                clock,
                remote,
                queue: RefCell::new(VecDeque::new()),
                timers: RefCell::new(BTreeMap::new()),
                deadlines: RefCell::new(HashMap::new()),
                next_timer: Cell::new(1),
            }),
        }
    }

    /// The clock deadlines are measured against.
    pub fn clock(&self) -> &ClockHandle {
        &self.inner.clock
    }

    /// A `Send + Sync` handle for marshaling work from other threads.
    pub fn handle(&self) -> LooperHandle {
        LooperHandle {
            remote: Arc::clone(&self.inner.remote),
        }
    }

    /// Whether the calling thread owns this looper.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.remote.thread
    }

    /// Fail loudly when a main-context-only operation runs elsewhere.
    pub fn assert_current(&self, operation: &str) {
        assert!(
            self.is_current(),
            "{operation} must be called on the looper thread"
        );
    }

    /// Queue a job behind everything already queued.
    pub fn post(&self, job: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(job));
    }

    /// Queue a job ahead of everything already queued.
    pub fn post_at_front(&self, job: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_front(Box::new(job));
    }

    /// Queue a job once `delay` has elapsed on the looper clock.
    pub fn post_delayed(&self, delay: Duration, job: impl FnOnce() + 'static) -> TimerToken {
        let seq = self.inner.next_timer.get();
        self.inner.next_timer.set(seq + 1);
        let deadline = self.inner.clock.now().saturating_add(delay);
        self.inner
            .timers
            .borrow_mut()
            .insert((deadline, seq), Box::new(job));
        self.inner.deadlines.borrow_mut().insert(seq, deadline);
        TimerToken(seq)
    }

    /// Remove a delayed job that has not fired yet.
    ///
    /// Returns `false` if the job already fired or was canceled.
    pub fn cancel(&self, token: TimerToken) -> bool {
        let Some(deadline) = self.inner.deadlines.borrow_mut().remove(&token.0) else {
            return false;
        };
        self.inner
            .timers
            .borrow_mut()
            .remove(&(deadline, token.0))
            .is_some()
    }

    /// Whether a delayed job is still waiting to fire.
    pub fn is_scheduled(&self, token: TimerToken) -> bool {
        self.inner.deadlines.borrow().contains_key(&token.0)
    }

    /// Number of delayed jobs waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Number of jobs queued to run now.
    pub fn queued_jobs(&self) -> usize {
        self.inner.queue.borrow().len() + self.inner.remote.messages.lock().len()
    }

    /// Deadline of the earliest delayed job.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .timers
            .borrow()
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Register a thread-local pump that can be woken through [`LooperHandle`].
    pub fn register_pump(&self, pump: impl Fn() + 'static) -> PumpRegistration {
        self.assert_current("register_pump");
        let id = PumpId(NEXT_PUMP.fetch_add(1, Ordering::Relaxed));
        PUMPS.with(|pumps| pumps.borrow_mut().insert(id, Rc::new(pump)));
        PumpRegistration {
            id,
            _not_send: PhantomData,
        }
    }

    /// Run everything runnable right now, including work queued while running.
    ///
    /// Returns the number of jobs run.
    pub fn run_pending(&self) -> usize {
        self.assert_current("run_pending");
        let mut ran = 0;
        loop {
            self.drain_remote();
            self.promote_due_timers();
            let job = self.inner.queue.borrow_mut().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    /// Move virtual time forward, firing timers in deadline order.
    ///
    /// The clock is set to each timer's deadline before it runs. With a system
    /// clock this only runs pending work.
    pub fn advance_by(&self, duration: Duration) -> usize {
        self.assert_current("advance_by");
        let Some(fake) = self.inner.clock.as_fake().cloned() else {
            return self.run_pending();
        };
        let target = fake.now().saturating_add(duration);
        let mut ran = 0;
        loop {
            ran += self.run_pending();
            match self.next_deadline() {
                Some(deadline) if deadline <= target => fake.set(deadline),
                _ => break,
            }
        }
        fake.set(target);
        ran + self.run_pending()
    }

    /// Run the loop on the owning thread until `stop` returns true.
    ///
    /// Sleeps until the next timer deadline or a remote wake-up. With a fake
    /// clock, idle periods jump straight to the next deadline.
    pub fn run_until(&self, mut stop: impl FnMut() -> bool) {
        self.assert_current("run_until");
        loop {
            self.run_pending();
            if stop() {
                return;
            }
            let deadline = self.next_deadline();
            if let (Some(fake), Some(deadline)) = (self.inner.clock.as_fake(), deadline) {
                if self.inner.remote.messages.lock().is_empty() {
                    fake.set(deadline);
                }
                continue;
            }
            let mut messages = self.inner.remote.messages.lock();
            if !messages.is_empty() {
                continue;
            }
            match deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_sub(self.inner.clock.now());
                    self.inner.remote.wakeup.wait_for(&mut messages, wait);
                }
                None => self.inner.remote.wakeup.wait(&mut messages),
            }
        }
    }

    fn drain_remote(&self) {
        let messages = std::mem::take(&mut *self.inner.remote.messages.lock());
        if messages.is_empty() {
            return;
        }
        let mut queue = self.inner.queue.borrow_mut();
        for message in messages {
            match message {
                RemoteMessage::Job(job) => queue.push_back(job),
                RemoteMessage::Pump(id) => queue.push_back(Box::new(move || run_pump(id))),
            }
        }
    }

    fn promote_due_timers(&self) {
        let now = self.inner.clock.now();
        let mut timers = self.inner.timers.borrow_mut();
        let mut deadlines = self.inner.deadlines.borrow_mut();
        let mut queue = self.inner.queue.borrow_mut();
        while let Some(entry) = timers.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, seq), job) = entry.remove_entry();
            deadlines.remove(&seq);
            queue.push_back(job);
        }
    }
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Looper")
            .field("thread", &self.inner.remote.thread)
            .field("queued", &self.inner.queue.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .finish()
    }
}

/// Cross-thread handle to a [`Looper`].
#[derive(Clone)]
pub struct LooperHandle {
    remote: Arc<Remote>,
}

impl LooperHandle {
    /// Whether the calling thread owns the looper.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.remote.thread
    }

    /// Queue a job on the looper from any thread.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        self.remote.push(RemoteMessage::Job(Box::new(job)));
    }

    /// Run a pump: synchronously on the looper thread, queued from elsewhere.
    pub fn wake_pump(&self, pump: PumpId) {
        if self.is_current() {
            run_pump(pump);
        } else {
            self.remote.push(RemoteMessage::Pump(pump));
        }
    }
}

impl fmt::Debug for LooperHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LooperHandle")
            .field("thread", &self.remote.thread)
            .finish()
    }
}

/// Keeps a pump registered; unregisters on drop.
#[derive(Debug)]
pub struct PumpRegistration {
    id: PumpId,
    _not_send: PhantomData<Rc<()>>,
}

impl PumpRegistration {
    /// The id to pass to [`LooperHandle::wake_pump`].
    pub fn id(&self) -> PumpId {
        self.id
    }
}

impl Drop for PumpRegistration {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = PUMPS.try_with(|pumps| pumps.borrow_mut().remove(&self.id));
    }
}

#[cfg(test)]
#[path = "looper_tests.rs"]
mod tests;
