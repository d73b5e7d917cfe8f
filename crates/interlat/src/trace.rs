// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Trace-span provider seam.
//!
//! The crate never renders traces itself. It begins and ends async sections on
//! a [`TraceSink`] supplied by the host, identified by a `(label, cookie)` pair.
//! A [`TraceSpan`] is the owned end of such a section: it is not `Clone` and
//! ends exactly once, either explicitly or when dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

/// Host-provided tracing backend.
pub trait TraceSink {
    /// Begin an async section.
    fn begin_async_section(&self, label: &str, cookie: u32);

    /// End an async section previously begun with the same label and cookie.
    fn end_async_section(&self, label: &str, cookie: u32);
}

/// Emits sections as `tracing` events under the `interlat::trace` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTraceSink;

impl TraceSink for TracingTraceSink {
    fn begin_async_section(&self, label: &str, cookie: u32) {
        tracing::trace!(target: "interlat::trace", label, cookie, "begin");
    }

    fn end_async_section(&self, label: &str, cookie: u32) {
        tracing::trace!(target: "interlat::trace", label, cookie, "end");
    }
}

/// Discards all sections.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn begin_async_section(&self, _label: &str, _cookie: u32) {}

    fn end_async_section(&self, _label: &str, _cookie: u32) {}
}

/// A begin or end call observed by [`RecordingTraceSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceRecord {
    Begin { label: String, cookie: u32 },
    End { label: String, cookie: u32 },
}

/// Records every call, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingTraceSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl RecordingTraceSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far, in order.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().clone()
    }

    /// Number of `end` calls for a label.
    pub fn end_count(&self, label: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| matches!(r, TraceRecord::End { label: l, .. } if l == label))
            .count()
    }

    /// Labels of sections begun but not yet ended.
    pub fn open_sections(&self) -> Vec<String> {
        let records = self.records.lock();
        let mut open: Vec<(String, u32)> = Vec::new();
        for record in records.iter() {
            match record {
                TraceRecord::Begin { label, cookie } => open.push((label.clone(), *cookie)),
                TraceRecord::End { label, cookie } => {
                    open.retain(|(l, c)| !(l == label && c == cookie));
                }
            }
        }
        open.into_iter().map(|(label, _)| label).collect()
    }
}

impl TraceSink for RecordingTraceSink {
    fn begin_async_section(&self, label: &str, cookie: u32) {
        self.records.lock().push(TraceRecord::Begin {
            label: label.to_string(),
            cookie,
        });
    }

    fn end_async_section(&self, label: &str, cookie: u32) {
        self.records.lock().push(TraceRecord::End {
            label: label.to_string(),
            cookie,
        });
    }
}

static NEXT_COOKIE: AtomicU32 = AtomicU32::new(1);

/// An open async section. Ends exactly once.
pub struct TraceSpan {
    label: String,
    cookie: u32,
    sink: Option<Rc<dyn TraceSink>>,
}

impl TraceSpan {
    /// Begin a new section on `sink`.
    pub fn begin(sink: &Rc<dyn TraceSink>, label: impl Into<String>) -> Self {
        let label = label.into();
        let cookie = NEXT_COOKIE.fetch_add(1, Ordering::Relaxed);
        sink.begin_async_section(&label, cookie);
        Self {
            label,
            cookie,
            sink: Some(Rc::clone(sink)),
        }
    }

    /// Section label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Section cookie.
    pub fn cookie(&self) -> u32 {
        self.cookie
    }

    /// End the section now.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.end_async_section(&self.label, self.cookie);
        }
    }
}

impl Drop for TraceSpan {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TraceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSpan")
            .field("label", &self.label)
            .field("cookie", &self.cookie)
            .finish()
    }
}

/// A span that can be taken over by at most one new owner.
///
/// After [`take_over`](Self::take_over) succeeds the original holder no longer
/// controls when the span ends.
#[derive(Debug, Default)]
pub struct TakeOverTrace {
    span: RefCell<Option<TraceSpan>>,
}

impl TakeOverTrace {
    /// Wrap an open span.
    pub fn new(span: TraceSpan) -> Self {
        Self {
            span: RefCell::new(Some(span)),
        }
    }

    /// A holder with nothing to take over.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Claim the span. Only the first caller gets it.
    pub fn take_over(&self) -> Option<TraceSpan> {
        self.span.borrow_mut().take()
    }

    /// Whether the span is still unclaimed.
    pub fn is_available(&self) -> bool {
        self.span.borrow().is_some()
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
