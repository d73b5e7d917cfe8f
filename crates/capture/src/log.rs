// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Update log implementation.

use crate::record::{CapturedUpdate, UpdateKind};
use crate::CaptureError;
use interlat::{InteractionUpdate, InteractionUpdateListener, UsageError};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Records the update stream of a client.
///
/// Plug a clone into [`InteractionClientBuilder::listener`] and keep another
/// for assertions; clones share the same log.
///
/// [`InteractionClientBuilder::listener`]: interlat::InteractionClientBuilder::listener
pub struct UpdateLog {
    start: Instant,
    updates: Arc<Mutex<Vec<CapturedUpdate>>>,
    usage_errors: Arc<Mutex<Vec<UsageError>>>,
    file_writer: Option<Arc<Mutex<BufWriter<File>>>>,
}

impl UpdateLog {
    /// Create a new in-memory update log
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            updates: Arc::new(Mutex::new(Vec::new())),
            usage_errors: Arc::new(Mutex::new(Vec::new())),
            file_writer: None,
        }
    }

    /// Create an update log that also appends to a file (JSONL format)
    pub fn with_file(path: &Path) -> Result<Self, CaptureError> {
        let file = File::create(path)?;
        Ok(Self {
            file_writer: Some(Arc::new(Mutex::new(BufWriter::new(file)))),
            ..Self::new()
        })
    }

    /// Record an update
    pub fn record(&self, update: &InteractionUpdate) -> CapturedUpdate {
        let mut updates = self.updates.lock();
        let captured = CapturedUpdate::from_update(updates.len() as u64, self.start.elapsed(), update);
        updates.push(captured.clone());

        if let Some(ref writer) = self.file_writer {
            let mut w = writer.lock();
            let written = serde_json::to_string(&captured)
                .map_err(CaptureError::from)
                .and_then(|json| {
                    writeln!(w, "{json}")?;
                    w.flush()?;
                    Ok(())
                });
            if let Err(error) = written {
                tracing::warn!(%error, seq = captured.seq, "failed to append captured update");
            }
        }
        captured
    }

    /// Get all captured updates
    pub fn updates(&self) -> Vec<CapturedUpdate> {
        self.updates.lock().clone()
    }

    /// Get the last N updates
    pub fn last(&self, n: usize) -> Vec<CapturedUpdate> {
        let all = self.updates.lock();
        all.iter().rev().take(n).rev().cloned().collect()
    }

    /// Count updates matching a predicate
    pub fn count<F: Fn(&CapturedUpdate) -> bool>(&self, pred: F) -> usize {
        self.updates.lock().iter().filter(|u| pred(u)).count()
    }

    /// Updates of one interaction, in order
    pub fn for_interaction(&self, interaction_id: u64) -> Vec<CapturedUpdate> {
        self.filtered(|u| u.interaction_id == interaction_id)
    }

    /// `rendered` updates
    pub fn rendered(&self) -> Vec<CapturedUpdate> {
        self.filtered(|u| u.kind == UpdateKind::Rendered)
    }

    /// Updates of any cancel kind
    pub fn canceled(&self) -> Vec<CapturedUpdate> {
        self.filtered(|u| u.kind.is_cancel())
    }

    /// Usage errors reported to the log
    pub fn usage_errors(&self) -> Vec<UsageError> {
        self.usage_errors.lock().clone()
    }

    /// Get the total number of updates
    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.updates.lock().is_empty()
    }

    /// Clear all recorded updates and usage errors
    pub fn clear(&self) {
        self.updates.lock().clear();
        self.usage_errors.lock().clear();
    }

    fn filtered(&self, pred: impl Fn(&CapturedUpdate) -> bool) -> Vec<CapturedUpdate> {
        self.updates
            .lock()
            .iter()
            .filter(|u| pred(u))
            .cloned()
            .collect()
    }
}

impl Default for UpdateLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for UpdateLog {
    fn clone(&self) -> Self {
        Self {
            start: self.start,
            updates: Arc::clone(&self.updates),
            usage_errors: Arc::clone(&self.usage_errors),
            file_writer: self.file_writer.as_ref().map(Arc::clone),
        }
    }
}

impl InteractionUpdateListener for UpdateLog {
    fn on_update(&self, update: &InteractionUpdate) {
        self.record(update);
    }

    fn on_usage_error(&self, error: &UsageError) {
        tracing::warn!(%error, "interaction usage error");
        self.usage_errors.lock().push(error.clone());
    }
}

/// Load a JSONL capture written by [`UpdateLog::with_file`]
pub fn read_jsonl(path: &Path) -> Result<Vec<CapturedUpdate>, CaptureError> {
    parse_jsonl(&std::fs::read_to_string(path)?)
}

/// Parse JSONL capture content, one update per line
///
/// Blank lines are skipped.
pub fn parse_jsonl(content: &str) -> Result<Vec<CapturedUpdate>, CaptureError> {
    let mut updates = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let update = serde_json::from_str(line).map_err(|source| CaptureError::Line {
            line: index + 1,
            source,
        })?;
        updates.push(update);
    }
    Ok(updates)
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
