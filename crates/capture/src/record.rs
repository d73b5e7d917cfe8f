// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Captured update data types.

use crate::duration_serde;
use interlat::InteractionUpdate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle step of a captured update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Start,
    RecordEvent,
    CancelOnEvent,
    CancelOnTimeout,
    CancelOnRuleRemoved,
    Finish,
    Rendered,
}

impl UpdateKind {
    /// Whether the interaction ended with this update
    pub fn is_terminal(self) -> bool {
        self.is_cancel() || self == Self::Rendered
    }

    /// Whether this is one of the cancel variants
    pub fn is_cancel(self) -> bool {
        matches!(
            self,
            Self::CancelOnEvent | Self::CancelOnTimeout | Self::CancelOnRuleRemoved
        )
    }
}

impl From<&InteractionUpdate> for UpdateKind {
    fn from(update: &InteractionUpdate) -> Self {
        match update {
            InteractionUpdate::Start { .. } => Self::Start,
            InteractionUpdate::RecordEvent { .. } => Self::RecordEvent,
            InteractionUpdate::CancelOnEvent { .. } => Self::CancelOnEvent,
            InteractionUpdate::CancelOnTimeout { .. } => Self::CancelOnTimeout,
            InteractionUpdate::CancelOnRuleRemoved { .. } => Self::CancelOnRuleRemoved,
            InteractionUpdate::Finish { .. } => Self::Finish,
            InteractionUpdate::Rendered { .. } => Self::Rendered,
        }
    }
}

/// One captured update, flattened for JSONL
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapturedUpdate {
    /// Sequence number within the capture
    pub seq: u64,

    /// Elapsed wall time since capture started
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,

    pub kind: UpdateKind,

    /// Engine-assigned interaction id
    pub interaction_id: u64,

    /// Interaction description
    pub interaction: String,

    /// Name of the attributed trigger
    #[serde(default)]
    pub trigger: Option<String>,

    /// Debug rendering of the event that caused the update
    #[serde(default)]
    pub event: Option<String>,

    /// Send time of that event
    #[serde(default, with = "duration_serde::option")]
    pub event_uptime: Option<Duration>,

    /// Cancel reason for `cancel_on_event`
    #[serde(default)]
    pub reason: Option<String>,

    /// Armed timeout for `cancel_on_timeout`
    #[serde(default, with = "duration_serde::option")]
    pub timeout: Option<Duration>,

    /// Frame timestamp for `rendered`
    #[serde(default, with = "duration_serde::option")]
    pub frame_uptime: Option<Duration>,

    /// Starting event to frame, for `rendered`
    #[serde(default, with = "duration_serde::option")]
    pub display_duration: Option<Duration>,

    /// Trigger to frame, for `rendered` with a trigger
    #[serde(default, with = "duration_serde::option")]
    pub trigger_duration: Option<Duration>,

    /// Events recorded on the interaction so far
    #[serde(default)]
    pub events_recorded: usize,
}

impl CapturedUpdate {
    /// Flatten an update
    pub fn from_update(seq: u64, elapsed: Duration, update: &InteractionUpdate) -> Self {
        let snapshot = update.interaction();
        let event = update.event();
        let (reason, timeout, frame_uptime) = match update {
            InteractionUpdate::CancelOnEvent { reason, .. } => (Some(reason.clone()), None, None),
            InteractionUpdate::CancelOnTimeout { timeout, .. } => (None, Some(*timeout), None),
            InteractionUpdate::Rendered { frame_uptime, .. } => (None, None, Some(*frame_uptime)),
            _ => (None, None, None),
        };
        Self {
            seq,
            elapsed,
            kind: UpdateKind::from(update),
            interaction_id: snapshot.id.get(),
            interaction: snapshot.description(),
            trigger: snapshot.trigger.as_ref().map(|t| t.name()),
            event: event.map(|e| e.describe()),
            event_uptime: event.map(|e| e.uptime()),
            reason,
            timeout,
            frame_uptime,
            display_duration: update.display_duration(),
            trigger_duration: frame_uptime.and_then(|frame| snapshot.trigger_duration(frame)),
            events_recorded: snapshot.sent_events.len(),
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
