// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Latency summaries from interlat capture logs.
//!
//! [`summarize`] folds a capture into per-interaction counts and display
//! latency percentiles; [`render_table`] prints them for humans.

use interlat_capture::{CaptureError, CapturedUpdate, UpdateKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while producing a report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read capture {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::as_millis_f64(*duration))
    }
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Nearest-rank percentiles over a set of durations
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    #[serde(rename = "p50_ms", with = "millis")]
    pub p50: Duration,
    #[serde(rename = "p90_ms", with = "millis")]
    pub p90: Duration,
    #[serde(rename = "p99_ms", with = "millis")]
    pub p99: Duration,
    #[serde(rename = "max_ms", with = "millis")]
    pub max: Duration,
}

impl LatencyStats {
    /// `None` for an empty sample
    pub fn from_samples(mut samples: Vec<Duration>) -> Option<Self> {
        let max = *samples.iter().max()?;
        samples.sort_unstable();
        Some(Self {
            count: samples.len(),
            p50: nearest_rank(&samples, 50),
            p90: nearest_rank(&samples, 90),
            p99: nearest_rank(&samples, 99),
            max,
        })
    }
}

/// Smallest sample with at least `percent` of the samples at or below it.
fn nearest_rank(sorted: &[Duration], percent: usize) -> Duration {
    let rank = (percent * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

/// Counts and latencies for one interaction description
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InteractionSummary {
    pub interaction: String,
    pub started: usize,
    pub finished: usize,
    pub rendered: usize,
    pub canceled_on_event: usize,
    pub canceled_on_timeout: usize,
    pub canceled_on_rule_removed: usize,
    /// Start of the capture still running or finishing at its end
    pub unresolved: usize,
    /// Starting event to frame
    pub display: Option<LatencyStats>,
    /// Trigger to frame, for attributed interactions
    pub trigger: Option<LatencyStats>,
}

impl InteractionSummary {
    pub fn canceled(&self) -> usize {
        self.canceled_on_event + self.canceled_on_timeout + self.canceled_on_rule_removed
    }
}

/// A whole capture, summarized
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LatencyReport {
    pub updates: usize,
    /// Sorted by interaction description
    pub interactions: Vec<InteractionSummary>,
}

#[derive(Default)]
struct Accumulator {
    summary: InteractionSummary,
    display: Vec<Duration>,
    trigger: Vec<Duration>,
}

/// Fold captured updates into a report
pub fn summarize(updates: &[CapturedUpdate]) -> LatencyReport {
    let mut by_name: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for update in updates {
        let acc = by_name.entry(update.interaction.as_str()).or_default();
        let summary = &mut acc.summary;
        match update.kind {
            UpdateKind::Start => summary.started += 1,
            UpdateKind::RecordEvent => {}
            UpdateKind::Finish => summary.finished += 1,
            UpdateKind::CancelOnEvent => summary.canceled_on_event += 1,
            UpdateKind::CancelOnTimeout => summary.canceled_on_timeout += 1,
            UpdateKind::CancelOnRuleRemoved => summary.canceled_on_rule_removed += 1,
            UpdateKind::Rendered => {
                summary.rendered += 1;
                acc.display.extend(update.display_duration);
                acc.trigger.extend(update.trigger_duration);
            }
        }
    }

    let interactions = by_name
        .into_iter()
        .map(|(name, acc)| {
            let mut summary = acc.summary;
            summary.interaction = name.to_string();
            summary.unresolved = summary
                .started
                .saturating_sub(summary.rendered + summary.canceled());
            summary.display = LatencyStats::from_samples(acc.display);
            summary.trigger = LatencyStats::from_samples(acc.trigger);
            summary
        })
        .collect();

    LatencyReport {
        updates: updates.len(),
        interactions,
    }
}

fn format_ms(stats: Option<&LatencyStats>, pick: fn(&LatencyStats) -> Duration) -> String {
    match stats {
        Some(stats) => format!("{:.1}", as_millis_f64(pick(stats))),
        None => "-".to_string(),
    }
}

/// Plain-text table, one row per interaction
///
/// With `verbose`, cancel causes and trigger latency get their own rows.
pub fn render_table(report: &LatencyReport, verbose: bool) -> String {
    let width = report
        .interactions
        .iter()
        .map(|s| s.interaction.chars().count())
        .max()
        .unwrap_or(0)
        .max("interaction".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>7}  {:>8}  {:>8}  {:>8}  {:>8}  {:>8}  {:>8}",
        "interaction", "started", "rendered", "canceled", "p50 ms", "p90 ms", "p99 ms", "max ms"
    );
    for summary in &report.interactions {
        let display = summary.display.as_ref();
        let _ = writeln!(
            out,
            "{:<width$}  {:>7}  {:>8}  {:>8}  {:>8}  {:>8}  {:>8}  {:>8}",
            summary.interaction,
            summary.started,
            summary.rendered,
            summary.canceled(),
            format_ms(display, |s| s.p50),
            format_ms(display, |s| s.p90),
            format_ms(display, |s| s.p99),
            format_ms(display, |s| s.max),
        );
        if verbose {
            let _ = writeln!(
                out,
                "{:<width$}  on event {}, on timeout {}, on rule removed {}, unresolved {}",
                "",
                summary.canceled_on_event,
                summary.canceled_on_timeout,
                summary.canceled_on_rule_removed,
                summary.unresolved,
            );
            if let Some(trigger) = summary.trigger.as_ref() {
                let _ = writeln!(
                    out,
                    "{:<width$}  trigger p50 {} ms, p90 {} ms, max {} ms",
                    "",
                    format_ms(Some(trigger), |s| s.p50),
                    format_ms(Some(trigger), |s| s.p90),
                    format_ms(Some(trigger), |s| s.max),
                );
            }
        }
    }
    let _ = writeln!(
        out,
        "{} updates, {} interactions",
        report.updates,
        report.interactions.len()
    );
    out
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
