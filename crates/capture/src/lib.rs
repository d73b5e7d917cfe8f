// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Update capture and recording for test assertions.
//!
//! This crate records the [`InteractionUpdate`](interlat::InteractionUpdate)
//! stream of an interlat client in memory and, optionally, as JSONL for
//! offline latency reports.

mod duration_serde;
mod log;
mod record;

use thiserror::Error;

pub use log::{parse_jsonl, read_jsonl, UpdateLog};
pub use record::{CapturedUpdate, UpdateKind};

/// Errors that can occur when writing or reading captures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode capture record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid capture record on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
