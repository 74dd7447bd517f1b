//! Trace frames and per-invocation recording
//!
//! [`TraceFrame`] and [`TraceResult`] are the wire types consumed by the
//! visualizer. [`TraceRecorder`] is the mutable trace state of exactly one
//! invocation — the current-line cell, the ordered frame list, and the
//! subject program's captured output. A recorder is constructed fresh for
//! every run and never shared, so concurrent invocations cannot observe each
//! other's state.

pub mod serialize;

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One snapshot of variable state at one executed statement occurrence
#[derive(Debug, Clone, Serialize, Default)]
pub struct TraceFrame {
    /// Source line of the statement that just ran
    pub line_no: u32,
    /// Sequence bindings, deep-copied
    pub lists: BTreeMap<String, JsonValue>,
    /// Mapping bindings, deep-copied
    pub dicts: BTreeMap<String, JsonValue>,
    /// Scalar bindings
    pub prims: BTreeMap<String, JsonValue>,
    /// Chains reachable through a `next` field, as ordered `val` sequences
    pub linked: BTreeMap<String, JsonValue>,
    /// Binary trees as nested `{id, val, left, right}` records
    pub trees: BTreeMap<String, JsonValue>,
    /// For each list binding: the (int binding, value) pairs currently
    /// indexing into it
    pub array_indices: BTreeMap<String, Vec<(String, i64)>>,
}

/// The full result of one trace invocation
#[derive(Debug, Clone, Serialize)]
pub struct TraceResult {
    pub frames: Vec<TraceFrame>,
    pub complexity: String,
}

/// Mutable trace state scoped to a single invocation
#[derive(Debug, Default)]
pub struct TraceRecorder {
    current_line: u32,
    frames: Vec<TraceFrame>,
    output: Vec<String>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// "Record current line" hook: overwrite the current-line cell
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    /// Append a completed frame (frames arrive strictly in execution order)
    pub fn push_frame(&mut self, frame: TraceFrame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<TraceFrame> {
        self.frames
    }

    /// Record one line of subject `print` output
    pub fn print_line(&mut self, text: String) {
        self.output.push(text);
    }

    /// The subject program's captured output, one entry per `print` call
    pub fn output(&self) -> &[String] {
        &self.output
    }
}
