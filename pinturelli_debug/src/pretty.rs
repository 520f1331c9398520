// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use pinturelli_core::channel::Dispatch;
use pinturelli_core::trace::{
    DispatchEvent, FrameSummary, NodeChange, NodeLifecycleEvent, PassBeginEvent, PassEndEvent,
    TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    dispatches: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("dispatches", &self.dispatches)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            dispatches: true,
        }
    }

    /// Returns a copy that skips dispatch lines.
    ///
    /// Pointer moves dispatch on every event, which drowns out the frame
    /// lines in interactive sessions.
    #[must_use]
    pub fn without_dispatches(mut self) -> Self {
        self.dispatches = false;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn outcome(d: &Dispatch) -> &'static str {
    if d.vetoed {
        "vetoed"
    } else if d.stopped {
        "stopped"
    } else {
        "delivered"
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:begin] frame={} {}",
            e.frame_index,
            e.pass.as_str(),
        );
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:end] frame={} {} count={}",
            e.frame_index,
            e.pass.as_str(),
            e.count,
        );
    }

    fn on_node_attached(&mut self, e: &NodeLifecycleEvent<'_>) {
        let _ = writeln!(
            self.writer,
            "[attach] frame={} node={} slot={}",
            e.frame_index, e.node, e.node_index,
        );
    }

    fn on_node_detached(&mut self, e: &NodeLifecycleEvent<'_>) {
        let _ = writeln!(
            self.writer,
            "[detach] frame={} node={} slot={}",
            e.frame_index, e.node, e.node_index,
        );
    }

    fn on_dispatch(&mut self, e: &DispatchEvent<'_>) {
        if !self.dispatches {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[dispatch] frame={} {}:{} {} invoked={} skipped={}",
            e.frame_index,
            e.target,
            e.event,
            outcome(&e.outcome),
            e.outcome.invoked,
            e.outcome.skipped,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} updated={} moved={} drawn={} blits={} \
             released={} attached={} detached={}",
            s.frame_index,
            s.updated,
            s.moved,
            s.drawn,
            s.blits,
            s.captures_released,
            s.attached,
            s.detached,
        );
    }

    fn on_node_changes(&mut self, frame_index: u64, changes: &[NodeChange]) {
        let _ = writeln!(
            self.writer,
            "[changes] frame={frame_index} nodes={}",
            changes.len(),
        );
    }
}
