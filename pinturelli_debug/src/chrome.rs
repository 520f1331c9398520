// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedKind, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Passes become duration slices; everything else becomes an instant event.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        let ts = recorded.at_us;
        events.push(match recorded.kind {
            RecordedKind::PassBegin { frame_index, pass } => json!({
                "ph": "B",
                "name": pass.as_str(),
                "cat": "Frame",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": { "frame_index": frame_index }
            }),
            RecordedKind::PassEnd {
                frame_index,
                pass,
                count,
            } => json!({
                "ph": "E",
                "name": pass.as_str(),
                "cat": "Frame",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": { "frame_index": frame_index, "count": count }
            }),
            RecordedKind::NodeAttached {
                frame_index,
                node_index,
                node,
            } => lifecycle("NodeAttached", ts, frame_index, node_index, &node),
            RecordedKind::NodeDetached {
                frame_index,
                node_index,
                node,
            } => lifecycle("NodeDetached", ts, frame_index, node_index, &node),
            RecordedKind::Dispatch {
                frame_index,
                target,
                event,
                outcome,
            } => json!({
                "ph": "i",
                "name": format!("{target}:{event}"),
                "cat": "Channel",
                "ts": ts,
                "pid": 0,
                "tid": 1,
                "s": "t",
                "args": {
                    "frame_index": frame_index,
                    "vetoed": outcome.vetoed,
                    "stopped": outcome.stopped,
                    "invoked": outcome.invoked,
                    "skipped": outcome.skipped,
                }
            }),
            RecordedKind::FrameSummary(s) => json!({
                "ph": "i",
                "name": "FrameSummary",
                "cat": "Summary",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "g",
                "args": {
                    "frame_index": s.frame_index,
                    "updated": s.updated,
                    "moved": s.moved,
                    "drawn": s.drawn,
                    "blits": s.blits,
                    "captures_released": s.captures_released,
                    "attached": s.attached,
                    "detached": s.detached,
                }
            }),
            RecordedKind::NodeChangesCount { frame_index, count } => json!({
                "ph": "i",
                "name": "NodeChanges",
                "cat": "Rich",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "p",
                "args": { "frame_index": frame_index, "count": count }
            }),
        });
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn lifecycle(name: &str, ts: u64, frame_index: u64, node_index: u32, node: &str) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": "Tree",
        "ts": ts,
        "pid": 0,
        "tid": 0,
        "s": "t",
        "args": {
            "frame_index": frame_index,
            "node_index": node_index,
            "node": node,
        }
    })
}
