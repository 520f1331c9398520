// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records, each stamped with the microseconds
//! elapsed since the recorder was created. [`decode`] reads them back as an
//! iterator of [`RecordedEvent`].
//!
//! Node change events ([`on_node_changes`](TraceSink::on_node_changes)) store
//! only the count.

use std::time::Instant;

use pinturelli_core::channel::Dispatch;
use pinturelli_core::trace::{
    DispatchEvent, FrameSummary, NodeChange, NodeLifecycleEvent, PassBeginEvent, PassEndEvent,
    PassKind, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PASS_BEGIN: u8 = 1;
const TAG_PASS_END: u8 = 2;
const TAG_NODE_ATTACHED: u8 = 3;
const TAG_NODE_DETACHED: u8 = 4;
const TAG_DISPATCH: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_NODE_CHANGES_COUNT: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug)]
pub struct RecorderSink {
    buf: Vec<u8>,
    origin: Instant,
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSink {
    /// Creates an empty recorder. Timestamps count from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            origin: Instant::now(),
        }
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, v: usize) {
        self.write_u64(u64::try_from(v).unwrap_or(u64::MAX));
    }

    fn write_str(&mut self, s: &str) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "node ids and event names longer than u32::MAX are truncated"
        )]
        let len = s.len().min(u32::MAX as usize) as u32;
        self.write_u32(len);
        self.buf.extend_from_slice(&s.as_bytes()[..len as usize]);
    }

    fn write_stamp(&mut self) {
        let micros = self.origin.elapsed().as_micros();
        self.write_u64(u64::try_from(micros).unwrap_or(u64::MAX));
    }

    fn write_pass(&mut self, p: PassKind) {
        self.write_u8(match p {
            PassKind::Update => 0,
            PassKind::Evaluate => 1,
            PassKind::Draw => 2,
            PassKind::Compose => 3,
            PassKind::ForcedRedraw => 4,
        });
    }

    fn write_lifecycle(&mut self, tag: u8, e: &NodeLifecycleEvent<'_>) {
        self.write_u8(tag);
        self.write_stamp();
        self.write_u64(e.frame_index);
        self.write_u32(e.node_index);
        self.write_str(e.node);
    }
}

impl TraceSink for RecorderSink {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.write_u8(TAG_PASS_BEGIN);
        self.write_stamp();
        self.write_u64(e.frame_index);
        self.write_pass(e.pass);
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.write_u8(TAG_PASS_END);
        self.write_stamp();
        self.write_u64(e.frame_index);
        self.write_pass(e.pass);
        self.write_count(e.count);
    }

    fn on_node_attached(&mut self, e: &NodeLifecycleEvent<'_>) {
        self.write_lifecycle(TAG_NODE_ATTACHED, e);
    }

    fn on_node_detached(&mut self, e: &NodeLifecycleEvent<'_>) {
        self.write_lifecycle(TAG_NODE_DETACHED, e);
    }

    fn on_dispatch(&mut self, e: &DispatchEvent<'_>) {
        self.write_u8(TAG_DISPATCH);
        self.write_stamp();
        self.write_u64(e.frame_index);
        self.write_str(e.target);
        self.write_str(e.event);
        self.write_u8(u8::from(e.outcome.vetoed) | (u8::from(e.outcome.stopped) << 1));
        self.write_count(e.outcome.invoked);
        self.write_count(e.outcome.skipped);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_stamp();
        self.write_u64(s.frame_index);
        self.write_count(s.updated);
        self.write_count(s.moved);
        self.write_count(s.drawn);
        self.write_count(s.blits);
        self.write_count(s.captures_released);
        self.write_count(s.attached);
        self.write_count(s.detached);
    }

    fn on_node_changes(&mut self, frame_index: u64, changes: &[NodeChange]) {
        self.write_u8(TAG_NODE_CHANGES_COUNT);
        self.write_stamp();
        self.write_u64(frame_index);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "node change count capped at u32::MAX for recording"
        )]
        self.write_u32(changes.len().min(u32::MAX as usize) as u32);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Microseconds since the recorder was created.
    pub at_us: u64,
    /// The event.
    pub kind: RecordedKind,
}

/// Payload of a [`RecordedEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedKind {
    /// A [`PassBeginEvent`].
    PassBegin {
        /// Frame counter.
        frame_index: u64,
        /// Which pass.
        pass: PassKind,
    },
    /// A [`PassEndEvent`].
    PassEnd {
        /// Frame counter.
        frame_index: u64,
        /// Which pass.
        pass: PassKind,
        /// Nodes visited or blits performed.
        count: u64,
    },
    /// A node-attached [`NodeLifecycleEvent`].
    NodeAttached {
        /// Frame counter.
        frame_index: u64,
        /// Slot index.
        node_index: u32,
        /// String id.
        node: String,
    },
    /// A node-detached [`NodeLifecycleEvent`].
    NodeDetached {
        /// Frame counter.
        frame_index: u64,
        /// Slot index.
        node_index: u32,
        /// String id.
        node: String,
    },
    /// A [`DispatchEvent`].
    Dispatch {
        /// Frame counter.
        frame_index: u64,
        /// Target node id.
        target: String,
        /// Event name.
        event: String,
        /// What happened.
        outcome: Dispatch,
    },
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Node-change count for a frame.
    NodeChangesCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of node changes.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u64()?).ok()
    }

    fn read_str(&mut self) -> Option<String> {
        let len = usize::try_from(self.read_u32()?).ok()?;
        Some(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn read_pass(&mut self) -> Option<PassKind> {
        Some(match self.read_u8()? {
            0 => PassKind::Update,
            1 => PassKind::Evaluate,
            2 => PassKind::Draw,
            3 => PassKind::Compose,
            4 => PassKind::ForcedRedraw,
            _ => return None,
        })
    }

    fn decode_kind(&mut self, tag: u8) -> Option<RecordedKind> {
        Some(match tag {
            TAG_PASS_BEGIN => RecordedKind::PassBegin {
                frame_index: self.read_u64()?,
                pass: self.read_pass()?,
            },
            TAG_PASS_END => RecordedKind::PassEnd {
                frame_index: self.read_u64()?,
                pass: self.read_pass()?,
                count: self.read_u64()?,
            },
            TAG_NODE_ATTACHED => RecordedKind::NodeAttached {
                frame_index: self.read_u64()?,
                node_index: self.read_u32()?,
                node: self.read_str()?,
            },
            TAG_NODE_DETACHED => RecordedKind::NodeDetached {
                frame_index: self.read_u64()?,
                node_index: self.read_u32()?,
                node: self.read_str()?,
            },
            TAG_DISPATCH => {
                let frame_index = self.read_u64()?;
                let target = self.read_str()?;
                let event = self.read_str()?;
                let flags = self.read_u8()?;
                RecordedKind::Dispatch {
                    frame_index,
                    target,
                    event,
                    outcome: Dispatch {
                        vetoed: flags & 1 != 0,
                        stopped: flags & 2 != 0,
                        invoked: self.read_count()?,
                        skipped: self.read_count()?,
                    },
                }
            }
            TAG_FRAME_SUMMARY => RecordedKind::FrameSummary(FrameSummary {
                frame_index: self.read_u64()?,
                updated: self.read_count()?,
                moved: self.read_count()?,
                drawn: self.read_count()?,
                blits: self.read_count()?,
                captures_released: self.read_count()?,
                attached: self.read_count()?,
                detached: self.read_count()?,
            }),
            TAG_NODE_CHANGES_COUNT => RecordedKind::NodeChangesCount {
                frame_index: self.read_u64()?,
                count: self.read_u32()?,
            },
            // Unknown tag: stop iteration.
            _ => return None,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let at_us = self.read_u64()?;
        let kind = self.decode_kind(tag)?;
        Some(RecordedEvent { at_us, kind })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
