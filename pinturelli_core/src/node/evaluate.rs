// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame evaluation and change tracking.
//!
//! Evaluation drains each dirty channel once per frame:
//!
//! 1. **POSITION**: Drain dirty indices (parent before child), recompute
//!    each active node's accumulated origin and visibility, and mark its
//!    capture stale. Inactive nodes are skipped; they are repositioned when
//!    reactivated.
//! 2. **CONTENT**: Drain dirty indices (no recomputation; surfaces are
//!    repainted by the draw pass).
//! 3. **TOPOLOGY**: Drain and report whether anything was attached,
//!    detached, or reactivated.
//!
//! [`FrameChanges`] uses raw slot indices (`u32`), matching
//! [`NodeId::index`](super::NodeId::index).

use alloc::vec::Vec;

use super::tree::NodeTree;
use crate::dirty;

/// The set of changes produced by a single [`NodeTree::evaluate`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameChanges {
    /// Active nodes whose accumulated geometry was recomputed.
    pub moved: Vec<u32>,
    /// Nodes whose surface content or size changed.
    pub content: Vec<u32>,
    /// Nodes activated since the last evaluate.
    pub attached: Vec<u32>,
    /// Nodes deactivated since the last evaluate.
    pub detached: Vec<u32>,
    /// Whether the draw order changed.
    pub topology_changed: bool,
}

impl FrameChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.moved.clear();
        self.content.clear();
        self.attached.clear();
        self.detached.clear();
        self.topology_changed = false;
    }

    /// Returns whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
            && self.content.is_empty()
            && self.attached.is_empty()
            && self.detached.is_empty()
            && !self.topology_changed
    }
}

impl NodeTree {
    /// Evaluates the tree, recomputing dirty geometry and returning the set
    /// of changes.
    pub fn evaluate(&mut self) -> FrameChanges {
        let mut changes = FrameChanges::default();
        self.evaluate_into(&mut changes);
        changes
    }

    /// Like [`evaluate`](Self::evaluate), but reuses a caller-provided buffer.
    pub fn evaluate_into(&mut self, changes: &mut FrameChanges) {
        changes.clear();

        let dirty_positions: Vec<u32> = self
            .dirty
            .drain(dirty::POSITION)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in dirty_positions {
            if self.off[idx as usize] {
                continue;
            }
            self.update_position_at(idx);
            self.capture_stale[idx as usize] = true;
            changes.moved.push(idx);
        }

        changes.content = self
            .dirty
            .drain(dirty::CONTENT)
            .deterministic()
            .run()
            .collect();

        let topology: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();

        core::mem::swap(&mut self.pending_attached, &mut changes.attached);
        core::mem::swap(&mut self.pending_detached, &mut changes.detached);
        changes.topology_changed =
            !topology.is_empty() || !changes.attached.is_empty() || !changes.detached.is_empty();
    }
}
