// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The node tree uses multi-channel dirty tracking (via [`understory_dirty`])
//! to defer accumulated-geometry recomputation to the next evaluation.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`POSITION`] uses
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) over child → parent
//!   dependency edges added on attach. Moving a node marks its whole subtree,
//!   because accumulated positions are inherited.
//!
//! - **Local-only**: [`CONTENT`] is marked when a widget paints into its
//!   surface or is resized. Only the node itself appears in the drain output.
//!
//! - **Structural**: [`TOPOLOGY`] is marked on attach, detach, and
//!   reactivation. It is drained and reported, never propagated.
//!
//! Capture invalidation runs the other way (toward the root) and is tracked
//! with a per-node stale bit instead; see
//! [`NodeTree::invalidate_capture`](crate::node::NodeTree::invalidate_capture).
//!
//! # Consumption
//!
//! [`NodeTree::evaluate`](crate::node::NodeTree::evaluate) drains all
//! channels and surfaces the results as
//! [`FrameChanges`](crate::node::FrameChanges).

use understory_dirty::Channel;

/// Local offset changed, or an ancestor moved.
pub const POSITION: Channel = Channel::new(0);

/// Surface content or size changed.
pub const CONTENT: Channel = Channel::new(1);

/// Tree topology or activation changed.
pub const TOPOLOGY: Channel = Channel::new(2);
