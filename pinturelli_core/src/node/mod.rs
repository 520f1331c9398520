// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node tree data model.
//!
//! A *node* is a positioned, sized element of the scene. Each node has:
//!
//! - An identity: a unique string id chosen by the author, and a compact
//!   [`NodeId`] handle indexing the tree's struct-of-arrays storage.
//! - Topology: parent, first-child, and sibling links forming an ordered
//!   tree. Child order is paint order, back to front.
//! - **Local geometry** set by the caller:
//!   [`local offset`](NodeTree::set_local_offset) and
//!   [`size`](NodeTree::set_size).
//! - **Accumulated geometry** maintained by the tree: the absolute origin
//!   (parent origin plus local offset) and on-canvas visibility.
//! - Activation: nodes are created *off* and go live when attached.
//!   [`detach`](NodeTree::detach) turns a whole subtree off without
//!   unlinking it; [`reactivate`](NodeTree::reactivate) brings it back.
//! - Surfaces: an optional graphic surface the widget paints into, and an
//!   optional [capture](NodeTree::create_capture) of the whole subtree.
//!
//! # Dirty tracking
//!
//! Offset changes update the node itself immediately and mark its subtree on
//! the POSITION channel (see [`dirty`](crate::dirty));
//! [`evaluate`](NodeTree::evaluate) brings the descendants up to date once
//! per frame.

mod capture;
mod evaluate;
mod id;
mod traverse;
mod tree;

pub use evaluate::FrameChanges;
pub use id::{INVALID, NodeId, SurfaceId};
pub use traverse::{Ancestors, Children};
pub use tree::NodeTree;
