// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, NodeId};
use super::tree::NodeTree;

/// An iterator over the direct children of a node, in paint order.
///
/// Created by [`NodeTree::children`]. Inactive children are included.
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a NodeTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a NodeTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(NodeId(idx))
    }
}

/// An iterator from a node up to the root, starting with the node itself.
///
/// Created by [`NodeTree::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    tree: &'a NodeTree,
    current: u32,
}

impl<'a> Ancestors<'a> {
    pub(crate) fn new(tree: &'a NodeTree, start: u32) -> Self {
        Self {
            tree,
            current: start,
        }
    }
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.parent[idx as usize];
        Some(NodeId(idx))
    }
}
