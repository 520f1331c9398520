// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Captures, composition, and surface-level position propagation.
//!
//! A *capture* is a canvas-sized surface holding the flattened composite of a
//! node and its visible active descendants, drawn at their absolute
//! positions. While a capture is valid, composition blits it in place of the
//! whole subtree.
//!
//! Any geometry or content change at or below a node sets the stale bit on
//! that node and every ancestor. Stale captures are released by the next
//! [`compose`](NodeTree::compose); they are rebuilt only through an explicit
//! [`create_capture`](NodeTree::create_capture).

use kurbo::Point;

use super::id::{INVALID, NodeId, SurfaceId};
use super::tree::NodeTree;
use crate::backend::{SurfaceBackend, Target};
use crate::error::SceneError;

impl NodeTree {
    /// Marks the captures of `node` and every ancestor stale.
    pub fn invalidate_capture(&mut self, node: NodeId) {
        self.check(node);
        self.invalidate_capture_at(node.0);
    }

    pub(crate) fn invalidate_capture_at(&mut self, mut idx: u32) {
        while idx != INVALID {
            self.capture_stale[idx as usize] = true;
            idx = self.parent[idx as usize];
        }
    }

    /// Returns the node's capture, if one was built and is still valid.
    #[must_use]
    pub fn capture(&self, node: NodeId) -> Option<SurfaceId> {
        self.check(node);
        let idx = node.0 as usize;
        self.capture[idx].filter(|_| !self.capture_stale[idx])
    }

    /// Builds the capture of `node` from the current surfaces.
    ///
    /// Ancestor captures are invalidated first, since they would otherwise
    /// keep showing the subtree as it was before. A previous capture of the
    /// node is released.
    ///
    /// # Errors
    ///
    /// - [`SceneError::InvalidTarget`] if `node` is not a node of this tree.
    /// - [`SceneError::NotInTree`] if `node` is inactive.
    pub fn create_capture(
        &mut self,
        node: NodeId,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<SurfaceId, SceneError> {
        self.check_target(node)?;
        let idx = node.0;
        if self.off[idx as usize] {
            return Err(SceneError::NotInTree {
                node: self.names[idx as usize].clone(),
            });
        }
        self.invalidate_capture_at(self.parent[idx as usize]);
        if let Some(old) = self.capture[idx as usize].take() {
            backend.release_surface(old);
        }

        let capture = backend.create_surface(self.canvas);
        let mut blits = 0;
        self.compose_node(idx, Target::Surface(capture), backend, &mut blits);
        self.capture[idx as usize] = Some(capture);
        self.capture_stale[idx as usize] = false;
        tracing::trace!(node = %self.names[idx as usize], blits, "capture built");
        Ok(capture)
    }

    /// Releases every stale capture and returns how many were released.
    pub fn release_stale_captures(&mut self, backend: &mut dyn SurfaceBackend) -> usize {
        let mut released = 0;
        for idx in 0..self.capture.len() {
            if self.capture_stale[idx] {
                if let Some(capture) = self.capture[idx].take() {
                    backend.release_surface(capture);
                    released += 1;
                }
            }
        }
        released
    }

    /// Composites the active tree onto the screen and returns the number of
    /// blits performed.
    ///
    /// Starting from the root, a valid capture is blitted and its subtree
    /// skipped; otherwise the node's surface is blitted at its origin (when
    /// visible) and its children are composed in order. Stale captures are
    /// released first.
    pub fn compose(&mut self, backend: &mut dyn SurfaceBackend) -> usize {
        self.release_stale_captures(backend);
        let mut blits = 0;
        self.compose_node(NodeId::ROOT.0, Target::Screen, backend, &mut blits);
        blits
    }

    fn compose_node(
        &self,
        idx: u32,
        target: Target,
        backend: &mut dyn SurfaceBackend,
        blits: &mut usize,
    ) {
        let i = idx as usize;
        if self.off[i] {
            return;
        }
        if let (Some(capture), false) = (self.capture[i], self.capture_stale[i]) {
            backend.blit(capture, target, Point::ORIGIN);
            *blits += 1;
            return;
        }
        if let (Some(surface), true) = (self.surface[i], self.visible[i]) {
            backend.blit(surface, target, self.origin[i]);
            *blits += 1;
        }
        let mut child = self.first_child[i];
        while child != INVALID {
            self.compose_node(child, target, backend, blits);
            child = self.next_sibling[child as usize];
        }
    }

    /// Blits every visible node surface in draw order, bypassing captures.
    ///
    /// Returns the number of blits performed.
    pub fn forced_redraw(&self, backend: &mut dyn SurfaceBackend) -> usize {
        let mut blits = 0;
        for &idx in &self.draw_order {
            if let (Some(surface), true) = (self.surface[idx as usize], self.visible[idx as usize]) {
                backend.blit(surface, Target::Screen, self.origin[idx as usize]);
                blits += 1;
            }
        }
        blits
    }

    /// Recomputes the geometry of every active descendant of `node` right
    /// away and blits their surfaces at the new positions.
    ///
    /// This is the eager counterpart of [`evaluate`](Self::evaluate) for
    /// callers that move a node and need the subtree on screen before the
    /// next frame.
    ///
    /// # Errors
    ///
    /// [`SceneError::InvalidTarget`] if `node` is not a node of this tree.
    pub fn propagate_position(
        &mut self,
        node: NodeId,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<(), SceneError> {
        self.check_target(node)?;
        self.propagate_position_at(node.0, backend);
        Ok(())
    }

    fn propagate_position_at(&mut self, idx: u32, backend: &mut dyn SurfaceBackend) {
        self.capture_stale[idx as usize] = true;
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            let c = child as usize;
            if !self.off[c] {
                self.update_position_at(child);
                if let (Some(surface), true) = (self.surface[c], self.visible[c]) {
                    backend.blit(surface, Target::Screen, self.origin[c]);
                }
                self.propagate_position_at(child, backend);
            }
            child = self.next_sibling[c];
        }
    }

    /// Allocates missing graphic surfaces and releases retired ones.
    pub(crate) fn sync_surfaces(&mut self, backend: &mut dyn SurfaceBackend) {
        for surface in self.retired.drain(..) {
            backend.release_surface(surface);
        }
        for &idx in &self.draw_order {
            let i = idx as usize;
            if self.wants_surface[i] && self.surface[i].is_none() {
                self.surface[i] = Some(backend.create_surface(self.size[i]));
            }
        }
    }
}
