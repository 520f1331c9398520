// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with topology, activation, and geometry.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use kurbo::{Point, Rect, Size, Vec2};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::id::{INVALID, NodeId, SurfaceId};
use super::traverse::{Ancestors, Children};
use crate::config::SceneConfig;
use crate::dirty;
use crate::error::{ChildFault, SceneError};
use crate::validate;
use crate::widget::{NodeSpec, RootWidget, Widget};

/// Struct-of-arrays storage for every node of a scene.
///
/// Nodes are addressed by [`NodeId`] handles and by their unique string ids.
/// Slot 0 always holds the root, which is active from construction. Every
/// other node is created inactive ("off") and becomes live once attached
/// under a live parent.
///
/// Alongside the child lists the tree maintains the *draw-order list*: the
/// active nodes in paint order, where each node's active subtree occupies one
/// contiguous block starting with the node itself.
pub struct NodeTree {
    // -- Identity --
    pub(crate) names: Vec<String>,
    pub(crate) kinds: Vec<String>,
    pub(crate) registry: BTreeMap<String, u32>,

    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Local geometry (set by callers) --
    pub(crate) local_offset: Vec<Vec2>,
    pub(crate) size: Vec<Size>,
    pub(crate) hidden: Vec<bool>,

    // -- Accumulated geometry (written by update_position) --
    pub(crate) origin: Vec<Point>,
    pub(crate) visible: Vec<bool>,

    // -- Activation --
    pub(crate) off: Vec<bool>,
    /// Set on nodes detached directly, as opposed to through an ancestor.
    pub(crate) detached: Vec<bool>,

    // -- Surfaces --
    pub(crate) wants_surface: Vec<bool>,
    pub(crate) surface: Vec<Option<SurfaceId>>,
    pub(crate) capture: Vec<Option<SurfaceId>>,
    pub(crate) capture_stale: Vec<bool>,
    pub(crate) retired: Vec<SurfaceId>,

    // -- Behavior --
    pub(crate) widgets: Vec<Option<Box<dyn Widget>>>,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Paint order --
    pub(crate) draw_order: Vec<u32>,

    // -- Lifecycle tracking --
    pub(crate) pending_attached: Vec<u32>,
    pub(crate) pending_detached: Vec<u32>,

    pub(crate) canvas: Size,
    pub(crate) validate: bool,
}

impl fmt::Debug for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTree")
            .field("nodes", &self.names.len())
            .field("draw_order", &self.draw_order)
            .field("canvas", &self.canvas)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

impl NodeTree {
    /// Id of the root node.
    pub const ROOT_ID: &'static str = "root";

    /// Creates a tree holding only the canvas-sized root node.
    #[must_use]
    pub fn new(config: &SceneConfig) -> Self {
        let mut tree = Self {
            names: Vec::new(),
            kinds: Vec::new(),
            registry: BTreeMap::new(),
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            local_offset: Vec::new(),
            size: Vec::new(),
            hidden: Vec::new(),
            origin: Vec::new(),
            visible: Vec::new(),
            off: Vec::new(),
            detached: Vec::new(),
            wants_surface: Vec::new(),
            surface: Vec::new(),
            capture: Vec::new(),
            capture_stale: Vec::new(),
            retired: Vec::new(),
            widgets: Vec::new(),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            draw_order: Vec::new(),
            pending_attached: Vec::new(),
            pending_detached: Vec::new(),
            canvas: config.canvas,
            validate: config.validate,
        };
        let root = tree.push_slot(
            Self::ROOT_ID,
            Self::ROOT_ID,
            Vec2::ZERO,
            config.canvas,
            Box::new(RootWidget),
        );
        tree.off[root as usize] = false;
        tree.visible[root as usize] = true;
        tree.draw_order.push(root);
        tree
    }

    // -- Allocation API --

    /// Creates an inactive node from a construction spec.
    ///
    /// The node has no parent and is not part of the draw order until it is
    /// [attached](Self::attach). Its graphic surface, if requested, is
    /// allocated lazily by the next draw pass.
    ///
    /// # Errors
    ///
    /// [`SceneError::DuplicateId`] if the id is taken, and, when validating,
    /// [`SceneError::TypeMismatch`] for non-finite geometry.
    pub fn create_node(
        &mut self,
        spec: &NodeSpec,
        widget: Box<dyn Widget>,
    ) -> Result<NodeId, SceneError> {
        if self.registry.contains_key(&spec.id) {
            return Err(SceneError::DuplicateId {
                id: spec.id.clone(),
            });
        }
        let on = self.validate;
        let local = Vec2::new(
            validate::finite(on, &spec.id, "local_x", spec.local_x)?,
            validate::finite(on, &spec.id, "local_y", spec.local_y)?,
        );
        let size = Size::new(
            validate::finite(on, &spec.id, "width", spec.width)?,
            validate::finite(on, &spec.id, "height", spec.height)?,
        );
        let idx = self.push_slot(&spec.id, &spec.kind, local, size, widget);
        self.hidden[idx as usize] = !spec.visible;
        self.wants_surface[idx as usize] = spec.graphic_surface;
        Ok(NodeId(idx))
    }

    // -- Topology API --

    /// Attaches `child` as the last child of `parent` and activates it.
    ///
    /// The child's accumulated geometry is computed immediately and its
    /// active subtree is inserted into the draw order directly after the
    /// block of its nearest active previous sibling (or directly after the
    /// parent when it has none). Captures of the parent chain become stale.
    ///
    /// # Errors
    ///
    /// - [`SceneError::InvalidTarget`] if `parent` is not a node of this tree.
    /// - [`SceneError::InvalidChild`] if `child` is unknown, the root, already
    ///   parented, or `parent` itself or one of its ancestors.
    /// - [`SceneError::NotInTree`] if `parent` is inactive.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.check_target(parent)?;
        if !self.contains(child) {
            return Err(SceneError::InvalidChild {
                child: format!("{child:?}"),
                fault: ChildFault::UnknownHandle,
            });
        }
        let fault = if child == NodeId::ROOT {
            Some(ChildFault::Root)
        } else if self.is_ancestor(child, parent) {
            Some(ChildFault::Cycle)
        } else if self.parent[child.0 as usize] != INVALID {
            Some(ChildFault::AlreadyParented)
        } else {
            None
        };
        if let Some(fault) = fault {
            return Err(SceneError::InvalidChild {
                child: self.names[child.0 as usize].clone(),
                fault,
            });
        }
        if self.off[parent.0 as usize] {
            return Err(SceneError::NotInTree {
                node: self.names[parent.0 as usize].clone(),
            });
        }

        let (p, c) = (parent.0, child.0);
        self.link_last(p, c);
        let _ = self.dirty.add_dependency(c, p, dirty::POSITION);
        self.detached[c as usize] = false;
        self.activate_block(c);
        self.dirty.mark(p, dirty::TOPOLOGY);
        tracing::trace!(node = %self.names[c as usize], parent = %self.names[p as usize], "attached");
        Ok(())
    }

    /// Deactivates `node` and its whole active subtree.
    ///
    /// The nodes keep their parent links and child lists; only their `off`
    /// flag is set and their block is removed from the draw order.
    /// Descendants that were already off stay untouched.
    ///
    /// # Errors
    ///
    /// - [`SceneError::InvalidTarget`] if `node` is not a node of this tree.
    /// - [`SceneError::InvalidChild`] when detaching the root.
    /// - [`SceneError::NotInTree`] if `node` is already inactive.
    pub fn detach(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.check_target(node)?;
        if node == NodeId::ROOT {
            return Err(SceneError::InvalidChild {
                child: String::from(Self::ROOT_ID),
                fault: ChildFault::Root,
            });
        }
        let idx = node.0;
        let Some(start) = self.position_at(idx) else {
            return Err(SceneError::NotInTree {
                node: self.names[idx as usize].clone(),
            });
        };

        let len = self.block_len(idx);
        let removed: Vec<u32> = self.draw_order.drain(start..start + len).collect();
        for &i in &removed {
            self.off[i as usize] = true;
            self.visible[i as usize] = false;
            self.pending_detached.push(i);
        }
        self.detached[idx as usize] = true;

        let p = self.parent[idx as usize];
        self.dirty.mark(p, dirty::TOPOLOGY);
        self.invalidate_capture_at(p);
        tracing::trace!(node = %self.names[idx as usize], count = removed.len(), "detached");
        Ok(())
    }

    /// Reactivates a detached node and its subtree under its existing parent.
    ///
    /// The block is re-inserted at the position [`attach`](Self::attach)
    /// would use, and every reactivated node's geometry is recomputed.
    /// Descendants that were detached individually stay off.
    ///
    /// # Errors
    ///
    /// - [`SceneError::InvalidTarget`] if `node` is not a node of this tree.
    /// - [`SceneError::InvalidChild`] if `node` is active or has no parent.
    /// - [`SceneError::NotInTree`] if the parent is inactive.
    pub fn reactivate(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.check_target(node)?;
        let idx = node.0;
        let fault = if !self.off[idx as usize] {
            Some(ChildFault::AlreadyActive)
        } else if self.parent[idx as usize] == INVALID {
            Some(ChildFault::Orphan)
        } else {
            None
        };
        if let Some(fault) = fault {
            return Err(SceneError::InvalidChild {
                child: self.names[idx as usize].clone(),
                fault,
            });
        }
        let p = self.parent[idx as usize];
        if self.off[p as usize] {
            return Err(SceneError::NotInTree {
                node: self.names[p as usize].clone(),
            });
        }

        self.detached[idx as usize] = false;
        self.activate_block(idx);
        self.dirty.mark(p, dirty::TOPOLOGY);
        tracing::trace!(node = %self.names[idx as usize], "reactivated");
        Ok(())
    }

    // -- Geometry API --

    /// Recomputes the accumulated origin and on-canvas visibility of a node
    /// from its parent's origin and its own local offset.
    ///
    /// Descendants are not touched; they follow at the next
    /// [`evaluate`](Self::evaluate) or
    /// [`propagate_position`](Self::propagate_position).
    pub fn update_position(&mut self, node: NodeId) {
        self.check(node);
        self.update_position_at(node.0);
    }

    /// Sets the horizontal local offset.
    ///
    /// # Errors
    ///
    /// [`SceneError::TypeMismatch`] when validating and `x` is not finite.
    pub fn set_local_x(&mut self, node: NodeId, x: f64) -> Result<(), SceneError> {
        self.check(node);
        let x = validate::finite(self.validate, self.name(node), "local_x", x)?;
        let y = self.local_offset[node.0 as usize].y;
        self.move_to(node.0, Vec2::new(x, y));
        Ok(())
    }

    /// Sets the vertical local offset.
    ///
    /// # Errors
    ///
    /// [`SceneError::TypeMismatch`] when validating and `y` is not finite.
    pub fn set_local_y(&mut self, node: NodeId, y: f64) -> Result<(), SceneError> {
        self.check(node);
        let y = validate::finite(self.validate, self.name(node), "local_y", y)?;
        let x = self.local_offset[node.0 as usize].x;
        self.move_to(node.0, Vec2::new(x, y));
        Ok(())
    }

    /// Sets both components of the local offset.
    ///
    /// # Errors
    ///
    /// [`SceneError::TypeMismatch`] when validating and a component is not
    /// finite.
    pub fn set_local_offset(&mut self, node: NodeId, offset: Vec2) -> Result<(), SceneError> {
        self.check(node);
        let name = self.name(node);
        let x = validate::finite(self.validate, name, "local_x", offset.x)?;
        let y = validate::finite(self.validate, name, "local_y", offset.y)?;
        self.move_to(node.0, Vec2::new(x, y));
        Ok(())
    }

    /// Resizes a node.
    ///
    /// Inactive nodes are left untouched. An existing graphic surface is
    /// retired and reallocated at the new size by the next draw pass.
    ///
    /// # Errors
    ///
    /// [`SceneError::TypeMismatch`] when validating and a dimension is not
    /// finite.
    pub fn set_size(&mut self, node: NodeId, width: f64, height: f64) -> Result<(), SceneError> {
        self.check(node);
        let name = self.name(node);
        let width = validate::finite(self.validate, name, "width", width)?;
        let height = validate::finite(self.validate, name, "height", height)?;
        let idx = node.0;
        if self.off[idx as usize] {
            return Ok(());
        }
        self.size[idx as usize] = Size::new(width, height);
        if let Some(surface) = self.surface[idx as usize].take() {
            self.retired.push(surface);
        }
        self.update_position_at(idx);
        self.dirty.mark(idx, dirty::CONTENT);
        self.invalidate_capture_at(idx);
        Ok(())
    }

    /// Sets the author visibility flag.
    ///
    /// A hidden node is never visible, wherever it sits on the canvas.
    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        self.check(node);
        let idx = node.0;
        self.hidden[idx as usize] = hidden;
        if !self.off[idx as usize] {
            self.update_position_at(idx);
            self.invalidate_capture_at(idx);
        }
    }

    // -- Lookup and getters (read-only, no dirty marking) --

    /// Returns whether the handle belongs to this tree.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        (node.0 as usize) < self.names.len()
    }

    /// Returns the number of nodes, active or not, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Returns the handle of the node with the given string id.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.registry.get(name).map(|&idx| NodeId(idx))
    }

    /// Like [`id_of`](Self::id_of), but reports a missing node as an error.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`] if no node carries `name`.
    pub fn lookup(&self, name: &str) -> Result<NodeId, SceneError> {
        self.id_of(name).ok_or_else(|| SceneError::UnknownNode {
            id: String::from(name),
        })
    }

    /// Returns the string id of a node.
    #[must_use]
    pub fn name(&self, node: NodeId) -> &str {
        self.check(node);
        &self.names[node.0 as usize]
    }

    /// Returns the registered type name a node was built from.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> &str {
        self.check(node);
        &self.kinds[node.0 as usize]
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.check(node);
        let p = self.parent[node.0 as usize];
        (p != INVALID).then_some(NodeId(p))
    }

    /// Returns an iterator over the direct children of a node.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Children<'_> {
        self.check(node);
        Children::new(self, self.first_child[node.0 as usize])
    }

    /// Returns an iterator from `node` up to the root, `node` included.
    #[must_use]
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        self.check(node);
        Ancestors::new(self, node.0)
    }

    /// Returns whether `ancestor` is `node` or lies on its parent chain.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == ancestor)
    }

    /// Returns the local offset relative to the parent's origin.
    #[must_use]
    pub fn local_offset(&self, node: NodeId) -> Vec2 {
        self.check(node);
        self.local_offset[node.0 as usize]
    }

    /// Returns the node's width and height.
    #[must_use]
    pub fn size(&self, node: NodeId) -> Size {
        self.check(node);
        self.size[node.0 as usize]
    }

    /// Returns the accumulated (absolute) top-left corner.
    #[must_use]
    pub fn origin(&self, node: NodeId) -> Point {
        self.check(node);
        self.origin[node.0 as usize]
    }

    /// Returns the accumulated center point.
    #[must_use]
    pub fn center(&self, node: NodeId) -> Point {
        self.bounds(node).center()
    }

    /// Returns the absolute bounding rectangle.
    #[must_use]
    pub fn bounds(&self, node: NodeId) -> Rect {
        self.check(node);
        Rect::from_origin_size(self.origin[node.0 as usize], self.size[node.0 as usize])
    }

    /// Returns whether a node is inactive.
    #[must_use]
    pub fn is_off(&self, node: NodeId) -> bool {
        self.check(node);
        self.off[node.0 as usize]
    }

    /// Returns whether a node is active, not hidden, and overlaps the canvas.
    #[must_use]
    pub fn is_visible(&self, node: NodeId) -> bool {
        self.check(node);
        self.visible[node.0 as usize]
    }

    /// Returns the author visibility flag.
    #[must_use]
    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.check(node);
        self.hidden[node.0 as usize]
    }

    /// Returns the node's graphic surface, once allocated.
    #[must_use]
    pub fn surface(&self, node: NodeId) -> Option<SurfaceId> {
        self.check(node);
        self.surface[node.0 as usize]
    }

    /// Returns the canvas extents.
    #[must_use]
    pub fn canvas(&self) -> Size {
        self.canvas
    }

    /// Returns whether debug-mode contract checks are enabled.
    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.validate
    }

    /// Returns the active nodes in paint order (back to front).
    pub fn draw_order(&self) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator + '_ {
        self.draw_order.iter().map(|&idx| NodeId(idx))
    }

    /// Returns the index of a node in the draw order, or `None` when off.
    #[must_use]
    pub fn position_in_draw_order(&self, node: NodeId) -> Option<usize> {
        self.check(node);
        self.position_at(node.0)
    }

    // -- Widget access --

    /// Returns the widget of a node.
    ///
    /// `None` only while the scene is running one of the node's own hooks.
    #[must_use]
    pub fn widget(&self, node: NodeId) -> Option<&(dyn Widget + 'static)> {
        self.check(node);
        self.widgets[node.0 as usize].as_deref()
    }

    /// Returns the widget of a node mutably.
    pub fn widget_mut(&mut self, node: NodeId) -> Option<&mut (dyn Widget + 'static)> {
        self.check(node);
        self.widgets[node.0 as usize].as_deref_mut()
    }

    /// Returns the widget of a node if it is a `W`.
    #[must_use]
    pub fn widget_as<W: Widget>(&self, node: NodeId) -> Option<&W> {
        let widget: &(dyn Any + 'static) = self.widget(node)?;
        widget.downcast_ref()
    }

    /// Returns the widget of a node mutably if it is a `W`.
    pub fn widget_as_mut<W: Widget>(&mut self, node: NodeId) -> Option<&mut W> {
        let widget: &mut (dyn Any + 'static) = self.widget_mut(node)?;
        widget.downcast_mut()
    }

    pub(crate) fn take_widget(&mut self, idx: u32) -> Option<Box<dyn Widget>> {
        self.widgets[idx as usize].take()
    }

    pub(crate) fn restore_widget(&mut self, idx: u32, widget: Box<dyn Widget>) {
        self.widgets[idx as usize] = Some(widget);
    }

    // -- Internal helpers --

    /// Panics on handles from another tree.
    pub(crate) fn check(&self, node: NodeId) {
        assert!(
            self.contains(node),
            "unknown {node:?} (tree has {} nodes)",
            self.names.len()
        );
    }

    pub(crate) fn check_target(&self, node: NodeId) -> Result<(), SceneError> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(SceneError::InvalidTarget { target: node })
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts stay far below u32::MAX"
    )]
    fn push_slot(
        &mut self,
        name: &str,
        kind: &str,
        local: Vec2,
        size: Size,
        widget: Box<dyn Widget>,
    ) -> u32 {
        let idx = self.names.len() as u32;
        self.names.push(String::from(name));
        self.kinds.push(String::from(kind));
        self.registry.insert(String::from(name), idx);
        self.parent.push(INVALID);
        self.first_child.push(INVALID);
        self.next_sibling.push(INVALID);
        self.prev_sibling.push(INVALID);
        self.local_offset.push(local);
        self.size.push(size);
        self.hidden.push(false);
        self.origin.push(local.to_point());
        self.visible.push(false);
        self.off.push(true);
        self.detached.push(false);
        self.wants_surface.push(false);
        self.surface.push(None);
        self.capture.push(None);
        self.capture_stale.push(false);
        self.widgets.push(Some(widget));
        idx
    }

    /// Appends `c` to the end of `p`'s child list.
    fn link_last(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }
    }

    /// Turns on `idx` and every descendant not detached on its own, then
    /// splices them into the draw order as one block.
    fn activate_block(&mut self, idx: u32) {
        let at = self.insertion_point(idx);

        let mut block = Vec::new();
        self.collect_activatable(idx, &mut block);
        for &i in &block {
            self.off[i as usize] = false;
            // Pre-order: parents are positioned before their children.
            self.update_position_at(i);
            self.pending_attached.push(i);
        }
        self.draw_order.splice(at..at, block);

        self.invalidate_capture_at(idx);
    }

    /// Draw-order index where the block of the (inactive) node `idx` belongs.
    fn insertion_point(&self, idx: u32) -> usize {
        let mut prev = self.prev_sibling[idx as usize];
        while prev != INVALID {
            if let Some(pos) = self.position_at(prev) {
                return pos + self.block_len(prev);
            }
            prev = self.prev_sibling[prev as usize];
        }
        let p = self.parent[idx as usize];
        self.position_at(p).map_or(self.draw_order.len(), |pos| pos + 1)
    }

    fn collect_activatable(&self, idx: u32, out: &mut Vec<u32>) {
        out.push(idx);
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            if !self.detached[child as usize] {
                self.collect_activatable(child, out);
            }
            child = self.next_sibling[child as usize];
        }
    }

    /// Length of the contiguous draw-order block of an active node.
    pub(crate) fn block_len(&self, idx: u32) -> usize {
        let mut len = 1;
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            if !self.off[child as usize] {
                len += self.block_len(child);
            }
            child = self.next_sibling[child as usize];
        }
        len
    }

    pub(crate) fn position_at(&self, idx: u32) -> Option<usize> {
        if self.off[idx as usize] {
            return None;
        }
        self.draw_order.iter().position(|&i| i == idx)
    }

    pub(crate) fn update_position_at(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let base = if p == INVALID {
            Point::ORIGIN
        } else {
            self.origin[p as usize]
        };
        let origin = base + self.local_offset[idx as usize];
        let size = self.size[idx as usize];
        let off_canvas = origin.x > self.canvas.width
            || origin.y > self.canvas.height
            || origin.x + size.width < 0.0
            || origin.y + size.height < 0.0;
        self.origin[idx as usize] = origin;
        self.visible[idx as usize] =
            !self.off[idx as usize] && !self.hidden[idx as usize] && !off_canvas;
    }

    fn move_to(&mut self, idx: u32, offset: Vec2) {
        if self.off[idx as usize] {
            return;
        }
        self.local_offset[idx as usize] = offset;
        self.update_position_at(idx);
        self.dirty.mark_with(idx, dirty::POSITION, &EagerPolicy);
        self.invalidate_capture_at(idx);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::widget::NodeSpec;

    fn tree() -> NodeTree {
        NodeTree::new(&SceneConfig::default())
    }

    fn node(tree: &mut NodeTree, id: &str, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let spec = NodeSpec::new(id, "box").at(x, y).size(w, h);
        tree.create_node(&spec, Box::new(RootWidget)).unwrap()
    }

    fn order(tree: &NodeTree) -> Vec<&str> {
        tree.draw_order().map(|n| tree.name(n)).collect()
    }

    /// Pre-order of the active tree, rebuilt from scratch.
    fn rebuilt_order(tree: &NodeTree) -> Vec<NodeId> {
        fn walk(tree: &NodeTree, n: NodeId, out: &mut Vec<NodeId>) {
            out.push(n);
            for c in tree.children(n) {
                if !tree.is_off(c) {
                    walk(tree, c, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(tree, NodeId::ROOT, &mut out);
        out
    }

    #[test]
    fn root_exists_from_construction() {
        let tree = tree();
        assert_eq!(tree.id_of("root"), Some(NodeId::ROOT));
        assert_eq!(tree.size(NodeId::ROOT), Size::new(500.0, 600.0));
        assert!(!tree.is_off(NodeId::ROOT));
        assert!(tree.is_visible(NodeId::ROOT));
        assert_eq!(order(&tree), vec!["root"]);
    }

    #[test]
    fn created_nodes_start_off() {
        let mut tree = tree();
        let a = node(&mut tree, "a", 1.0, 2.0, 3.0, 4.0);
        assert!(tree.is_off(a));
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.position_in_draw_order(a), None);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut tree = tree();
        node(&mut tree, "a", 0.0, 0.0, 1.0, 1.0);
        let spec = NodeSpec::new("a", "box");
        assert_eq!(
            tree.create_node(&spec, Box::new(RootWidget)),
            Err(SceneError::DuplicateId { id: "a".into() })
        );
        let spec = NodeSpec::new("root", "box");
        assert!(tree.create_node(&spec, Box::new(RootWidget)).is_err());
    }

    #[test]
    fn attach_computes_accumulated_geometry() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 10.0, 100.0, 150.0, 40.0);
        let b = node(&mut tree, "B", 5.0, 5.0, 20.0, 20.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.attach(a, b).unwrap();

        assert_eq!(tree.origin(a), Point::new(10.0, 100.0));
        assert_eq!(tree.origin(b), Point::new(15.0, 105.0));
        assert_eq!(tree.center(a), Point::new(85.0, 120.0));
        assert_eq!(order(&tree), vec!["root", "A", "B"]);
    }

    #[test]
    fn detach_turns_off_whole_block() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 10.0, 100.0, 150.0, 40.0);
        let b = node(&mut tree, "B", 5.0, 5.0, 20.0, 20.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.attach(a, b).unwrap();

        tree.detach(a).unwrap();
        assert!(tree.is_off(a));
        assert!(tree.is_off(b));
        assert_eq!(order(&tree), vec!["root"]);
        // Structure is retained.
        assert_eq!(tree.children(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(tree.parent(a), Some(NodeId::ROOT));
    }

    #[test]
    fn detach_of_off_node_fails() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            tree.detach(a),
            Err(SceneError::NotInTree { node: "A".into() })
        );
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.detach(a).unwrap();
        assert!(matches!(tree.detach(a), Err(SceneError::NotInTree { .. })));
    }

    #[test]
    fn detach_root_fails() {
        let mut tree = tree();
        assert!(matches!(
            tree.detach(NodeId::ROOT),
            Err(SceneError::InvalidChild {
                fault: ChildFault::Root,
                ..
            })
        ));
    }

    #[test]
    fn siblings_keep_order_and_contiguous_blocks() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        let b = node(&mut tree, "B", 0.0, 0.0, 1.0, 1.0);
        let c = node(&mut tree, "C", 0.0, 0.0, 1.0, 1.0);
        let a1 = node(&mut tree, "A1", 0.0, 0.0, 1.0, 1.0);
        let b1 = node(&mut tree, "B1", 0.0, 0.0, 1.0, 1.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.attach(NodeId::ROOT, b).unwrap();
        tree.attach(NodeId::ROOT, c).unwrap();
        // Children attached after their later siblings still land inside the
        // parent's block.
        tree.attach(a, a1).unwrap();
        tree.attach(b, b1).unwrap();

        assert_eq!(order(&tree), vec!["root", "A", "A1", "B", "B1", "C"]);
        assert_eq!(tree.draw_order().collect::<Vec<_>>(), rebuilt_order(&tree));
    }

    #[test]
    fn attach_rejects_bad_children() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        let b = node(&mut tree, "B", 0.0, 0.0, 1.0, 1.0);
        tree.attach(NodeId::ROOT, a).unwrap();

        let fault = |r: Result<(), SceneError>| match r {
            Err(SceneError::InvalidChild { fault, .. }) => Some(fault),
            _ => None,
        };
        assert_eq!(fault(tree.attach(a, NodeId::ROOT)), Some(ChildFault::Root));
        assert_eq!(
            fault(tree.attach(NodeId::ROOT, a)),
            Some(ChildFault::AlreadyParented)
        );
        assert_eq!(fault(tree.attach(a, a)), Some(ChildFault::Cycle));
        assert_eq!(
            fault(tree.attach(a, NodeId(99))),
            Some(ChildFault::UnknownHandle)
        );
        assert_eq!(
            tree.attach(NodeId(99), b),
            Err(SceneError::InvalidTarget {
                target: NodeId(99)
            })
        );
    }

    #[test]
    fn attach_under_off_parent_fails() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        let b = node(&mut tree, "B", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            tree.attach(a, b),
            Err(SceneError::NotInTree { node: "A".into() })
        );
        assert_eq!(tree.parent(b), None);
    }

    #[test]
    fn reactivate_restores_block_in_place() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        let b = node(&mut tree, "B", 0.0, 0.0, 1.0, 1.0);
        let c = node(&mut tree, "C", 0.0, 0.0, 1.0, 1.0);
        let b1 = node(&mut tree, "B1", 0.0, 0.0, 1.0, 1.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.attach(NodeId::ROOT, b).unwrap();
        tree.attach(NodeId::ROOT, c).unwrap();
        tree.attach(b, b1).unwrap();

        tree.detach(b).unwrap();
        assert_eq!(order(&tree), vec!["root", "A", "C"]);
        tree.reactivate(b).unwrap();
        assert_eq!(order(&tree), vec!["root", "A", "B", "B1", "C"]);
        assert!(!tree.is_off(b1));
        assert_eq!(tree.draw_order().collect::<Vec<_>>(), rebuilt_order(&tree));
    }

    #[test]
    fn individually_detached_descendants_stay_off() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        let a1 = node(&mut tree, "A1", 0.0, 0.0, 1.0, 1.0);
        let a2 = node(&mut tree, "A2", 0.0, 0.0, 1.0, 1.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.attach(a, a1).unwrap();
        tree.attach(a, a2).unwrap();

        tree.detach(a1).unwrap();
        tree.detach(a).unwrap();
        tree.reactivate(a).unwrap();
        assert!(tree.is_off(a1));
        assert_eq!(order(&tree), vec!["root", "A", "A2"]);

        tree.reactivate(a1).unwrap();
        assert_eq!(order(&tree), vec!["root", "A", "A1", "A2"]);
    }

    #[test]
    fn reactivate_rejects_active_and_orphans() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            tree.reactivate(a),
            Err(SceneError::InvalidChild {
                fault: ChildFault::Orphan,
                ..
            })
        ));
        tree.attach(NodeId::ROOT, a).unwrap();
        assert!(matches!(
            tree.reactivate(a),
            Err(SceneError::InvalidChild {
                fault: ChildFault::AlreadyActive,
                ..
            })
        ));
    }

    #[test]
    fn reactivate_under_off_parent_fails() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 0.0, 0.0, 1.0, 1.0);
        let b = node(&mut tree, "B", 0.0, 0.0, 1.0, 1.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.attach(a, b).unwrap();
        tree.detach(b).unwrap();
        tree.detach(a).unwrap();
        assert_eq!(
            tree.reactivate(b),
            Err(SceneError::NotInTree { node: "A".into() })
        );
    }

    #[test]
    fn setters_on_off_nodes_are_noops() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 3.0, 4.0, 10.0, 10.0);
        tree.set_local_x(a, 50.0).unwrap();
        tree.set_size(a, 1.0, 1.0).unwrap();
        assert_eq!(tree.local_offset(a), Vec2::new(3.0, 4.0));
        assert_eq!(tree.size(a), Size::new(10.0, 10.0));
    }

    #[test]
    fn setting_offset_updates_node_immediately() {
        let mut tree = tree();
        let a = node(&mut tree, "A", 10.0, 10.0, 10.0, 10.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.set_local_x(a, 30.0).unwrap();
        tree.set_local_y(a, 40.0).unwrap();
        assert_eq!(tree.origin(a), Point::new(30.0, 40.0));
        tree.set_local_offset(a, Vec2::new(1.0, 2.0)).unwrap();
        assert_eq!(tree.origin(a), Point::new(1.0, 2.0));
    }

    #[test]
    fn non_finite_offsets_fail_only_when_validating() {
        let mut tree = NodeTree::new(&SceneConfig::default().with_validation(true));
        let a = node(&mut tree, "A", 0.0, 0.0, 10.0, 10.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        assert!(matches!(
            tree.set_local_x(a, f64::NAN),
            Err(SceneError::TypeMismatch { field: "local_x", .. })
        ));
        assert_eq!(tree.local_offset(a), Vec2::ZERO);

        let mut tree = NodeTree::new(&SceneConfig::default().with_validation(false));
        let a = node(&mut tree, "A", 0.0, 0.0, 10.0, 10.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        tree.set_local_x(a, f64::INFINITY).unwrap();
        assert!(tree.local_offset(a).x.is_infinite());
    }

    #[test]
    fn visibility_follows_canvas_edges() {
        let mut tree = NodeTree::new(&SceneConfig::default().with_canvas(100.0, 100.0));
        let a = node(&mut tree, "A", 0.0, 0.0, 10.0, 10.0);
        tree.attach(NodeId::ROOT, a).unwrap();
        assert!(tree.is_visible(a));

        // Touching an edge still counts as on-canvas.
        tree.set_local_x(a, 100.0).unwrap();
        assert!(tree.is_visible(a));
        tree.set_local_x(a, 100.5).unwrap();
        assert!(!tree.is_visible(a));
        tree.set_local_x(a, -10.0).unwrap();
        assert!(tree.is_visible(a));
        tree.set_local_x(a, -10.5).unwrap();
        assert!(!tree.is_visible(a));
    }

    #[test]
    fn hidden_flag_overrides_position() {
        let mut tree = tree();
        let spec = NodeSpec::new("A", "box").visible(false);
        let a = tree.create_node(&spec, Box::new(RootWidget)).unwrap();
        tree.attach(NodeId::ROOT, a).unwrap();
        assert!(!tree.is_visible(a));
        tree.set_hidden(a, false);
        assert!(tree.is_visible(a));
    }

    #[test]
    fn lookup_reports_unknown_ids() {
        let tree = tree();
        assert_eq!(tree.lookup("root"), Ok(NodeId::ROOT));
        assert_eq!(
            tree.lookup("nope"),
            Err(SceneError::UnknownNode { id: "nope".into() })
        );
    }

    #[test]
    fn widget_downcast() {
        let tree = tree();
        assert!(tree.widget_as::<RootWidget>(NodeId::ROOT).is_some());
    }

    #[test]
    #[should_panic(expected = "unknown NodeId(7)")]
    fn foreign_handle_panics_on_getters() {
        let tree = tree();
        let _ = tree.origin(NodeId(7));
    }
}
