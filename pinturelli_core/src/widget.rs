// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The contract concrete node types implement.
//!
//! A [`Widget`] is the behavior attached to one node: it updates state in
//! the update pass and paints in the draw pass. Geometry, topology, and
//! surfaces live in the [`NodeTree`]; the widget reaches them through the
//! [`UpdateCx`] and [`DrawCx`] it is handed.
//!
//! Optional behaviors are exposed as capability objects. A widget that
//! reacts to clicks returns itself from
//! [`Widget::click_reactive`] as a [`ClickReactive`].
//!
//! Widgets are built by name through a [`WidgetRegistry`] so scenes can be
//! described with plain [`NodeSpec`] data.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use core::any::Any;
use core::fmt;

use kurbo::{Point, Rect, Size, Vec2};

use crate::backend::{Rgba, SurfaceBackend, Target};
use crate::config::SceneConfig;
use crate::error::{Hook, SceneError};
use crate::input::{InputState, PointerEvent};
use crate::node::{NodeId, NodeTree};

/// Behavior of one node.
///
/// Both hooks default to reporting [`SceneError::NotImplemented`]; the scene
/// turns that into an error when validating and into a no-op otherwise.
pub trait Widget: Any {
    /// Advances the widget's state. Runs parent before child.
    fn local_update(&mut self, cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
        Err(cx.not_implemented(Hook::LocalUpdate))
    }

    /// Paints the widget. Runs child before parent.
    fn local_draw(&mut self, cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
        Err(cx.not_implemented(Hook::LocalDraw))
    }

    /// Returns the click capability, if the widget has one.
    fn click_reactive(&mut self) -> Option<&mut dyn ClickReactive> {
        None
    }
}

/// Capability of widgets that react to presses and clicks.
pub trait ClickReactive {
    /// The pointer went down on the node.
    fn on_press(&mut self, cx: &mut PointerCx<'_>) {
        _ = cx;
    }

    /// The pointer went up on the node.
    fn on_release(&mut self, cx: &mut PointerCx<'_>) {
        _ = cx;
    }

    /// The pointer went down and up on the node.
    fn on_click(&mut self, cx: &mut PointerCx<'_>);
}

/// The widget of the root node. Does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct RootWidget;

impl Widget for RootWidget {
    fn local_update(&mut self, _cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn local_draw(&mut self, _cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Context of [`Widget::local_update`].
///
/// The widget being updated is temporarily out of the tree, so
/// [`NodeTree::widget`] returns `None` for it.
pub struct UpdateCx<'a> {
    pub(crate) node: NodeId,
    pub(crate) tree: &'a mut NodeTree,
    pub(crate) input: &'a InputState,
    pub(crate) frame: u64,
}

impl fmt::Debug for UpdateCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateCx")
            .field("node", &self.node)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl UpdateCx<'_> {
    /// Returns the handle of the node being updated.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the string id of the node being updated.
    #[must_use]
    pub fn name(&self) -> &str {
        self.tree.name(self.node)
    }

    /// Returns the index of the frame being run.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Returns the pointer state.
    #[must_use]
    pub fn input(&self) -> &InputState {
        self.input
    }

    /// Returns the node's absolute bounds.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.tree.bounds(self.node)
    }

    /// Returns whether the pointer lies over the node.
    #[must_use]
    pub fn is_under_pointer(&self) -> bool {
        self.tree.collision_area(self.node, self.input.pointer)
    }

    /// Moves the node.
    ///
    /// # Errors
    ///
    /// As [`NodeTree::set_local_offset`].
    pub fn set_local_offset(&mut self, offset: Vec2) -> Result<(), SceneError> {
        self.tree.set_local_offset(self.node, offset)
    }

    /// Returns the tree.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &*self.tree
    }

    /// Returns the tree mutably.
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut *self.tree
    }

    /// Error reported by default hook bodies.
    #[must_use]
    pub fn not_implemented(&self, hook: Hook) -> SceneError {
        SceneError::NotImplemented {
            node: String::from(self.name()),
            hook,
        }
    }
}

/// Context of [`Widget::local_draw`].
///
/// Drawing helpers take rectangles in node-local coordinates (origin at the
/// node's top-left corner) and land on the node's graphic surface, or on the
/// screen at the node's position when it has none.
pub struct DrawCx<'a> {
    pub(crate) node: NodeId,
    pub(crate) tree: &'a NodeTree,
    pub(crate) backend: &'a mut dyn SurfaceBackend,
    pub(crate) target: Target,
    pub(crate) input: &'a InputState,
    pub(crate) painted: bool,
}

impl fmt::Debug for DrawCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCx")
            .field("node", &self.node)
            .field("target", &self.target)
            .field("painted", &self.painted)
            .finish_non_exhaustive()
    }
}

impl DrawCx<'_> {
    /// Returns the handle of the node being drawn.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the string id of the node being drawn.
    #[must_use]
    pub fn name(&self) -> &str {
        self.tree.name(self.node)
    }

    /// Returns where drawing lands.
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the node's size.
    #[must_use]
    pub fn size(&self) -> Size {
        self.tree.size(self.node)
    }

    /// Returns the node's absolute top-left corner.
    #[must_use]
    pub fn origin(&self) -> Point {
        self.tree.origin(self.node)
    }

    /// Returns the pointer state.
    #[must_use]
    pub fn input(&self) -> &InputState {
        self.input
    }

    /// Returns the tree.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        self.tree
    }

    /// Fills a node-local rectangle.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let rect = self.to_target(rect);
        self.backend.fill_rect(self.target, rect, color);
        self.painted = true;
    }

    /// Fills the whole node.
    pub fn fill(&mut self, color: Rgba) {
        self.fill_rect(self.size().to_rect(), color);
    }

    /// Erases the whole node back to transparent.
    pub fn clear(&mut self) {
        let rect = self.to_target(self.size().to_rect());
        self.backend.clear(self.target, rect);
        self.painted = true;
    }

    /// Returns the backend for drawing the helpers do not cover.
    ///
    /// Content drawn this way counts as a repaint of the node.
    pub fn backend(&mut self) -> &mut dyn SurfaceBackend {
        self.painted = true;
        &mut *self.backend
    }

    /// Error reported by default hook bodies.
    #[must_use]
    pub fn not_implemented(&self, hook: Hook) -> SceneError {
        SceneError::NotImplemented {
            node: String::from(self.name()),
            hook,
        }
    }

    fn to_target(&self, rect: Rect) -> Rect {
        match self.target {
            Target::Surface(_) => rect,
            Target::Screen => rect + self.origin().to_vec2(),
        }
    }
}

/// Context of the [`ClickReactive`] hooks.
pub struct PointerCx<'a> {
    pub(crate) node: NodeId,
    pub(crate) tree: &'a mut NodeTree,
    pub(crate) event: PointerEvent,
}

impl fmt::Debug for PointerCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerCx")
            .field("node", &self.node)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

impl PointerCx<'_> {
    /// Returns the handle of the node under the pointer.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the pointer event.
    #[must_use]
    pub fn event(&self) -> &PointerEvent {
        &self.event
    }

    /// Returns the pointer position relative to the node's origin.
    #[must_use]
    pub fn local_position(&self) -> Point {
        (self.event.position - self.tree.origin(self.node)).to_point()
    }

    /// Returns the tree.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &*self.tree
    }

    /// Returns the tree mutably.
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut *self.tree
    }
}

/// Visitor for [`Traversal::Visit`](crate::scene::Traversal::Visit).
///
/// Called on every active node of the subtree, parent before child.
pub trait NodeVisitor {
    /// Visits one node.
    ///
    /// # Errors
    ///
    /// An error ends the traversal and is returned to the caller.
    fn visit(&mut self, tree: &NodeTree, node: NodeId) -> Result<(), SceneError>;
}

impl<F: FnMut(&NodeTree, NodeId) -> Result<(), SceneError>> NodeVisitor for F {
    fn visit(&mut self, tree: &NodeTree, node: NodeId) -> Result<(), SceneError> {
        self(tree, node)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Plain-data description of a node to insert.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    /// Unique string id.
    pub id: String,
    /// Registered widget type name.
    pub kind: String,
    /// Id of the parent node.
    pub parent: String,
    /// Horizontal offset from the parent's origin.
    pub local_x: f64,
    /// Vertical offset from the parent's origin.
    pub local_y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Author visibility.
    pub visible: bool,
    /// Whether the node gets its own graphic surface.
    pub graphic_surface: bool,
}

impl NodeSpec {
    /// Default width and height.
    pub const DEFAULT_SIZE: f64 = 50.0;

    /// Creates a spec for a visible 50×50 node with a graphic surface at the
    /// root's origin.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parent: String::from(NodeTree::ROOT_ID),
            local_x: 0.0,
            local_y: 0.0,
            width: Self::DEFAULT_SIZE,
            height: Self::DEFAULT_SIZE,
            visible: true,
            graphic_surface: true,
        }
    }

    /// Sets the parent id.
    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    /// Sets the local offset.
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.local_x = x;
        self.local_y = y;
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the author visibility.
    #[must_use]
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Sets whether the node gets a graphic surface.
    #[must_use]
    pub fn graphic_surface(mut self, graphic_surface: bool) -> Self {
        self.graphic_surface = graphic_surface;
        self
    }
}

/// Everything a widget constructor receives.
#[derive(Debug)]
pub struct WidgetInit<'a> {
    /// The scene configuration.
    pub config: &'a SceneConfig,
    /// Handle of the parent node.
    pub parent: NodeId,
    /// Absolute bounds of the parent node.
    pub parent_bounds: Rect,
    /// The spec being inserted.
    pub spec: &'a NodeSpec,
}

/// A widget constructor.
pub type WidgetCtor = Box<dyn Fn(&WidgetInit<'_>) -> Box<dyn Widget>>;

/// Widget constructors by type name.
#[derive(Default)]
pub struct WidgetRegistry {
    ctors: BTreeMap<String, WidgetCtor>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ctors.keys()).finish()
    }
}

impl WidgetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor, replacing any previous one of the same name.
    pub fn register<W: Widget>(
        &mut self,
        kind: impl Into<String>,
        make: impl Fn(&WidgetInit<'_>) -> W + 'static,
    ) {
        let ctor: WidgetCtor =
            Box::new(move |init: &WidgetInit<'_>| -> Box<dyn Widget> { Box::new(make(init)) });
        self.ctors.insert(kind.into(), ctor);
    }

    /// Returns whether a type name is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.ctors.contains_key(kind)
    }

    /// Builds a widget.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownType`] if no constructor is registered as `kind`.
    pub fn build(&self, kind: &str, init: &WidgetInit<'_>) -> Result<Box<dyn Widget>, SceneError> {
        let ctor = self.ctors.get(kind).ok_or_else(|| SceneError::UnknownType {
            kind: String::from(kind),
        })?;
        Ok(ctor(init))
    }
}
