// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tree coordinator.
//!
//! A [`Scene`] owns everything a running canvas application needs: the
//! [`NodeTree`], the event [`Channel`], the widget type registry, the input
//! state, and the configuration. Hosts drive it with three entry points:
//!
//! - [`run_update_pass`](Scene::run_update_pass) once per frame,
//! - [`handle_pointer`](Scene::handle_pointer) for every pointer event,
//! - [`forced_redraw`](Scene::forced_redraw) when the screen was lost.
//!
//! # Frame stages
//!
//! 1. **Update**: `local_update` over the active tree, parent before child.
//! 2. **Evaluate**: drain dirty positions (see [`NodeTree::evaluate`]).
//! 3. **Draw**: allocate missing surfaces, then `local_draw` over the visible
//!    active tree, child before parent.
//! 4. **Compose**: release stale captures and composite onto the screen
//!    (see [`NodeTree::compose`]).
//!
//! An error in any stage aborts the frame and is returned to the host.

use alloc::borrow::ToOwned;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use kurbo::Point;

use crate::backend::{SurfaceBackend, Target};
use crate::channel::{Channel, Dispatch, Event, Listener, SubscriptionId};
use crate::config::SceneConfig;
use crate::dirty;
use crate::error::SceneError;
use crate::input::{self, EventData, InputState, PointerEvent, PointerKind};
use crate::node::{FrameChanges, NodeId, NodeTree, SurfaceId};
use crate::trace::{
    DispatchEvent, FrameSummary, NodeLifecycleEvent, PassBeginEvent, PassEndEvent, PassKind,
    Tracer,
};
use crate::validate;
use crate::widget::{
    DrawCx, NodeSpec, NodeVisitor, PointerCx, UpdateCx, Widget, WidgetInit, WidgetRegistry,
};

/// An operation applied to a node and its active descendants by
/// [`Scene::propagate`].
pub enum Traversal<'v> {
    /// Run `local_update`, parent before child.
    Update,
    /// Run `local_draw`, child before parent.
    Draw,
    /// Blit every visible surface in draw order.
    ForcedRedraw,
    /// Deliver a click at a canvas point to every node it lands on.
    ///
    /// Every node hit needs the
    /// [`ClickReactive`](crate::widget::ClickReactive) capability; the
    /// traversal's own start node is exempt.
    Click(Point),
    /// Hand every node to a visitor, parent before child.
    Visit(&'v mut dyn NodeVisitor),
}

impl core::fmt::Debug for Traversal<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Update => f.write_str("Update"),
            Self::Draw => f.write_str("Draw"),
            Self::ForcedRedraw => f.write_str("ForcedRedraw"),
            Self::Click(p) => f.debug_tuple("Click").field(p).finish(),
            Self::Visit(_) => f.write_str("Visit(..)"),
        }
    }
}

/// What one [`Scene::run_update_pass`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the frame that ran.
    pub frame_index: u64,
    /// Nodes whose `local_update` ran.
    pub updated: usize,
    /// Nodes whose `local_draw` ran.
    pub drawn: usize,
    /// Blits performed by compositing.
    pub blits: usize,
    /// Stale captures released by compositing.
    pub captures_released: usize,
    /// Changes drained by evaluation.
    pub changes: FrameChanges,
}

/// What one [`Scene::handle_pointer`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerReport {
    /// The event passed the debouncer.
    pub accepted: bool,
    /// The node under the pointer.
    pub target: Option<NodeId>,
    /// The event completed a click on `target`.
    pub clicked: bool,
}

/// The tree coordinator. See the [module docs](self).
pub struct Scene {
    tree: NodeTree,
    channel: Channel<NodeTree, EventData>,
    widgets: WidgetRegistry,
    input: InputState,
    config: SceneConfig,
    frame_index: u64,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scene")
            .field("tree", &self.tree)
            .field("channel", &self.channel)
            .field("widgets", &self.widgets)
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl Scene {
    /// Creates a scene holding only the root node.
    #[must_use]
    pub fn new(config: SceneConfig) -> Self {
        Self {
            tree: NodeTree::new(&config),
            channel: Channel::new(config.propagation),
            widgets: WidgetRegistry::new(),
            input: InputState::new(config.debounce_ms),
            config,
            frame_index: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Returns the node tree.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Returns the node tree mutably.
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }

    /// Returns the event channel.
    pub fn channel_mut(&mut self) -> &mut Channel<NodeTree, EventData> {
        &mut self.channel
    }

    /// Returns the pointer state.
    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Returns the index the next frame will run with.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // -- Construction --

    /// Registers a widget constructor under a type name.
    pub fn register<W: Widget>(
        &mut self,
        kind: impl Into<String>,
        ctor: impl Fn(&WidgetInit<'_>) -> W + 'static,
    ) {
        self.widgets.register(kind, ctor);
    }

    /// Builds a node from a spec through the type registry and attaches it.
    ///
    /// # Errors
    ///
    /// - [`SceneError::UnknownType`] if `spec.kind` is not registered.
    /// - [`SceneError::UnknownParent`] if `spec.parent` names no node.
    /// - [`SceneError::DuplicateId`] if `spec.id` is taken.
    /// - [`SceneError::NotInTree`] if the parent is inactive.
    /// - [`SceneError::TypeMismatch`] for non-finite geometry when validating.
    pub fn insert_element(&mut self, spec: NodeSpec) -> Result<NodeId, SceneError> {
        if !self.widgets.contains(&spec.kind) {
            return Err(SceneError::UnknownType { kind: spec.kind });
        }
        let parent = self.resolve_parent(&spec)?;
        let init = WidgetInit {
            config: &self.config,
            parent,
            parent_bounds: self.tree.bounds(parent),
            spec: &spec,
        };
        let widget = self.widgets.build(&spec.kind, &init)?;
        self.insert_built(&spec, parent, widget)
    }

    /// Like [`insert_element`](Self::insert_element), with an already built
    /// widget instead of a registered type.
    ///
    /// # Errors
    ///
    /// As [`insert_element`](Self::insert_element), except `UnknownType`.
    pub fn insert_with(&mut self, spec: NodeSpec, widget: impl Widget) -> Result<NodeId, SceneError> {
        let parent = self.resolve_parent(&spec)?;
        self.insert_built(&spec, parent, alloc::boxed::Box::new(widget))
    }

    fn resolve_parent(&self, spec: &NodeSpec) -> Result<NodeId, SceneError> {
        let parent = self
            .tree
            .id_of(&spec.parent)
            .ok_or_else(|| SceneError::UnknownParent {
                parent: spec.parent.clone(),
            })?;
        if self.tree.id_of(&spec.id).is_some() {
            return Err(SceneError::DuplicateId {
                id: spec.id.clone(),
            });
        }
        if self.tree.is_off(parent) {
            return Err(SceneError::NotInTree {
                node: spec.parent.clone(),
            });
        }
        Ok(parent)
    }

    fn insert_built(
        &mut self,
        spec: &NodeSpec,
        parent: NodeId,
        widget: alloc::boxed::Box<dyn Widget>,
    ) -> Result<NodeId, SceneError> {
        let node = self.tree.create_node(spec, widget)?;
        self.tree.attach(parent, node)?;
        tracing::debug!(id = %spec.id, kind = %spec.kind, parent = %spec.parent, "element inserted");
        Ok(node)
    }

    /// Attaches an existing node. See [`NodeTree::attach`].
    ///
    /// # Errors
    ///
    /// As [`NodeTree::attach`].
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.tree.attach(parent, child)
    }

    /// Detaches a node and its subtree. See [`NodeTree::detach`].
    ///
    /// # Errors
    ///
    /// As [`NodeTree::detach`].
    pub fn detach(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.tree.detach(node)
    }

    /// Reactivates a detached node. See [`NodeTree::reactivate`].
    ///
    /// # Errors
    ///
    /// As [`NodeTree::reactivate`].
    pub fn reactivate(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.tree.reactivate(node)
    }

    /// Resolves a path selector. See [`NodeTree::select`].
    ///
    /// # Errors
    ///
    /// As [`NodeTree::select`].
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>, SceneError> {
        self.tree.select(selector)
    }

    /// Builds the capture of a node. See [`NodeTree::create_capture`].
    ///
    /// # Errors
    ///
    /// As [`NodeTree::create_capture`].
    pub fn create_capture(
        &mut self,
        node: NodeId,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<SurfaceId, SceneError> {
        self.tree.create_capture(node, backend)
    }

    // -- Events --

    /// Subscribes `listener` to `event` on the node with id `target`.
    ///
    /// The target does not need to exist yet.
    ///
    /// # Errors
    ///
    /// [`SceneError::InvalidTarget`] if `listener` is not a node of the tree.
    pub fn listen(
        &mut self,
        listener: NodeId,
        target: &str,
        event: &str,
        subscription: Listener<NodeTree, EventData>,
    ) -> Result<SubscriptionId, SceneError> {
        self.tree.check_target(listener)?;
        let subscription = subscription.listener(self.tree.name(listener));
        Ok(self.channel.subscribe(target, event, subscription))
    }

    /// Removes a subscription made with [`listen`](Self::listen).
    pub fn unlisten(&mut self, target: &str, event: &str, subscription: SubscriptionId) -> bool {
        self.channel.unsubscribe(target, event, subscription)
    }

    /// Adds a global middleware to the channel.
    pub fn use_middleware(
        &mut self,
        middleware: impl FnMut(&NodeTree, &Event<'_, EventData>) -> bool + 'static,
    ) {
        self.channel.use_middleware(middleware);
    }

    /// Emits `event` on `node`, delivering it to the node's subscribers.
    ///
    /// # Errors
    ///
    /// [`SceneError::InvalidTarget`] if `node` is not a node of the tree.
    pub fn emit(
        &mut self,
        node: NodeId,
        event: &str,
        data: impl Into<EventData>,
    ) -> Result<Dispatch, SceneError> {
        self.tree.check_target(node)?;
        Ok(self.dispatch(node, event, &data.into(), &mut Tracer::none()))
    }

    fn dispatch(
        &mut self,
        node: NodeId,
        event: &str,
        data: &EventData,
        tracer: &mut Tracer<'_>,
    ) -> Dispatch {
        let target = self.tree.name(node).to_owned();
        let outcome = self.channel.dispatch(&target, event, data, &mut self.tree);
        tracer.dispatch(&DispatchEvent {
            frame_index: self.frame_index,
            target: &target,
            event,
            outcome,
        });
        outcome
    }

    // -- Frame loop --

    /// Runs one frame: update, evaluate, draw, compose.
    ///
    /// # Errors
    ///
    /// The first error returned by a widget hook, or, when validating,
    /// [`SceneError::NotImplemented`] for a hook left at its default body.
    pub fn run_update_pass(
        &mut self,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<FrameReport, SceneError> {
        self.run_update_pass_traced(backend, &mut Tracer::none())
    }

    /// Like [`run_update_pass`](Self::run_update_pass), reporting to a
    /// tracer.
    ///
    /// # Errors
    ///
    /// As [`run_update_pass`](Self::run_update_pass).
    pub fn run_update_pass_traced(
        &mut self,
        backend: &mut dyn SurfaceBackend,
        tracer: &mut Tracer<'_>,
    ) -> Result<FrameReport, SceneError> {
        let frame_index = self.frame_index;
        let mut report = FrameReport {
            frame_index,
            ..FrameReport::default()
        };

        self.begin(tracer, PassKind::Update);
        let order: Vec<u32> = self.tree.draw_order.clone();
        report.updated = self.update_nodes(&order)?;
        self.input.end_frame();
        self.end(tracer, PassKind::Update, report.updated);

        self.begin(tracer, PassKind::Evaluate);
        report.changes = self.tree.evaluate();
        self.end(tracer, PassKind::Evaluate, report.changes.moved.len());
        self.trace_lifecycle(tracer, &report.changes);

        self.begin(tracer, PassKind::Draw);
        self.tree.sync_surfaces(backend);
        let mut order = Vec::new();
        post_order(&self.tree, NodeId::ROOT.0, None, &mut order);
        report.drawn = self.draw_nodes(&order, backend)?;
        self.end(tracer, PassKind::Draw, report.drawn);

        self.begin(tracer, PassKind::Compose);
        report.captures_released = self.tree.release_stale_captures(backend);
        report.blits = self.tree.compose(backend);
        self.end(tracer, PassKind::Compose, report.blits);

        tracer.frame_summary(&FrameSummary {
            frame_index,
            updated: report.updated,
            moved: report.changes.moved.len(),
            drawn: report.drawn,
            blits: report.blits,
            captures_released: report.captures_released,
            attached: report.changes.attached.len(),
            detached: report.changes.detached.len(),
        });
        tracing::trace!(
            frame = frame_index,
            updated = report.updated,
            drawn = report.drawn,
            blits = report.blits,
            "frame complete"
        );
        self.frame_index += 1;
        Ok(report)
    }

    /// Blits every visible node surface in draw order, bypassing captures.
    ///
    /// Returns the number of blits performed.
    pub fn forced_redraw(&mut self, backend: &mut dyn SurfaceBackend) -> usize {
        self.forced_redraw_traced(backend, &mut Tracer::none())
    }

    /// Like [`forced_redraw`](Self::forced_redraw), reporting to a tracer.
    pub fn forced_redraw_traced(
        &mut self,
        backend: &mut dyn SurfaceBackend,
        tracer: &mut Tracer<'_>,
    ) -> usize {
        self.begin(tracer, PassKind::ForcedRedraw);
        let blits = self.tree.forced_redraw(backend);
        self.end(tracer, PassKind::ForcedRedraw, blits);
        blits
    }

    /// Applies a [`Traversal`] to `node` and its active descendants.
    ///
    /// Returns the number of nodes the operation ran on (blits for
    /// [`Traversal::ForcedRedraw`]). An inactive start node yields 0.
    ///
    /// # Errors
    ///
    /// - [`SceneError::InvalidTarget`] if `node` is not a node of the tree.
    /// - When validating, [`SceneError::MissingMethod`] for a node lacking the
    ///   capability the operation needs, and [`SceneError::NotImplemented`]
    ///   for hooks left at their default bodies.
    /// - Any error returned by a hook or visitor.
    pub fn propagate(
        &mut self,
        node: NodeId,
        traversal: Traversal<'_>,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<usize, SceneError> {
        self.tree.check_target(node)?;
        self.propagate_within(node, traversal, None, backend)
    }

    /// Like [`propagate`](Self::propagate), but stops `countdown` levels
    /// below `node`.
    ///
    /// A countdown of 0 reaches `node` alone, 1 adds its children, and so
    /// on. `-1` means no limit.
    ///
    /// # Errors
    ///
    /// As [`propagate`](Self::propagate), plus, when validating,
    /// [`SceneError::InvalidCounter`] for a negative countdown other than
    /// `-1`. Without validation such a countdown means no limit.
    pub fn propagate_to_depth(
        &mut self,
        node: NodeId,
        traversal: Traversal<'_>,
        countdown: i32,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<usize, SceneError> {
        self.tree.check_target(node)?;
        let limit = validate::counter(
            self.config.validate,
            self.tree.name(node),
            "countdown",
            countdown,
        )?;
        self.propagate_within(node, traversal, limit, backend)
    }

    fn propagate_within(
        &mut self,
        node: NodeId,
        traversal: Traversal<'_>,
        limit: Option<u32>,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<usize, SceneError> {
        let Some(start) = self.tree.position_at(node.0) else {
            return Ok(0);
        };
        let mut block: Vec<u32> =
            self.tree.draw_order[start..start + self.tree.block_len(node.0)].to_vec();
        if let Some(limit) = limit {
            retain_within(&self.tree, &mut block, limit);
        }

        match traversal {
            Traversal::Update => self.update_nodes(&block),
            Traversal::Draw => {
                self.tree.sync_surfaces(backend);
                let mut order = Vec::new();
                post_order(&self.tree, node.0, limit, &mut order);
                self.draw_nodes(&order, backend)
            }
            Traversal::ForcedRedraw => {
                let mut blits = 0;
                for &idx in &block {
                    let i = idx as usize;
                    if let (Some(surface), true) = (self.tree.surface[i], self.tree.visible[i]) {
                        backend.blit(surface, Target::Screen, self.tree.origin[i]);
                        blits += 1;
                    }
                }
                Ok(blits)
            }
            Traversal::Click(point) => {
                let mut clicked = 0;
                for &idx in &block {
                    let id = NodeId(idx);
                    if idx == node.0
                        || self.tree.is_off(id)
                        || !self.tree.collision_area(id, point)
                    {
                        continue;
                    }
                    let event = PointerEvent::up(point, 0);
                    let handled = with_widget(&mut self.tree, idx, |widget, tree| {
                        widget.click_reactive().map(|click| {
                            click.on_click(&mut PointerCx {
                                node: id,
                                tree,
                                event,
                            });
                        })
                    })
                    .flatten()
                    .is_some();
                    let name = self.tree.name(id);
                    if validate::capability(self.config.validate, handled, name, "on_click")? {
                        clicked += 1;
                    }
                }
                Ok(clicked)
            }
            Traversal::Visit(visitor) => {
                for &idx in &block {
                    visitor.visit(&self.tree, NodeId(idx))?;
                }
                Ok(block.len())
            }
        }
    }

    // -- Input --

    /// Feeds one pointer event into the scene.
    ///
    /// Presses and releases are debounced. Accepted events update the input
    /// state, are hit-tested against the visible active nodes, and are
    /// emitted on the node under the pointer as `"pointerdown"`,
    /// `"pointerup"`, or `"pointermove"`. A release on the node the press
    /// landed on also runs its click capability and emits `"click"`.
    ///
    /// Widgets without the click capability receive no capability calls;
    /// the channel events are emitted regardless.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        backend: &dyn SurfaceBackend,
    ) -> PointerReport {
        self.handle_pointer_traced(event, backend, &mut Tracer::none())
    }

    /// Like [`handle_pointer`](Self::handle_pointer), reporting dispatches to
    /// a tracer.
    pub fn handle_pointer_traced(
        &mut self,
        event: PointerEvent,
        backend: &dyn SurfaceBackend,
        tracer: &mut Tracer<'_>,
    ) -> PointerReport {
        let mut report = PointerReport::default();
        if !self.input.apply(&event) {
            return report;
        }
        report.accepted = true;

        let policy = match event.kind {
            PointerKind::Down | PointerKind::Up => self.config.press_policy,
            PointerKind::Move => self.config.drag_policy,
        };
        let target = self
            .tree
            .hit_test(event.position, policy, backend, self.config.alpha_threshold);
        report.target = target;
        self.input.hovered = target;

        let pressed_on = self.input.pressed_on;
        if event.kind == PointerKind::Down {
            self.input.pressed_on = target;
        } else if event.kind == PointerKind::Up {
            self.input.pressed_on = None;
        }
        let Some(node) = target else {
            return report;
        };

        let data = EventData::Pointer {
            event,
            local: (event.position - self.tree.origin(node)).to_point(),
        };
        match event.kind {
            PointerKind::Down => {
                self.run_click(node, event, |click, cx| click.on_press(cx));
                self.dispatch(node, input::POINTER_DOWN, &data, tracer);
            }
            PointerKind::Up => {
                self.run_click(node, event, |click, cx| click.on_release(cx));
                self.dispatch(node, input::POINTER_UP, &data, tracer);
                if pressed_on == Some(node) {
                    self.run_click(node, event, |click, cx| click.on_click(cx));
                    self.dispatch(node, input::CLICK, &data, tracer);
                    report.clicked = true;
                }
            }
            PointerKind::Move => {
                self.dispatch(node, input::POINTER_MOVE, &data, tracer);
            }
        }
        report
    }

    fn run_click(
        &mut self,
        node: NodeId,
        event: PointerEvent,
        f: impl FnOnce(&mut dyn crate::widget::ClickReactive, &mut PointerCx<'_>),
    ) {
        with_widget(&mut self.tree, node.0, |widget, tree| {
            if let Some(click) = widget.click_reactive() {
                f(click, &mut PointerCx { node, tree, event });
            }
        });
    }

    // -- Helpers --

    fn update_nodes(&mut self, order: &[u32]) -> Result<usize, SceneError> {
        let mut updated = 0;
        for &idx in order {
            if self.tree.off[idx as usize] {
                continue;
            }
            let (input, frame) = (&self.input, self.frame_index);
            let result = with_widget(&mut self.tree, idx, |widget, tree| {
                widget.local_update(&mut UpdateCx {
                    node: NodeId(idx),
                    tree,
                    input,
                    frame,
                })
            });
            if let Some(result) = result {
                validate::hook(self.config.validate, result)?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn draw_nodes(
        &mut self,
        order: &[u32],
        backend: &mut dyn SurfaceBackend,
    ) -> Result<usize, SceneError> {
        let mut drawn = 0;
        for &idx in order {
            let i = idx as usize;
            if self.tree.off[i] || !self.tree.visible[i] {
                continue;
            }
            let surface = self.tree.surface[i];
            let target = surface.map_or(Target::Screen, Target::Surface);
            let input = &self.input;
            let outcome = with_widget(&mut self.tree, idx, |widget, tree| {
                let mut cx = DrawCx {
                    node: NodeId(idx),
                    tree,
                    backend: &mut *backend,
                    target,
                    input,
                    painted: false,
                };
                let result = widget.local_draw(&mut cx);
                (result, cx.painted)
            });
            let Some((result, painted)) = outcome else {
                continue;
            };
            validate::hook(self.config.validate, result)?;
            if painted && surface.is_some() {
                self.tree.dirty.mark(idx, dirty::CONTENT);
                self.tree.invalidate_capture_at(idx);
            }
            drawn += 1;
        }
        Ok(drawn)
    }

    fn trace_lifecycle(&self, tracer: &mut Tracer<'_>, changes: &FrameChanges) {
        if !tracer.is_active() {
            return;
        }
        for &idx in &changes.attached {
            tracer.node_attached(&NodeLifecycleEvent {
                frame_index: self.frame_index,
                node_index: idx,
                node: &self.tree.names[idx as usize],
            });
        }
        for &idx in &changes.detached {
            tracer.node_detached(&NodeLifecycleEvent {
                frame_index: self.frame_index,
                node_index: idx,
                node: &self.tree.names[idx as usize],
            });
        }
        #[cfg(feature = "trace-rich")]
        {
            use crate::trace::{NodeChange, NodeField};
            let records: Vec<NodeChange> = changes
                .moved
                .iter()
                .map(|&node_index| (node_index, NodeField::Position))
                .chain(changes.content.iter().map(|&i| (i, NodeField::Content)))
                .chain(
                    changes
                        .attached
                        .iter()
                        .chain(&changes.detached)
                        .map(|&i| (i, NodeField::Topology)),
                )
                .map(|(node_index, field)| NodeChange { node_index, field })
                .collect();
            tracer.node_changes(self.frame_index, &records);
        }
    }

    fn begin(&self, tracer: &mut Tracer<'_>, pass: PassKind) {
        tracer.pass_begin(&PassBeginEvent {
            frame_index: self.frame_index,
            pass,
        });
    }

    fn end(&self, tracer: &mut Tracer<'_>, pass: PassKind, count: usize) {
        tracer.pass_end(&PassEndEvent {
            frame_index: self.frame_index,
            pass,
            count,
        });
    }
}

/// Runs `f` with the widget of `idx` taken out of the tree.
///
/// Returns `None` when the widget is already out, which only happens when a
/// hook re-enters its own node.
fn with_widget<R>(
    tree: &mut NodeTree,
    idx: u32,
    f: impl FnOnce(&mut dyn Widget, &mut NodeTree) -> R,
) -> Option<R> {
    let mut widget = tree.take_widget(idx)?;
    let result = f(widget.as_mut(), tree);
    tree.restore_widget(idx, widget);
    Some(result)
}

/// Active nodes of the subtree at `idx`, children before parents.
/// Active nodes under `idx`, children before their parent, at most
/// `remaining` levels deep.
fn post_order(tree: &NodeTree, idx: u32, remaining: Option<u32>, out: &mut Vec<u32>) {
    if tree.off[idx as usize] {
        return;
    }
    if remaining != Some(0) {
        let next = remaining.map(|r| r - 1);
        for child in tree.children(NodeId(idx)) {
            post_order(tree, child.0, next, out);
        }
    }
    out.push(idx);
}

/// Keeps the nodes of a pre-order block at most `limit` levels below its
/// first node.
fn retain_within(tree: &NodeTree, block: &mut Vec<u32>, limit: u32) {
    let mut depths: BTreeMap<u32, u32> = BTreeMap::new();
    block.retain(|&idx| {
        let depth = depths
            .get(&tree.parent[idx as usize])
            .map_or(0, |d| d + 1);
        depths.insert(idx, depth);
        depth <= limit
    });
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::RefCell;

    use kurbo::{Size, Vec2};

    use super::*;
    use crate::backend::Rgba;
    use crate::channel::{EventPropagation, PropagationPolicy};
    use crate::error::Hook;
    use crate::headless::HeadlessBackend;
    use crate::hit::HitPolicy;
    use crate::widget::ClickReactive;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Logs every hook call as `"<hook>:<id>"`.
    struct Logger {
        log: Log,
    }

    impl Widget for Logger {
        fn local_update(&mut self, cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
            self.log.borrow_mut().push(alloc::format!("update:{}", cx.name()));
            Ok(())
        }

        fn local_draw(&mut self, cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
            self.log.borrow_mut().push(alloc::format!("draw:{}", cx.name()));
            cx.fill(Rgba::WHITE);
            Ok(())
        }
    }

    /// Counts clicks and paints itself opaque.
    #[derive(Default)]
    struct Button {
        presses: u32,
        clicks: u32,
    }

    impl Widget for Button {
        fn local_update(&mut self, _cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
            Ok(())
        }

        fn local_draw(&mut self, cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
            cx.fill(Rgba::BLACK);
            Ok(())
        }

        fn click_reactive(&mut self) -> Option<&mut dyn ClickReactive> {
            Some(self)
        }
    }

    impl ClickReactive for Button {
        fn on_press(&mut self, _cx: &mut PointerCx<'_>) {
            self.presses += 1;
        }

        fn on_click(&mut self, _cx: &mut PointerCx<'_>) {
            self.clicks += 1;
        }
    }

    /// Leaves both hooks at their defaults.
    struct Bare;
    impl Widget for Bare {}

    fn config() -> SceneConfig {
        SceneConfig::default().with_validation(true)
    }

    fn logging_scene(log: &Log) -> Scene {
        let mut scene = Scene::new(config());
        let sink = Rc::clone(log);
        scene.register("logger", move |_| Logger {
            log: Rc::clone(&sink),
        });
        scene
    }

    fn backend(scene: &Scene) -> HeadlessBackend {
        HeadlessBackend::new(scene.config().canvas)
    }

    #[test]
    fn insert_element_builds_and_attaches() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene
            .insert_element(NodeSpec::new("A", "logger").at(10.0, 100.0).size(150.0, 40.0))
            .unwrap();
        let b = scene
            .insert_element(
                NodeSpec::new("B", "logger")
                    .parent("A")
                    .at(5.0, 5.0)
                    .size(20.0, 20.0),
            )
            .unwrap();

        let tree = scene.tree();
        assert_eq!(tree.origin(a), Point::new(10.0, 100.0));
        assert_eq!(tree.origin(b), Point::new(15.0, 105.0));
        assert_eq!(tree.kind(b), "logger");

        scene.detach(a).unwrap();
        let tree = scene.tree();
        assert!(tree.is_off(a) && tree.is_off(b));
        assert_eq!(tree.draw_order().collect::<Vec<_>>(), vec![NodeId::ROOT]);
    }

    #[test]
    fn insert_element_errors() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        assert_eq!(
            scene.insert_element(NodeSpec::new("x", "slider")),
            Err(SceneError::UnknownType {
                kind: "slider".into()
            })
        );
        assert_eq!(
            scene.insert_element(NodeSpec::new("x", "logger").parent("nope")),
            Err(SceneError::UnknownParent {
                parent: "nope".into()
            })
        );
        scene.insert_element(NodeSpec::new("x", "logger")).unwrap();
        assert_eq!(
            scene.insert_element(NodeSpec::new("x", "logger")),
            Err(SceneError::DuplicateId { id: "x".into() })
        );
        assert!(matches!(
            scene.insert_element(NodeSpec::new("y", "logger").at(f64::NAN, 0.0)),
            Err(SceneError::TypeMismatch { field: "local_x", .. })
        ));
    }

    #[test]
    fn constructor_sees_parent() {
        let mut scene = Scene::new(config());
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        scene.register("logger", move |init| {
            *sink.borrow_mut() = Some((init.parent, init.parent_bounds.size()));
            Logger {
                log: Log::default(),
            }
        });
        scene.insert_element(NodeSpec::new("x", "logger")).unwrap();
        assert_eq!(
            *seen.borrow(),
            Some((NodeId::ROOT, Size::new(500.0, 600.0)))
        );
    }

    #[test]
    fn update_runs_pre_order_and_draw_post_order() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        scene
            .insert_element(NodeSpec::new("A1", "logger").parent("A"))
            .unwrap();
        scene.insert_element(NodeSpec::new("B", "logger")).unwrap();
        let mut backend = backend(&scene);

        let report = scene.run_update_pass(&mut backend).unwrap();
        assert_eq!(
            *log.borrow(),
            [
                "update:A", "update:A1", "update:B", "draw:A1", "draw:A", "draw:B",
            ]
        );
        assert_eq!(report.frame_index, 0);
        assert_eq!(report.updated, 4);
        assert_eq!(report.drawn, 4);
        assert_eq!(report.blits, 3);
        assert_eq!(scene.frame_index(), 1);
    }

    #[test]
    fn off_subtrees_are_skipped() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        scene
            .insert_element(NodeSpec::new("A1", "logger").parent("A"))
            .unwrap();
        scene.detach(a).unwrap();
        let mut backend = backend(&scene);

        let report = scene.run_update_pass(&mut backend).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(report.blits, 0);
        assert_eq!(report.changes.detached.len(), 2);
    }

    #[test]
    fn default_hooks_fail_only_when_validating() {
        let mut scene = Scene::new(config());
        scene.insert_with(NodeSpec::new("bare", "bare"), Bare).unwrap();
        let mut backend = backend(&scene);
        assert_eq!(
            scene.run_update_pass(&mut backend),
            Err(SceneError::NotImplemented {
                node: "bare".into(),
                hook: Hook::LocalUpdate
            })
        );

        let mut scene = Scene::new(config().with_validation(false));
        scene.insert_with(NodeSpec::new("bare", "bare"), Bare).unwrap();
        let report = scene.run_update_pass(&mut backend).unwrap();
        assert_eq!(report.updated, 2);
    }

    #[test]
    fn evaluation_catches_up_descendants() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene
            .insert_element(NodeSpec::new("A", "logger").at(10.0, 10.0))
            .unwrap();
        let b = scene
            .insert_element(NodeSpec::new("B", "logger").parent("A").at(5.0, 5.0))
            .unwrap();
        let mut backend = backend(&scene);
        scene.run_update_pass(&mut backend).unwrap();

        scene
            .tree_mut()
            .set_local_offset(a, Vec2::new(100.0, 0.0))
            .unwrap();
        let report = scene.run_update_pass(&mut backend).unwrap();
        assert_eq!(scene.tree().origin(b), Point::new(105.0, 5.0));
        assert_eq!(report.changes.moved, vec![a.index(), b.index()]);
    }

    #[test]
    fn repaint_invalidates_capture() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        let mut backend = backend(&scene);
        scene.run_update_pass(&mut backend).unwrap();

        scene.create_capture(a, &mut backend).unwrap();
        assert!(scene.tree().capture(a).is_some());
        // Logger repaints every frame.
        let report = scene.run_update_pass(&mut backend).unwrap();
        assert_eq!(report.captures_released, 1);
        assert!(scene.tree().capture(a).is_none());
    }

    #[test]
    fn listen_and_emit_in_priority_order() {
        let mut scene = Scene::new(config());
        let btn = scene.insert_with(NodeSpec::new("btn1", "button"), Button::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for (tag, priority) in [("callback1", 10), ("callback2", 20)] {
            let sink = Rc::clone(&seen);
            scene
                .listen(
                    NodeId::ROOT,
                    "btn1",
                    "click",
                    Listener::new(move |_, event| {
                        assert_eq!(event.listener, Some("root"));
                        sink.borrow_mut().push(tag);
                    })
                    .priority(priority),
                )
                .unwrap();
        }

        let outcome = scene.emit(btn, "click", EventData::Empty).unwrap();
        assert_eq!(*seen.borrow(), ["callback2", "callback1"]);
        assert_eq!(outcome.invoked, 2);
    }

    #[test]
    fn callbacks_mutate_the_tree() {
        let mut scene = Scene::new(config());
        let btn = scene.insert_with(NodeSpec::new("btn", "button"), Button::default()).unwrap();
        let panel = scene
            .insert_with(NodeSpec::new("panel", "button").at(0.0, 100.0), Button::default())
            .unwrap();
        scene
            .listen(
                panel,
                "btn",
                "click",
                Listener::new(move |tree: &mut NodeTree, _| {
                    let panel = tree.lookup("panel").unwrap();
                    tree.detach(panel).unwrap();
                }),
            )
            .unwrap();

        scene.emit(btn, "click", EventData::Empty).unwrap();
        assert!(scene.tree().is_off(panel));
    }

    #[test]
    fn middleware_vetoes_emits() {
        let mut scene = Scene::new(config());
        let btn = scene.insert_with(NodeSpec::new("btn", "button"), Button::default()).unwrap();
        let hits = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&hits);
        scene
            .listen(btn, "btn", "ping", Listener::new(move |_, _| *sink.borrow_mut() += 1))
            .unwrap();
        scene.use_middleware(|tree, event| !tree.is_off(tree.lookup(event.target).unwrap()));

        scene.emit(btn, "ping", 1.0).unwrap();
        scene.detach(btn).unwrap();
        let outcome = scene.emit(btn, "ping", 2.0).unwrap();
        assert!(outcome.vetoed);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn stop_on_consume_policy_from_config() {
        let mut scene = Scene::new(config().with_propagation(PropagationPolicy::StopOnConsume));
        let btn = scene.insert_with(NodeSpec::new("btn", "button"), Button::default()).unwrap();
        scene
            .listen(btn, "btn", "e", Listener::with_propagation(|_, _| EventPropagation::Stop))
            .unwrap();
        scene.listen(btn, "btn", "e", Listener::new(|_, _| {})).unwrap();
        let outcome = scene.emit(btn, "e", EventData::Empty).unwrap();
        assert!(outcome.stopped);
        assert_eq!(outcome.invoked, 1);
    }

    #[test]
    fn pointer_click_on_same_node() {
        let mut scene = Scene::new(config());
        let btn = scene
            .insert_with(
                NodeSpec::new("btn", "button").at(10.0, 10.0).size(60.0, 90.0),
                Button::default(),
            )
            .unwrap();
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&clicks);
        scene
            .listen(
                NodeId::ROOT,
                "btn",
                "click",
                Listener::new(move |_, event: &Event<'_, EventData>| {
                    let EventData::Pointer { local, .. } = event.data else {
                        panic!("expected pointer data");
                    };
                    sink.borrow_mut().push(*local);
                }),
            )
            .unwrap();
        let backend = backend(&scene);

        let down = scene.handle_pointer(PointerEvent::down((20.0, 30.0), 0), &backend);
        assert_eq!(down.target, Some(btn));
        assert!(scene.input().pressed);
        let up = scene.handle_pointer(PointerEvent::up((25.0, 30.0), 50), &backend);
        assert!(up.clicked);
        assert_eq!(*clicks.borrow(), [Point::new(15.0, 20.0)]);

        let button = scene.tree().widget_as::<Button>(btn).unwrap();
        assert_eq!((button.presses, button.clicks), (1, 1));
    }

    #[test]
    fn release_elsewhere_is_not_a_click() {
        let mut scene = Scene::new(config());
        let btn = scene
            .insert_with(NodeSpec::new("btn", "button").size(60.0, 90.0), Button::default())
            .unwrap();
        let backend = backend(&scene);

        scene.handle_pointer(PointerEvent::down((5.0, 5.0), 0), &backend);
        let up = scene.handle_pointer(PointerEvent::up((300.0, 300.0), 10), &backend);
        assert_eq!(up.target, Some(NodeId::ROOT));
        assert!(!up.clicked);
        assert_eq!(scene.tree().widget_as::<Button>(btn).unwrap().clicks, 0);
    }

    #[test]
    fn plain_widgets_still_receive_click_events() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        scene
            .insert_element(NodeSpec::new("plain", "logger").size(20.0, 20.0))
            .unwrap();
        let clicks = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&clicks);
        scene
            .listen(
                NodeId::ROOT,
                "plain",
                "click",
                Listener::new(move |_: &mut NodeTree, _: &Event<'_, EventData>| {
                    *sink.borrow_mut() += 1;
                }),
            )
            .unwrap();
        let backend = backend(&scene);

        scene.handle_pointer(PointerEvent::down((5.0, 5.0), 0), &backend);
        let up = scene.handle_pointer(PointerEvent::up((5.0, 5.0), 50), &backend);
        assert!(up.clicked);
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn repeated_presses_are_debounced() {
        let mut scene = Scene::new(config());
        scene
            .insert_with(NodeSpec::new("btn", "button"), Button::default())
            .unwrap();
        let backend = backend(&scene);

        let first = scene.handle_pointer(PointerEvent::down((5.0, 5.0), 1000), &backend);
        let second = scene.handle_pointer(PointerEvent::down((5.0, 5.0), 1100), &backend);
        let third = scene.handle_pointer(PointerEvent::down((5.0, 5.0), 1200), &backend);
        assert!(first.accepted && !second.accepted && third.accepted);
    }

    #[test]
    fn frame_flags_reset_after_update_pass() {
        let mut scene = Scene::new(config());
        let mut backend = backend(&scene);
        scene.handle_pointer(PointerEvent::down((5.0, 5.0), 0), &backend);
        assert!(scene.input().pressed_this_frame);
        scene.run_update_pass(&mut backend).unwrap();
        assert!(!scene.input().pressed_this_frame);
        assert!(scene.input().pressed);
    }

    #[test]
    fn pixel_policy_uses_painted_surfaces() {
        let mut config = config();
        config.press_policy = HitPolicy::Pixel;
        let mut scene = Scene::new(config);
        let btn = scene
            .insert_with(NodeSpec::new("btn", "button").size(20.0, 20.0), Button::default())
            .unwrap();
        let mut backend = backend(&scene);

        // Nothing painted yet: no surface, so nothing is hit.
        let report = scene.handle_pointer(PointerEvent::down((5.0, 5.0), 0), &backend);
        assert_eq!(report.target, None);

        scene.run_update_pass(&mut backend).unwrap();
        let report = scene.handle_pointer(PointerEvent::down((5.0, 5.0), 500), &backend);
        assert_eq!(report.target, Some(btn));
    }

    #[test]
    fn propagate_rejects_foreign_handles() {
        let mut scene = Scene::new(config());
        let mut backend = backend(&scene);
        assert_eq!(
            scene.propagate(NodeId(42), Traversal::Update, &mut backend),
            Err(SceneError::InvalidTarget {
                target: NodeId(42)
            })
        );
    }

    #[test]
    fn propagate_click_requires_capability_when_validating() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let btn = scene
            .insert_with(NodeSpec::new("btn", "button").size(20.0, 20.0), Button::default())
            .unwrap();
        let mut backend = backend(&scene);

        let clicked = scene
            .propagate(NodeId::ROOT, Traversal::Click(Point::new(5.0, 5.0)), &mut backend)
            .unwrap();
        assert_eq!(clicked, 1);
        assert_eq!(scene.tree().widget_as::<Button>(btn).unwrap().clicks, 1);

        scene
            .insert_element(NodeSpec::new("logger", "logger").size(20.0, 20.0))
            .unwrap();
        assert_eq!(
            scene.propagate(NodeId::ROOT, Traversal::Click(Point::new(5.0, 5.0)), &mut backend),
            Err(SceneError::MissingMethod {
                node: "logger".into(),
                method: "on_click"
            })
        );
    }

    #[test]
    fn propagate_click_skips_silently_in_production() {
        let log = Log::default();
        let mut scene = Scene::new(config().with_validation(false));
        let sink = Rc::clone(&log);
        scene.register("logger", move |_| Logger {
            log: Rc::clone(&sink),
        });
        scene
            .insert_element(NodeSpec::new("logger", "logger").size(20.0, 20.0))
            .unwrap();
        let mut backend = backend(&scene);
        let clicked = scene
            .propagate(NodeId::ROOT, Traversal::Click(Point::new(5.0, 5.0)), &mut backend)
            .unwrap();
        assert_eq!(clicked, 0);
    }

    #[test]
    fn propagate_visit_and_update_cover_subtree() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        scene
            .insert_element(NodeSpec::new("A1", "logger").parent("A"))
            .unwrap();
        scene.insert_element(NodeSpec::new("B", "logger")).unwrap();
        let mut backend = backend(&scene);

        let mut names = Vec::new();
        let mut visitor = |tree: &NodeTree, node: NodeId| -> Result<(), SceneError> {
            names.push(tree.name(node).to_string());
            Ok(())
        };
        let visited = scene
            .propagate(a, Traversal::Visit(&mut visitor), &mut backend)
            .unwrap();
        assert_eq!(visited, 2);
        assert_eq!(names, ["A", "A1"]);

        scene.propagate(a, Traversal::Update, &mut backend).unwrap();
        assert_eq!(*log.borrow(), ["update:A", "update:A1"]);
    }

    #[test]
    fn countdown_limits_propagation_depth() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        scene
            .insert_element(NodeSpec::new("A1", "logger").parent("A"))
            .unwrap();
        scene
            .insert_element(NodeSpec::new("A1a", "logger").parent("A1"))
            .unwrap();
        scene
            .insert_element(NodeSpec::new("A2", "logger").parent("A"))
            .unwrap();
        let mut backend = backend(&scene);

        let updated = scene
            .propagate_to_depth(a, Traversal::Update, 0, &mut backend)
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(*log.borrow(), ["update:A"]);

        log.borrow_mut().clear();
        scene
            .propagate_to_depth(a, Traversal::Update, 1, &mut backend)
            .unwrap();
        assert_eq!(*log.borrow(), ["update:A", "update:A1", "update:A2"]);

        log.borrow_mut().clear();
        scene
            .propagate_to_depth(a, Traversal::Draw, 1, &mut backend)
            .unwrap();
        assert_eq!(*log.borrow(), ["draw:A1", "draw:A2", "draw:A"]);

        let updated = scene
            .propagate_to_depth(a, Traversal::Update, -1, &mut backend)
            .unwrap();
        assert_eq!(updated, 4);
    }

    #[test]
    fn stray_negative_countdown_fails_only_when_validating() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        let a = scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        let mut backend = backend(&scene);
        assert_eq!(
            scene.propagate_to_depth(a, Traversal::Update, -2, &mut backend),
            Err(SceneError::InvalidCounter {
                node: "A".into(),
                field: "countdown",
                value: -2,
            })
        );
        assert!(log.borrow().is_empty());

        scene.config.validate = false;
        let updated = scene
            .propagate_to_depth(a, Traversal::Update, -2, &mut backend)
            .unwrap();
        assert_eq!(updated, 1);
    }

    #[test]
    fn forced_redraw_blits_visible_surfaces() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        scene.insert_element(NodeSpec::new("A", "logger")).unwrap();
        scene
            .insert_element(NodeSpec::new("B", "logger").visible(false))
            .unwrap();
        let mut backend = backend(&scene);
        scene.run_update_pass(&mut backend).unwrap();
        backend.clear_ops();

        assert_eq!(scene.forced_redraw(&mut backend), 1);
        assert_eq!(
            scene
                .propagate(NodeId::ROOT, Traversal::ForcedRedraw, &mut backend)
                .unwrap(),
            1
        );
    }

    #[test]
    fn surfaceless_widgets_paint_on_screen() {
        let log = Log::default();
        let mut scene = logging_scene(&log);
        scene
            .insert_element(
                NodeSpec::new("A", "logger")
                    .at(10.0, 10.0)
                    .size(5.0, 5.0)
                    .graphic_surface(false),
            )
            .unwrap();
        let mut backend = backend(&scene);
        let report = scene.run_update_pass(&mut backend).unwrap();
        assert_eq!(report.blits, 0);
        assert_eq!(backend.screen_pixel(12, 12), Some(Rgba::WHITE));
    }
}
