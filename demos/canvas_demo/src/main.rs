// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless scene with nested buttons driven by simulated pointer input.
//!
//! Builds a container holding two buttons, one of which nests a third
//! button and a comment. Runs 90 frames against a
//! [`HeadlessBackend`](pinturelli_core::headless::HeadlessBackend), pressing
//! "cancelar" to detach the nested subtree and "aceptar" to bring it back.
//! Every frame is traced to stdout through a
//! [`PrettyPrintSink`](pinturelli_debug::pretty::PrettyPrintSink) and to a
//! [`RecorderSink`](pinturelli_debug::recorder::RecorderSink), which is
//! exported as `trace.json` at the end.
//!
//! Set `RUST_LOG=debug` to see the scene's own log output.

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;

use pinturelli_core::backend::Rgba;
use pinturelli_core::channel::Listener;
use pinturelli_core::headless::HeadlessBackend;
use pinturelli_core::input::{CLICK, PointerEvent};
use pinturelli_core::trace::{
    DispatchEvent, FrameSummary, NodeChange, NodeLifecycleEvent, PassBeginEvent, PassEndEvent,
    TraceSink, Tracer,
};
use pinturelli_core::widget::{ClickReactive, DrawCx, NodeSpec, PointerCx, UpdateCx, Widget};
use pinturelli_core::{NodeId, NodeTree, Scene, SceneConfig, SceneError};
use pinturelli_debug::pretty::PrettyPrintSink;
use pinturelli_debug::recorder::RecorderSink;
use tracing_subscriber::EnvFilter;

const FRAME_COUNT: u64 = 90;
const FRAME_MS: u64 = 16;

// ---------------------------------------------------------------------------
// Widgets
// ---------------------------------------------------------------------------

/// Translucent panel.
struct Container;

impl Widget for Container {
    fn local_update(&mut self, _cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn local_draw(&mut self, cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
        cx.fill(Rgba::new(255, 255, 255, 50));
        Ok(())
    }
}

/// Pink button that grows more opaque while held.
struct Button {
    label: String,
    alpha: u8,
}

impl Widget for Button {
    fn local_update(&mut self, cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
        if cx.input().pressed && cx.is_under_pointer() {
            self.alpha = self.alpha.wrapping_add(5);
        }
        Ok(())
    }

    fn local_draw(&mut self, cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
        cx.fill(Rgba::new(255, 200, 200, self.alpha));
        Ok(())
    }

    fn click_reactive(&mut self) -> Option<&mut dyn ClickReactive> {
        Some(self)
    }
}

impl ClickReactive for Button {
    fn on_click(&mut self, cx: &mut PointerCx<'_>) {
        let at = cx.local_position();
        tracing::info!(label = %self.label, x = at.x, y = at.y, "click");
    }
}

/// Blue label box.
struct Comment;

impl Widget for Comment {
    fn local_update(&mut self, _cx: &mut UpdateCx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn local_draw(&mut self, cx: &mut DrawCx<'_>) -> Result<(), SceneError> {
        cx.fill(Rgba::new(0, 0, 255, 220));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Forwards every event to two sinks.
struct Tee<'a>(&'a mut dyn TraceSink, &'a mut dyn TraceSink);

impl TraceSink for Tee<'_> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.0.on_pass_begin(e);
        self.1.on_pass_begin(e);
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.0.on_pass_end(e);
        self.1.on_pass_end(e);
    }

    fn on_node_attached(&mut self, e: &NodeLifecycleEvent<'_>) {
        self.0.on_node_attached(e);
        self.1.on_node_attached(e);
    }

    fn on_node_detached(&mut self, e: &NodeLifecycleEvent<'_>) {
        self.0.on_node_detached(e);
        self.1.on_node_detached(e);
    }

    fn on_dispatch(&mut self, e: &DispatchEvent<'_>) {
        self.0.on_dispatch(e);
        self.1.on_dispatch(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.0.on_frame_summary(s);
        self.1.on_frame_summary(s);
    }

    fn on_node_changes(&mut self, frame_index: u64, changes: &[NodeChange]) {
        self.0.on_node_changes(frame_index, changes);
        self.1.on_node_changes(frame_index, changes);
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

fn build_scene() -> Result<Scene, SceneError> {
    let mut scene = Scene::new(SceneConfig::default().with_validation(true));
    scene.register("container", |_| Container);
    scene.register("button", |init| Button {
        label: init.spec.id.clone(),
        alpha: 50,
    });
    scene.register("comment", |_| Comment);

    scene.insert_element(
        NodeSpec::new("container", "container")
            .at(10.0, 200.0)
            .size(480.0, 380.0),
    )?;
    for (id, parent, x, y) in [
        ("aceptar", "container", 10.0, 100.0),
        ("cancelar", "container", 160.0, 200.0),
        ("ppp", "cancelar", 56.0, 38.0),
    ] {
        scene.insert_element(
            NodeSpec::new(id, "button")
                .parent(parent)
                .at(x, y)
                .size(60.0, 90.0),
        )?;
    }
    scene.insert_element(
        NodeSpec::new("hola", "comment")
            .parent("ppp")
            .at(5.0, 54.0)
            .size(46.0, 30.0),
    )?;

    // "cancelar" hides the nested button, "aceptar" brings it back.
    let root = NodeId::ROOT;
    scene.listen(
        root,
        "cancelar",
        CLICK,
        Listener::new(|tree: &mut NodeTree, _| {
            if let Ok(ppp) = tree.lookup("ppp") {
                match tree.detach(ppp) {
                    Ok(()) => tracing::info!("ppp detached"),
                    Err(err) => tracing::warn!(%err, "detach failed"),
                }
            }
        })
        .priority(10),
    )?;
    scene.listen(
        root,
        "aceptar",
        CLICK,
        Listener::new(|tree: &mut NodeTree, _| {
            if let Ok(ppp) = tree.lookup("ppp") {
                match tree.reactivate(ppp) {
                    Ok(()) => tracing::info!("ppp reactivated"),
                    Err(err) => tracing::debug!(%err, "nothing to reactivate"),
                }
            }
        }),
    )?;
    Ok(scene)
}

/// Pointer input scripted per frame.
fn scripted_input(frame: u64, tree: &NodeTree) -> Option<PointerEvent> {
    let at = |id: &str| tree.lookup(id).map(|n| tree.center(n)).ok();
    let now = frame * FRAME_MS;
    match frame {
        10 => at("cancelar").map(|p| PointerEvent::down(p, now)),
        14 => at("cancelar").map(|p| PointerEvent::up(p, now)),
        20..=29 => Some(PointerEvent::moved((100.0 + 10.0 * (frame - 20) as f64, 320.0), now)),
        40 => at("aceptar").map(|p| PointerEvent::down(p, now)),
        // Debounced: within 200 ms of the previous press.
        42 => at("aceptar").map(|p| PointerEvent::down(p, now)),
        50 => at("aceptar").map(|p| PointerEvent::up(p, now)),
        _ => None,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // -- sinks -------------------------------------------------------------
    let mut pretty = PrettyPrintSink::new(Box::new(std::io::stdout()));
    let mut recorder = RecorderSink::new();

    // -- scene -------------------------------------------------------------
    let mut scene = build_scene()?;
    let mut backend = HeadlessBackend::new(scene.config().canvas);
    let buttons = scene.select("#container/button")?;
    tracing::info!(count = buttons.len(), "buttons directly under the container");

    // -- simulated loop ----------------------------------------------------
    for frame in 0..FRAME_COUNT {
        let mut tee = Tee(&mut pretty, &mut recorder);
        let mut tracer = Tracer::new(&mut tee);
        if let Some(event) = scripted_input(frame, scene.tree()) {
            let report = scene.handle_pointer_traced(event, &backend, &mut tracer);
            if !report.accepted {
                tracing::info!(frame, "pointer event debounced");
            }
        }
        scene.run_update_pass_traced(&mut backend, &mut tracer)?;
    }

    // -- screen lost: repaint from surfaces --------------------------------
    let blits = scene.forced_redraw(&mut backend);
    println!("Forced redraw: {blits} blits, {} live surfaces", backend.live_surfaces());

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let mut writer = BufWriter::new(File::create(path)?);
    pinturelli_debug::chrome::export(recorder.as_bytes(), &mut writer)?;

    println!("Wrote {path} ({FRAME_COUNT} frames)");
    Ok(())
}
