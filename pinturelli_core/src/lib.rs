// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained-mode scene graph for interactive canvas applications.
//!
//! `pinturelli_core` keeps a composite tree of positioned, sized nodes,
//! drives per-frame update and draw passes over it, resolves pointer input
//! with bounding-box and pixel-exact hit-testing, and routes named events
//! between nodes through a priority-ordered channel. It is `no_std`
//! compatible (with `alloc`) and stores nodes in struct-of-arrays layout
//! addressed by index handles.
//!
//! # Architecture
//!
//! ```text
//!   Frame driver ──► Scene::run_update_pass()
//!                        │
//!                        ├─ update pass   (pre-order Widget::local_update)
//!                        ├─ evaluate      (drain dirty positions)
//!                        ├─ draw pass     (post-order Widget::local_draw)
//!                        └─ compose       (captures / surfaces ─► screen)
//!
//!   Pointer input ──► Scene::handle_pointer() ──► hit test ──► Channel::dispatch()
//! ```
//!
//! **[`node`]**: Struct-of-arrays node tree: local and accumulated
//! geometry, child lists, the flat draw-order list, and capture caches.
//!
//! **[`scene`]**: The tree coordinator. Owns the tree, the channel, the
//! widget type registry and input state, and exposes the frame entry points.
//!
//! **[`widget`]**: The [`Widget`](widget::Widget) contract concrete node
//! types implement, plus capability objects and the type registry.
//!
//! **[`channel`]**: Per-node event subscriptions with priorities and
//! middlewares.
//!
//! **[`hit`]**: Area and pixel collision tests and back-to-front hit
//! resolution.
//!
//! **[`input`]**: Pointer events, debouncing, and per-frame input state.
//!
//! **[`select`]**: Path selectors such as `#panel/button[-1]`.
//!
//! **[`backend`]**: The [`SurfaceBackend`](backend::SurfaceBackend) trait
//! the host renderer implements; [`headless`] is an in-memory implementation.
//!
//! **[`dirty`]**: Dirty-tracking channels via `understory_dirty`.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and the
//! zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-node
//!   change events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod channel;
pub mod config;
pub mod dirty;
pub mod error;
pub mod headless;
pub mod hit;
pub mod input;
pub mod node;
pub mod scene;
pub mod select;
pub mod trace;
pub mod widget;

mod validate;

pub use config::SceneConfig;
pub use error::SceneError;
pub use node::{NodeId, NodeTree};
pub use scene::Scene;
