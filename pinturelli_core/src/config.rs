// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene configuration.

use kurbo::Size;

use crate::channel::PropagationPolicy;
use crate::hit::HitPolicy;

/// Configuration threaded through [`Scene::new`](crate::Scene::new).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneConfig {
    /// Canvas extents. The root node takes this size, captures are allocated
    /// at this size, and on-canvas visibility is tested against it.
    pub canvas: Size,
    /// Enables the contract checks of debug mode: finite numeric inputs,
    /// overridden widget hooks, and capabilities required by traversals.
    ///
    /// Structural checks run regardless of this flag.
    pub validate: bool,
    /// Whether a callback returning
    /// [`EventPropagation::Stop`](crate::channel::EventPropagation::Stop)
    /// halts delivery to later subscribers.
    pub propagation: PropagationPolicy,
    /// Hit policy for pointer down and up.
    pub press_policy: HitPolicy,
    /// Hit policy for pointer moves.
    pub drag_policy: HitPolicy,
    /// Minimum alpha a sampled surface pixel needs to count as a hit.
    pub alpha_threshold: u8,
    /// Cooldown, in milliseconds, during which repeated pointer down (or up)
    /// events are dropped.
    pub debounce_ms: u64,
}

impl SceneConfig {
    /// Default canvas width.
    pub const DEFAULT_WIDTH: f64 = 500.0;
    /// Default canvas height.
    pub const DEFAULT_HEIGHT: f64 = 600.0;
    /// Default input debounce window in milliseconds.
    pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

    /// Returns a copy with the given canvas extents.
    #[must_use]
    pub const fn with_canvas(mut self, width: f64, height: f64) -> Self {
        self.canvas = Size::new(width, height);
        self
    }

    /// Returns a copy with validation switched on or off.
    #[must_use]
    pub const fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Returns a copy with the given channel propagation policy.
    #[must_use]
    pub const fn with_propagation(mut self, propagation: PropagationPolicy) -> Self {
        self.propagation = propagation;
        self
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            canvas: Size::new(Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT),
            validate: cfg!(debug_assertions),
            propagation: PropagationPolicy::RunAll,
            press_policy: HitPolicy::Area,
            drag_policy: HitPolicy::Area,
            alpha_threshold: 1,
            debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
        }
    }
}
