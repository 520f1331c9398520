// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collision tests and pointer hit resolution.
//!
//! Hit resolution scans the draw order from front to back (the reverse of
//! paint order), so the topmost node under the pointer wins.

use kurbo::Point;

use crate::backend::SurfaceBackend;
use crate::node::{NodeId, NodeTree};

/// How a node decides whether a point hits it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HitPolicy {
    /// The point lies inside the node's bounding box.
    #[default]
    Area,
    /// The point lies inside the bounding box and the node's surface is
    /// opaque enough there.
    Pixel,
}

impl NodeTree {
    /// Returns whether `point` lies in the half-open box
    /// `[x, x + w) × [y, y + h)` of the node.
    #[must_use]
    pub fn collision_area(&self, node: NodeId, point: Point) -> bool {
        self.bounds(node).contains(point)
    }

    /// Returns whether the node's graphic surface is at least
    /// `alpha_threshold` opaque at `point`.
    ///
    /// Nodes without a surface never hit.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "local coordinates are bounded by the node size"
    )]
    pub fn collision_pixel(
        &self,
        node: NodeId,
        point: Point,
        backend: &dyn SurfaceBackend,
        alpha_threshold: u8,
    ) -> bool {
        let Some(surface) = self.surface(node) else {
            return false;
        };
        if !self.collision_area(node, point) {
            return false;
        }
        let local = point - self.origin(node);
        let (x, y) = (local.x.floor() as u32, local.y.floor() as u32);
        backend
            .sample(surface, x, y)
            .is_some_and(|px| px.a >= alpha_threshold)
    }

    /// Returns the topmost visible node hit by `point` under `policy`.
    #[must_use]
    pub fn hit_test(
        &self,
        point: Point,
        policy: HitPolicy,
        backend: &dyn SurfaceBackend,
        alpha_threshold: u8,
    ) -> Option<NodeId> {
        self.draw_order().rev().find(|&node| {
            self.is_visible(node)
                && match policy {
                    HitPolicy::Area => self.collision_area(node, point),
                    HitPolicy::Pixel => {
                        self.collision_pixel(node, point, backend, alpha_threshold)
                    }
                }
        })
    }
}
