// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing-surface contract for host renderers.
//!
//! The scene never draws pixels itself. Everything it needs from the host
//! (offscreen surfaces for nodes and captures, blitting them onto each other
//! or onto the screen, pixel readback for exact hit-testing, erasing) goes
//! through [`SurfaceBackend`]. A canvas library, a GPU compositor, or the
//! in-memory [`HeadlessBackend`](crate::headless::HeadlessBackend) can all
//! sit behind it.
//!
//! # Frame loop pseudocode
//!
//! ```rust,ignore
//! fn on_frame(scene: &mut Scene, backend: &mut impl SurfaceBackend) {
//!     backend.clear(Target::Screen, canvas_rect);
//!     scene.run_update_pass(backend)?;
//! }
//!
//! fn on_pointer(scene: &mut Scene, backend: &mut impl SurfaceBackend, e: PointerEvent) {
//!     scene.handle_pointer(e, backend);
//! }
//! ```

use core::fmt;

use kurbo::{Point, Rect, Size};

pub use crate::node::SurfaceId;

/// Where a drawing operation lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The visible canvas.
    Screen,
    /// An offscreen surface.
    Surface(SurfaceId),
}

/// An 8-bit RGBA color.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha. Zero is fully transparent.
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    /// Creates a color from its channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Debug for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rgba(#{:02x}{:02x}{:02x}{:02x})",
            self.r, self.g, self.b, self.a
        )
    }
}

/// Offscreen surfaces and the operations the scene performs on them.
///
/// Rectangles and points are in the coordinate space of the target: canvas
/// pixels for [`Target::Screen`], surface-local pixels for
/// [`Target::Surface`].
pub trait SurfaceBackend {
    /// Returns the size of the visible canvas.
    fn canvas_size(&self) -> Size;

    /// Allocates a transparent offscreen surface of the given size.
    fn create_surface(&mut self, size: Size) -> SurfaceId;

    /// Frees a surface. Later operations on it are ignored.
    fn release_surface(&mut self, surface: SurfaceId);

    /// Draws `src` onto `dst` with its top-left corner at `at`.
    fn blit(&mut self, src: SurfaceId, dst: Target, at: Point);

    /// Reads one pixel of a surface, or `None` when out of bounds.
    fn sample(&self, surface: SurfaceId, x: u32, y: u32) -> Option<Rgba>;

    /// Erases a rectangle back to transparent.
    fn clear(&mut self, target: Target, rect: Rect);

    /// Fills a rectangle with a solid color.
    fn fill_rect(&mut self, target: Target, rect: Rect, color: Rgba);
}
