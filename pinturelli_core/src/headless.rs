// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory [`SurfaceBackend`] for tests, demos, and headless hosts.
//!
//! [`HeadlessBackend`] keeps every surface (and the screen) as a plain RGBA
//! buffer and appends each call to an operation log, so tests can assert both
//! on pixels and on the order in which the scene composited things.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use kurbo::{Point, Rect, Size};

use crate::backend::{Rgba, SurfaceBackend, SurfaceId, Target};

/// A recorded backend call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    /// A surface was allocated.
    Create(SurfaceId),
    /// A surface was released.
    Release(SurfaceId),
    /// A surface was drawn onto a target.
    Blit {
        /// Source surface.
        src: SurfaceId,
        /// Destination.
        dst: Target,
        /// Top-left corner in destination space.
        at: Point,
    },
    /// A rectangle was erased.
    Clear {
        /// Destination.
        target: Target,
        /// Erased rectangle.
        rect: Rect,
    },
    /// A rectangle was filled.
    Fill {
        /// Destination.
        target: Target,
        /// Filled rectangle.
        rect: Rect,
        /// Fill color.
        color: Rgba,
    },
}

#[derive(Clone, Debug)]
struct Pixmap {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Pixmap {
    fn new(size: Size) -> Self {
        let width = extent(size.width);
        let height = extent(size.height);
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width as usize * height as usize],
        }
    }

    fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[(y * self.width + x) as usize])
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) as usize;
        self.pixels[idx] = over(color, self.pixels[idx]);
    }

    fn fill(&mut self, rect: Rect, color: Rgba) {
        for y in span(rect.y0, rect.y1, self.height) {
            for x in span(rect.x0, rect.x1, self.width) {
                self.pixels[(y * self.width + x) as usize] = color;
            }
        }
    }
}

/// An in-memory surface backend.
#[derive(Clone, Debug)]
pub struct HeadlessBackend {
    screen: Pixmap,
    surfaces: Vec<Option<Pixmap>>,
    ops: Vec<Op>,
}

impl HeadlessBackend {
    /// Creates a backend whose screen has the given canvas size.
    #[must_use]
    pub fn new(canvas: Size) -> Self {
        Self {
            screen: Pixmap::new(canvas),
            surfaces: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// Returns the operation log.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Clears the operation log, keeping all pixels.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Returns the blits recorded so far, in order.
    pub fn blits(&self) -> impl Iterator<Item = (SurfaceId, Target, Point)> + '_ {
        self.ops.iter().filter_map(|op| match *op {
            Op::Blit { src, dst, at } => Some((src, dst, at)),
            _ => None,
        })
    }

    /// Reads one pixel of the screen.
    #[must_use]
    pub fn screen_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.screen.get(x, y)
    }

    /// Returns the number of surfaces currently allocated.
    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.iter().filter(|s| s.is_some()).count()
    }

    /// Returns whether `surface` is allocated.
    #[must_use]
    pub fn is_live(&self, surface: SurfaceId) -> bool {
        matches!(self.surfaces.get(surface.0 as usize), Some(Some(_)))
    }

    fn pixmap_mut(&mut self, target: Target) -> Option<&mut Pixmap> {
        match target {
            Target::Screen => Some(&mut self.screen),
            Target::Surface(id) => self.surfaces.get_mut(id.0 as usize)?.as_mut(),
        }
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn canvas_size(&self) -> Size {
        Size::new(f64::from(self.screen.width), f64::from(self.screen.height))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "surface counts stay far below u32::MAX"
    )]
    fn create_surface(&mut self, size: Size) -> SurfaceId {
        let id = SurfaceId(self.surfaces.len() as u32);
        self.surfaces.push(Some(Pixmap::new(size)));
        self.ops.push(Op::Create(id));
        id
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        if let Some(slot) = self.surfaces.get_mut(surface.0 as usize) {
            *slot = None;
        }
        self.ops.push(Op::Release(surface));
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "blit offsets are rounded canvas coordinates"
    )]
    fn blit(&mut self, src: SurfaceId, dst: Target, at: Point) {
        self.ops.push(Op::Blit { src, dst, at });
        let Some(Some(source)) = self.surfaces.get(src.0 as usize) else {
            return;
        };
        let source = source.clone();
        let (ox, oy) = (at.x.round() as i64, at.y.round() as i64);
        let Some(dest) = self.pixmap_mut(dst) else {
            return;
        };
        for y in 0..source.height {
            for x in 0..source.width {
                let color = source.pixels[(y * source.width + x) as usize];
                if color.a > 0 {
                    dest.put(ox + i64::from(x), oy + i64::from(y), color);
                }
            }
        }
    }

    fn sample(&self, surface: SurfaceId, x: u32, y: u32) -> Option<Rgba> {
        self.surfaces.get(surface.0 as usize)?.as_ref()?.get(x, y)
    }

    fn clear(&mut self, target: Target, rect: Rect) {
        self.ops.push(Op::Clear { target, rect });
        if let Some(pixmap) = self.pixmap_mut(target) {
            pixmap.fill(rect, Rgba::TRANSPARENT);
        }
    }

    fn fill_rect(&mut self, target: Target, rect: Rect, color: Rgba) {
        self.ops.push(Op::Fill {
            target,
            rect,
            color,
        });
        if let Some(pixmap) = self.pixmap_mut(target) {
            pixmap.fill(rect, color);
        }
    }
}

/// Source-over compositing of straight-alpha colors.
#[expect(
    clippy::cast_possible_truncation,
    reason = "blended channels are bounded by 255"
)]
fn over(src: Rgba, dst: Rgba) -> Rgba {
    if src.a == 255 || dst.a == 0 {
        return src;
    }
    let sa = u32::from(src.a);
    let da = u32::from(dst.a) * (255 - sa) / 255;
    let out_a = sa + da;
    let mix = |s: u8, d: u8| ((u32::from(s) * sa + u32::from(d) * da) / out_a) as u8;
    Rgba::new(
        mix(src.r, dst.r),
        mix(src.g, dst.g),
        mix(src.b, dst.b),
        out_a as u8,
    )
}

/// Pixel extent of a length, rounded up.
#[expect(
    clippy::cast_possible_truncation,
    reason = "canvas dimensions fit in u32"
)]
fn extent(len: f64) -> u32 {
    if len.is_finite() && len > 0.0 {
        len.ceil() as u32
    } else {
        0
    }
}

/// Pixel columns (or rows) covered by `[lo, hi)`, clamped to `[0, limit)`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to [0, limit] before casting"
)]
fn span(lo: f64, hi: f64, limit: u32) -> Range<u32> {
    let limit_f = f64::from(limit);
    let start = lo.floor().clamp(0.0, limit_f) as u32;
    let end = hi.ceil().clamp(0.0, limit_f) as u32;
    start..end.max(start)
}
