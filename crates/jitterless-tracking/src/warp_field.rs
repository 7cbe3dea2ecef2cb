//! Dense motion: a global transform refined by a grid of local offsets.

use glam::Affine2;
use jitterless_core::{MotionModel, Transform, Vec2};
use std::ops::{Add, Mul, Sub};

use crate::spatial_index::GridSize;

/// Global transform plus per-vertex corrections on a regular grid.
///
/// Vertices span the frame corner to corner. Offsets are expressed in output
/// coordinates and interpolated bilinearly between vertices. A field with no
/// offsets is purely global, which is also how [`MotionModel::identity`] is
/// represented, so fields of any resolution can be combined with it.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpField {
    resolution: GridSize,
    frame_size: Vec2,
    global: Transform,
    offsets: Vec<Vec2>,
}

impl WarpField {
    /// Field of `resolution` vertices over a `frame_size` frame with zero offsets.
    pub fn new(resolution: GridSize, frame_size: Vec2, global: Transform) -> Self {
        Self {
            resolution,
            frame_size,
            global,
            offsets: vec![Vec2::ZERO; resolution.area()],
        }
    }

    /// Field without local corrections.
    pub fn from_global(global: Transform) -> Self {
        Self {
            resolution: GridSize::new(1, 1),
            frame_size: Vec2::ZERO,
            global,
            offsets: Vec::new(),
        }
    }

    pub fn global(&self) -> Transform {
        self.global
    }

    pub fn resolution(&self) -> GridSize {
        self.resolution
    }

    pub fn offsets(&self) -> &[Vec2] {
        &self.offsets
    }

    pub fn has_local_motion(&self) -> bool {
        !self.offsets.is_empty()
    }

    pub fn offset(&self, col: u32, row: u32) -> Vec2 {
        self.offsets
            .get((row * self.resolution.cols + col) as usize)
            .copied()
            .unwrap_or(Vec2::ZERO)
    }

    pub fn set_offset(&mut self, col: u32, row: u32, offset: Vec2) {
        assert!(col < self.resolution.cols && row < self.resolution.rows);
        if self.offsets.is_empty() {
            self.offsets = vec![Vec2::ZERO; self.resolution.area()];
        }
        self.offsets[(row * self.resolution.cols + col) as usize] = offset;
    }

    /// Grid coordinates of a frame position, clamped to the vertex range.
    pub fn grid_position(&self, position: Vec2) -> Vec2 {
        let span = Vec2::new(
            self.resolution.cols.saturating_sub(1) as f32,
            self.resolution.rows.saturating_sub(1) as f32,
        );
        let unit = position / self.frame_size.max(Vec2::ONE);
        (unit * span).clamp(Vec2::ZERO, span)
    }

    /// Vertex closest to a frame position.
    pub fn nearest_vertex(&self, position: Vec2) -> (u32, u32) {
        let g = self.grid_position(position).round();
        (g.x as u32, g.y as u32)
    }

    /// Fields on different grids cannot be combined vertex by vertex.
    fn combine(self, rhs: Self, op: impl Fn(Vec2, Vec2) -> Vec2, global: Transform) -> Self {
        debug_assert!(
            !self.has_local_motion()
                || !rhs.has_local_motion()
                || self.resolution == rhs.resolution,
            "combining {}x{} and {}x{} motion grids",
            self.resolution.cols,
            self.resolution.rows,
            rhs.resolution.cols,
            rhs.resolution.rows
        );
        let (resolution, frame_size) = if self.has_local_motion() {
            (self.resolution, self.frame_size)
        } else {
            (rhs.resolution, rhs.frame_size)
        };
        let len = self.offsets.len().max(rhs.offsets.len());
        let offsets = (0..len)
            .map(|i| {
                let a = self.offsets.get(i).copied().unwrap_or(Vec2::ZERO);
                let b = rhs.offsets.get(i).copied().unwrap_or(Vec2::ZERO);
                op(a, b)
            })
            .collect();
        Self {
            resolution,
            frame_size,
            global,
            offsets,
        }
    }
}

impl Default for WarpField {
    fn default() -> Self {
        Self::from_global(Transform::IDENTITY)
    }
}

impl Add for WarpField {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let global = self.global + rhs.global;
        self.combine(rhs, |a, b| a + b, global)
    }
}

impl Sub for WarpField {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let global = self.global - rhs.global;
        self.combine(rhs, |a, b| a - b, global)
    }
}

impl Mul<f32> for WarpField {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self {
        self.global = self.global * rhs;
        for offset in &mut self.offsets {
            *offset *= rhs;
        }
        self
    }
}

impl MotionModel for WarpField {
    fn identity() -> Self {
        Self::default()
    }

    fn to_affine(&self) -> Affine2 {
        self.global.to_affine()
    }

    fn local_offset(&self, position: Vec2) -> Vec2 {
        if self.offsets.is_empty() {
            return Vec2::ZERO;
        }
        let g = self.grid_position(position);
        let (x0, y0) = (g.x.floor() as u32, g.y.floor() as u32);
        let x1 = (x0 + 1).min(self.resolution.cols - 1);
        let y1 = (y0 + 1).min(self.resolution.rows - 1);
        let (fx, fy) = (g.x - x0 as f32, g.y - y0 as f32);

        let top = self.offset(x0, y0).lerp(self.offset(x1, y0), fx);
        let bottom = self.offset(x0, y1).lerp(self.offset(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    fn grid_lines(&self) -> (Vec<f32>, Vec<f32>) {
        if self.offsets.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let lines = |count: u32, extent: f32| -> Vec<f32> {
            if count < 2 {
                return Vec::new();
            }
            (0..count)
                .map(|i| extent * i as f32 / (count - 1) as f32)
                .collect()
        };
        (
            lines(self.resolution.cols, self.frame_size.x),
            lines(self.resolution.rows, self.frame_size.y),
        )
    }
}
