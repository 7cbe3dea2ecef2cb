//! Geometric primitives for 2D camera motion.

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Vec2 as GlamVec2};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin with the given size.
    #[inline]
    pub fn from_size(size: Vec2) -> Self {
        Self::new(0.0, 0.0, size.x, size.y)
    }

    /// Minimum corner (top-left).
    #[inline]
    pub fn min(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Maximum corner (bottom-right).
    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    /// Size as a vector.
    #[inline]
    pub fn size(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Check if a point is inside the rectangle.
    ///
    /// The top and left edges are inclusive, the bottom and right edges are not.
    #[inline]
    pub fn contains(self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}

/// Compact similarity motion: translation, rotation and uniform scale.
///
/// The arithmetic is component-wise, a first-order approximation of motion
/// composition that keeps trajectories linear so they can be summed, scaled
/// and filtered. Scale is stored as `dilation = scale - 1` which makes
/// [`Transform::IDENTITY`] the additive zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec2,
    /// Rotation about the frame origin, in radians.
    pub rotation: f32,
    pub dilation: f32,
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        rotation: 0.0,
        dilation: 0.0,
    };

    /// Create a transform from translation, rotation (radians) and scale.
    #[inline]
    pub fn new(translation: Vec2, rotation: f32, scale: f32) -> Self {
        Self {
            translation,
            rotation,
            dilation: scale - 1.0,
        }
    }

    /// Create a translation transform.
    #[inline]
    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            translation: Vec2::new(x, y),
            ..Self::IDENTITY
        }
    }

    /// Build from similarity matrix coefficients where
    /// `x' = a*x - b*y + tx` and `y' = b*x + a*y + ty`.
    pub fn from_similarity(a: f32, b: f32, translation: Vec2) -> Self {
        Self::new(translation, b.atan2(a), a.hypot(b))
    }

    /// Uniform scale factor.
    #[inline]
    pub fn scale(&self) -> f32 {
        1.0 + self.dilation
    }

    /// Dense affine matrix used for resampling.
    pub fn to_affine(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(
            Vec2::splat(self.scale()),
            self.rotation,
            self.translation,
        )
    }

    /// Transform a point.
    #[inline]
    pub fn apply(&self, point: Vec2) -> Vec2 {
        self.to_affine().transform_point2(point)
    }

    /// Exact inverse of the similarity mapping.
    pub fn inverse(&self) -> Self {
        let scale = self.scale();
        if scale.abs() < f32::EPSILON {
            return Self::IDENTITY;
        }
        let inv_scale = 1.0 / scale;
        let (sin, cos) = (-self.rotation).sin_cos();
        let t = self.translation;
        let rotated = Vec2::new(cos * t.x - sin * t.y, sin * t.x + cos * t.y);
        Self::new(-rotated * inv_scale, -self.rotation, inv_scale)
    }

    /// Linear interpolation toward `other`; `t = 0` gives `self`.
    #[inline]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        *self * (1.0 - t) + *other * t
    }
}

impl Add for Transform {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            translation: self.translation + rhs.translation,
            rotation: self.rotation + rhs.rotation,
            dilation: self.dilation + rhs.dilation,
        }
    }
}

impl AddAssign for Transform {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Transform {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for Transform {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            translation: -self.translation,
            rotation: -self.rotation,
            dilation: -self.dilation,
        }
    }
}

impl Mul<f32> for Transform {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            translation: self.translation * rhs,
            rotation: self.rotation * rhs,
            dilation: self.dilation * rhs,
        }
    }
}
