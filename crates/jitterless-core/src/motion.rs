//! The motion estimate abstraction shared by the tracker and the smoother.

use crate::geometry::{Transform, Vec2};
use glam::Affine2;
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

/// A camera motion estimate that can be accumulated, filtered and applied.
///
/// Implementors form a vector space under `+` and `* f32` with
/// [`MotionModel::identity`] as the zero element. Every estimate has a global
/// affine part; dense models add a per-position correction on top of it.
pub trait MotionModel:
    Clone + Debug + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self>
{
    fn identity() -> Self;

    /// Global affine part of the motion.
    fn to_affine(&self) -> Affine2;

    /// Dense correction at an output position, applied after the global part.
    fn local_offset(&self, _position: Vec2) -> Vec2 {
        Vec2::ZERO
    }

    /// Linear interpolation toward `other`; `t = 0` gives `self`.
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self.clone() * (1.0 - t) + other.clone() * t
    }

    /// Vertical and horizontal output lines between which [`local_offset`]
    /// is linear along each axis. Empty for purely global motion.
    ///
    /// [`local_offset`]: MotionModel::local_offset
    fn grid_lines(&self) -> (Vec<f32>, Vec<f32>) {
        (Vec::new(), Vec::new())
    }

    /// Position in the source frame which lands at `output` once warped.
    fn source_of(&self, output: Vec2) -> Vec2 {
        self.to_affine()
            .inverse()
            .transform_point2(output - self.local_offset(output))
    }
}

impl MotionModel for Transform {
    fn identity() -> Self {
        Transform::IDENTITY
    }

    fn to_affine(&self) -> Affine2 {
        Transform::to_affine(self)
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Transform::lerp(self, other, t)
    }
}
