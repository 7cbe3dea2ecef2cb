//! Pyramidal Lucas-Kanade point tracker.

use jitterless_core::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pyramid::{GrayImage, ImagePyramid};

/// A point in the previous frame and where it was found in the current one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedPoint {
    pub tracked: Vec2,
    pub matched: Vec2,
    /// False when the flow did not converge or left the frame.
    pub valid: bool,
}

impl MatchedPoint {
    fn lost(tracked: Vec2) -> Self {
        Self {
            tracked,
            matched: tracked,
            valid: false,
        }
    }

    #[inline]
    pub fn displacement(&self) -> Vec2 {
        self.matched - self.tracked
    }
}

/// Lucas-Kanade optical flow point tracker with pyramidal support.
#[derive(Debug, Clone)]
pub struct PointTracker {
    pub window_size: u32,
    pub pyramid_levels: u32,
    pub max_iterations: u32,
    pub epsilon: f32,
    /// Matches moving further than this (in pixels) are rejected.
    pub search_radius: f32,
    /// Smallest structure tensor eigenvalue for a trackable window.
    pub min_eigenvalue: f32,
}

impl PointTracker {
    pub fn new() -> Self {
        Self {
            window_size: 15,
            pyramid_levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            search_radius: 64.0,
            min_eigenvalue: 1e-6,
        }
    }

    /// Track every point from `prev` to `curr`.
    pub fn track(
        &self,
        prev: &ImagePyramid,
        curr: &ImagePyramid,
        points: &[Vec2],
    ) -> Vec<MatchedPoint> {
        points
            .par_iter()
            .map(|&point| self.track_point(prev, curr, point))
            .collect()
    }

    fn track_point(&self, prev: &ImagePyramid, curr: &ImagePyramid, position: Vec2) -> MatchedPoint {
        let levels = prev.levels.len().min(curr.levels.len());
        let hw = (self.window_size / 2) as i32;
        let mut guess = Vec2::ZERO;

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let p = position * scale;
            let prev_img = &prev.levels[level];
            let curr_img = &curr.levels[level];

            let window = Window::sample(prev_img, p, hw);
            let Some(inv) = window.inverse_tensor(self.min_eigenvalue) else {
                if level == 0 {
                    return MatchedPoint::lost(position);
                }
                continue;
            };

            let mut d = guess * scale;
            for _ in 0..self.max_iterations {
                let mut b = Vec2::ZERO;
                let mut i = 0;
                for wy in -hw..=hw {
                    for wx in -hw..=hw {
                        let q = p + d + Vec2::new(wx as f32, wy as f32);
                        let it = curr_img.sample(q.x, q.y) - window.intensity[i];
                        b += window.gradient[i] * it;
                        i += 1;
                    }
                }
                let delta = Vec2::new(
                    inv[0] * b.x + inv[1] * b.y,
                    inv[1] * b.x + inv[2] * b.y,
                );
                d -= delta;
                if delta.length_squared() < self.epsilon * self.epsilon {
                    break;
                }
            }
            guess = d / scale;
        }

        let matched = position + guess;
        let base = curr.base();
        if !guess.is_finite() || guess.length() > self.search_radius || !base.is_inside(matched, 0.0)
        {
            return MatchedPoint::lost(position);
        }
        MatchedPoint {
            tracked: position,
            matched,
            valid: true,
        }
    }
}

impl Default for PointTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Template window around a point in the previous image.
struct Window {
    intensity: Vec<f32>,
    gradient: Vec<Vec2>,
    g11: f32,
    g12: f32,
    g22: f32,
}

impl Window {
    fn sample(img: &GrayImage, centre: Vec2, hw: i32) -> Self {
        let n = ((2 * hw + 1) * (2 * hw + 1)) as usize;
        let mut intensity = Vec::with_capacity(n);
        let mut gradient = Vec::with_capacity(n);
        let (mut g11, mut g12, mut g22) = (0.0f32, 0.0f32, 0.0f32);

        for wy in -hw..=hw {
            for wx in -hw..=hw {
                let q = centre + Vec2::new(wx as f32, wy as f32);
                let ix = (img.sample(q.x + 1.0, q.y) - img.sample(q.x - 1.0, q.y)) * 0.5;
                let iy = (img.sample(q.x, q.y + 1.0) - img.sample(q.x, q.y - 1.0)) * 0.5;
                intensity.push(img.sample(q.x, q.y));
                gradient.push(Vec2::new(ix, iy));
                g11 += ix * ix;
                g12 += ix * iy;
                g22 += iy * iy;
            }
        }

        Self {
            intensity,
            gradient,
            g11,
            g12,
            g22,
        }
    }

    /// Inverse of the symmetric structure tensor as `[a, b, c]` for `[[a, b], [b, c]]`.
    fn inverse_tensor(&self, min_eigenvalue: f32) -> Option<[f32; 3]> {
        let n = self.intensity.len() as f32;
        let trace = 0.5 * (self.g11 + self.g22);
        let spread = (0.25 * (self.g11 - self.g22).powi(2) + self.g12 * self.g12).sqrt();
        if (trace - spread) / n < min_eigenvalue {
            return None;
        }
        let det = self.g11 * self.g22 - self.g12 * self.g12;
        let inv_det = 1.0 / det;
        Some([self.g22 * inv_det, -self.g12 * inv_det, self.g11 * inv_det])
    }
}
