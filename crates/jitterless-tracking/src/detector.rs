//! Corner detection spread across a spatial grid.

use jitterless_core::Vec2;
use rayon::prelude::*;

use crate::pyramid::GrayImage;
use crate::spatial_index::SpatialIndex;

/// A corner candidate and its Shi-Tomasi response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub position: Vec2,
    pub response: f32,
}

/// Shi-Tomasi corner detector which keeps the strongest corner per grid bucket.
#[derive(Debug, Clone)]
pub struct FeatureDetector {
    /// Minimum eigenvalue of the averaged structure tensor.
    pub min_response: f32,
    /// Half size of the structure tensor window.
    pub window_radius: u32,
    /// Pixels at the image edge where no corner is reported.
    pub border: u32,
}

impl FeatureDetector {
    pub fn new() -> Self {
        Self {
            min_response: 1e-4,
            window_radius: 2,
            border: 8,
        }
    }

    /// Minimum-eigenvalue corner response for every pixel.
    pub fn response(&self, img: &GrayImage) -> GrayImage {
        let (ix, iy) = compute_gradients(img);
        let (w, h) = (img.width as i32, img.height as i32);
        let r = self.window_radius as i32;
        let norm = 1.0 / ((2 * r + 1) * (2 * r + 1)) as f32;

        let mut out = GrayImage::new(img.width, img.height);
        out.data
            .par_chunks_mut(img.width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as i32;
                for (x, value) in row.iter_mut().enumerate() {
                    let x = x as i32;
                    let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
                    for wy in (y - r).max(0)..=(y + r).min(h - 1) {
                        for wx in (x - r).max(0)..=(x + r).min(w - 1) {
                            let idx = (wy * w + wx) as usize;
                            gxx += ix[idx] * ix[idx];
                            gxy += ix[idx] * iy[idx];
                            gyy += iy[idx] * iy[idx];
                        }
                    }
                    let (gxx, gxy, gyy) = (gxx * norm, gxy * norm, gyy * norm);
                    let trace = 0.5 * (gxx + gyy);
                    let spread = (0.25 * (gxx - gyy) * (gxx - gyy) + gxy * gxy).sqrt();
                    *value = trace - spread;
                }
            });
        out
    }

    /// Fill the empty buckets of `features` with the strongest corners of `img`.
    ///
    /// Buckets that already hold a feature are left untouched. Returns the
    /// number of features added.
    pub fn detect(&self, img: &GrayImage, features: &mut SpatialIndex<Feature>) -> usize {
        let response = self.response(img);
        let grid = features.resolution();
        let mut occupied = vec![false; grid.area()];
        for key in features.keys() {
            occupied[(key.row * grid.cols + key.col) as usize] = true;
        }

        let before = features.len();
        let border = self.border;
        for y in border..img.height.saturating_sub(border) {
            for x in border..img.width.saturating_sub(border) {
                let strength = response.data[(y * img.width + x) as usize];
                if strength < self.min_response {
                    continue;
                }
                let position = Vec2::new(x as f32, y as f32);
                let Some(key) = features.try_key_of(position) else {
                    continue;
                };
                if occupied[(key.row * grid.cols + key.col) as usize] {
                    continue;
                }
                let stronger = features
                    .get(key)
                    .map_or(true, |current| strength > current.response);
                if stronger {
                    features.place(
                        position,
                        Feature {
                            position,
                            response: strength,
                        },
                    );
                }
            }
        }
        features.len() - before
    }
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute spatial gradients (Ix, Iy) using central differences.
pub fn compute_gradients(img: &GrayImage) -> (Vec<f32>, Vec<f32>) {
    let size = (img.width * img.height) as usize;
    let mut ix = vec![0.0f32; size];
    let mut iy = vec![0.0f32; size];
    for y in 1..(img.height as i32 - 1) {
        for x in 1..(img.width as i32 - 1) {
            let idx = (y as u32 * img.width + x as u32) as usize;
            ix[idx] = (img.get(x + 1, y) - img.get(x - 1, y)) * 0.5;
            iy[idx] = (img.get(x, y + 1) - img.get(x, y - 1)) * 0.5;
        }
    }
    (ix, iy)
}
