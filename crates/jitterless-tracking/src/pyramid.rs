//! Image pyramid utilities for multi-scale tracking.

use jitterless_core::{FrameBuffer, JitterlessError, PixelFormat, Result, Vec2};

/// A grayscale image stored as f32 values [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl GrayImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
        }
    }

    /// Create an image from a per-pixel function.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Self {
        let mut img = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.data[(y * width + x) as usize] = f(x, y);
            }
        }
        img
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Bilinear sample at a sub-pixel position, edges replicated.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (ix, iy) = (x0 as i32, y0 as i32);
        let top = self.get(ix, iy) * (1.0 - fx) + self.get(ix + 1, iy) * fx;
        let bottom = self.get(ix, iy + 1) * (1.0 - fx) + self.get(ix + 1, iy + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Check whether a position is at least `margin` pixels inside the image.
    #[inline]
    pub fn is_inside(&self, position: Vec2, margin: f32) -> bool {
        position.x >= margin
            && position.y >= margin
            && position.x < self.width as f32 - margin
            && position.y < self.height as f32 - margin
    }
}

/// Multi-scale image pyramid.
#[derive(Debug, Clone)]
pub struct ImagePyramid {
    pub levels: Vec<GrayImage>,
}

impl ImagePyramid {
    pub fn build(gray: &GrayImage, num_levels: u32) -> Self {
        let mut levels = vec![gray.clone()];
        for _ in 1..num_levels.max(1) {
            let prev = &levels[levels.len() - 1];
            if prev.width < 16 || prev.height < 16 {
                break;
            }
            let nw = prev.width.div_ceil(2);
            let nh = prev.height.div_ceil(2);
            let mut level = GrayImage::new(nw, nh);
            for y in 0..nh {
                for x in 0..nw {
                    let sx = (x * 2) as i32;
                    let sy = (y * 2) as i32;
                    let avg = (prev.get(sx, sy)
                        + prev.get(sx + 1, sy)
                        + prev.get(sx, sy + 1)
                        + prev.get(sx + 1, sy + 1))
                        * 0.25;
                    level.set(x, y, avg);
                }
            }
            levels.push(level);
        }
        Self { levels }
    }

    pub fn base(&self) -> &GrayImage {
        &self.levels[0]
    }
}

/// Convert RGBA u8 frame data to a grayscale image.
pub fn rgb_to_gray(rgba: &[u8], w: u32, h: u32) -> GrayImage {
    let size = (w * h) as usize;
    let mut gray = GrayImage::new(w, h);
    for i in 0..size {
        let idx = i * 4;
        if idx + 2 < rgba.len() {
            gray.data[i] = (0.299 * rgba[idx] as f32
                + 0.587 * rgba[idx + 1] as f32
                + 0.114 * rgba[idx + 2] as f32)
                / 255.0;
        }
    }
    gray
}

/// Extract the luminance plane of a frame for tracking.
pub fn luminance(frame: &FrameBuffer) -> Result<GrayImage> {
    if frame.is_empty() {
        return Err(JitterlessError::FrameMismatch(format!(
            "cannot track an empty {}x{} frame",
            frame.width, frame.height
        )));
    }
    let plane = frame
        .planes
        .first()
        .ok_or_else(|| JitterlessError::FrameMismatch("frame has no planes".into()))?;
    let (w, h) = (frame.width, frame.height);

    match frame.format {
        PixelFormat::Gray8 | PixelFormat::Yuv420P => {
            let mut gray = GrayImage::new(w, h);
            for y in 0..h {
                let row = plane.row(y);
                let out = &mut gray.data[(y * w) as usize..((y + 1) * w) as usize];
                for (dst, &src) in out.iter_mut().zip(row) {
                    *dst = src as f32 / 255.0;
                }
            }
            Ok(gray)
        }
        PixelFormat::Rgba8 => {
            let mut packed = Vec::with_capacity(PixelFormat::Rgba8.frame_size(w, h));
            for y in 0..h {
                packed.extend_from_slice(plane.row(y));
            }
            Ok(rgb_to_gray(&packed, w, h))
        }
    }
}
