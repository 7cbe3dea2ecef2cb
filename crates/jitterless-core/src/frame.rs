//! Frame buffer types for video frames in CPU memory.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::Vec2;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit grayscale
    Gray8,
    /// YUV 4:2:0 planar
    Yuv420P,
}

impl PixelFormat {
    /// Number of planes for this format.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Rgba8 | Self::Gray8 => 1,
            Self::Yuv420P => 3,
        }
    }

    /// Calculate total bytes needed for a frame of this format, without padding.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        match self {
            Self::Rgba8 => (width * height * 4) as usize,
            Self::Gray8 => (width * height) as usize,
            Self::Yuv420P => {
                let y_size = (width * height) as usize;
                let uv_size = (width.div_ceil(2) * height.div_ceil(2)) as usize;
                y_size + uv_size * 2
            }
        }
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved channels per pixel
    pub channels: usize,
}

impl FramePlane {
    /// Create a new zeroed frame plane with the given dimensions.
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        // Align stride to 64 bytes for SIMD and GPU compatibility
        let min_stride = (width as usize) * channels;
        let stride = (min_stride + 63) & !63;
        let data = vec![0u8; stride * height as usize];
        Self {
            data,
            stride,
            width,
            height,
            channels,
        }
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.channels;
        &self.data[start..end]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.channels;
        &mut self.data[start..end]
    }

    /// Sample a channel, clamping coordinates to the plane edges.
    #[inline]
    pub fn sample(&self, x: i32, y: i32, channel: usize) -> u8 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.stride + x * self.channels + channel]
    }

    /// Bilinear sample of a channel at a sub-pixel position, edges replicated.
    pub fn sample_bilinear(&self, position: Vec2, channel: usize) -> f32 {
        let x0 = position.x.floor();
        let y0 = position.y.floor();
        let fx = position.x - x0;
        let fy = position.y - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let p00 = self.sample(x0, y0, channel) as f32;
        let p10 = self.sample(x0 + 1, y0, channel) as f32;
        let p01 = self.sample(x0, y0 + 1, channel) as f32;
        let p11 = self.sample(x0 + 1, y0 + 1, channel) as f32;

        let top = p00 + (p10 - p00) * fx;
        let bottom = p01 + (p11 - p01) * fx;
        top + (bottom - top) * fy
    }
}

/// A video frame in CPU memory.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data planes (1-3 depending on format)
    pub planes: SmallVec<[FramePlane; 3]>,
}

impl FrameBuffer {
    /// Create a new frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = match format {
            PixelFormat::Rgba8 => {
                smallvec::smallvec![FramePlane::new(width, height, 4)]
            }
            PixelFormat::Gray8 => {
                smallvec::smallvec![FramePlane::new(width, height, 1)]
            }
            PixelFormat::Yuv420P => {
                let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
                smallvec::smallvec![
                    FramePlane::new(width, height, 1), // Y
                    FramePlane::new(cw, ch, 1),        // U
                    FramePlane::new(cw, ch, 1),        // V
                ]
            }
        };

        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Create a grayscale frame from a per-pixel function.
    pub fn from_fn_gray(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Gray8);
        let plane = frame.primary_plane_mut();
        for y in 0..height {
            for (x, px) in plane.row_mut(y).iter_mut().enumerate() {
                *px = f(x as u32, y);
            }
        }
        frame
    }

    /// Frame size as a vector.
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// A frame without pixels in either direction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Get the primary plane (plane 0).
    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        &self.planes[0]
    }

    /// Get the primary plane mutably.
    #[inline]
    pub fn primary_plane_mut(&mut self) -> &mut FramePlane {
        &mut self.planes[0]
    }

    /// Ratio between a plane's resolution and the frame resolution.
    pub fn plane_scale(&self, plane: usize) -> Vec2 {
        let p = &self.planes[plane];
        Vec2::new(
            p.width as f32 / self.width.max(1) as f32,
            p.height as f32 / self.height.max(1) as f32,
        )
    }

    /// Check whether two frames share format and dimensions.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.format == other.format && self.width == other.width && self.height == other.height
    }
}
