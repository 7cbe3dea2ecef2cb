//! Jitterless Core - Foundation types for video stabilisation
//!
//! This crate provides the fundamental types used throughout Jitterless:
//! - Geometry (Rect, Transform)
//! - The MotionModel abstraction shared by tracking and smoothing
//! - Frame buffers, host frame leases and frame resampling

pub mod error;
pub mod frame;
pub mod geometry;
pub mod lease;
pub mod motion;
pub mod warp;

pub use error::{JitterlessError, Result};
pub use frame::{FrameBuffer, FramePlane, PixelFormat};
pub use geometry::{Rect, Transform, Vec2};
pub use lease::FrameLease;
pub use motion::MotionModel;
pub use warp::{warp_frame, warp_frame_into};
