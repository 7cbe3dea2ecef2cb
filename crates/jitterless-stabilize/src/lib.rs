//! Jitterless Stabilize - delayed trajectory smoothing and frame warping.
//!
//! The [`VideoStabilizer`] runs the whole pipeline for one stream: it tracks
//! each incoming frame, integrates the motion into a trajectory, smooths the
//! trajectory over a centred window and warps the delayed frame so that its
//! crop stays inside the image.

pub mod crop;
pub mod delay_line;
pub mod kernel;
pub mod settings;
pub mod stabilizer;
pub mod trajectory;

pub use crop::{covers_crop, crop_region, enclose_crop, CROP_SEARCH_STEPS};
pub use delay_line::DelayLine;
pub use kernel::{gaussian_kernel, trajectory_kernel};
pub use settings::StabilizerSettings;
pub use stabilizer::{HostFrame, VideoStabilizer};
pub use trajectory::{
    BufferedFrame, MotionSample, Reconfigured, StabilizedFrame, TrajectorySmoother,
    SMOOTHING_RADIUS_MIN,
};
