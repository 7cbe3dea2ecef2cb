//! Delayed sliding-window smoothing of the camera trajectory.
//!
//! Frames are held back in a queue of `radius + 2` entries while their motion
//! samples travel through a centred window of `2 * radius + 1` samples. When
//! both are full the oldest buffered frame sits at the centre of the window,
//! so the smoothed trajectory around it covers both past and future motion.

use jitterless_core::{
    warp_frame, FrameBuffer, FrameLease, JitterlessError, MotionModel, Rect, Result,
};
use std::ops::{Add, Mul};
use tracing::{debug, info};

use crate::crop::enclose_crop;
use crate::delay_line::DelayLine;
use crate::kernel::trajectory_kernel;

/// Smallest accepted smoothing radius.
pub const SMOOTHING_RADIUS_MIN: usize = 2;

/// One step of the camera path.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSample<M> {
    /// Motion from the frame at `timestamp` to the next one.
    pub velocity: M,
    /// Running sum of all velocities up to and including this one.
    pub displacement: M,
    /// Timestamp of the frame the velocity departs from. Padding samples and
    /// combinations of samples have none.
    pub timestamp: Option<u64>,
}

impl<M: MotionModel> MotionSample<M> {
    pub fn identity() -> Self {
        Self {
            velocity: M::identity(),
            displacement: M::identity(),
            timestamp: None,
        }
    }
}

impl<M: MotionModel> Add for MotionSample<M> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            velocity: self.velocity + rhs.velocity,
            displacement: self.displacement + rhs.displacement,
            timestamp: None,
        }
    }
}

impl<M: MotionModel> Mul<f32> for MotionSample<M> {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            velocity: self.velocity * rhs,
            displacement: self.displacement * rhs,
            timestamp: self.timestamp,
        }
    }
}

/// A frame waiting in the delay queue.
///
/// Owns a copy of the pixels and borrows the host frame through its lease.
#[derive(Debug)]
pub struct BufferedFrame {
    pub frame: FrameBuffer,
    pub timestamp: u64,
    lease: FrameLease,
    emitted: bool,
}

impl BufferedFrame {
    pub fn new(frame: FrameBuffer, timestamp: u64, lease: FrameLease) -> Self {
        Self {
            frame,
            timestamp,
            lease,
            emitted: false,
        }
    }

    pub fn lease(&self) -> &FrameLease {
        &self.lease
    }
}

/// A warped output frame, handed back together with the host's lease.
#[derive(Debug)]
pub struct StabilizedFrame<M> {
    pub frame: FrameBuffer,
    pub crop: Rect,
    pub timestamp: u64,
    /// Warp applied to the buffered frame, after crop enclosure.
    pub warp: M,
    pub lease: FrameLease,
}

/// Outcome of [`TrajectorySmoother::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconfigured {
    pub changed: bool,
    /// Host frame leases released by the change.
    pub released: usize,
}

/// Sliding-window Gaussian smoother over a motion trajectory.
#[derive(Debug)]
pub struct TrajectorySmoother<M: MotionModel> {
    radius: usize,
    frames: DelayLine<BufferedFrame>,
    trajectory: DelayLine<MotionSample<M>>,
    kernel: Vec<f32>,
    last_timestamp: Option<u64>,
}

impl<M: MotionModel + Sync> TrajectorySmoother<M> {
    pub fn new(radius: usize) -> Result<Self> {
        validate_radius(radius)?;
        let mut smoother = Self {
            radius,
            frames: DelayLine::new(radius + 2),
            trajectory: DelayLine::new(2 * radius + 1),
            kernel: trajectory_kernel(2 * radius + 1),
            last_timestamp: None,
        };
        smoother.reset();
        Ok(smoother)
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Number of frames held back before the first output.
    pub fn frame_queue_capacity(&self) -> usize {
        self.frames.capacity()
    }

    pub fn trajectory_capacity(&self) -> usize {
        self.trajectory.capacity()
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn oldest_frame(&self) -> Option<&BufferedFrame> {
        self.frames.oldest()
    }

    pub fn trajectory(&self) -> &DelayLine<MotionSample<M>> {
        &self.trajectory
    }

    /// Change the smoothing radius.
    ///
    /// Every buffered frame is released before the queues are resized. An
    /// invalid radius leaves the smoother untouched.
    pub fn configure(&mut self, radius: usize) -> Result<Reconfigured> {
        validate_radius(radius)?;
        if radius == self.radius {
            return Ok(Reconfigured {
                changed: false,
                released: 0,
            });
        }

        let released = self.release_frames();
        self.frames.resize(radius + 2);
        self.trajectory.resize(2 * radius + 1);
        self.kernel = trajectory_kernel(2 * radius + 1);
        info!(from = self.radius, to = radius, released, "Smoothing radius changed");
        self.radius = radius;
        self.reset();

        Ok(Reconfigured {
            changed: true,
            released,
        })
    }

    /// Release all buffered frames and reseed the trajectory.
    ///
    /// Returns the number of host frame leases released.
    pub fn reset(&mut self) -> usize {
        let released = self.release_frames();
        self.trajectory.clear();
        self.last_timestamp = None;

        // The velocity of frame i is only known once frame i + 1 arrives, so
        // the window lags by one sample to keep the oldest frame centred.
        self.trajectory.push(MotionSample::identity());
        while self.trajectory.len() < self.radius - 1 {
            let padding = MotionSample {
                velocity: M::identity(),
                displacement: self.newest_displacement(),
                timestamp: None,
            };
            self.trajectory.push(padding);
        }
        released
    }

    fn release_frames(&mut self) -> usize {
        let released = self.frames.iter().filter(|f| f.lease.is_armed()).count();
        if released > 0 {
            debug!(released, "Releasing buffered frames");
        }
        self.frames.clear();
        released
    }

    fn newest_displacement(&self) -> M {
        self.trajectory
            .newest()
            .map_or_else(M::identity, |sample| sample.displacement.clone())
    }

    /// Queue a frame with the motion from the previous frame to it.
    pub fn push(&mut self, frame: BufferedFrame, velocity: M) {
        let sample = MotionSample {
            displacement: self.newest_displacement() + velocity.clone(),
            velocity,
            timestamp: self.last_timestamp,
        };
        self.last_timestamp = Some(frame.timestamp);
        self.trajectory.push(sample);
        self.frames.push(frame);
    }

    /// Both delay lines are full and an output can be produced.
    pub fn is_ready(&self) -> bool {
        debug_assert_eq!(
            self.frames.is_full(),
            self.trajectory.is_full(),
            "frame queue and trajectory are out of sync"
        );
        self.frames.is_full() && self.trajectory.is_full()
    }

    /// Warp the oldest buffered frame onto the smoothed trajectory.
    ///
    /// Returns `None` until the window is full, and for a frame that was
    /// already emitted. The frame's lease moves into the returned value.
    pub fn stabilize(&mut self, crop: Rect) -> Option<StabilizedFrame<M>> {
        if !self.is_ready() {
            return None;
        }
        let centre = self.trajectory.centre()?;
        let smoothed = self.trajectory.convolve(&self.kernel)?;
        let correction = smoothed.displacement - centre.displacement.clone();
        let smooth_warp = centre.velocity.clone() + correction;

        let oldest = self.frames.oldest_mut()?;
        if oldest.emitted {
            return None;
        }
        let warp = enclose_crop(oldest.frame.size(), &smooth_warp, crop);
        let frame = warp_frame(&oldest.frame, &warp);
        oldest.emitted = true;

        Some(StabilizedFrame {
            frame,
            crop,
            timestamp: oldest.timestamp,
            warp,
            lease: std::mem::take(&mut oldest.lease),
        })
    }
}

fn validate_radius(radius: usize) -> Result<()> {
    if radius < SMOOTHING_RADIUS_MIN || radius % 2 != 0 {
        return Err(JitterlessError::InvalidConfiguration(format!(
            "smoothing radius must be even and at least {SMOOTHING_RADIUS_MIN}, got {radius}"
        )));
    }
    Ok(())
}
