//! The per-stream stabilisation pipeline.

use jitterless_core::{FrameBuffer, FrameLease, MotionModel, PixelFormat, Rect, Result, Vec2};
use jitterless_tracking::{luminance, FrameTracker, WarpField};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::crop::crop_region;
use crate::settings::StabilizerSettings;
use crate::trajectory::{BufferedFrame, StabilizedFrame, TrajectorySmoother};

/// A frame handed over by the host, still owned by it through `lease`.
#[derive(Debug)]
pub struct HostFrame {
    pub frame: FrameBuffer,
    pub timestamp: u64,
    pub lease: FrameLease,
}

/// Tracks, smooths and warps one video stream.
///
/// Output lags the input by the frame queue length. Frames discarded
/// without being emitted are released through their leases.
#[derive(Debug)]
pub struct VideoStabilizer {
    settings: StabilizerSettings,
    tracker: FrameTracker,
    smoother: TrajectorySmoother<WarpField>,
    last_velocity: WarpField,
    output_size: Option<Vec2>,
}

impl VideoStabilizer {
    pub fn new(settings: StabilizerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            tracker: FrameTracker::new(settings.tracker_settings())?,
            smoother: TrajectorySmoother::new(settings.smoothing_radius)?,
            last_velocity: WarpField::identity(),
            output_size: None,
            settings,
        })
    }

    pub fn settings(&self) -> &StabilizerSettings {
        &self.settings
    }

    /// Apply new settings. Buffers are only rebuilt when the radius or the
    /// local motion grid changes.
    ///
    /// Invalid settings are rejected and the current ones stay in effect.
    pub fn configure(&mut self, settings: StabilizerSettings) -> Result<()> {
        settings.validate()?;
        self.tracker.configure(settings.tracker_settings())?;
        let mut report = self.smoother.configure(settings.smoothing_radius)?;

        // Motion measured on the old grid cannot be combined with the new one.
        let regridded = settings.local_motion_resolution != self.settings.local_motion_resolution;
        if regridded && !report.changed {
            report.released = self.smoother.reset();
        }
        if regridded || report.changed {
            self.last_velocity = WarpField::identity();
        }
        info!(
            radius = settings.smoothing_radius,
            crop = settings.crop_proportion,
            test_mode = settings.test_mode,
            regridded,
            released = report.released,
            "Stabiliser configured"
        );
        self.settings = settings;
        Ok(())
    }

    /// Drop all buffered frames and restart tracking.
    pub fn reset(&mut self) {
        let released = self.smoother.reset();
        debug!(released, "Stabiliser reset");
        self.tracker.restart();
        self.last_velocity = WarpField::identity();
    }

    pub fn is_ready(&self) -> bool {
        self.smoother.is_ready()
    }

    /// Feed one frame and collect the delayed output, if any.
    ///
    /// Empty frames are rejected with [`JitterlessError::FrameMismatch`] and
    /// released immediately.
    ///
    /// [`JitterlessError::FrameMismatch`]: jitterless_core::JitterlessError::FrameMismatch
    pub fn process(&mut self, input: HostFrame) -> Result<Option<StabilizedFrame<WarpField>>> {
        let start = Instant::now();
        let HostFrame {
            frame,
            timestamp,
            lease,
        } = input;

        let gray = luminance(&frame)?;
        match self.tracker.track(&gray) {
            Some(velocity) => self.last_velocity = velocity,
            None => trace!(timestamp, "No motion estimate, holding last velocity"),
        }
        self.smoother
            .push(BufferedFrame::new(frame, timestamp, lease), self.last_velocity.clone());

        let Some(oldest) = self.smoother.oldest_frame() else {
            return Ok(None);
        };
        let (width, height) = (oldest.frame.width, oldest.frame.height);
        let crop = crop_region(width, height, self.settings.crop_proportion);
        let Some(mut output) = self.smoother.stabilize(crop) else {
            return Ok(None);
        };

        self.output_size = Some(if self.settings.test_mode {
            output.frame.size()
        } else {
            crop.size()
        });

        let elapsed = start.elapsed();
        if self.settings.test_mode {
            draw_outline(&mut output.frame, crop);
            debug!(
                timestamp = output.timestamp,
                frame_ms = elapsed.as_secs_f64() * 1e3,
                quality = self.tracker.tracking_quality(),
                "Stabilised frame"
            );
        } else {
            trace!(frame_ms = elapsed.as_secs_f64() * 1e3, "Stabilised frame");
        }
        Ok(Some(output))
    }

    /// Latency introduced by the frame queue at the given frame rate.
    pub fn frame_delay(&self, frames_per_second: f64) -> Duration {
        if frames_per_second <= 0.0 || !frames_per_second.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.smoother.frame_queue_capacity() as f64 / frames_per_second)
    }

    /// Size of the emitted frames: the crop, or the whole frame in test mode.
    ///
    /// Unknown until the first output.
    pub fn output_size(&self) -> Option<Vec2> {
        self.output_size
    }

    pub fn tracking_quality(&self) -> f32 {
        self.tracker.tracking_quality()
    }

    pub fn scene_stability(&self) -> f32 {
        self.tracker.scene_stability()
    }
}

// Magenta in each plane's colour space.
fn outline_colour(format: PixelFormat, plane: usize) -> &'static [u8] {
    match (format, plane) {
        (PixelFormat::Rgba8, _) => &[255, 0, 255, 255],
        (PixelFormat::Gray8, _) | (PixelFormat::Yuv420P, 0) => &[105],
        (PixelFormat::Yuv420P, 1) => &[212],
        (PixelFormat::Yuv420P, _) => &[234],
    }
}

/// Draw a 2 pixel outline of `rect` onto every plane of `frame`.
fn draw_outline(frame: &mut FrameBuffer, rect: Rect) {
    let format = frame.format;
    for index in 0..frame.planes.len() {
        let scale = frame.plane_scale(index);
        let colour = outline_colour(format, index);
        let plane = &mut frame.planes[index];

        let min = (rect.min() * scale).floor();
        let max = (rect.max() * scale).ceil();
        let (x0, y0) = (min.x.max(0.0) as u32, min.y.max(0.0) as u32);
        let (x1, y1) = (
            (max.x as u32).min(plane.width),
            (max.y as u32).min(plane.height),
        );
        let thickness = (2.0 * scale.x).round().max(1.0) as u32;
        let channels = plane.channels;

        for y in y0..y1 {
            let horizontal = y < y0 + thickness || y + thickness >= y1;
            let row = plane.row_mut(y);
            for x in x0..x1 {
                if horizontal || x < x0 + thickness || x + thickness >= x1 {
                    let at = x as usize * channels;
                    row[at..at + channels].copy_from_slice(&colour[..channels]);
                }
            }
        }
    }
}
