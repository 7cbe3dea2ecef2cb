//! Stabiliser configuration.

use jitterless_core::{JitterlessError, Result};
use jitterless_tracking::{FrameTrackerSettings, GridSize};
use serde::{Deserialize, Serialize};

use crate::trajectory::SMOOTHING_RADIUS_MIN;

/// User-facing settings of the [`VideoStabilizer`](crate::VideoStabilizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerSettings {
    /// Half-width of the smoothing window in frames. Must be even.
    pub smoothing_radius: usize,
    /// Fraction of each frame dimension removed by the output crop.
    pub crop_proportion: f32,
    /// Vertex grid of the local motion field.
    pub local_motion_resolution: GridSize,
    /// Output the full frame with the crop outlined instead of cropping.
    pub test_mode: bool,
    pub tracker: FrameTrackerSettings,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            smoothing_radius: 14,
            crop_proportion: 0.05,
            local_motion_resolution: GridSize::new(2, 2),
            test_mode: false,
            tracker: FrameTrackerSettings::default(),
        }
    }
}

impl StabilizerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.smoothing_radius < SMOOTHING_RADIUS_MIN || self.smoothing_radius % 2 != 0 {
            return Err(JitterlessError::InvalidConfiguration(format!(
                "smoothing radius must be even and at least {SMOOTHING_RADIUS_MIN}, got {}",
                self.smoothing_radius
            )));
        }
        if !(self.crop_proportion > 0.0 && self.crop_proportion < 1.0) {
            return Err(JitterlessError::InvalidConfiguration(format!(
                "crop proportion must lie in (0, 1), got {}",
                self.crop_proportion
            )));
        }
        self.tracker_settings().validate()
    }

    /// Tracker settings with the local motion grid applied.
    pub fn tracker_settings(&self) -> FrameTrackerSettings {
        FrameTrackerSettings {
            motion_resolution: self.local_motion_resolution,
            ..self.tracker.clone()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| JitterlessError::Serialization(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| JitterlessError::Serialization(e.to_string()))
    }
}
