//! Frame-to-frame camera motion estimation.
//!
//! Features are kept one per bucket of a [`SpatialIndex`] so that the motion
//! fit is not dominated by a single textured corner of the scene. Inliers of
//! the previous fit are carried forward at their matched positions and the
//! remaining buckets are refilled by the corner detector before every step.

use jitterless_core::{JitterlessError, Rect, Result, Vec2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detector::{Feature, FeatureDetector};
use crate::estimation::{ransac_similarity, MotionFit};
use crate::point_tracker::{MatchedPoint, PointTracker};
use crate::pyramid::{GrayImage, ImagePyramid};
use crate::spatial_index::{GridSize, SpatialIndex};
use crate::warp_field::WarpField;

/// Tuning of the [`FrameTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTrackerSettings {
    /// Vertex grid of the local motion field.
    pub motion_resolution: GridSize,
    /// Bucket grid used to spread detected features.
    pub detection_resolution: GridSize,
    /// Minimum inlier ratio of a trusted estimate.
    pub min_motion_quality: f32,
    /// Minimum inlier count of a trusted estimate.
    pub min_motion_samples: usize,
    /// Inliers a vertex needs before it receives a local offset.
    pub min_local_samples: usize,
    pub min_feature_response: f32,
    pub ransac_iterations: u32,
    /// Reprojection error, in pixels, below which a match is an inlier.
    pub inlier_threshold: f32,
    pub pyramid_levels: u32,
    pub window_size: u32,
    pub max_iterations: u32,
    pub epsilon: f32,
}

impl Default for FrameTrackerSettings {
    fn default() -> Self {
        Self {
            motion_resolution: GridSize::new(2, 2),
            detection_resolution: GridSize::new(16, 12),
            min_motion_quality: 0.3,
            min_motion_samples: 16,
            min_local_samples: 4,
            min_feature_response: 1e-4,
            ransac_iterations: 200,
            inlier_threshold: 2.0,
            pyramid_levels: 3,
            window_size: 15,
            max_iterations: 30,
            epsilon: 0.01,
        }
    }
}

impl FrameTrackerSettings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(JitterlessError::InvalidConfiguration(msg.into()));
        if self.motion_resolution.area() == 0 {
            return invalid("motion resolution must have at least one vertex");
        }
        if self.detection_resolution.area() == 0 {
            return invalid("detection resolution must have at least one bucket");
        }
        if !(0.0..=1.0).contains(&self.min_motion_quality) {
            return invalid("minimum motion quality must lie in [0, 1]");
        }
        if self.min_motion_samples < 2 {
            return invalid("at least two motion samples are required");
        }
        if self.ransac_iterations == 0 {
            return invalid("RANSAC needs at least one iteration");
        }
        if self.inlier_threshold <= 0.0 || self.epsilon <= 0.0 {
            return invalid("inlier threshold and epsilon must be positive");
        }
        if self.pyramid_levels == 0 {
            return invalid("pyramid needs at least one level");
        }
        if self.window_size < 3 || self.window_size % 2 == 0 {
            return invalid("tracking window must be odd and at least 3 pixels");
        }
        Ok(())
    }
}

/// Estimates the motion between consecutive luminance frames.
#[derive(Debug)]
pub struct FrameTracker {
    settings: FrameTrackerSettings,
    detector: FeatureDetector,
    point_tracker: PointTracker,
    features: SpatialIndex<Feature>,
    previous: Option<ImagePyramid>,
    last_motion: WarpField,
    scene_stability: f32,
    tracking_quality: f32,
}

impl FrameTracker {
    pub fn new(settings: FrameTrackerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::with_settings(settings))
    }

    fn with_settings(settings: FrameTrackerSettings) -> Self {
        let mut tracker = Self {
            features: SpatialIndex::new(settings.detection_resolution, Rect::from_size(Vec2::ONE)),
            detector: FeatureDetector::new(),
            point_tracker: PointTracker::new(),
            previous: None,
            last_motion: WarpField::default(),
            scene_stability: 0.0,
            tracking_quality: 0.0,
            settings,
        };
        tracker.apply_settings();
        tracker
    }

    /// Replace the settings. Tracking restarts when the grids or the pyramid change.
    pub fn configure(&mut self, settings: FrameTrackerSettings) -> Result<()> {
        settings.validate()?;
        let restart = settings.detection_resolution != self.settings.detection_resolution
            || settings.motion_resolution != self.settings.motion_resolution
            || settings.pyramid_levels != self.settings.pyramid_levels;
        self.settings = settings;
        self.apply_settings();
        if restart {
            self.restart();
        }
        Ok(())
    }

    fn apply_settings(&mut self) {
        let s = &self.settings;
        self.detector.min_response = s.min_feature_response;
        self.point_tracker.window_size = s.window_size;
        self.point_tracker.pyramid_levels = s.pyramid_levels;
        self.point_tracker.max_iterations = s.max_iterations;
        self.point_tracker.epsilon = s.epsilon;
    }

    pub fn settings(&self) -> &FrameTrackerSettings {
        &self.settings
    }

    /// Forget the previous frame and all tracked features.
    pub fn restart(&mut self) {
        self.previous = None;
        self.features.clear();
        self.last_motion = WarpField::default();
        self.scene_stability = 0.0;
        self.tracking_quality = 0.0;
    }

    pub fn is_initialized(&self) -> bool {
        self.previous.is_some()
    }

    pub fn motion_resolution(&self) -> GridSize {
        self.settings.motion_resolution
    }

    pub fn detection_resolution(&self) -> GridSize {
        self.settings.detection_resolution
    }

    /// Positions of the features that will be tracked into the next frame.
    pub fn tracking_points(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.features.iter().map(|(_, feature)| feature.position)
    }

    /// Inlier ratio of the last estimate.
    pub fn scene_stability(&self) -> f32 {
        self.scene_stability
    }

    /// Confidence in the last estimate, from feature spread and inlier support.
    pub fn tracking_quality(&self) -> f32 {
        self.tracking_quality
    }

    /// Motion from the previous frame to `frame`.
    ///
    /// Returns `None` for the first frame after a restart and when no feature
    /// could be followed. Weak evidence, down to a single match, holds the
    /// previous motion instead.
    pub fn track(&mut self, frame: &GrayImage) -> Option<WarpField> {
        let current = ImagePyramid::build(frame, self.settings.pyramid_levels);
        let previous = match self.previous.take() {
            Some(previous) if previous.base().size() == frame.size() => previous,
            _ => {
                self.restart();
                self.features
                    .rescale(self.settings.detection_resolution, Rect::from_size(frame.size()));
                self.previous = Some(current);
                return None;
            }
        };

        let motion = self.estimate(&previous, &current);
        self.previous = Some(current);
        motion
    }

    fn estimate(&mut self, previous: &ImagePyramid, current: &ImagePyramid) -> Option<WarpField> {
        self.detector.detect(previous.base(), &mut self.features);
        let points: Vec<Vec2> = self.tracking_points().collect();
        self.features.clear();
        if points.is_empty() {
            return self.lose("no features to track");
        }

        let matches: Vec<MatchedPoint> = self
            .point_tracker
            .track(previous, current, &points)
            .into_iter()
            .filter(|m| m.valid)
            .collect();
        if matches.is_empty() {
            return self.lose("no feature could be followed");
        }
        let (src, dst): (Vec<Vec2>, Vec<Vec2>) =
            matches.iter().map(|m| (m.tracked, m.matched)).unzip();
        let Some(fit) = ransac_similarity(
            &src,
            &dst,
            self.settings.ransac_iterations,
            self.settings.inlier_threshold,
        ) else {
            debug!(matches = matches.len(), "Too few matches to fit, holding previous estimate");
            self.scene_stability = 0.0;
            self.tracking_quality = 0.0;
            return Some(self.last_motion.clone());
        };

        for (m, _) in matches.iter().zip(&fit.inliers).filter(|(_, &inlier)| inlier) {
            self.features.try_place(
                m.matched,
                Feature {
                    position: m.matched,
                    response: 0.0,
                },
            );
        }

        let ratio = fit.inlier_ratio();
        let settings = &self.settings;
        let support = (fit.inlier_count as f32 / settings.min_motion_samples as f32).min(1.0);
        let consistency = if settings.min_motion_quality > 0.0 {
            (ratio / settings.min_motion_quality).min(1.0)
        } else {
            1.0
        };
        self.scene_stability = ratio;
        self.tracking_quality =
            (self.features.distribution_quality() * support * consistency).clamp(0.0, 1.0);

        if fit.inlier_count < settings.min_motion_samples || ratio < settings.min_motion_quality {
            debug!(
                inliers = fit.inlier_count,
                ratio,
                "Insufficient motion evidence, holding previous estimate"
            );
            return Some(self.last_motion.clone());
        }

        let field = self.local_motion(&fit, &matches, previous.base().size());
        self.last_motion = field.clone();
        Some(field)
    }

    /// Per-vertex mean residual of the inliers around each vertex.
    fn local_motion(&self, fit: &MotionFit, matches: &[MatchedPoint], frame_size: Vec2) -> WarpField {
        let resolution = self.settings.motion_resolution;
        let mut field = WarpField::new(resolution, frame_size, fit.transform);
        let mut sums = vec![(Vec2::ZERO, 0usize); resolution.area()];

        for (m, _) in matches.iter().zip(&fit.inliers).filter(|(_, &inlier)| inlier) {
            let residual = m.matched - fit.transform.apply(m.tracked);
            let (col, row) = field.nearest_vertex(m.matched);
            let slot = &mut sums[(row * resolution.cols + col) as usize];
            slot.0 += residual;
            slot.1 += 1;
        }

        for row in 0..resolution.rows {
            for col in 0..resolution.cols {
                let (sum, count) = sums[(row * resolution.cols + col) as usize];
                if count >= self.settings.min_local_samples && count > 0 {
                    field.set_offset(col, row, sum / count as f32);
                }
            }
        }
        field
    }

    fn lose(&mut self, reason: &str) -> Option<WarpField> {
        debug!(reason, "Tracking lost");
        self.scene_stability = 0.0;
        self.tracking_quality = 0.0;
        None
    }
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self::with_settings(FrameTrackerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitterless_core::Transform;

    fn texture(p: Vec2) -> f32 {
        0.5 + 0.2 * (0.11 * p.x + 0.05 * p.y).sin()
            + 0.2 * (0.04 * p.x - 0.13 * p.y).cos()
            + 0.08 * (0.23 * p.x + 0.19 * p.y).sin()
    }

    /// Frame whose content is the texture moved by `motion`.
    fn frame(motion: Transform) -> GrayImage {
        let inverse = motion.to_affine().inverse();
        GrayImage::from_fn(160, 120, |x, y| {
            texture(inverse.transform_point2(Vec2::new(x as f32, y as f32)))
        })
    }

    fn tracker() -> FrameTracker {
        FrameTracker::new(FrameTrackerSettings {
            min_feature_response: 1e-6,
            min_motion_samples: 8,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_first_frame_seeds() {
        let mut tracker = tracker();
        assert!(!tracker.is_initialized());
        assert!(tracker.track(&frame(Transform::IDENTITY)).is_none());
        assert!(tracker.is_initialized());
    }

    #[test]
    fn test_static_scene() {
        let mut tracker = tracker();
        tracker.track(&frame(Transform::IDENTITY));
        let motion = tracker.track(&frame(Transform::IDENTITY)).unwrap();
        assert!(motion.global().translation.length() < 0.05);
        assert!((tracker.scene_stability() - 1.0).abs() < 1e-6);
        assert!(tracker.tracking_quality() > 0.5);
        assert!(tracker.tracking_points().count() > 0);
    }

    #[test]
    fn test_translation() {
        let mut tracker = tracker();
        tracker.track(&frame(Transform::IDENTITY));
        let motion = tracker.track(&frame(Transform::translate(2.0, -1.0))).unwrap();
        let t = motion.global().translation;
        assert!((t - Vec2::new(2.0, -1.0)).length() < 0.1, "translation = {t}");
        assert!(motion.global().rotation.abs() < 0.005);
    }

    #[test]
    fn test_rotation_about_centre() {
        let centre = Vec2::new(80.0, 60.0);
        let rotation = Transform::new(Vec2::ZERO, 0.02, 1.0);
        let about_centre = Transform {
            translation: centre - rotation.apply(centre),
            ..rotation
        };

        let mut tracker = tracker();
        tracker.track(&frame(Transform::IDENTITY));
        let motion = tracker.track(&frame(about_centre)).unwrap().global();
        assert!((motion.rotation - 0.02).abs() < 0.003, "rotation = {}", motion.rotation);
        assert!(motion.apply(centre).distance(centre) < 0.3);
    }

    #[test]
    fn test_flat_frames_are_lost() {
        let flat = GrayImage::from_fn(160, 120, |_, _| 0.4);
        let mut tracker = tracker();
        tracker.track(&flat);
        assert!(tracker.track(&flat).is_none());
        assert_eq!(tracker.tracking_quality(), 0.0);
        assert_eq!(tracker.scene_stability(), 0.0);
    }

    #[test]
    fn test_weak_evidence_holds_previous_motion() {
        let mut tracker = FrameTracker::new(FrameTrackerSettings {
            min_feature_response: 1e-6,
            min_motion_samples: 100_000,
            ..Default::default()
        })
        .unwrap();
        tracker.track(&frame(Transform::IDENTITY));
        let held = tracker.track(&frame(Transform::translate(2.0, 0.0))).unwrap();
        assert_eq!(held, WarpField::default());
        assert!(tracker.tracking_quality() < 0.01);
        assert!(tracker.scene_stability() > 0.9);
    }

    #[test]
    fn test_single_match_holds_previous_motion() {
        // One detection bucket leaves a single feature to follow.
        let mut tracker = FrameTracker::new(FrameTrackerSettings {
            detection_resolution: GridSize::new(1, 1),
            min_feature_response: 1e-6,
            min_motion_samples: 8,
            ..Default::default()
        })
        .unwrap();
        tracker.track(&frame(Transform::IDENTITY));
        let held = tracker.track(&frame(Transform::translate(1.0, 0.0)));
        assert_eq!(held, Some(WarpField::default()));
        assert_eq!(tracker.tracking_quality(), 0.0);
        assert_eq!(tracker.scene_stability(), 0.0);
    }

    #[test]
    fn test_size_change_restarts() {
        let mut tracker = tracker();
        tracker.track(&frame(Transform::IDENTITY));
        let small = GrayImage::from_fn(80, 60, |x, y| texture(Vec2::new(x as f32, y as f32)));
        assert!(tracker.track(&small).is_none());
        assert!(tracker.is_initialized());
    }

    #[test]
    fn test_invalid_settings() {
        let bad = FrameTrackerSettings {
            window_size: 14,
            ..Default::default()
        };
        assert!(matches!(
            FrameTracker::new(bad),
            Err(JitterlessError::InvalidConfiguration(_))
        ));

        let mut tracker = tracker();
        let before = tracker.settings().clone();
        assert!(tracker
            .configure(FrameTrackerSettings {
                min_motion_quality: 1.5,
                ..Default::default()
            })
            .is_err());
        assert_eq!(tracker.settings(), &before);
    }

    #[test]
    fn test_settings_serde_defaults() {
        let settings: FrameTrackerSettings =
            serde_json::from_str(r#"{"min_motion_samples": 32}"#).unwrap();
        assert_eq!(settings.min_motion_samples, 32);
        assert_eq!(settings.motion_resolution, GridSize::new(2, 2));
    }
}
