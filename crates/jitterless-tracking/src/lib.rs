//! Jitterless Tracking - feature tracking and camera motion estimation.

pub mod detector;
pub mod estimation;
pub mod frame_tracker;
pub mod point_tracker;
pub mod pyramid;
pub mod spatial_index;
pub mod warp_field;

pub use detector::{compute_gradients, Feature, FeatureDetector};
pub use estimation::{fit_similarity, ransac_similarity, MotionFit};
pub use frame_tracker::{FrameTracker, FrameTrackerSettings};
pub use point_tracker::{MatchedPoint, PointTracker};
pub use pyramid::{luminance, rgb_to_gray, GrayImage, ImagePyramid};
pub use spatial_index::{GridSize, SpatialIndex, SpatialKey};
pub use warp_field::WarpField;
