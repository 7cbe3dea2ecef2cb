//! Output crop and the warp attenuation that keeps it covered.

use jitterless_core::{MotionModel, Rect, Vec2};

/// Number of steps of the linear search from the warp toward identity.
pub const CROP_SEARCH_STEPS: u32 = 100;

/// Centred crop removing `proportion` of each frame dimension.
///
/// The removed pixel count is floored and split evenly, with the extra pixel
/// of an odd count going to the bottom right.
pub fn crop_region(width: u32, height: u32, proportion: f32) -> Rect {
    let total_x = (width as f32 * proportion).floor() as u32;
    let total_y = (height as f32 * proportion).floor() as u32;
    Rect::new(
        (total_x / 2) as f32,
        (total_y / 2) as f32,
        width.saturating_sub(total_x) as f32,
        height.saturating_sub(total_y) as f32,
    )
}

// Tolerance in pixels for crop points mapping onto the frame edge.
const EDGE_TOLERANCE: f32 = 1e-3;

/// Check that every pixel of `crop` is sourced from inside the frame.
///
/// The source mapping is bilinear between the vertex lines of the motion
/// model, so it is enough to test the crop at its corners and wherever those
/// lines cross it. The frame is convex, so covering those control points
/// covers the whole crop.
pub fn covers_crop<M: MotionModel>(frame_size: Vec2, warp: &M, crop: Rect) -> bool {
    let (cols, rows) = warp.grid_lines();
    let (min, max) = (crop.min(), crop.max());
    let xs = control_coordinates(min.x, max.x, &cols);
    let ys = control_coordinates(min.y, max.y, &rows);

    let lower = Vec2::splat(-EDGE_TOLERANCE);
    let upper = frame_size + EDGE_TOLERANCE;
    ys.iter().all(|&y| {
        xs.iter().all(|&x| {
            let source = warp.source_of(Vec2::new(x, y));
            source.cmpge(lower).all() && source.cmple(upper).all()
        })
    })
}

fn control_coordinates(from: f32, to: f32, lines: &[f32]) -> Vec<f32> {
    let mut coords = Vec::with_capacity(lines.len() + 2);
    coords.push(from);
    coords.extend(lines.iter().copied().filter(|&l| l > from && l < to));
    coords.push(to);
    coords
}

/// Attenuate `warp` until the warped frame covers `crop`.
///
/// The warp is interpolated toward identity in [`CROP_SEARCH_STEPS`] equal
/// steps and the first candidate passing [`covers_crop`] is returned. The
/// last step is identity itself.
pub fn enclose_crop<M: MotionModel>(frame_size: Vec2, warp: &M, crop: Rect) -> M {
    if covers_crop(frame_size, warp, crop) {
        return warp.clone();
    }

    let identity = M::identity();
    for step in 1..CROP_SEARCH_STEPS {
        let t = step as f32 / CROP_SEARCH_STEPS as f32;
        let reduced = warp.lerp(&identity, t);
        if covers_crop(frame_size, &reduced, crop) {
            return reduced;
        }
    }
    identity
}
