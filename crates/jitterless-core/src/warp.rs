//! Resampling of frames through a motion estimate.

use rayon::prelude::*;

use crate::error::{JitterlessError, Result};
use crate::frame::FrameBuffer;
use crate::geometry::Vec2;
use crate::motion::MotionModel;

/// Warp `src` into a new frame of the same layout.
///
/// Each output pixel is pulled from the source position given by the inverse
/// of `motion`, with bilinear filtering and replicated edges.
pub fn warp_frame<M>(src: &FrameBuffer, motion: &M) -> FrameBuffer
where
    M: MotionModel + Sync,
{
    let mut dst = FrameBuffer::new(src.width, src.height, src.format);
    warp_into(src, motion, &mut dst);
    dst
}

/// Warp `src` into an existing frame, reusing its allocation.
pub fn warp_frame_into<M>(src: &FrameBuffer, motion: &M, dst: &mut FrameBuffer) -> Result<()>
where
    M: MotionModel + Sync,
{
    if !src.same_layout(dst) {
        return Err(JitterlessError::FrameMismatch(format!(
            "cannot warp {}x{} {:?} into {}x{} {:?}",
            src.width, src.height, src.format, dst.width, dst.height, dst.format
        )));
    }
    warp_into(src, motion, dst);
    Ok(())
}

fn warp_into<M>(src: &FrameBuffer, motion: &M, dst: &mut FrameBuffer)
where
    M: MotionModel + Sync,
{
    for (index, (source, target)) in src.planes.iter().zip(dst.planes.iter_mut()).enumerate() {
        let scale = src.plane_scale(index);
        let channels = source.channels;
        let width = source.width as usize;
        if width == 0 || target.stride == 0 {
            continue;
        }

        target
            .data
            .par_chunks_mut(target.stride)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..width {
                    let output = Vec2::new(x as f32, y as f32) / scale;
                    let sample_at = motion.source_of(output) * scale;
                    for c in 0..channels {
                        let value = source.sample_bilinear(sample_at, c);
                        row[x * channels + c] = value.round().clamp(0.0, 255.0) as u8;
                    }
                }
            });
    }
}
