//! Trajectory smoothing scenarios driven with known camera paths.
//!
//! Exercises jitterless-stabilize together with the jitterless-core frame
//! and motion types, bypassing the tracker. Dense paths use the tracker's
//! [`WarpField`] without running the tracker itself.

use jitterless_core::{FrameBuffer, FrameLease, MotionModel, PixelFormat, Rect, Transform, Vec2};
use jitterless_stabilize::{covers_crop, crop_region, BufferedFrame, TrajectorySmoother};
use jitterless_tracking::{GridSize, WarpField};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{init_tracing, linear_fit, Jitter};

// ── Helpers ────────────────────────────────────────────────────

fn blank(timestamp: u64) -> BufferedFrame {
    BufferedFrame::new(
        FrameBuffer::new(320, 240, PixelFormat::Gray8),
        timestamp,
        FrameLease::detached(),
    )
}

fn counted(timestamp: u64, counter: &Arc<AtomicUsize>) -> BufferedFrame {
    let counter = Arc::clone(counter);
    BufferedFrame::new(
        FrameBuffer::new(32, 24, PixelFormat::Gray8),
        timestamp,
        FrameLease::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

const FRAME: Vec2 = Vec2::new(320.0, 240.0);

/// Dense velocity with the given global shift and random vertex offsets.
fn dense_velocity(shift: Vec2, jitter: &mut Jitter, sigma: f64) -> WarpField {
    let grid = GridSize::new(2, 2);
    let mut velocity = WarpField::new(grid, FRAME, Transform::translate(shift.x, shift.y));
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let offset = Vec2::new(jitter.gaussian(sigma) as f32, jitter.gaussian(sigma) as f32);
            velocity.set_offset(col, row, offset);
        }
    }
    velocity
}

// ── Delay line centring ────────────────────────────────────────

#[test]
fn centre_sample_matches_oldest_frame() {
    for radius in [2, 4, 8, 14] {
        let mut smoother = TrajectorySmoother::<Transform>::new(radius).unwrap();
        let capacity = smoother.frame_queue_capacity() as u64;

        for k in 0..capacity {
            assert!(!smoother.is_ready(), "radius {radius} ready after {k} frames");
            smoother.push(blank(1000 + k), Transform::translate(1.0, 0.0));
        }
        assert!(smoother.is_ready());

        for k in capacity..capacity + 5 {
            let centre = smoother.trajectory().centre().unwrap().timestamp;
            let oldest = smoother.oldest_frame().unwrap().timestamp;
            assert_eq!(centre, Some(oldest), "radius {radius}");
            smoother.push(blank(1000 + k), Transform::translate(1.0, 0.0));
        }
    }
}

// ── Smoothing idempotence ──────────────────────────────────────

#[test]
fn steady_motion_is_not_damped() {
    let velocity = Transform::new(Vec2::new(1.5, -0.5), 0.001, 1.0);
    let mut smoother = TrajectorySmoother::<Transform>::new(6).unwrap();
    let crop = Rect::new(100.0, 80.0, 120.0, 80.0);
    let window = smoother.trajectory_capacity() as u64;

    let mut last = None;
    for ts in 0..3 * window {
        smoother.push(blank(ts), velocity);
        if let Some(out) = smoother.stabilize(crop) {
            last = Some(out.warp);
        }
    }

    // The warp of a frame is its own velocity plus the correction.
    let warp = last.unwrap();
    assert!((warp.translation - velocity.translation).length() < 5e-3, "{warp:?}");
    assert!((warp.rotation - velocity.rotation).abs() < 1e-5);
    assert!(warp.dilation.abs() < 1e-5);
}

// ── Resize safety ──────────────────────────────────────────────

#[test]
fn shrinking_releases_each_frame_exactly_once() {
    let counters: Vec<Arc<AtomicUsize>> = (0..40).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let crop = Rect::new(4.0, 3.0, 24.0, 18.0);
    let mut smoother = TrajectorySmoother::<Transform>::new(8).unwrap();
    let mut emitted = Vec::new();

    for (ts, counter) in counters.iter().enumerate().take(14) {
        smoother.push(counted(ts as u64, counter), Transform::IDENTITY);
        if let Some(out) = smoother.stabilize(crop) {
            emitted.push(out);
        }
    }
    let buffered = smoother.buffered_frames();
    assert_eq!(buffered, 10);

    // The oldest buffered frame was already emitted and holds no lease.
    let report = smoother.configure(2).unwrap();
    assert!(report.changed);
    assert_eq!(report.released, buffered - 1);

    // Frames still held by the caller are not touched by the resize.
    let emitted_ts: Vec<u64> = emitted.iter().map(|o| o.timestamp).collect();
    for (ts, counter) in counters.iter().enumerate().take(14) {
        let expected = usize::from(!emitted_ts.contains(&(ts as u64)));
        assert_eq!(counter.load(Ordering::SeqCst), expected, "frame {ts}");
    }
    drop(emitted);

    for (ts, counter) in counters.iter().enumerate().skip(14) {
        smoother.push(counted(ts as u64, counter), Transform::IDENTITY);
        drop(smoother.stabilize(crop));
    }
    drop(smoother);

    for (ts, counter) in counters.iter().enumerate() {
        assert_eq!(counter.load(Ordering::SeqCst), 1, "frame {ts}");
    }
}

// ── End-to-end jitter scenario ─────────────────────────────────

#[test]
fn drift_is_kept_and_jitter_removed() {
    init_tracing();
    const FRAMES: usize = 100;
    const RADIUS: usize = 14;

    let mut jitter = Jitter::new(7);
    let positions: Vec<f64> = (0..FRAMES).map(|i| i as f64 + jitter.gaussian(3.0)).collect();

    let mut smoother = TrajectorySmoother::<Transform>::new(RADIUS).unwrap();
    let crop = crop_region(320, 240, 0.25);
    let mut raw = Vec::new();
    let mut smoothed = Vec::new();

    for (i, &position) in positions.iter().enumerate() {
        let velocity = if i == 0 {
            Transform::IDENTITY
        } else {
            Transform::translate((position - positions[i - 1]) as f32, 0.0)
        };
        smoother.push(blank(i as u64), velocity);

        if let Some(out) = smoother.stabilize(crop) {
            let frame = out.timestamp as usize;
            // Content of the frame lands at its position plus the warp.
            let output = positions[frame] + out.warp.translation.x as f64;
            raw.push((frame as f64, positions[frame]));
            smoothed.push((frame as f64, output));
        }
    }
    assert_eq!(smoothed.len(), FRAMES - (RADIUS + 2) + 1);

    let (raw_slope, raw_noise) = linear_fit(&raw[RADIUS..]);
    let (slope, noise) = linear_fit(&smoothed[RADIUS..]);
    assert!((raw_slope - 1.0).abs() < 0.1, "raw slope {raw_slope}");
    assert!((slope - 1.0).abs() < 0.05, "drift slope {slope}");
    assert!(noise < 0.5 * raw_noise, "noise {noise} vs raw {raw_noise}");
    // 3 px of jitter leaves well under 1.5 px of residual shake.
    assert!(noise < 1.2, "residual noise {noise}");
}

#[test]
fn dense_trajectory_is_smoothed_inside_crop() {
    const FRAMES: usize = 100;
    const RADIUS: usize = 14;

    let mut jitter = Jitter::new(5);
    let positions: Vec<f64> = (0..FRAMES).map(|i| i as f64 + jitter.gaussian(3.0)).collect();

    let mut smoother = TrajectorySmoother::<WarpField>::new(RADIUS).unwrap();
    let crop = crop_region(320, 240, 0.25);
    let mut raw = Vec::new();
    let mut smoothed = Vec::new();

    for (i, &position) in positions.iter().enumerate() {
        let shift = if i == 0 { 0.0 } else { (position - positions[i - 1]) as f32 };
        let velocity = dense_velocity(Vec2::new(shift, 0.0), &mut jitter, 1.0);
        smoother.push(blank(i as u64), velocity);

        if let Some(out) = smoother.stabilize(crop) {
            assert!(covers_crop(FRAME, &out.warp, crop), "frame {}", out.timestamp);
            let frame = out.timestamp as usize;
            let output = positions[frame] + out.warp.global().translation.x as f64;
            raw.push((frame as f64, positions[frame]));
            smoothed.push((frame as f64, output));
        }
    }
    assert_eq!(smoothed.len(), FRAMES - (RADIUS + 2) + 1);

    let (_, raw_noise) = linear_fit(&raw[RADIUS..]);
    let (slope, noise) = linear_fit(&smoothed[RADIUS..]);
    assert!((slope - 1.0).abs() < 0.05, "drift slope {slope}");
    assert!(noise < 0.5 * raw_noise, "noise {noise} vs raw {raw_noise}");
    assert!(noise < 1.2, "residual noise {noise}");
}

#[test]
fn crop_stays_covered_under_large_shake() {
    let mut jitter = Jitter::new(11);
    let mut smoother = TrajectorySmoother::<Transform>::new(4).unwrap();
    let crop = crop_region(320, 240, 0.05);

    for ts in 0..60 {
        let velocity = Transform::new(
            Vec2::new(jitter.gaussian(25.0) as f32, jitter.gaussian(25.0) as f32),
            jitter.gaussian(0.05) as f32,
            1.0,
        );
        smoother.push(blank(ts), velocity);
        if let Some(out) = smoother.stabilize(crop) {
            assert!(covers_crop(FRAME, &out.warp, crop) || out.warp == Transform::IDENTITY);
        }
    }

    // Local motion alone can push the crop off the frame.
    let mut smoother = TrajectorySmoother::<WarpField>::new(4).unwrap();
    for ts in 0..60 {
        let shift = Vec2::new(jitter.gaussian(15.0) as f32, jitter.gaussian(15.0) as f32);
        smoother.push(blank(ts), dense_velocity(shift, &mut jitter, 8.0));
        if let Some(out) = smoother.stabilize(crop) {
            assert!(covers_crop(FRAME, &out.warp, crop) || out.warp == WarpField::identity());
            // Sources of crop pixels between the control points stay inside too.
            for y in [crop.y, crop.y + crop.height * 0.3, crop.y + crop.height] {
                for x in [crop.x, crop.x + crop.width * 0.7, crop.x + crop.width] {
                    let source = out.warp.source_of(Vec2::new(x, y));
                    assert!(source.cmpge(Vec2::splat(-1e-2)).all(), "{source}");
                    assert!(source.cmple(FRAME + 1e-2).all(), "{source}");
                }
            }
        }
    }
}
