//! Tracker-driven runs of the full stabiliser on synthetic footage.
//!
//! Exercises jitterless-tracking and jitterless-stabilize together: frames
//! are rendered from a known camera path and the estimated motion has to be
//! good enough for the smoothing to remove the shake.

use jitterless_core::{FrameBuffer, FrameLease, PixelFormat, Vec2};
use jitterless_stabilize::{HostFrame, StabilizerSettings, VideoStabilizer};
use jitterless_tracking::{luminance, FrameTracker, FrameTrackerSettings, GridSize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{init_tracing, linear_fit, Jitter};

// ── Helpers ────────────────────────────────────────────────────

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn texture(x: f32, y: f32) -> f32 {
    0.5 + 0.2 * (0.11 * x + 0.05 * y).sin()
        + 0.2 * (0.04 * x - 0.13 * y).cos()
        + 0.08 * (0.23 * x + 0.19 * y).sin()
}

/// Gray frame of the scene seen with the content shifted by `offset`.
fn render(offset: Vec2) -> FrameBuffer {
    FrameBuffer::from_fn_gray(WIDTH, HEIGHT, |x, y| {
        let value = texture(x as f32 - offset.x, y as f32 - offset.y);
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    })
}

fn render_rgba(offset: Vec2) -> FrameBuffer {
    let gray = render(offset);
    let mut frame = FrameBuffer::new(WIDTH, HEIGHT, PixelFormat::Rgba8);
    for y in 0..HEIGHT {
        let src = gray.primary_plane().row(y).to_vec();
        let dst = frame.primary_plane_mut().row_mut(y);
        for (px, value) in dst.chunks_exact_mut(4).zip(src) {
            px.copy_from_slice(&[value, value, value, 255]);
        }
    }
    frame
}

fn host(frame: FrameBuffer, timestamp: u64) -> HostFrame {
    HostFrame {
        frame,
        timestamp,
        lease: FrameLease::detached(),
    }
}

fn settings(radius: usize) -> StabilizerSettings {
    StabilizerSettings {
        smoothing_radius: radius,
        crop_proportion: 0.2,
        tracker: FrameTrackerSettings {
            min_feature_response: 1e-6,
            min_motion_samples: 8,
            ..Default::default()
        },
        ..Default::default()
    }
}

// ── Tracking ───────────────────────────────────────────────────

#[test]
fn tracker_recovers_frame_shift() {
    let mut tracker = FrameTracker::new(settings(2).tracker).unwrap();
    let first = luminance(&render(Vec2::ZERO)).unwrap();
    let second = luminance(&render(Vec2::new(2.0, -1.0))).unwrap();

    assert!(tracker.track(&first).is_none());
    let motion = tracker.track(&second).unwrap();
    let t = motion.global().translation;
    assert!((t - Vec2::new(2.0, -1.0)).length() < 0.15, "translation {t}");
    assert!(tracker.scene_stability() > 0.8);
    assert!((0.0..=1.0).contains(&tracker.tracking_quality()));
}

#[test]
fn rgba_input_is_tracked_like_gray() {
    let mut tracker = FrameTracker::new(settings(2).tracker).unwrap();
    tracker.track(&luminance(&render_rgba(Vec2::ZERO)).unwrap());
    let motion = tracker
        .track(&luminance(&render_rgba(Vec2::new(-1.5, 0.5))).unwrap())
        .unwrap();
    let t = motion.global().translation;
    assert!((t - Vec2::new(-1.5, 0.5)).length() < 0.15, "translation {t}");
}

#[test]
fn local_motion_grid_follows_settings() {
    let mut tracker = FrameTracker::new(FrameTrackerSettings {
        motion_resolution: GridSize::new(3, 2),
        ..settings(2).tracker
    })
    .unwrap();
    tracker.track(&luminance(&render(Vec2::ZERO)).unwrap());
    let motion = tracker
        .track(&luminance(&render(Vec2::new(1.0, 0.0))).unwrap())
        .unwrap();
    assert_eq!(motion.resolution(), GridSize::new(3, 2));
    // A rigid shift leaves no local residual worth mentioning.
    assert!(motion.offsets().iter().all(|o| o.length() < 0.25));
}

// ── Full pipeline ──────────────────────────────────────────────

#[test]
fn shaky_footage_is_stabilised() {
    init_tracing();
    const FRAMES: usize = 50;
    const RADIUS: usize = 6;

    let mut jitter = Jitter::new(3);
    let positions: Vec<f64> = (0..FRAMES).map(|i| i as f64 + jitter.gaussian(1.5)).collect();

    let mut stabilizer = VideoStabilizer::new(settings(RADIUS)).unwrap();
    let mut raw = Vec::new();
    let mut smoothed = Vec::new();

    for (i, &position) in positions.iter().enumerate() {
        let frame = render(Vec2::new(position as f32, 0.0));
        if let Some(out) = stabilizer.process(host(frame, i as u64)).unwrap() {
            let k = out.timestamp as usize;
            let output = positions[k] + out.warp.global().translation.x as f64;
            raw.push((k as f64, positions[k]));
            smoothed.push((k as f64, output));
        }
        assert!((0.0..=1.0).contains(&stabilizer.tracking_quality()));
        assert!((0.0..=1.0).contains(&stabilizer.scene_stability()));
    }
    assert_eq!(smoothed.len(), FRAMES - (RADIUS + 2) + 1);

    let (_, raw_noise) = linear_fit(&raw[RADIUS..]);
    let (slope, noise) = linear_fit(&smoothed[RADIUS..]);
    assert!((slope - 1.0).abs() < 0.1, "drift slope {slope}");
    assert!(noise < 0.75 * raw_noise, "noise {noise} vs raw {raw_noise}");
}

#[test]
fn featureless_footage_passes_through() {
    let mut stabilizer = VideoStabilizer::new(settings(2)).unwrap();
    let flat = FrameBuffer::from_fn_gray(WIDTH, HEIGHT, |_, _| 90);
    let mut outputs = 0;
    for ts in 0..10 {
        if let Some(out) = stabilizer.process(host(flat.clone(), ts)).unwrap() {
            assert_eq!(out.frame, flat);
            outputs += 1;
        }
    }
    assert_eq!(outputs, 7);
    assert_eq!(stabilizer.tracking_quality(), 0.0);
}

#[test]
fn dropping_the_stabiliser_releases_pending_frames() {
    let released = Arc::new(AtomicUsize::new(0));
    let mut stabilizer = VideoStabilizer::new(settings(4)).unwrap();
    let mut emitted = 0;

    for ts in 0..9 {
        let counter = Arc::clone(&released);
        let input = HostFrame {
            frame: render(Vec2::new(ts as f32 * 0.5, 0.0)),
            timestamp: ts,
            lease: FrameLease::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        };
        if let Some(out) = stabilizer.process(input).unwrap() {
            // The host takes the frame back.
            out.lease.disarm();
            emitted += 1;
        }
    }
    assert_eq!(emitted, 4);
    assert_eq!(released.load(Ordering::SeqCst), 0);

    drop(stabilizer);
    assert_eq!(released.load(Ordering::SeqCst), 9 - emitted);
}
