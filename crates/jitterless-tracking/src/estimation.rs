//! Robust global motion fitting from point correspondences.

use jitterless_core::{Transform, Vec2};

/// Result of a robust fit.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionFit {
    pub transform: Transform,
    /// Inlier flag for every input correspondence.
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
}

impl MotionFit {
    /// Fraction of correspondences consistent with the fitted model.
    pub fn inlier_ratio(&self) -> f32 {
        if self.inliers.is_empty() {
            0.0
        } else {
            self.inlier_count as f32 / self.inliers.len() as f32
        }
    }
}

/// Least-squares similarity transform mapping `src` onto `dst`.
///
/// Falls back to a pure translation when the source points coincide.
pub fn fit_similarity(src: &[Vec2], dst: &[Vec2]) -> Option<Transform> {
    if src.is_empty() || src.len() != dst.len() {
        return None;
    }
    let n = src.len() as f32;
    let src_centre = src.iter().copied().sum::<Vec2>() / n;
    let dst_centre = dst.iter().copied().sum::<Vec2>() / n;

    let (mut spread, mut a_num, mut b_num) = (0.0f32, 0.0f32, 0.0f32);
    for (s, d) in src.iter().zip(dst) {
        let p = *s - src_centre;
        let q = *d - dst_centre;
        spread += p.length_squared();
        a_num += p.x * q.x + p.y * q.y;
        b_num += p.x * q.y - p.y * q.x;
    }

    let (a, b) = if spread > 1e-6 {
        (a_num / spread, b_num / spread)
    } else {
        (1.0, 0.0)
    };
    if !(a.is_finite() && b.is_finite()) || a.hypot(b) < 1e-3 {
        return None;
    }

    let rotated = Vec2::new(a * src_centre.x - b * src_centre.y, b * src_centre.x + a * src_centre.y);
    Some(Transform::from_similarity(a, b, dst_centre - rotated))
}

/// RANSAC similarity estimation with a least-squares refit on the inliers.
pub fn ransac_similarity(
    src: &[Vec2],
    dst: &[Vec2],
    iterations: u32,
    threshold: f32,
) -> Option<MotionFit> {
    if src.len() < 2 || src.len() != dst.len() {
        return None;
    }
    let n = src.len();
    let mut rng = Lcg::new(12345);
    let mut best: Option<(Transform, usize)> = None;

    for _ in 0..iterations {
        let i = rng.next_index(n);
        let mut j = rng.next_index(n);
        if i == j {
            j = (j + 1) % n;
        }
        let Some(candidate) = fit_similarity(&[src[i], src[j]], &[dst[i], dst[j]]) else {
            continue;
        };
        let count = count_inliers(&candidate, src, dst, threshold);
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((candidate, count));
            if count == n {
                break;
            }
        }
    }

    let (model, _) = best?;
    let inliers = inlier_mask(&model, src, dst, threshold);
    let (in_src, in_dst): (Vec<Vec2>, Vec<Vec2>) = src
        .iter()
        .zip(dst)
        .zip(&inliers)
        .filter(|(_, &inlier)| inlier)
        .map(|((s, d), _)| (*s, *d))
        .unzip();

    let transform = fit_similarity(&in_src, &in_dst).unwrap_or(model);
    let inliers = inlier_mask(&transform, src, dst, threshold);
    let inlier_count = inliers.iter().filter(|&&inlier| inlier).count();
    Some(MotionFit {
        transform,
        inliers,
        inlier_count,
    })
}

fn inlier_mask(model: &Transform, src: &[Vec2], dst: &[Vec2], threshold: f32) -> Vec<bool> {
    let affine = model.to_affine();
    src.iter()
        .zip(dst)
        .map(|(s, d)| affine.transform_point2(*s).distance(*d) < threshold)
        .collect()
}

fn count_inliers(model: &Transform, src: &[Vec2], dst: &[Vec2], threshold: f32) -> usize {
    inlier_mask(model, src, dst, threshold)
        .into_iter()
        .filter(|&inlier| inlier)
        .count()
}

/// Deterministic linear congruential sampler.
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_index(&mut self, n: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) as usize % n
    }
}
