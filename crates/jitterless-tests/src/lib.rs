//! Integration test crate for Jitterless.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on all jitterless crates to verify they work together.

#[cfg(test)]
mod smoothing;

#[cfg(test)]
mod pipeline;

/// Deterministic noise source for synthetic camera paths.
#[cfg(test)]
pub(crate) struct Jitter {
    state: u64,
}

#[cfg(test)]
impl Jitter {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_unit(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    /// Normally distributed sample (Box-Muller).
    pub(crate) fn gaussian(&mut self, sigma: f64) -> f64 {
        let (u1, u2) = (self.next_unit(), self.next_unit());
        sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// Least-squares line through `(x, y)` pairs: `(slope, residual std)`.
#[cfg(test)]
pub(crate) fn linear_fit(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let slope = sxy / sxx;
    let variance = points
        .iter()
        .map(|p| (p.1 - mean_y - slope * (p.0 - mean_x)).powi(2))
        .sum::<f64>()
        / n;
    (slope, variance.sqrt())
}

#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
