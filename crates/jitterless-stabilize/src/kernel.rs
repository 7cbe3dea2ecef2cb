//! Smoothing kernels for the trajectory filter.

/// Symmetric Gaussian kernel of `length` taps, normalised to unit mass.
///
/// A non-positive `sigma` yields a unit impulse at the centre tap.
pub fn gaussian_kernel(length: usize, sigma: f32) -> Vec<f32> {
    if length == 0 {
        return Vec::new();
    }
    let centre = (length - 1) as f32 / 2.0;
    let mut kernel = vec![0.0f32; length];
    if sigma <= 0.0 {
        kernel[length / 2] = 1.0;
        return kernel;
    }

    let sigma2 = 2.0 * sigma * sigma;
    for (i, w) in kernel.iter_mut().enumerate() {
        let k = i as f32 - centre;
        *w = (-(k * k) / sigma2).exp();
    }
    let total: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }
    kernel
}

/// Kernel for a trajectory window: sigma is a sixth of the window, which
/// keeps about 99.7% of the mass inside it.
pub fn trajectory_kernel(window: usize) -> Vec<f32> {
    gaussian_kernel(window, window as f32 / 6.0)
}
