//! Release tokens for frames owned by the host.
//!
//! The host hands the stabiliser a frame it still owns. The stabiliser keeps
//! a copy of the pixels and a [`FrameLease`] which returns the frame to the
//! host when dropped, so every path that discards a buffered frame releases
//! it exactly once.

use std::fmt;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Borrowed reference to a host frame with a release obligation.
pub struct FrameLease {
    release: Option<ReleaseFn>,
}

impl FrameLease {
    /// Lease whose `release` hook runs when the lease is dropped.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Lease with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    /// Whether the lease still holds a release obligation.
    pub fn is_armed(&self) -> bool {
        self.release.is_some()
    }

    /// Release the frame now.
    pub fn release(mut self) {
        self.run_release();
    }

    /// Hand ownership back to the host without calling the release hook.
    pub fn disarm(mut self) {
        self.release = None;
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl Default for FrameLease {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLease")
            .field("armed", &self.is_armed())
            .finish()
    }
}
