//! Backend and session traits the bridge drives the workload through.

use std::thread;

/// Errors the compute layer reports back to the bridge.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// A start parameter was rejected before any work began.
    #[error("invalid compute input: {0}")]
    InvalidInput(&'static str),
    /// The backend does not implement the requested algorithm.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The workload failed mid-run.
    #[error("compute fault: {0}")]
    Fault(String),
}

/// Factory for compute sessions.
///
/// A backend is long-lived and shared; each call to [`start`] produces an
/// independent session owned by a single worker thread.
///
/// [`start`]: ComputeBackend::start
pub trait ComputeBackend: Send + Sync + 'static {
    /// Begin a workload for `algorithm` across `threads` threads.
    ///
    /// `threads` is always concrete here; auto-detection happens before
    /// the backend is involved.
    fn start(
        &self,
        algorithm: &str,
        threads: u32,
    ) -> Result<Box<dyn ComputeSession>, ComputeError>;
}

/// One running workload.
///
/// The owning thread calls [`step`] in a loop; each call performs a
/// bounded batch of work and returns the number of hashes it completed,
/// so the loop stays responsive to pause and shutdown between batches.
///
/// [`step`]: ComputeSession::step
pub trait ComputeSession: Send + std::fmt::Debug {
    /// Perform one batch of work and report the hashes completed.
    fn step(&mut self) -> Result<u64, ComputeError>;

    /// Release workload resources. Called exactly once, after the last
    /// [`step`](ComputeSession::step).
    fn stop(&mut self);
}

/// Thread count to use when the configuration asks for auto-detection.
pub fn auto_thread_count() -> u32 {
    thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
