#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Compute workload seam for the `emberhost` bridge.
//!
//! The bridge drives an external compute library through the
//! start/step/stop contract defined here and never interprets the
//! workload beyond success/failure and a periodic hash-count delta.

/// Public API for this crate.
pub mod api;

mod cpu;

pub use api::{ComputeBackend, ComputeError, ComputeSession, auto_thread_count};
pub use cpu::CpuBackend;
