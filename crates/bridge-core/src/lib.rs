#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Value objects shared across the `emberhost` bridge boundary.
//!
//! Everything in this crate is a plain copyable value: configuration,
//! metrics snapshots, the engine lifecycle status, and the pure
//! pre-flight validator. Nothing here owns a lock or a thread.

pub mod config;
pub mod metrics;
pub mod status;
pub mod validate;

pub use config::{EngineConfig, SecurityConfig, load_engine_config, save_engine_config};
pub use metrics::PerformanceMetrics;
pub use status::EngineStatus;
pub use validate::{ValidationReport, validate_config};
