#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Lifecycle bridge between a host application and a compute engine.
//!
//! [`EngineBridge`] is the single entry point: it owns the engine state
//! machine, the live configuration and metrics, the compute and monitor
//! worker threads, and the callback dispatcher that carries events back
//! into the host runtime.

/// Public types: options, errors, callbacks.
pub mod api;

mod bridge;
mod dispatch;
mod state;
mod store;
mod workers;

pub use api::{
    BridgeError, BridgeOptions, BridgeResult, CallbackSet, ErrorCallback, PerformanceCallback,
    StatusCallback,
};
pub use bridge::EngineBridge;
pub use dispatch::{HostAttachError, HostRuntime, LocalHost};
pub use ember_bridge_core::{
    EngineConfig, EngineStatus, PerformanceMetrics, SecurityConfig, ValidationReport,
    validate_config,
};
