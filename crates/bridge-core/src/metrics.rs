//! Performance snapshot published by the monitor thread.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Point-in-time performance snapshot for the engine.
///
/// Exactly one writer (the monitor thread) produces these; everyone else
/// reads detached copies, so a snapshot's fields are always internally
/// consistent as of a single write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Smoothed hash rate in hashes per second.
    pub hashrate: f64,
    /// Coarse power draw estimate in watts.
    pub power_usage: f64,
    /// Coarse package temperature estimate in degrees Celsius.
    pub temperature: f64,
    /// Shares accepted by the pool (monotonic).
    pub accepted_shares: u64,
    /// Shares rejected by the pool (monotonic).
    pub rejected_shares: u64,
    /// Cumulative hash count since the last start.
    pub total_hashes: u64,
    /// Number of compute threads the workload was started with.
    pub threads_active: u32,
    /// Wall-clock time of the write, unix milliseconds.
    pub last_update_unix_ms: i64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            hashrate: 0.0,
            power_usage: 0.0,
            temperature: 0.0,
            accepted_shares: 0,
            rejected_shares: 0,
            total_hashes: 0,
            threads_active: 0,
            last_update_unix_ms: Utc::now().timestamp_millis(),
        }
    }
}
