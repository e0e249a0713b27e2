//! Mutex-guarded shared records.
//!
//! Every accessor copies the whole record in or out; no caller ever holds
//! a lock across other bridge work, so the lock ordering story stays
//! trivial (there is none).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use ember_bridge_core::{EngineConfig, PerformanceMetrics};

/// Live engine configuration plus the runtime security toggle.
#[derive(Debug)]
pub(crate) struct ConfigStore {
    config: Mutex<EngineConfig>,
    security_enabled: AtomicBool,
}

impl ConfigStore {
    pub(crate) fn new() -> Self {
        Self {
            config: Mutex::new(EngineConfig::default()),
            security_enabled: AtomicBool::new(true),
        }
    }

    pub(crate) fn get(&self) -> EngineConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, cfg: EngineConfig) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = cfg;
    }

    pub(crate) fn set_security_enabled(&self, enabled: bool) {
        self.security_enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn security_enabled(&self) -> bool {
        self.security_enabled.load(Ordering::Acquire)
    }
}

/// Latest metrics snapshot. Written only by the monitor thread while the
/// engine is active; read by anyone.
#[derive(Debug)]
pub(crate) struct MetricsStore {
    metrics: Mutex<PerformanceMetrics>,
}

impl MetricsStore {
    pub(crate) fn new() -> Self {
        Self {
            metrics: Mutex::new(PerformanceMetrics::default()),
        }
    }

    pub(crate) fn get(&self) -> PerformanceMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, snapshot: PerformanceMetrics) {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub(crate) fn reset(&self) {
        self.set(PerformanceMetrics::default());
    }
}

/// Most recent error message, kept for polling hosts.
#[derive(Debug, Default)]
pub(crate) struct LastError {
    message: Mutex<Option<String>>,
}

impl LastError {
    pub(crate) fn record(&self, message: impl Into<String>) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub(crate) fn take_snapshot(&self) -> Option<String> {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn clear(&self) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
