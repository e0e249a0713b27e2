//! Public bridge types: tunables, errors, and the callback surface.

use std::time::Duration;

use ember_bridge_core::{EngineStatus, PerformanceMetrics};

/// Tunable timing knobs for a bridge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// How often the monitor thread samples counters and publishes a
    /// metrics snapshot.
    pub monitor_interval: Duration,
    /// How long [`stop`](crate::EngineBridge::stop) waits for the worker
    /// threads to exit before declaring the engine faulted.
    pub shutdown_timeout: Duration,
}

impl BridgeOptions {
    /// Default monitor sampling period.
    pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);
    /// Default bound on worker shutdown.
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            monitor_interval: Self::DEFAULT_MONITOR_INTERVAL,
            shutdown_timeout: Self::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Errors returned by bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The operation is not legal from the engine's current state.
    #[error("cannot {operation} while engine is {from}")]
    InvalidStateTransition {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the engine was observed in.
        from: EngineStatus,
    },

    /// The submitted configuration failed pre-flight validation.
    #[error("configuration rejected: {}", reasons.join("; "))]
    ValidationFailure {
        /// Every problem the validator found.
        reasons: Vec<String>,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn {role} worker: {message}")]
    WorkerSpawnFailure {
        /// Which worker failed, `compute` or `monitor`.
        role: &'static str,
        /// The OS-level spawn error.
        message: String,
    },

    /// The compute workload failed mid-run.
    #[error("compute worker fault: {0}")]
    WorkerFault(String),

    /// Workers did not exit within the shutdown bound.
    #[error("workers did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The bridge has not been initialized with a host runtime yet.
    #[error("bridge is not initialized")]
    NotInitialized,

    /// The bridge was already initialized.
    #[error("bridge is already initialized")]
    AlreadyInitialized,
}

/// Shorthand result for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Host callback invoked on every state transition.
pub type StatusCallback = Box<dyn Fn(EngineStatus) + Send + Sync>;
/// Host callback invoked with each fresh metrics snapshot while running.
pub type PerformanceCallback = Box<dyn Fn(&PerformanceMetrics) + Send + Sync>;
/// Host callback invoked when the engine records an error.
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// The host-side callbacks a bridge dispatches into.
///
/// All channels are optional; an unset channel is simply skipped.
/// Callbacks run on bridge worker threads and must not call back into
/// lifecycle operations on the same bridge.
#[derive(Default)]
pub struct CallbackSet {
    /// State-transition channel.
    pub on_status: Option<StatusCallback>,
    /// Metrics channel.
    pub on_performance: Option<PerformanceCallback>,
    /// Error channel.
    pub on_error: Option<ErrorCallback>,
}

impl CallbackSet {
    /// A set with no channels registered.
    pub fn none() -> Self {
        Self::default()
    }

    /// Register the status channel.
    pub fn with_status(mut self, f: impl Fn(EngineStatus) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    /// Register the metrics channel.
    pub fn with_performance(
        mut self,
        f: impl Fn(&PerformanceMetrics) + Send + Sync + 'static,
    ) -> Self {
        self.on_performance = Some(Box::new(f));
        self
    }

    /// Register the error channel.
    pub fn with_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSet")
            .field("on_status", &self.on_status.is_some())
            .field("on_performance", &self.on_performance.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_published_constants() {
        let opts = BridgeOptions::default();
        assert_eq!(opts.monitor_interval, BridgeOptions::DEFAULT_MONITOR_INTERVAL);
        assert_eq!(opts.shutdown_timeout, BridgeOptions::DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn callback_set_builder_registers_channels() {
        let set = CallbackSet::none()
            .with_status(|_| {})
            .with_error(|_| {});
        assert!(set.on_status.is_some());
        assert!(set.on_performance.is_none());
        assert!(set.on_error.is_some());
    }
}
