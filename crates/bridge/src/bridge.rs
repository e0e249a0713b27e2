//! The engine bridge facade.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError};

use ember_bridge_core::{EngineConfig, EngineStatus, PerformanceMetrics, validate_config};
use ember_compute::{ComputeBackend, auto_thread_count};
use tracing::{info, warn};

use crate::api::{BridgeError, BridgeOptions, BridgeResult, CallbackSet};
use crate::dispatch::{CallbackDispatcher, HostRuntime};
use crate::state::EngineStateMachine;
use crate::store::{ConfigStore, LastError, MetricsStore};
use crate::workers::{WakeSignal, WorkerShared, WorkerThreadManager};

struct RuntimeInner {
    dispatcher: Arc<CallbackDispatcher>,
    workers: WorkerThreadManager,
    signal: Arc<WakeSignal>,
    hashes: Arc<AtomicU64>,
}

/// Bridge between a host application and the compute engine.
///
/// One instance owns one engine. Lifecycle operations (`start`, `stop`,
/// `pause`, `resume`) serialize on an internal lock; the read-side
/// accessors (`get_status`, `get_metrics`, `get_configuration`) never
/// block on lifecycle work.
///
/// Callbacks registered through [`initialize`](Self::initialize) run on
/// bridge worker threads and must not call lifecycle operations on the
/// same bridge.
pub struct EngineBridge {
    backend: Arc<dyn ComputeBackend>,
    options: BridgeOptions,
    state: Arc<EngineStateMachine>,
    config: Arc<ConfigStore>,
    metrics: Arc<MetricsStore>,
    last_error: Arc<LastError>,
    runtime: Mutex<Option<RuntimeInner>>,
}

impl EngineBridge {
    /// Create a bridge over `backend` with the given tunables.
    ///
    /// The bridge is inert until [`initialize`](Self::initialize) hands it
    /// a host runtime.
    pub fn new(backend: Arc<dyn ComputeBackend>, options: BridgeOptions) -> Self {
        Self {
            backend,
            options,
            state: Arc::new(EngineStateMachine::new()),
            config: Arc::new(ConfigStore::new()),
            metrics: Arc::new(MetricsStore::new()),
            last_error: Arc::new(LastError::default()),
            runtime: Mutex::new(None),
        }
    }

    fn runtime_lock(&self) -> std::sync::MutexGuard<'_, Option<RuntimeInner>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the host runtime and callback set. Must be called exactly
    /// once before any lifecycle operation.
    pub fn initialize(
        &self,
        host: Arc<dyn HostRuntime>,
        callbacks: CallbackSet,
    ) -> BridgeResult<()> {
        let mut guard = self.runtime_lock();
        if guard.is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }
        *guard = Some(RuntimeInner {
            dispatcher: Arc::new(CallbackDispatcher::new(host, callbacks)),
            workers: WorkerThreadManager::default(),
            signal: Arc::new(WakeSignal::default()),
            hashes: Arc::new(AtomicU64::new(0)),
        });
        info!("bridge initialized");
        Ok(())
    }

    /// Start the engine with `config`.
    ///
    /// Legal from `STOPPED` and `ERROR`. The configuration is validated
    /// first; a rejected configuration leaves the state untouched.
    pub fn start(&self, config: EngineConfig) -> BridgeResult<()> {
        let mut guard = self.runtime_lock();
        let rt = guard.as_mut().ok_or(BridgeError::NotInitialized)?;

        let mut config = config;
        config.normalize();
        let report = validate_config(&config);
        if !report.is_ok() {
            let message = format!("configuration rejected: {}", report.reasons.join("; "));
            warn!(%message, "start refused");
            self.last_error.record(&message);
            rt.dispatcher.dispatch_error(&message);
            return Err(BridgeError::ValidationFailure {
                reasons: report.reasons,
            });
        }

        self.state
            .try_transition(&[EngineStatus::Stopped, EngineStatus::Error], EngineStatus::Starting)
            .map_err(|from| BridgeError::InvalidStateTransition {
                operation: "start",
                from,
            })?;
        rt.dispatcher.dispatch_status(EngineStatus::Starting);

        // A faulted run leaves behind workers that have already been told
        // to shut down; collect their handles before reusing the slots.
        if !rt.workers.is_empty() {
            rt.signal.shutdown();
            rt.workers.stop_all(self.options.shutdown_timeout);
        }

        let threads = if config.threads == 0 {
            auto_thread_count()
        } else {
            config.threads
        };
        config.threads = threads;

        let session = match self.backend.start(&config.algorithm, threads) {
            Ok(session) => session,
            Err(err) => {
                let message = format!("engine start failed: {err}");
                self.state.fault();
                self.last_error.record(&message);
                rt.dispatcher.dispatch_error(&message);
                rt.dispatcher.dispatch_status(EngineStatus::Error);
                return Err(BridgeError::WorkerFault(err.to_string()));
            }
        };

        info!(pool = %config.pool_url, algorithm = %config.algorithm, threads, "starting engine");
        self.config.set(config);
        self.last_error.clear();
        self.metrics.set(PerformanceMetrics {
            threads_active: threads,
            ..PerformanceMetrics::default()
        });

        rt.signal = Arc::new(WakeSignal::default());
        rt.hashes = Arc::new(AtomicU64::new(0));
        let shared = Arc::new(WorkerShared {
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            last_error: Arc::clone(&self.last_error),
            dispatcher: Arc::clone(&rt.dispatcher),
            signal: Arc::clone(&rt.signal),
            hashes: Arc::clone(&rt.hashes),
        });

        if let Err(err) = rt.workers.spawn_compute(&shared, session) {
            return Err(self.fail_spawn(rt, "compute", err));
        }
        if let Err(err) = rt
            .workers
            .spawn_monitor(&shared, self.options.monitor_interval, threads)
        {
            return Err(self.fail_spawn(rt, "monitor", err));
        }

        if let Err(from) = self
            .state
            .try_transition(&[EngineStatus::Starting], EngineStatus::Running)
        {
            // The compute worker can fault before startup finishes.
            if from == EngineStatus::Error {
                let message = self
                    .last_error
                    .take_snapshot()
                    .unwrap_or_else(|| "compute worker faulted during startup".to_string());
                return Err(BridgeError::WorkerFault(message));
            }
            return Err(BridgeError::InvalidStateTransition {
                operation: "start",
                from,
            });
        }
        rt.dispatcher.dispatch_status(EngineStatus::Running);
        Ok(())
    }

    fn fail_spawn(
        &self,
        rt: &mut RuntimeInner,
        role: &'static str,
        err: std::io::Error,
    ) -> BridgeError {
        let message = format!("failed to spawn {role} worker: {err}");
        rt.signal.shutdown();
        rt.workers.stop_all(self.options.shutdown_timeout);
        self.state.fault();
        self.last_error.record(&message);
        rt.dispatcher.dispatch_error(&message);
        rt.dispatcher.dispatch_status(EngineStatus::Error);
        BridgeError::WorkerSpawnFailure {
            role,
            message: err.to_string(),
        }
    }

    /// Stop the engine and join both workers.
    ///
    /// A no-op when already `STOPPED`. If the workers miss the shutdown
    /// deadline the engine is declared faulted instead of hanging the
    /// caller forever.
    pub fn stop(&self) -> BridgeResult<()> {
        let mut guard = self.runtime_lock();
        let rt = guard.as_mut().ok_or(BridgeError::NotInitialized)?;

        if self.state.current() == EngineStatus::Stopped {
            return Ok(());
        }
        self.state
            .try_transition(
                &[EngineStatus::Starting, EngineStatus::Running, EngineStatus::Paused],
                EngineStatus::Stopping,
            )
            .map_err(|from| BridgeError::InvalidStateTransition {
                operation: "stop",
                from,
            })?;
        rt.dispatcher.dispatch_status(EngineStatus::Stopping);
        info!("stopping engine");

        rt.signal.shutdown();
        if rt.workers.stop_all(self.options.shutdown_timeout) {
            if let Err(from) = self
                .state
                .try_transition(&[EngineStatus::Stopping], EngineStatus::Stopped)
            {
                // The compute worker can fault in the window before it
                // observes the shutdown signal; that is an engine fault,
                // not a caller mistake.
                if from == EngineStatus::Error {
                    let message = self
                        .last_error
                        .take_snapshot()
                        .unwrap_or_else(|| "compute worker faulted during stop".to_string());
                    return Err(BridgeError::WorkerFault(message));
                }
                return Err(BridgeError::InvalidStateTransition {
                    operation: "stop",
                    from,
                });
            }
            rt.dispatcher.dispatch_status(EngineStatus::Stopped);
            Ok(())
        } else {
            let message = format!(
                "workers did not stop within {:?}",
                self.options.shutdown_timeout
            );
            warn!(%message);
            self.state.fault();
            self.last_error.record(&message);
            rt.dispatcher.dispatch_error(&message);
            rt.dispatcher.dispatch_status(EngineStatus::Error);
            Err(BridgeError::ShutdownTimeout(self.options.shutdown_timeout))
        }
    }

    /// Pause the compute worker. Legal only from `RUNNING`; the monitor
    /// keeps sampling but stops dispatching metrics.
    pub fn pause(&self) -> BridgeResult<()> {
        let guard = self.runtime_lock();
        let rt = guard.as_ref().ok_or(BridgeError::NotInitialized)?;
        self.state
            .try_transition(&[EngineStatus::Running], EngineStatus::Paused)
            .map_err(|from| BridgeError::InvalidStateTransition {
                operation: "pause",
                from,
            })?;
        rt.signal.pause();
        rt.dispatcher.dispatch_status(EngineStatus::Paused);
        Ok(())
    }

    /// Resume a paused compute worker. Legal only from `PAUSED`.
    pub fn resume(&self) -> BridgeResult<()> {
        let guard = self.runtime_lock();
        let rt = guard.as_ref().ok_or(BridgeError::NotInitialized)?;
        self.state
            .try_transition(&[EngineStatus::Paused], EngineStatus::Running)
            .map_err(|from| BridgeError::InvalidStateTransition {
                operation: "resume",
                from,
            })?;
        rt.signal.resume();
        rt.dispatcher.dispatch_status(EngineStatus::Running);
        Ok(())
    }

    /// Replace the stored configuration. Takes effect at the next start;
    /// a running engine keeps the configuration it was started with.
    pub fn update_configuration(&self, config: EngineConfig) -> BridgeResult<()> {
        let mut config = config;
        config.normalize();
        let report = validate_config(&config);
        if !report.is_ok() {
            return Err(BridgeError::ValidationFailure {
                reasons: report.reasons,
            });
        }
        self.config.set(config);
        Ok(())
    }

    /// Detached copy of the current configuration.
    pub fn get_configuration(&self) -> EngineConfig {
        self.config.get()
    }

    /// Detached copy of the latest metrics snapshot.
    pub fn get_metrics(&self) -> PerformanceMetrics {
        self.metrics.get()
    }

    /// Current lifecycle state.
    pub fn get_status(&self) -> EngineStatus {
        self.state.current()
    }

    /// Flip the runtime security toggle. Independent of the stored
    /// [`SecurityConfig`](ember_bridge_core::SecurityConfig) record.
    pub fn enable_secure_mode(&self, enabled: bool) {
        self.config.set_security_enabled(enabled);
    }

    /// Current value of the runtime security toggle.
    pub fn secure_mode_enabled(&self) -> bool {
        self.config.security_enabled()
    }

    /// Record a host-observed error and forward it to the error channel.
    /// Does not change the lifecycle state.
    pub fn report_error(&self, message: &str) {
        warn!(%message, "host reported error");
        self.last_error.record(message);
        // Dispatch outside the runtime lock so an error callback may
        // itself report errors without deadlocking.
        let dispatcher = self
            .runtime_lock()
            .as_ref()
            .map(|rt| Arc::clone(&rt.dispatcher));
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch_error(message);
        }
    }

    /// The most recent error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.take_snapshot()
    }

    /// Tear the bridge down: request shutdown, give the workers one
    /// deadline to exit, then drop everything and return to the
    /// uninitialized `STOPPED` state regardless.
    pub fn cleanup(&self) {
        let mut guard = self.runtime_lock();
        if let Some(rt) = guard.as_mut() {
            rt.signal.shutdown();
            if !rt.workers.stop_all(self.options.shutdown_timeout) {
                warn!("abandoning workers that missed the cleanup deadline");
                rt.workers.abandon();
            }
        }
        *guard = None;
        self.state.reset();
        self.metrics.reset();
        self.last_error.clear();
        info!("bridge cleaned up");
    }
}

impl Drop for EngineBridge {
    fn drop(&mut self) {
        // Wake any parked workers; do not block a drop on joining them.
        if let Some(rt) = self.runtime_lock().as_ref() {
            rt.signal.shutdown();
        }
    }
}

impl std::fmt::Debug for EngineBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBridge")
            .field("status", &self.get_status())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
