//! Compute and monitor worker threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use ember_bridge_core::{EngineStatus, PerformanceMetrics};
use ember_compute::ComputeSession;
use tracing::{debug, info};

use crate::dispatch::CallbackDispatcher;
use crate::state::EngineStateMachine;
use crate::store::{LastError, MetricsStore};

/// EMA weight for hashrate smoothing.
const HASHRATE_SMOOTHING: f64 = 0.1;

#[derive(Debug, Default)]
struct WakeState {
    paused: bool,
    shutdown: bool,
}

/// Pause/shutdown coordination shared by both workers.
///
/// A single mutex+condvar pair carries both signals, so a paused compute
/// thread wakes immediately on either resume or shutdown.
#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    state: Mutex<WakeState>,
    cond: Condvar,
}

impl WakeSignal {
    fn lock(&self) -> std::sync::MutexGuard<'_, WakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn pause(&self) {
        self.lock().paused = true;
        self.cond.notify_all();
    }

    pub(crate) fn resume(&self) {
        self.lock().paused = false;
        self.cond.notify_all();
    }

    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    /// Block while paused. Returns `false` once shutdown is requested.
    pub(crate) fn wait_if_paused(&self) -> bool {
        let mut state = self.lock();
        while state.paused && !state.shutdown {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !state.shutdown
    }

    /// Sleep for `interval`, waking early on shutdown. Returns `false`
    /// once shutdown is requested.
    pub(crate) fn sleep(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut state = self.lock();
        while !state.shutdown {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return true;
            };
            let (guard, _timeout) = self
                .cond
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        false
    }
}

/// Everything the worker loops share with the bridge facade.
pub(crate) struct WorkerShared {
    pub(crate) state: Arc<EngineStateMachine>,
    pub(crate) metrics: Arc<MetricsStore>,
    pub(crate) last_error: Arc<LastError>,
    pub(crate) dispatcher: Arc<CallbackDispatcher>,
    pub(crate) signal: Arc<WakeSignal>,
    /// Cumulative hashes, bumped by the compute thread and read by the
    /// monitor thread. The only cross-thread metrics channel.
    pub(crate) hashes: Arc<AtomicU64>,
}

/// Owns the two worker join handles for one engine run.
#[derive(Debug, Default)]
pub(crate) struct WorkerThreadManager {
    compute: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
}

impl WorkerThreadManager {
    pub(crate) fn is_empty(&self) -> bool {
        self.compute.is_none() && self.monitor.is_none()
    }

    pub(crate) fn spawn_compute(
        &mut self,
        shared: &Arc<WorkerShared>,
        session: Box<dyn ComputeSession>,
    ) -> std::io::Result<()> {
        let shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name("ember-compute".to_string())
            .spawn(move || run_compute_loop(shared, session))?;
        self.compute = Some(handle);
        Ok(())
    }

    pub(crate) fn spawn_monitor(
        &mut self,
        shared: &Arc<WorkerShared>,
        interval: Duration,
        threads_active: u32,
    ) -> std::io::Result<()> {
        let shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name("ember-monitor".to_string())
            .spawn(move || run_monitor_loop(shared, interval, threads_active))?;
        self.monitor = Some(handle);
        Ok(())
    }

    /// Join both workers, bounded by `timeout`. The shutdown signal must
    /// already have been raised. Returns `false` if either worker is
    /// still alive at the deadline; its handle is dropped either way so a
    /// later start is not wedged on a zombie.
    pub(crate) fn stop_all(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut all_joined = true;
        for handle in [self.compute.take(), self.monitor.take()].into_iter().flatten() {
            if wait_until_finished(&handle, deadline) {
                // Finished workers join without blocking.
                let _ = handle.join();
            } else {
                debug!(worker = ?handle.thread().name(), "worker missed shutdown deadline");
                all_joined = false;
            }
        }
        all_joined
    }

    /// Drop the handles without joining. Used by cleanup when the caller
    /// no longer cares whether the threads finish.
    pub(crate) fn abandon(&mut self) {
        self.compute = None;
        self.monitor = None;
    }
}

fn wait_until_finished(handle: &JoinHandle<()>, deadline: Instant) -> bool {
    // std has no timed join; poll with a short sleep instead.
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

fn run_compute_loop(shared: Arc<WorkerShared>, mut session: Box<dyn ComputeSession>) {
    info!("compute worker started");
    loop {
        if !shared.signal.wait_if_paused() {
            break;
        }
        match session.step() {
            Ok(done) => {
                shared.hashes.fetch_add(done, Ordering::AcqRel);
            }
            Err(err) => {
                // Faults racing an orderly shutdown are not faults.
                if shared.signal.is_shutdown() {
                    break;
                }
                let message = format!("compute worker fault: {err}");
                shared.state.fault();
                shared.last_error.record(&message);
                shared.dispatcher.dispatch_error(&message);
                shared.dispatcher.dispatch_status(EngineStatus::Error);
                shared.signal.shutdown();
                break;
            }
        }
    }
    session.stop();
    info!("compute worker exited");
}

fn run_monitor_loop(shared: Arc<WorkerShared>, interval: Duration, threads_active: u32) {
    info!("monitor worker started");
    let mut last_total: u64 = 0;
    let mut last_sample = Instant::now();
    let mut smoothed_rate = 0.0_f64;

    while shared.signal.sleep(interval) {
        let now = Instant::now();
        let elapsed = now.duration_since(last_sample).as_secs_f64();
        last_sample = now;

        let total = shared.hashes.load(Ordering::Acquire);
        let delta = total.saturating_sub(last_total);
        last_total = total;

        let raw_rate = if elapsed > 0.0 { delta as f64 / elapsed } else { 0.0 };
        smoothed_rate = if smoothed_rate == 0.0 {
            raw_rate
        } else {
            smoothed_rate + HASHRATE_SMOOTHING * (raw_rate - smoothed_rate)
        };

        let previous = shared.metrics.get();
        let snapshot = PerformanceMetrics {
            hashrate: smoothed_rate,
            power_usage: estimate_power(threads_active, smoothed_rate),
            temperature: estimate_temperature(smoothed_rate),
            // Share counters are fed by pool integration; carried
            // forward untouched here.
            accepted_shares: previous.accepted_shares,
            rejected_shares: previous.rejected_shares,
            total_hashes: total,
            threads_active,
            last_update_unix_ms: Utc::now().timestamp_millis(),
        };
        shared.metrics.set(snapshot.clone());

        if shared.state.current() == EngineStatus::Running {
            shared.dispatcher.dispatch_performance(&snapshot);
        }
    }
    info!("monitor worker exited");
}

fn estimate_power(threads_active: u32, hashrate: f64) -> f64 {
    if hashrate == 0.0 {
        return 0.0;
    }
    // Rough per-thread draw; no access to RAPL or sensors here.
    threads_active as f64 * 12.5
}

fn estimate_temperature(hashrate: f64) -> f64 {
    if hashrate == 0.0 { 0.0 } else { 55.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_returns_false_on_shutdown() {
        let signal = Arc::new(WakeSignal::default());
        let waker = Arc::clone(&signal);
        let handle = thread::spawn(move || waker.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        signal.shutdown();
        assert!(!handle.join().expect("join"));
    }

    #[test]
    fn sleep_returns_true_at_interval_end() {
        let signal = WakeSignal::default();
        let start = Instant::now();
        assert!(signal.sleep(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn wait_if_paused_blocks_until_resume() {
        let signal = Arc::new(WakeSignal::default());
        signal.pause();
        let waiter = Arc::clone(&signal);
        let handle = thread::spawn(move || waiter.wait_if_paused());
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        signal.resume();
        assert!(handle.join().expect("join"));
    }

    #[test]
    fn shutdown_unblocks_a_paused_waiter() {
        let signal = Arc::new(WakeSignal::default());
        signal.pause();
        let waiter = Arc::clone(&signal);
        let handle = thread::spawn(move || waiter.wait_if_paused());
        signal.shutdown();
        assert!(!handle.join().expect("join"));
    }
}
