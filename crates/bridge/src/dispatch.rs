//! Callback dispatch across the host-runtime boundary.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ember_bridge_core::{EngineStatus, PerformanceMetrics};
use tracing::warn;

use crate::api::CallbackSet;

/// Attaching the current thread to the host runtime failed.
#[derive(Debug, thiserror::Error)]
#[error("host runtime attach failed: {0}")]
pub struct HostAttachError(pub String);

/// Seam to the host application's runtime.
///
/// Bridge worker threads are not created by the host, so before any
/// callback crosses the boundary the dispatcher attaches the calling
/// thread, and detaches it afterwards only if the attach created the
/// association.
pub trait HostRuntime: Send + Sync + 'static {
    /// Associate the current thread with the host runtime.
    ///
    /// Returns `true` when the call created a new association that the
    /// dispatcher must undo, `false` when the thread was already attached.
    fn attach(&self) -> Result<bool, HostAttachError>;

    /// Undo an association created by [`attach`](HostRuntime::attach).
    fn detach(&self);
}

/// Host runtime for in-process hosts with no thread affinity. Attach and
/// detach are no-ops.
#[derive(Debug, Default)]
pub struct LocalHost;

impl HostRuntime for LocalHost {
    fn attach(&self) -> Result<bool, HostAttachError> {
        Ok(false)
    }

    fn detach(&self) {}
}

/// After this many consecutive failures a channel goes quiet until a
/// delivery succeeds again.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Delivers engine events into the host's callbacks.
///
/// A failed or panicking callback never takes the engine down: the
/// failure is counted per channel, logged, and once the channel has
/// failed [`MAX_CONSECUTIVE_FAILURES`] times in a row further deliveries
/// on it are suppressed until one succeeds.
pub(crate) struct CallbackDispatcher {
    host: Arc<dyn HostRuntime>,
    callbacks: CallbackSet,
    status_failures: AtomicU32,
    performance_failures: AtomicU32,
    error_failures: AtomicU32,
}

impl CallbackDispatcher {
    pub(crate) fn new(host: Arc<dyn HostRuntime>, callbacks: CallbackSet) -> Self {
        Self {
            host,
            callbacks,
            status_failures: AtomicU32::new(0),
            performance_failures: AtomicU32::new(0),
            error_failures: AtomicU32::new(0),
        }
    }

    pub(crate) fn dispatch_status(&self, status: EngineStatus) {
        if let Some(cb) = &self.callbacks.on_status {
            self.deliver("status", &self.status_failures, || cb(status));
        }
    }

    pub(crate) fn dispatch_performance(&self, snapshot: &PerformanceMetrics) {
        if let Some(cb) = &self.callbacks.on_performance {
            self.deliver("performance", &self.performance_failures, || cb(snapshot));
        }
    }

    pub(crate) fn dispatch_error(&self, message: &str) {
        if let Some(cb) = &self.callbacks.on_error {
            self.deliver("error", &self.error_failures, || cb(message));
        }
    }

    fn deliver(&self, channel: &'static str, failures: &AtomicU32, call: impl FnOnce()) {
        if failures.load(Ordering::Acquire) >= MAX_CONSECUTIVE_FAILURES {
            return;
        }

        let newly_attached = match self.host.attach() {
            Ok(flag) => flag,
            Err(err) => {
                let count = failures.fetch_add(1, Ordering::AcqRel) + 1;
                warn!(channel, %err, count, "host attach failed, dropping callback");
                return;
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(call));

        if newly_attached {
            self.host.detach();
        }

        match outcome {
            Ok(()) => failures.store(0, Ordering::Release),
            Err(_) => {
                let count = failures.fetch_add(1, Ordering::AcqRel) + 1;
                if count >= MAX_CONSECUTIVE_FAILURES {
                    warn!(channel, count, "callback keeps panicking, muting channel");
                } else {
                    warn!(channel, count, "callback panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("status_failures", &self.status_failures)
            .field("performance_failures", &self.performance_failures)
            .field("error_failures", &self.error_failures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingHost {
        attaches: AtomicU32,
        detaches: AtomicU32,
    }

    impl CountingHost {
        fn new() -> Self {
            Self {
                attaches: AtomicU32::new(0),
                detaches: AtomicU32::new(0),
            }
        }
    }

    impl HostRuntime for CountingHost {
        fn attach(&self) -> Result<bool, HostAttachError> {
            self.attaches.fetch_add(1, Ordering::AcqRel);
            Ok(true)
        }

        fn detach(&self) {
            self.detaches.fetch_add(1, Ordering::AcqRel);
        }
    }

    #[test]
    fn attach_and_detach_are_balanced() {
        let host = Arc::new(CountingHost::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = CallbackDispatcher::new(
            Arc::clone(&host) as Arc<dyn HostRuntime>,
            CallbackSet::none().with_status(move |s| sink.lock().unwrap().push(s)),
        );

        dispatcher.dispatch_status(EngineStatus::Running);
        dispatcher.dispatch_status(EngineStatus::Stopped);

        assert_eq!(host.attaches.load(Ordering::Acquire), 2);
        assert_eq!(host.detaches.load(Ordering::Acquire), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EngineStatus::Running, EngineStatus::Stopped]
        );
    }

    #[test]
    fn unset_channels_never_touch_the_host() {
        let host = Arc::new(CountingHost::new());
        let dispatcher =
            CallbackDispatcher::new(Arc::clone(&host) as Arc<dyn HostRuntime>, CallbackSet::none());
        dispatcher.dispatch_status(EngineStatus::Running);
        dispatcher.dispatch_error("boom");
        assert_eq!(host.attaches.load(Ordering::Acquire), 0);
    }

    #[test]
    fn panicking_channel_is_muted_after_three_strikes() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let dispatcher = CallbackDispatcher::new(
            Arc::new(LocalHost),
            CallbackSet::none().with_error(move |_| {
                counter.fetch_add(1, Ordering::AcqRel);
                panic!("host-side bug");
            }),
        );

        for _ in 0..5 {
            dispatcher.dispatch_error("event");
        }
        // Three deliveries were attempted, then the channel went quiet.
        assert_eq!(calls.load(Ordering::Acquire), 3);
    }

    #[test]
    fn panic_in_one_channel_leaves_others_alive() {
        let statuses = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&statuses);
        let dispatcher = CallbackDispatcher::new(
            Arc::new(LocalHost),
            CallbackSet::none()
                .with_status(move |_| {
                    counter.fetch_add(1, Ordering::AcqRel);
                })
                .with_error(|_| panic!("host-side bug")),
        );

        for _ in 0..4 {
            dispatcher.dispatch_error("event");
            dispatcher.dispatch_status(EngineStatus::Running);
        }
        assert_eq!(statuses.load(Ordering::Acquire), 4);
    }

    #[test]
    fn success_resets_the_strike_counter() {
        let should_panic = Arc::new(AtomicU32::new(1));
        let flag = Arc::clone(&should_panic);
        let delivered = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&delivered);
        let dispatcher = CallbackDispatcher::new(
            Arc::new(LocalHost),
            CallbackSet::none().with_error(move |_| {
                if flag.load(Ordering::Acquire) == 1 {
                    panic!("transient");
                }
                counter.fetch_add(1, Ordering::AcqRel);
            }),
        );

        dispatcher.dispatch_error("a");
        dispatcher.dispatch_error("b");
        should_panic.store(0, Ordering::Release);
        for _ in 0..4 {
            dispatcher.dispatch_error("c");
        }
        assert_eq!(delivered.load(Ordering::Acquire), 4);
    }
}
