//! Lock-free engine state machine.

use std::sync::atomic::{AtomicU8, Ordering};

use ember_bridge_core::EngineStatus;

const STOPPED: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;
const PAUSED: u8 = 3;
const STOPPING: u8 = 4;
const ERROR: u8 = 5;

fn encode(status: EngineStatus) -> u8 {
    match status {
        EngineStatus::Stopped => STOPPED,
        EngineStatus::Starting => STARTING,
        EngineStatus::Running => RUNNING,
        EngineStatus::Paused => PAUSED,
        EngineStatus::Stopping => STOPPING,
        EngineStatus::Error => ERROR,
    }
}

fn decode(raw: u8) -> EngineStatus {
    match raw {
        STOPPED => EngineStatus::Stopped,
        STARTING => EngineStatus::Starting,
        RUNNING => EngineStatus::Running,
        PAUSED => EngineStatus::Paused,
        STOPPING => EngineStatus::Stopping,
        _ => EngineStatus::Error,
    }
}

/// The engine's lifecycle state, transitioned only through compare-and-swap
/// so two racing operations can never both believe they won.
#[derive(Debug)]
pub(crate) struct EngineStateMachine {
    raw: AtomicU8,
}

impl EngineStateMachine {
    pub(crate) fn new() -> Self {
        Self {
            raw: AtomicU8::new(STOPPED),
        }
    }

    pub(crate) fn current(&self) -> EngineStatus {
        decode(self.raw.load(Ordering::Acquire))
    }

    /// Move to `to` if the current state is one of `allowed_from`.
    ///
    /// Returns the previous state on success, or the state actually
    /// observed when the transition is not legal.
    pub(crate) fn try_transition(
        &self,
        allowed_from: &[EngineStatus],
        to: EngineStatus,
    ) -> Result<EngineStatus, EngineStatus> {
        let target = encode(to);
        let mut observed = self.raw.load(Ordering::Acquire);
        loop {
            let current = decode(observed);
            if !allowed_from.contains(&current) {
                return Err(current);
            }
            match self.raw.compare_exchange_weak(
                observed,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current),
                Err(actual) => observed = actual,
            }
        }
    }

    /// Force the machine into `Error`, from any state.
    pub(crate) fn fault(&self) -> EngineStatus {
        decode(self.raw.swap(ERROR, Ordering::AcqRel))
    }

    /// Reset to `Stopped` unconditionally. Used by cleanup after the
    /// workers are known to be gone.
    pub(crate) fn reset(&self) {
        self.raw.store(STOPPED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped() {
        assert_eq!(EngineStateMachine::new().current(), EngineStatus::Stopped);
    }

    #[test]
    fn legal_transition_reports_previous_state() {
        let sm = EngineStateMachine::new();
        let prev = sm
            .try_transition(&[EngineStatus::Stopped], EngineStatus::Starting)
            .expect("legal");
        assert_eq!(prev, EngineStatus::Stopped);
        assert_eq!(sm.current(), EngineStatus::Starting);
    }

    #[test]
    fn illegal_transition_reports_observed_state() {
        let sm = EngineStateMachine::new();
        let got = sm
            .try_transition(&[EngineStatus::Running], EngineStatus::Paused)
            .expect_err("illegal");
        assert_eq!(got, EngineStatus::Stopped);
        assert_eq!(sm.current(), EngineStatus::Stopped);
    }

    #[test]
    fn fault_wins_from_any_state() {
        let sm = EngineStateMachine::new();
        sm.try_transition(&[EngineStatus::Stopped], EngineStatus::Starting)
            .expect("legal");
        assert_eq!(sm.fault(), EngineStatus::Starting);
        assert_eq!(sm.current(), EngineStatus::Error);
    }

    #[test]
    fn racing_transitions_elect_one_winner() {
        use std::sync::Arc;

        let sm = Arc::new(EngineStateMachine::new());
        let mut wins = 0;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sm = Arc::clone(&sm);
                std::thread::spawn(move || {
                    sm.try_transition(&[EngineStatus::Stopped], EngineStatus::Starting)
                        .is_ok()
                })
            })
            .collect();
        for h in handles {
            if h.join().expect("join") {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(sm.current(), EngineStatus::Starting);
    }
}
