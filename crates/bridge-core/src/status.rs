//! Engine lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the compute engine, as observed through the bridge.
///
/// The bridge stores this as a single atomic field; reads never block on
/// an in-flight lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    /// No worker threads exist; the engine is idle.
    Stopped,
    /// `start` has been accepted; worker threads are being spawned.
    Starting,
    /// The compute thread is executing work units.
    Running,
    /// The compute thread is suspended on its wake signal.
    Paused,
    /// `stop` is in progress; worker threads are being joined.
    Stopping,
    /// A worker fault or shutdown timeout occurred; `start` re-arms.
    Error,
}

impl EngineStatus {
    /// Stable display name, matching the wire-level status strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Stopped => "STOPPED",
            EngineStatus::Starting => "STARTING",
            EngineStatus::Running => "RUNNING",
            EngineStatus::Paused => "PAUSED",
            EngineStatus::Stopping => "STOPPING",
            EngineStatus::Error => "ERROR",
        }
    }

    /// True while worker threads may exist for this status.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EngineStatus::Starting
                | EngineStatus::Running
                | EngineStatus::Paused
                | EngineStatus::Stopping
        )
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states_match_thread_lifetime() {
        assert!(!EngineStatus::Stopped.is_active());
        assert!(!EngineStatus::Error.is_active());
        assert!(EngineStatus::Starting.is_active());
        assert!(EngineStatus::Running.is_active());
        assert!(EngineStatus::Paused.is_active());
        assert!(EngineStatus::Stopping.is_active());
    }

    #[test]
    fn display_matches_status_strings() {
        assert_eq!(EngineStatus::Running.to_string(), "RUNNING");
        assert_eq!(EngineStatus::Error.to_string(), "ERROR");
    }
}
