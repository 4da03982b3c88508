//! Shared state between the control thread and the telemetry thread.
//!
//! The telemetry thread is the single writer of the motion flag and the
//! detection snapshot; the control thread only reads them. Most recent value
//! wins; no history is kept.

use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Latest set of currently observed object classes.
///
/// Starts empty; it may stay empty (or go stale) if the detector never
/// publishes, which the scanner treats as "expected classes absent".
#[derive(Clone, Debug, Default)]
pub struct DetectionSnapshot {
    pub classes: HashSet<String>,
    pub received_at: Option<Instant>,
}

/// Shared state for one mission.
#[derive(Debug)]
pub struct MissionState {
    /// Whether the daemon is currently tracking a trajectory.
    /// Unknown until the first telemetry update arrives; treated as idle.
    trajectory_running: AtomicBool,

    /// Latest detection snapshot.
    detections: RwLock<DetectionSnapshot>,

    /// Shutdown signal for graceful termination.
    shutdown: AtomicBool,

    /// Number of telemetry messages received (for status reporting).
    telemetry_count: AtomicU64,
}

impl Default for MissionState {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionState {
    pub fn new() -> Self {
        Self {
            trajectory_running: AtomicBool::new(false),
            detections: RwLock::new(DetectionSnapshot::default()),
            shutdown: AtomicBool::new(false),
            telemetry_count: AtomicU64::new(0),
        }
    }

    /// Update the motion flag (called by the telemetry thread).
    pub fn set_trajectory_running(&self, running: bool) {
        self.trajectory_running.store(running, Ordering::Release);
    }

    /// Check whether a trajectory is currently being tracked.
    pub fn is_trajectory_running(&self) -> bool {
        self.trajectory_running.load(Ordering::Acquire)
    }

    /// Replace the detection snapshot (called by the telemetry thread).
    pub fn update_detections(&self, classes: HashSet<String>) {
        if let Ok(mut guard) = self.detections.write() {
            guard.classes = classes;
            guard.received_at = Some(Instant::now());
        }
    }

    /// Current observed class set.
    pub fn detection_classes(&self) -> HashSet<String> {
        self.detections
            .read()
            .map(|g| g.classes.clone())
            .unwrap_or_default()
    }

    /// Whether any detection snapshot has ever arrived.
    pub fn has_detections(&self) -> bool {
        self.detections
            .read()
            .map(|g| g.received_at.is_some())
            .unwrap_or(false)
    }

    /// Signal shutdown.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Check if shutdown is signaled.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Increment telemetry message count.
    pub fn increment_telemetry_count(&self) {
        self.telemetry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get telemetry message count.
    pub fn telemetry_count(&self) -> u64 {
        self.telemetry_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_idle_and_empty() {
        let state = MissionState::new();
        assert!(!state.is_trajectory_running());
        assert!(state.detection_classes().is_empty());
        assert!(!state.has_detections());
        assert!(!state.should_shutdown());
    }

    #[test]
    fn detection_update_replaces_snapshot() {
        let state = MissionState::new();
        state.update_detections(HashSet::from(["buoy".to_string(), "fish".to_string()]));
        state.update_detections(HashSet::from(["buoy".to_string()]));

        let classes = state.detection_classes();
        assert_eq!(classes, HashSet::from(["buoy".to_string()]));
        assert!(state.has_detections());
    }

    #[test]
    fn shutdown_is_sticky() {
        let state = MissionState::new();
        state.signal_shutdown();
        assert!(state.should_shutdown());
    }
}
