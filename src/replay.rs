//! Replay controller: the per-point mission state machine.
//!
//! Walks the recorded track log in order, accumulating waypoints into a
//! pending batch. At every inspection point the batch is submitted to the
//! daemon, the controller waits for the trajectory to finish, then runs the
//! inspection scanner before continuing. A trailing batch of non-inspection
//! points is flushed at the end of the log.
//!
//! Waypoint batches are strictly sequential: the next batch is never
//! submitted before the previous one has been observed idle, so the daemon
//! never receives overlapping trajectories.

use crate::config::{AnugaConfig, MotionConfig, ScanConfig};
use crate::error::{AnugaError, Result};
use crate::link::{MissionLink, TargetWaypoint, WaypointBatch};
use crate::scanner::{InspectionScanner, ScanOutcome};
use crate::shared::MissionState;
use crate::tracklog::{TrackLog, TrackPoint};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Overall mission outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissionOutcome {
    /// Every point was driven; inspections may still have timed out.
    Completed,
    /// Shutdown was requested before the log was finished.
    Cancelled,
}

/// Verification outcome for one inspection point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InspectionOutcome {
    Confirmed,
    TimedOut,
    /// The scan itself failed (actuator/link error); logged, not fatal.
    Inconclusive,
}

/// One serviced inspection point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InspectionRecord {
    /// Index of the point in the track log.
    pub point_index: usize,
    pub outcome: InspectionOutcome,
}

/// Result of one mission run.
#[derive(Clone, Debug)]
pub struct MissionReport {
    pub outcome: MissionOutcome,
    /// Points whose motion was completed (batch flushed and observed idle).
    pub points_driven: usize,
    pub inspections: Vec<InspectionRecord>,
}

impl MissionReport {
    fn new() -> Self {
        Self {
            outcome: MissionOutcome::Completed,
            points_driven: 0,
            inspections: Vec::new(),
        }
    }

    pub fn confirmed_count(&self) -> usize {
        self.count(InspectionOutcome::Confirmed)
    }

    pub fn timed_out_count(&self) -> usize {
        self.count(InspectionOutcome::TimedOut)
    }

    pub fn inconclusive_count(&self) -> usize {
        self.count(InspectionOutcome::Inconclusive)
    }

    fn count(&self, outcome: InspectionOutcome) -> usize {
        self.inspections
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }
}

enum WaitOutcome {
    Idle,
    Cancelled,
}

/// Drives one mission: owns the track log, the command link, and all
/// sequencing, timing, and termination decisions.
pub struct ReplayController<L: MissionLink> {
    link: L,
    shared: Arc<MissionState>,
    motion: MotionConfig,
    scan: ScanConfig,
    tracklog: Option<TrackLog>,
}

impl<L: MissionLink> ReplayController<L> {
    pub fn new(link: L, shared: Arc<MissionState>, config: &AnugaConfig) -> Self {
        Self {
            link,
            shared,
            motion: config.motion.clone(),
            scan: config.scan.clone(),
            tracklog: None,
        }
    }

    /// Load a track log from file, replacing any previously loaded log.
    ///
    /// The replacement is atomic: on any load error the previous log (if
    /// any) stays in place.
    pub fn load_tracklog(&mut self, path: &Path) -> Result<()> {
        let log = TrackLog::load(path)?;
        tracing::info!(
            "Loaded track log: {} points ({} inspection) in frame '{}'",
            log.len(),
            log.inspection_count(),
            log.frame_id
        );
        self.tracklog = Some(log);
        Ok(())
    }

    /// Install an already-built track log (used by tests and embedders).
    pub fn set_tracklog(&mut self, log: TrackLog) {
        self.tracklog = Some(log);
    }

    /// Replay the loaded track log.
    pub fn run(&mut self) -> Result<MissionReport> {
        let log = match &self.tracklog {
            Some(log) => log.clone(),
            None => return Err(AnugaError::Load("No track log loaded".to_string())),
        };

        tracing::info!(
            "Starting replay of {} points ({} inspection)",
            log.len(),
            log.inspection_count()
        );

        let mut report = MissionReport::new();
        let mut batch: Vec<TargetWaypoint> = Vec::new();

        for (index, point) in log.points.iter().enumerate() {
            if self.shared.should_shutdown() {
                return Ok(self.cancel(report, "Shutdown requested during replay"));
            }

            batch.push(self.target_waypoint(point));

            if !point.is_inspection {
                continue;
            }

            self.submit_batch(&log.frame_id, &batch, index)?;
            match self.wait_for_motion_idle() {
                WaitOutcome::Cancelled => {
                    return Ok(self.cancel(report, "Shutdown requested while motion was active"));
                }
                WaitOutcome::Idle => {}
            }
            report.points_driven += batch.len();
            batch.clear();

            let expected = point.expected_classes();
            let budget = Duration::from_secs_f32(self.scan.time_budget_secs);
            tracing::info!(
                "Inspecting point {} ({} expected classes)",
                index,
                expected.len()
            );

            let scan_result = InspectionScanner::new(&mut self.link, &self.shared, &self.scan)
                .scan(&expected, budget);

            let outcome = match scan_result {
                Ok(ScanOutcome::Confirmed) => InspectionOutcome::Confirmed,
                Ok(ScanOutcome::TimedOut) => InspectionOutcome::TimedOut,
                Ok(ScanOutcome::Cancelled) => {
                    // The scanner has already stopped the actuator.
                    tracing::warn!("Mission cancelled during inspection of point {}", index);
                    report.outcome = MissionOutcome::Cancelled;
                    return Ok(report);
                }
                Err(e) => {
                    tracing::error!("Inspection of point {} failed: {}", index, e);
                    InspectionOutcome::Inconclusive
                }
            };
            report.inspections.push(InspectionRecord {
                point_index: index,
                outcome,
            });
        }

        // Trailing non-inspection points: flush and wait, no scan.
        if !batch.is_empty() {
            self.submit_batch(&log.frame_id, &batch, log.len() - 1)?;
            match self.wait_for_motion_idle() {
                WaitOutcome::Cancelled => {
                    return Ok(self.cancel(report, "Shutdown requested while motion was active"));
                }
                WaitOutcome::Idle => {}
            }
            report.points_driven += batch.len();
        }

        tracing::info!(
            "Replay complete: {} points driven, {} inspections confirmed, {} timed out, {} inconclusive",
            report.points_driven,
            report.confirmed_count(),
            report.timed_out_count(),
            report.inconclusive_count()
        );

        Ok(report)
    }

    /// Build the motion request for one track point.
    fn target_waypoint(&self, point: &TrackPoint) -> TargetWaypoint {
        TargetWaypoint {
            position: point.pose.position,
            max_forward_speed: self.motion.max_forward_speed,
            heading_offset: self.motion.heading_offset,
            use_fixed_heading: false,
        }
    }

    /// Submit the pending batch. Rejection and transport failures are fatal.
    fn submit_batch(
        &mut self,
        frame_id: &str,
        waypoints: &[TargetWaypoint],
        through_index: usize,
    ) -> Result<()> {
        let batch = WaypointBatch {
            frame_id: frame_id.to_string(),
            waypoints: waypoints.to_vec(),
            interpolator: self.motion.interpolator.clone(),
            start_now: true,
        };

        tracing::info!(
            "Submitting batch of {} waypoints (through point {})",
            batch.waypoints.len(),
            through_index
        );

        let ack = self
            .link
            .submit_waypoints(&batch)
            .map_err(|e| AnugaError::Gateway(format!("Waypoint submission failed: {}", e)))?;

        if !ack.accepted {
            let reason = if ack.message.is_empty() {
                "no reason given".to_string()
            } else {
                ack.message
            };
            return Err(AnugaError::Gateway(format!(
                "Waypoint batch rejected: {}",
                reason
            )));
        }

        Ok(())
    }

    /// Block until the daemon reports the trajectory idle.
    ///
    /// A settle delay elapses first, so a motion flag that has not yet been
    /// updated to "running" is not mistaken for completion. Both the delay
    /// and the poll loop are shutdown-abortable.
    fn wait_for_motion_idle(&self) -> WaitOutcome {
        if let WaitOutcome::Cancelled =
            self.interruptible_sleep(Duration::from_secs_f32(self.motion.settle_delay_secs))
        {
            return WaitOutcome::Cancelled;
        }

        let poll = Duration::from_secs_f32(1.0 / self.motion.idle_poll_hz.max(0.1));
        while self.shared.is_trajectory_running() {
            if self.shared.should_shutdown() {
                return WaitOutcome::Cancelled;
            }
            std::thread::sleep(poll);
        }

        WaitOutcome::Idle
    }

    /// Sleep in bounded slices, checking the shutdown flag between them.
    fn interruptible_sleep(&self, total: Duration) -> WaitOutcome {
        const SLICE: Duration = Duration::from_millis(50);

        let deadline = Instant::now() + total;
        loop {
            if self.shared.should_shutdown() {
                return WaitOutcome::Cancelled;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return WaitOutcome::Idle;
            }
            std::thread::sleep(remaining.min(SLICE));
        }
    }

    /// Stop the vehicle and mark the mission cancelled.
    fn cancel(&mut self, mut report: MissionReport, reason: &str) -> MissionReport {
        tracing::warn!("{}", reason);
        if let Err(e) = self.link.send_stop() {
            tracing::error!("Failed to send stop command: {}", e);
        }
        report.outcome = MissionOutcome::Cancelled;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Acceptance, ActuatorCommand, MockLink};
    use crate::tracklog::{Orientation, Pose, Position};
    use std::collections::HashSet;

    fn test_config() -> AnugaConfig {
        let mut config = AnugaConfig::default();
        config.motion.settle_delay_secs = 0.0;
        config.motion.idle_poll_hz = 1000.0;
        config.scan.time_budget_secs = 0.05;
        config.scan.pulse_duration_secs = 0.01;
        config.scan.pulse_rate_hz = 200.0;
        config
    }

    fn point(x: f64, inspect: bool, classes: &[&str]) -> TrackPoint {
        TrackPoint {
            pose: Pose {
                position: Position { x, y: 0.0, z: -2.0 },
                orientation: Orientation {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    w: 1.0,
                },
            },
            is_inspection: inspect,
            expected: classes
                .iter()
                .map(|c| crate::tracklog::ExpectedDetection {
                    class_name: c.to_string(),
                    confidence: 0.9,
                    xmin: 0.0,
                    ymin: 0.0,
                    xmax: 1.0,
                    ymax: 1.0,
                })
                .collect(),
        }
    }

    fn log(points: Vec<TrackPoint>) -> TrackLog {
        TrackLog {
            frame_id: "world".to_string(),
            points,
        }
    }

    fn make_controller(link: &MockLink) -> (ReplayController<MockLink>, Arc<MissionState>) {
        let shared = Arc::new(MissionState::new());
        let controller = ReplayController::new(link.clone(), Arc::clone(&shared), &test_config());
        (controller, shared)
    }

    #[test]
    fn batches_flush_at_inspection_points_and_end_of_log() {
        let link = MockLink::new();
        let (mut controller, shared) = make_controller(&link);
        shared.update_detections(HashSet::from(["buoy".to_string(), "fish".to_string()]));

        controller.set_tracklog(log(vec![
            point(0.0, false, &[]),
            point(1.0, true, &["buoy"]),
            point(2.0, false, &[]),
        ]));

        let report = controller.run().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Completed);
        assert_eq!(report.points_driven, 3);
        assert_eq!(report.confirmed_count(), 1);

        let submissions = link.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].waypoints.len(), 2);
        assert_eq!(submissions[1].waypoints.len(), 1);
        assert_eq!(submissions[0].frame_id, "world");
        assert!(submissions[0].start_now);

        // Snapshot already covered the expected set: no rotation needed.
        assert_eq!(link.rotation_command_count(), 0);
    }

    #[test]
    fn rejection_halts_without_further_submissions() {
        let link = MockLink::new();
        let (mut controller, _shared) = make_controller(&link);
        link.push_response(Acceptance::rejected("trajectory overlap"));

        controller.set_tracklog(log(vec![
            point(0.0, true, &[]),
            point(1.0, true, &[]),
        ]));

        let err = controller.run().unwrap_err();
        assert!(matches!(err, AnugaError::Gateway(_)));
        assert_eq!(link.submissions().len(), 1);
    }

    #[test]
    fn log_without_inspection_points_is_one_trailing_batch() {
        let link = MockLink::new();
        let (mut controller, _shared) = make_controller(&link);

        controller.set_tracklog(log(vec![
            point(0.0, false, &[]),
            point(1.0, false, &[]),
            point(2.0, false, &[]),
        ]));

        let report = controller.run().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Completed);
        assert_eq!(report.points_driven, 3);
        assert!(report.inspections.is_empty());
        assert_eq!(link.submissions().len(), 1);
        assert_eq!(link.submissions()[0].waypoints.len(), 3);
        assert!(link.commands().is_empty());
    }

    #[test]
    fn final_inspection_point_needs_no_trailing_flush() {
        let link = MockLink::new();
        let (mut controller, shared) = make_controller(&link);
        shared.update_detections(HashSet::from(["wreck".to_string()]));

        controller.set_tracklog(log(vec![
            point(0.0, false, &[]),
            point(1.0, true, &["wreck"]),
        ]));

        let report = controller.run().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Completed);
        assert_eq!(link.submissions().len(), 1);
        assert_eq!(report.confirmed_count(), 1);
    }

    #[test]
    fn run_without_loaded_log_fails() {
        let link = MockLink::new();
        let (mut controller, _shared) = make_controller(&link);
        let err = controller.run().unwrap_err();
        assert!(matches!(err, AnugaError::Load(_)));
    }

    #[test]
    fn scan_timeout_does_not_abort_the_mission() {
        let link = MockLink::new();
        let (mut controller, _shared) = make_controller(&link);
        // Detections never arrive; the scan must time out and replay continue.

        controller.set_tracklog(log(vec![
            point(0.0, true, &["whale"]),
            point(1.0, false, &[]),
        ]));

        let report = controller.run().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Completed);
        assert_eq!(report.points_driven, 2);
        assert_eq!(report.timed_out_count(), 1);
        assert_eq!(link.submissions().len(), 2);
        assert!(link.rotation_command_count() > 0);
    }

    #[test]
    fn shutdown_while_motion_active_cancels_with_stop() {
        let link = MockLink::new();
        let (mut controller, shared) = make_controller(&link);
        shared.set_trajectory_running(true);

        controller.set_tracklog(log(vec![point(0.0, true, &["buoy"])]));

        let signal_state = Arc::clone(&shared);
        let signaler = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            signal_state.signal_shutdown();
        });

        let report = controller.run().unwrap();
        signaler.join().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Cancelled);
        assert_eq!(report.points_driven, 0);
        assert!(report.inspections.is_empty());
        assert_eq!(link.last_command(), Some(ActuatorCommand::Stop));
    }

    #[test]
    fn shutdown_during_scan_reports_cancelled_not_timed_out() {
        let link = MockLink::new();
        let shared = Arc::new(MissionState::new());
        let mut config = test_config();
        config.scan.time_budget_secs = 5.0;
        config.scan.pulse_duration_secs = 5.0;
        config.scan.pulse_rate_hz = 100.0;
        let mut controller = ReplayController::new(link.clone(), Arc::clone(&shared), &config);

        controller.set_tracklog(log(vec![point(0.0, true, &["buoy"])]));

        let signal_state = Arc::clone(&shared);
        let signaler = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            signal_state.signal_shutdown();
        });

        let report = controller.run().unwrap();
        signaler.join().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Cancelled);
        assert!(report.inspections.is_empty());
        assert_eq!(link.last_command(), Some(ActuatorCommand::Stop));
    }

    #[test]
    fn scan_failure_is_inconclusive_and_replay_continues() {
        let link = MockLink::new();
        let (mut controller, _shared) = make_controller(&link);
        link.set_fail_commands(true);

        controller.set_tracklog(log(vec![
            point(0.0, true, &["buoy"]),
            point(1.0, false, &[]),
        ]));

        let report = controller.run().unwrap();

        assert_eq!(report.outcome, MissionOutcome::Completed);
        assert_eq!(report.inconclusive_count(), 1);
        assert_eq!(link.submissions().len(), 2);
    }
}
