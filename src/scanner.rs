//! Inspection scanner: rotate-and-verify at an inspection point.
//!
//! Confirms, within a time budget, that every object class recorded at this
//! point is currently observable. If the current snapshot does not cover the
//! expected set, the vehicle rotates in place with short fixed pulses,
//! re-sampling detections after each pulse. A pulse rather than continuous
//! rotation keeps the camera from overshooting the object's field of view.

use crate::config::ScanConfig;
use crate::link::MissionLink;
use crate::shared::MissionState;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Terminal outcome of one inspection scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every expected class was observed.
    Confirmed,
    /// The budget elapsed without the expected classes being observed.
    TimedOut,
    /// Shutdown was requested mid-scan; the actuator was stopped.
    Cancelled,
}

enum PulseResult {
    Completed,
    Cancelled,
}

/// Bounded rotate-and-verify loop against the live detection snapshot.
pub struct InspectionScanner<'a, L: MissionLink> {
    link: &'a mut L,
    shared: &'a MissionState,
    config: &'a ScanConfig,
}

impl<'a, L: MissionLink> InspectionScanner<'a, L> {
    pub fn new(link: &'a mut L, shared: &'a MissionState, config: &'a ScanConfig) -> Self {
        Self {
            link,
            shared,
            config,
        }
    }

    /// Scan until every expected class is observed or the budget elapses.
    ///
    /// Returns immediately (zero rotation commands) if the current snapshot
    /// already covers the expected set. An empty or stale snapshot is treated
    /// as "expected classes absent", never as an error.
    pub fn scan(
        &mut self,
        expected: &HashSet<String>,
        budget: Duration,
    ) -> crate::error::Result<ScanOutcome> {
        let start = Instant::now();

        loop {
            if self.shared.should_shutdown() {
                self.link.send_stop()?;
                return Ok(ScanOutcome::Cancelled);
            }

            let observed = self.shared.detection_classes();
            if expected.is_subset(&observed) {
                tracing::info!("Inspection confirmed ({} classes)", expected.len());
                return Ok(ScanOutcome::Confirmed);
            }

            if !self.shared.has_detections() {
                tracing::debug!("No detection snapshot received yet, rotating");
            } else {
                tracing::debug!(
                    "Expected classes not in view (observed {}), rotating",
                    observed.len()
                );
            }

            if let PulseResult::Cancelled = self.rotation_pulse()? {
                return Ok(ScanOutcome::Cancelled);
            }

            if start.elapsed() >= budget {
                tracing::warn!(
                    "Inspection timed out after {:.1}s, not all expected objects present",
                    start.elapsed().as_secs_f32()
                );
                return Ok(ScanOutcome::TimedOut);
            }
        }
    }

    /// Issue one rotation pulse: constant angular velocity published at the
    /// control rate for the pulse duration, then a full stop.
    fn rotation_pulse(&mut self) -> crate::error::Result<PulseResult> {
        let period = Duration::from_secs_f32(1.0 / self.config.pulse_rate_hz.max(1.0));
        let deadline = Instant::now() + Duration::from_secs_f32(self.config.pulse_duration_secs);

        while Instant::now() < deadline {
            if self.shared.should_shutdown() {
                self.link.send_stop()?;
                return Ok(PulseResult::Cancelled);
            }

            if let Err(e) = self.link.send_scan_velocity(self.config.angular_vel) {
                // Leave the vehicle stopped before surfacing the failure.
                let _ = self.link.send_stop();
                return Err(e);
            }

            std::thread::sleep(period);
        }

        self.link.send_stop()?;
        Ok(PulseResult::Completed)
    }
}
