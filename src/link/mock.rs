//! Mock mission link for testing.

use crate::error::{AnugaError, Result};
use crate::link::{Acceptance, MissionLink, WaypointBatch};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// An actuator command recorded by the mock.
#[derive(Clone, Debug, PartialEq)]
pub enum ActuatorCommand {
    /// In-place rotation at the given angular velocity (rad/s).
    ScanVelocity(f32),
    /// Full stop.
    Stop,
}

/// Mock link for unit testing.
///
/// Records every submitted batch and actuator command; submission responses
/// can be scripted (default: accept everything).
#[derive(Clone)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

struct MockLinkInner {
    submissions: Vec<WaypointBatch>,
    commands: Vec<ActuatorCommand>,
    responses: VecDeque<Acceptance>,
    fail_commands: bool,
}

impl MockLink {
    /// Create a new mock link that accepts all submissions.
    pub fn new() -> Self {
        MockLink {
            inner: Arc::new(Mutex::new(MockLinkInner {
                submissions: Vec::new(),
                commands: Vec::new(),
                responses: VecDeque::new(),
                fail_commands: false,
            })),
        }
    }

    /// Script the response to the next unanswered submission.
    pub fn push_response(&self, response: Acceptance) {
        let mut inner = self.inner.lock().unwrap();
        inner.responses.push_back(response);
    }

    /// Make actuator commands fail with an I/O error.
    pub fn set_fail_commands(&self, fail: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_commands = fail;
    }

    /// All batches submitted so far.
    pub fn submissions(&self) -> Vec<WaypointBatch> {
        let inner = self.inner.lock().unwrap();
        inner.submissions.clone()
    }

    /// All actuator commands issued so far.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        let inner = self.inner.lock().unwrap();
        inner.commands.clone()
    }

    /// Last actuator command issued, if any.
    pub fn last_command(&self) -> Option<ActuatorCommand> {
        let inner = self.inner.lock().unwrap();
        inner.commands.last().cloned()
    }

    /// Number of rotation commands issued (stops excluded).
    pub fn rotation_command_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .commands
            .iter()
            .filter(|c| matches!(c, ActuatorCommand::ScanVelocity(v) if *v != 0.0))
            .count()
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionLink for MockLink {
    fn submit_waypoints(&mut self, batch: &WaypointBatch) -> Result<Acceptance> {
        let mut inner = self.inner.lock().unwrap();
        inner.submissions.push(batch.clone());
        Ok(inner
            .responses
            .pop_front()
            .unwrap_or_else(Acceptance::accepted))
    }

    fn send_scan_velocity(&mut self, angular_z: f32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_commands {
            return Err(AnugaError::Gateway("mock command failure".to_string()));
        }
        inner.commands.push(ActuatorCommand::ScanVelocity(angular_z));
        Ok(())
    }

    fn send_stop(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_commands {
            return Err(AnugaError::Gateway("mock command failure".to_string()));
        }
        inner.commands.push(ActuatorCommand::Stop);
        Ok(())
    }
}
