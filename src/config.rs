//! Configuration loading for AnugaNav

use crate::error::{AnugaError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct AnugaConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub tracklog: TracklogConfig,
}

/// Network connection settings for the JalaIO daemon
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Vehicle IP address (default: 127.0.0.1 for local mock)
    #[serde(default = "default_vehicle_ip")]
    pub vehicle_ip: String,

    /// Port number, used for TCP commands and UDP telemetry (default: 6060)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout in milliseconds (default: 5000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

/// Motion parameters applied to every submitted waypoint batch
#[derive(Clone, Debug, Deserialize)]
pub struct MotionConfig {
    /// Maximum forward speed while tracking waypoints (m/s)
    #[serde(default = "default_max_forward_speed")]
    pub max_forward_speed: f32,

    /// Heading offset applied to each waypoint (rad)
    #[serde(default = "default_heading_offset")]
    pub heading_offset: f32,

    /// Path interpolation strategy requested from the daemon
    #[serde(default = "default_interpolator")]
    pub interpolator: String,

    /// Delay after a batch is accepted before polling for idle (seconds).
    /// Covers the gap before the daemon reports the trajectory as running.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: f32,

    /// Poll rate while waiting for the trajectory to finish (Hz)
    #[serde(default = "default_idle_poll_hz")]
    pub idle_poll_hz: f32,
}

/// Inspection scan parameters
#[derive(Clone, Debug, Deserialize)]
pub struct ScanConfig {
    /// Total time budget for confirming one inspection point (seconds)
    #[serde(default = "default_time_budget")]
    pub time_budget_secs: f32,

    /// Duration of one rotation pulse (seconds)
    #[serde(default = "default_pulse_duration")]
    pub pulse_duration_secs: f32,

    /// Rate at which velocity commands are published during a pulse (Hz)
    #[serde(default = "default_pulse_rate")]
    pub pulse_rate_hz: f32,

    /// Angular velocity of a rotation pulse (rad/s)
    #[serde(default = "default_scan_angular_vel")]
    pub angular_vel: f32,
}

/// Track log source settings
#[derive(Clone, Debug, Deserialize)]
pub struct TracklogConfig {
    /// Path to the recorded track log file
    #[serde(default = "default_tracklog_path")]
    pub path: String,
}

// Default value functions
fn default_vehicle_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6060
}
fn default_timeout() -> u64 {
    5000
}
fn default_max_forward_speed() -> f32 {
    0.25
}
fn default_heading_offset() -> f32 {
    0.25
}
fn default_interpolator() -> String {
    "dubins".to_string()
}
fn default_settle_delay() -> f32 {
    2.0
}
fn default_idle_poll_hz() -> f32 {
    5.0
}
fn default_time_budget() -> f32 {
    30.0
}
fn default_pulse_duration() -> f32 {
    1.0
}
fn default_pulse_rate() -> f32 {
    50.0
}
fn default_scan_angular_vel() -> f32 {
    0.5
}
fn default_tracklog_path() -> String {
    "tracklog.yaml".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            vehicle_ip: default_vehicle_ip(),
            port: default_port(),
            timeout_ms: default_timeout(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_forward_speed: default_max_forward_speed(),
            heading_offset: default_heading_offset(),
            interpolator: default_interpolator(),
            settle_delay_secs: default_settle_delay(),
            idle_poll_hz: default_idle_poll_hz(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: default_time_budget(),
            pulse_duration_secs: default_pulse_duration(),
            pulse_rate_hz: default_pulse_rate(),
            angular_vel: default_scan_angular_vel(),
        }
    }
}

impl Default for TracklogConfig {
    fn default() -> Self {
        Self {
            path: default_tracklog_path(),
        }
    }
}

impl Default for AnugaConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            motion: MotionConfig::default(),
            scan: ScanConfig::default(),
            tracklog: TracklogConfig::default(),
        }
    }
}

impl AnugaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnugaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: AnugaConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the full address string for connection
    pub fn address(&self) -> String {
        format!("{}:{}", self.connection.vehicle_ip, self.connection.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recorded_mission_parameters() {
        let config = AnugaConfig::default();
        assert_eq!(config.motion.max_forward_speed, 0.25);
        assert_eq!(config.motion.interpolator, "dubins");
        assert_eq!(config.scan.time_budget_secs, 30.0);
        assert_eq!(config.scan.pulse_duration_secs, 1.0);
        assert_eq!(config.scan.angular_vel, 0.5);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AnugaConfig = toml::from_str(
            r#"
            [connection]
            vehicle_ip = "192.168.2.4"

            [scan]
            time_budget_secs = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.vehicle_ip, "192.168.2.4");
        assert_eq!(config.connection.port, 6060);
        assert_eq!(config.scan.time_budget_secs, 10.0);
        assert_eq!(config.scan.pulse_rate_hz, 50.0);
    }

    #[test]
    fn address_combines_ip_and_port() {
        let config = AnugaConfig::default();
        assert_eq!(config.address(), "127.0.0.1:6060");
    }
}
