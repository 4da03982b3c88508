//! Telemetry receiver: UDP stream from the JalaIO daemon into shared state.
//!
//! The daemon publishes trajectory status (~10Hz) and detection snapshots
//! (detector rate) as fire-and-forget UDP datagrams. This thread is the
//! single writer of the motion flag and detection snapshot in
//! [`MissionState`]; the control thread polls them. Only the most recent
//! value is kept.

use crate::error::{AnugaError, Result};
use crate::link::client::proto;
use crate::shared::MissionState;
use prost::Message as ProstMessage;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

/// Default buffer size (64KB)
const DEFAULT_BUFFER_SIZE: usize = 65536;

/// Max datagrams drained per loop iteration.
const MAX_MESSAGES_PER_ITERATION: usize = 50;

/// UDP telemetry receiver.
pub struct TelemetryReceiver {
    socket: UdpSocket,
    shared: Arc<MissionState>,
    buffer: Vec<u8>,
}

impl TelemetryReceiver {
    /// Bind the telemetry socket.
    pub fn bind(port: u16, shared: Arc<MissionState>) -> Result<Self> {
        let bind_addr = format!("0.0.0.0:{}", port);
        let socket = UdpSocket::bind(&bind_addr).map_err(|e| {
            AnugaError::Config(format!("Failed to bind UDP to {}: {}", bind_addr, e))
        })?;
        socket.set_nonblocking(true)?;

        tracing::info!("Telemetry socket bound to port {}", port);

        Ok(Self {
            socket,
            shared,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
        })
    }

    /// Run the telemetry loop until shutdown is signaled.
    pub fn run(&mut self) {
        tracing::info!("Telemetry thread started");

        loop {
            if self.shared.should_shutdown() {
                tracing::info!("Telemetry thread shutting down");
                break;
            }

            self.drain_messages();

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Process all available datagrams (bounded per iteration).
    fn drain_messages(&mut self) {
        for _ in 0..MAX_MESSAGES_PER_ITERATION {
            match self.recv_message() {
                Ok(Some(msg)) => {
                    self.shared.increment_telemetry_count();
                    self.dispatch(msg);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Telemetry receive error: {}", e);
                    break;
                }
            }
        }
    }

    /// Receive one telemetry message (non-blocking).
    fn recv_message(&mut self) -> Result<Option<proto::jalaio::Message>> {
        match self.socket.recv(&mut self.buffer) {
            Ok(len) => {
                if len < 4 {
                    return Ok(None);
                }
                // Read length prefix
                let msg_len = u32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]) as usize;

                if len < 4 + msg_len {
                    return Err(AnugaError::Protocol("Incomplete datagram".to_string()));
                }

                let msg = proto::jalaio::Message::decode(&self.buffer[4..4 + msg_len])?;
                Ok(Some(msg))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(AnugaError::Connection(e)),
        }
    }

    /// Update shared state from one telemetry message.
    fn dispatch(&self, msg: proto::jalaio::Message) {
        match msg.payload {
            Some(proto::jalaio::message::Payload::TrajectoryStatus(status)) => {
                self.shared.set_trajectory_running(status.running);
            }
            Some(proto::jalaio::message::Payload::Detections(set)) => {
                let classes = set
                    .detections
                    .into_iter()
                    .map(|d| d.class_name)
                    .collect();
                self.shared.update_detections(classes);
            }
            _ => {
                tracing::debug!("Ignoring non-telemetry payload on topic '{}'", msg.topic);
            }
        }
    }
}
