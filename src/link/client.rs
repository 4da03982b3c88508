//! JalaIO TCP client for submitting waypoint batches and scan commands.
//!
//! # Wire Protocol
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Protobuf binary          │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! Waypoint submissions are request/response (the daemon replies with an
//! ack); velocity commands are fire-and-forget.

use crate::error::{AnugaError, Result};
use crate::link::{Acceptance, MissionLink, WaypointBatch};
use prost::Message as ProstMessage;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

// Include generated protobuf types
pub mod proto {
    pub mod jalaio {
        include!(concat!(env!("OUT_DIR"), "/jalaio.rs"));
    }
}

/// Upper bound on a single framed response (1MB).
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// TCP command client for the JalaIO daemon.
pub struct JalaClient {
    stream: TcpStream,
}

impl JalaClient {
    /// Connect with timeout. The same timeout is applied to response reads.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        let sock_addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| AnugaError::Config(format!("Invalid address: {}", e)))?;
        let stream = TcpStream::connect_timeout(&sock_addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;

        tracing::info!("Connected to JalaIO at {}", addr);
        Ok(Self { stream })
    }

    /// Send a framed protobuf message.
    fn send_proto(&mut self, msg: &proto::jalaio::Message) -> Result<()> {
        let encoded = msg.encode_to_vec();
        let len = encoded.len() as u32;

        // Write length prefix (big-endian)
        self.stream.write_all(&len.to_be_bytes())?;
        // Write payload
        self.stream.write_all(&encoded)?;
        self.stream.flush()?;

        Ok(())
    }

    /// Read one framed protobuf message.
    fn recv_proto(&mut self) -> Result<proto::jalaio::Message> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE {
            return Err(AnugaError::Protocol(format!(
                "Response too large: {} bytes",
                len
            )));
        }

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload)?;

        Ok(proto::jalaio::Message::decode(payload.as_slice())?)
    }

    fn scan_velocity_message(angular_z: f32) -> proto::jalaio::Message {
        proto::jalaio::Message {
            topic: "command".to_string(),
            payload: Some(proto::jalaio::message::Payload::ScanVelocity(
                proto::jalaio::ScanVelocity { angular_z },
            )),
        }
    }
}

impl MissionLink for JalaClient {
    fn submit_waypoints(&mut self, batch: &WaypointBatch) -> Result<Acceptance> {
        let waypoints = batch
            .waypoints
            .iter()
            .map(|wp| proto::jalaio::Waypoint {
                point: Some(proto::jalaio::Vector3 {
                    x: wp.position.x,
                    y: wp.position.y,
                    z: wp.position.z,
                }),
                max_forward_speed: wp.max_forward_speed,
                heading_offset: wp.heading_offset,
                use_fixed_heading: wp.use_fixed_heading,
            })
            .collect();

        let request = proto::jalaio::Message {
            topic: "command".to_string(),
            payload: Some(proto::jalaio::message::Payload::WaypointSet(
                proto::jalaio::WaypointSetRequest {
                    frame_id: batch.frame_id.clone(),
                    waypoints,
                    interpolator: batch.interpolator.clone(),
                    start_now: batch.start_now,
                },
            )),
        };

        self.send_proto(&request)?;

        let response = self.recv_proto()?;
        match response.payload {
            Some(proto::jalaio::message::Payload::Ack(ack)) => Ok(Acceptance {
                accepted: ack.accepted,
                message: ack.message,
            }),
            Some(_) => Err(AnugaError::Protocol(
                "Unexpected response to waypoint submission".to_string(),
            )),
            None => Err(AnugaError::Protocol("Empty response payload".to_string())),
        }
    }

    fn send_scan_velocity(&mut self, angular_z: f32) -> Result<()> {
        self.send_proto(&Self::scan_velocity_message(angular_z))
    }

    fn send_stop(&mut self) -> Result<()> {
        self.send_proto(&Self::scan_velocity_message(0.0))
    }
}
