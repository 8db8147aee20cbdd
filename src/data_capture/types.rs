//! Common data types used across the data_capture subsystem.
//!
//! These mirror what the reassembly collaborator hands us: ordered per-direction
//! byte deliveries plus connection start/end notifications keyed by a [`FlowId`].

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::types::{ConnectionTuple, FlowId};

/// Direction of TCP flow for delivered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Bytes sent by the side that initiated the connection.
    ClientToServer,
    /// Bytes sent back by the side that accepted the connection.
    ServerToClient,
}

impl Direction {
    pub fn is_client_to_server(self) -> bool {
        matches!(self, Direction::ClientToServer)
    }
}

/// Why the collaborator considers a connection finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEndReason {
    /// Orderly FIN/RST teardown.
    #[default]
    Fin,
    /// The collaborator evicted the flow (idle timeout, table pressure, end of capture).
    Manual,
}

/// One ordered chunk of bytes for one direction of one flow.
///
/// `source` and `destination` are whatever addressing the delivery carried; they are
/// only consulted when the flow was never announced through a connection-start event.
#[derive(Debug, Clone)]
pub struct SegmentDelivery {
    pub flow_id: FlowId,
    pub direction: Direction,
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub source: Option<SocketAddr>,
    pub destination: Option<SocketAddr>,
}

impl SegmentDelivery {
    /// A delivery without addressing metadata, stamped with the given time.
    pub fn new(
        flow_id: FlowId,
        direction: Direction,
        payload: impl Into<Vec<u8>>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            flow_id,
            direction,
            payload: payload.into(),
            timestamp,
            source: None,
            destination: None,
        }
    }

    pub fn with_endpoints(mut self, source: SocketAddr, destination: SocketAddr) -> Self {
        self.source = Some(source);
        self.destination = Some(destination);
        self
    }
}

/// Everything the reassembly collaborator can tell the engine.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    ConnectionStart {
        flow_id: FlowId,
        tuple: ConnectionTuple,
    },
    Segment(SegmentDelivery),
    ConnectionEnd {
        flow_id: FlowId,
        reason: ConnectionEndReason,
    },
}

/// Running totals kept by the engine independently of any metrics backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub packets_processed: u64,
    pub http_messages: u64,
    pub http_requests: u64,
    pub http_responses: u64,
    pub dropped_packets: u64,
    pub errors: u64,
}

/// Converts a timestamp to floating-point seconds since the epoch.
pub fn to_epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Converts floating-point seconds since the epoch back to a timestamp.
///
/// Returns `None` for values chrono cannot represent (NaN, out of range).
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}
