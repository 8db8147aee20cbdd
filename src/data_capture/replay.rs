//! # Replay source
//!
//! Reads a recorded stream of collaborator events, one JSON object per line:
//!
//! ```text
//! {"event":"connection_start","flow_id":7,"client":"10.0.0.1:51000","server":"10.0.0.2:80"}
//! {"event":"segment","flow_id":7,"direction":"client_to_server","timestamp":1700000000.25,"data":"GET / HTTP/1.1\r\n\r\n"}
//! {"event":"connection_end","flow_id":7,"reason":"fin"}
//! ```
//!
//! A segment carries its payload either as text in `data` or as raw byte values in
//! `bytes`. `source`/`destination` and `timestamp` are optional; a missing timestamp
//! is replaced by the time the line is read.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};
use serde::Deserialize;

use super::capture_engine::CaptureEngine;
use super::types::{
    from_epoch_seconds, CaptureEvent, ConnectionEndReason, Direction, SegmentDelivery,
};
use crate::configuration::CaptureConfig;
use crate::error_handling::types::CaptureError;
use crate::network::{ConnectionTuple, FlowId};

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ReplayRecord {
    ConnectionStart {
        flow_id: FlowId,
        client: SocketAddr,
        server: SocketAddr,
    },
    Segment {
        flow_id: FlowId,
        direction: Direction,
        #[serde(default)]
        timestamp: Option<f64>,
        #[serde(default)]
        source: Option<SocketAddr>,
        #[serde(default)]
        destination: Option<SocketAddr>,
        #[serde(default)]
        data: Option<String>,
        #[serde(default)]
        bytes: Option<Vec<u8>>,
    },
    ConnectionEnd {
        flow_id: FlowId,
        #[serde(default)]
        reason: ConnectionEndReason,
    },
}

impl ReplayRecord {
    fn into_event(self) -> Result<CaptureEvent, String> {
        match self {
            ReplayRecord::ConnectionStart {
                flow_id,
                client,
                server,
            } => Ok(CaptureEvent::ConnectionStart {
                flow_id,
                tuple: ConnectionTuple::from_initiator(client, server),
            }),
            ReplayRecord::Segment {
                flow_id,
                direction,
                timestamp,
                source,
                destination,
                data,
                bytes,
            } => {
                let timestamp = match timestamp {
                    Some(secs) => from_epoch_seconds(secs)
                        .ok_or_else(|| format!("timestamp {} is out of range", secs))?,
                    None => Utc::now(),
                };
                let payload = match (data, bytes) {
                    (Some(_), Some(_)) => {
                        return Err("segment has both 'data' and 'bytes'".to_string())
                    }
                    (Some(text), None) => text.into_bytes(),
                    (None, Some(raw)) => raw,
                    (None, None) => return Err("segment has no payload".to_string()),
                };
                Ok(CaptureEvent::Segment(SegmentDelivery {
                    flow_id,
                    direction,
                    payload,
                    timestamp,
                    source,
                    destination,
                }))
            }
            ReplayRecord::ConnectionEnd { flow_id, reason } => {
                Ok(CaptureEvent::ConnectionEnd { flow_id, reason })
            }
        }
    }
}

/// Iterator over the events of a recorded stream.
///
/// Yields `Err(CaptureError::MalformedEvent)` for a line that cannot be decoded and
/// keeps going; a read failure is yielded once and ends the iteration.
pub struct ReplaySource<R> {
    reader: R,
    line_number: usize,
    failed: bool,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path)?;
        info!("Replaying capture events from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for ReplaySource<R> {
    type Item = Result<CaptureEvent, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut line = Vec::new();
        loop {
            line.clear();
            match self.reader.read_until(b'\n', &mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(CaptureError::Io(e)));
                }
            }
            self.line_number += 1;

            // Bytes, not text: a line that is not UTF-8 is malformed, not a read failure.
            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            let event = serde_json::from_slice::<ReplayRecord>(trimmed)
                .map_err(|e| e.to_string())
                .and_then(ReplayRecord::into_event)
                .map_err(|reason| CaptureError::MalformedEvent {
                    line: self.line_number,
                    reason,
                });
            return Some(event);
        }
    }
}

/// When [`run_capture`] stops early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Stop once this many HTTP messages were seen. `0` means no limit.
    pub max_http_messages: u64,
    pub timeout: Option<Duration>,
}

impl CaptureLimits {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            max_http_messages: config.packet_limit,
            timeout: (config.timeout_seconds > 0)
                .then(|| Duration::from_secs(config.timeout_seconds)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    MessageLimit,
    Timeout,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfInput => write!(f, "end of input"),
            StopReason::MessageLimit => write!(f, "HTTP message limit reached"),
            StopReason::Timeout => write!(f, "capture timeout reached"),
        }
    }
}

/// Feeds `events` to `engine` until the input ends or a limit is hit.
///
/// Malformed events are logged, counted as errors and skipped. Any other error stops
/// the run and is returned.
pub fn run_capture<I>(
    engine: &mut CaptureEngine,
    events: I,
    limits: &CaptureLimits,
) -> Result<StopReason, CaptureError>
where
    I: IntoIterator<Item = Result<CaptureEvent, CaptureError>>,
{
    let started = Instant::now();

    for event in events {
        if limits.timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
            info!("Capture timeout reached after {:?}", started.elapsed());
            return Ok(StopReason::Timeout);
        }

        match event {
            Ok(event) => {
                engine.dispatch(event);
            }
            Err(e @ CaptureError::MalformedEvent { .. }) => {
                warn!("Skipping event: {}", e);
                engine.record_error();
                continue;
            }
            Err(e) => return Err(e),
        }

        if limits.max_http_messages > 0
            && engine.stats().http_messages >= limits.max_http_messages
        {
            info!(
                "Reached HTTP message limit ({})",
                limits.max_http_messages
            );
            return Ok(StopReason::MessageLimit);
        }
    }

    debug!("Event stream exhausted");
    Ok(StopReason::EndOfInput)
}
