//! Metrics reporting.
//!
//! The engine only increments and observes; installing a recorder and exposing the
//! values is left to the embedding process. Without a recorder every call is a no-op.
//!
//! # Metrics
//! - `rewind_packets_processed_total` (counter): deliveries handed to the engine
//! - `rewind_http_messages_total` (counter): deliveries that parsed as HTTP
//! - `rewind_http_requests_total` / `rewind_http_responses_total` (counter)
//! - `rewind_sessions_created_total` / `rewind_sessions_closed_total` (counter)
//! - `rewind_active_sessions` (gauge)
//! - `rewind_errors_total` (counter): refused messages, unreadable events
//! - `rewind_dropped_packets_total` (counter): non-HTTP, filtered or refused deliveries
//! - `rewind_capture_latency_seconds` (histogram): processing time minus delivery time
//! - `rewind_session_duration_seconds` (histogram): recorded once per closed session

use chrono::{DateTime, Duration, Utc};

use crate::http_parser::MessageKind;

pub const PACKETS_PROCESSED: &str = "rewind_packets_processed_total";
pub const HTTP_MESSAGES: &str = "rewind_http_messages_total";
pub const HTTP_REQUESTS: &str = "rewind_http_requests_total";
pub const HTTP_RESPONSES: &str = "rewind_http_responses_total";
pub const SESSIONS_CREATED: &str = "rewind_sessions_created_total";
pub const SESSIONS_CLOSED: &str = "rewind_sessions_closed_total";
pub const ACTIVE_SESSIONS: &str = "rewind_active_sessions";
pub const ERRORS: &str = "rewind_errors_total";
pub const DROPPED_PACKETS: &str = "rewind_dropped_packets_total";
pub const CAPTURE_LATENCY: &str = "rewind_capture_latency_seconds";
pub const SESSION_DURATION: &str = "rewind_session_duration_seconds";

/// Gate in front of the `metrics` facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsRecorder {
    enabled: bool,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MetricsRecorder {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_packet(&self) {
        if self.enabled {
            ::metrics::counter!(PACKETS_PROCESSED).increment(1);
        }
    }

    pub fn record_http_message(&self, kind: MessageKind) {
        if !self.enabled {
            return;
        }
        ::metrics::counter!(HTTP_MESSAGES).increment(1);
        match kind {
            MessageKind::Request => ::metrics::counter!(HTTP_REQUESTS).increment(1),
            MessageKind::Response => ::metrics::counter!(HTTP_RESPONSES).increment(1),
            MessageKind::Unknown => {}
        }
    }

    pub fn record_session_created(&self) {
        if self.enabled {
            ::metrics::counter!(SESSIONS_CREATED).increment(1);
        }
    }

    pub fn record_session_closed(&self, duration: Option<Duration>) {
        if !self.enabled {
            return;
        }
        ::metrics::counter!(SESSIONS_CLOSED).increment(1);
        if let Some(duration) = duration {
            ::metrics::histogram!(SESSION_DURATION).record(seconds(duration));
        }
    }

    pub fn set_active_sessions(&self, count: usize) {
        if self.enabled {
            ::metrics::gauge!(ACTIVE_SESSIONS).set(count as f64);
        }
    }

    pub fn record_error(&self) {
        if self.enabled {
            ::metrics::counter!(ERRORS).increment(1);
        }
    }

    pub fn record_dropped(&self) {
        if self.enabled {
            ::metrics::counter!(DROPPED_PACKETS).increment(1);
        }
    }

    pub fn record_capture_latency(&self, delivered_at: DateTime<Utc>, processed_at: DateTime<Utc>) {
        if self.enabled {
            ::metrics::histogram!(CAPTURE_LATENCY).record(latency_seconds(delivered_at, processed_at));
        }
    }
}

/// Non-negative delay between delivery and processing. Replayed or skewed timestamps
/// from the future count as zero.
pub fn latency_seconds(delivered_at: DateTime<Utc>, processed_at: DateTime<Utc>) -> f64 {
    seconds(processed_at - delivered_at).max(0.0)
}

fn seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1_000.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use std::collections::HashMap;

    /// Current value of every metric seen by `snapshotter`, keyed by name.
    pub(crate) fn metric_values(snapshotter: &Snapshotter) -> HashMap<String, DebugValue> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, value)| (key.key().name().to_string(), value))
            .collect()
    }

    pub(crate) fn counter(values: &HashMap<String, DebugValue>, name: &str) -> u64 {
        match values.get(name) {
            Some(DebugValue::Counter(n)) => *n,
            other => panic!("{} is not a counter: {:?}", name, other),
        }
    }

    pub(crate) fn gauge(values: &HashMap<String, DebugValue>, name: &str) -> f64 {
        match values.get(name) {
            Some(DebugValue::Gauge(v)) => v.0,
            other => panic!("{} is not a gauge: {:?}", name, other),
        }
    }

    pub(crate) fn histogram(values: &HashMap<String, DebugValue>, name: &str) -> Vec<f64> {
        match values.get(name) {
            Some(DebugValue::Histogram(samples)) => samples.iter().map(|v| v.0).collect(),
            other => panic!("{} is not a histogram: {:?}", name, other),
        }
    }

    fn record_everything(recorder: MetricsRecorder) {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        recorder.record_packet();
        recorder.record_packet();
        recorder.record_http_message(MessageKind::Request);
        recorder.record_http_message(MessageKind::Response);
        recorder.record_http_message(MessageKind::Response);
        recorder.record_session_created();
        recorder.record_session_closed(Some(Duration::seconds(2)));
        recorder.record_session_closed(None);
        recorder.set_active_sessions(3);
        recorder.record_error();
        recorder.record_dropped();
        recorder.record_capture_latency(t0 + Duration::milliseconds(1_500), t0);
    }

    #[test]
    fn latency_is_clamped_at_zero() {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t1 = t0 + Duration::milliseconds(1_500);
        assert_eq!(latency_seconds(t0, t1), 1.5);
        assert_eq!(latency_seconds(t1, t0), 0.0);
    }

    #[test]
    fn enabled_recorder_reports_every_metric() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        ::metrics::with_local_recorder(&recorder, || record_everything(MetricsRecorder::new(true)));

        let values = metric_values(&snapshotter);
        assert_eq!(counter(&values, PACKETS_PROCESSED), 2);
        assert_eq!(counter(&values, HTTP_MESSAGES), 3);
        assert_eq!(counter(&values, HTTP_REQUESTS), 1);
        assert_eq!(counter(&values, HTTP_RESPONSES), 2);
        assert_eq!(counter(&values, SESSIONS_CREATED), 1);
        assert_eq!(counter(&values, SESSIONS_CLOSED), 2);
        assert_eq!(counter(&values, ERRORS), 1);
        assert_eq!(counter(&values, DROPPED_PACKETS), 1);
        assert_eq!(gauge(&values, ACTIVE_SESSIONS), 3.0);
        assert_eq!(histogram(&values, SESSION_DURATION), vec![2.0]);
        assert_eq!(histogram(&values, CAPTURE_LATENCY), vec![0.0]);
    }

    #[test]
    fn disabled_recorder_reports_nothing() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        ::metrics::with_local_recorder(&recorder, || record_everything(MetricsRecorder::new(false)));

        assert!(metric_values(&snapshotter).is_empty());
        assert!(!MetricsRecorder::new(false).is_enabled());
    }
}
