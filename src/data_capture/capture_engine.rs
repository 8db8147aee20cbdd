//! # Capture engine
//!
//! Entry point for everything the reassembly collaborator reports. Each delivery goes
//! through the same steps on the calling thread:
//!
//! 1. parse the payload; anything not HTTP is dropped here
//! 2. resolve the flow to its connection tuple
//! 3. apply the server-port filter
//! 4. hand the message to the correlator
//!
//! Nothing in here blocks. Other threads observe progress through
//! [`CaptureEngine::snapshots`].

use chrono::Utc;
use log::{debug, trace, warn};

use super::types::{CaptureEvent, CaptureStats, ConnectionEndReason, SegmentDelivery};
use crate::http_parser::{parse, MessageKind};
use crate::network::{ConnectionFilter, ConnectionTuple, FlowId, FlowResolver};
use crate::observability::MetricsRecorder;
use crate::session_management::{
    PairingOutcome, SessionClosed, SessionManager, SessionSnapshots,
};

const PREVIEW_LEN: usize = 64;

/// What became of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Not HTTP.
    Dropped,
    /// HTTP, but the server port is not being captured.
    Filtered,
    /// A request opened a transaction.
    Opened,
    /// A response completed the open transaction.
    Paired,
    /// A response with no open request.
    Orphaned,
    /// The correlator refused the message, e.g. its session is closed.
    Rejected,
}

impl From<PairingOutcome> for SegmentOutcome {
    fn from(pairing: PairingOutcome) -> Self {
        match pairing {
            PairingOutcome::Opened { .. } => SegmentOutcome::Opened,
            PairingOutcome::Paired { .. } => SegmentOutcome::Paired,
            PairingOutcome::Orphaned => SegmentOutcome::Orphaned,
        }
    }
}

#[derive(Debug, Default)]
pub struct CaptureEngine {
    resolver: FlowResolver,
    sessions: SessionManager,
    filter: ConnectionFilter,
    metrics: MetricsRecorder,
    stats: CaptureStats,
}

impl CaptureEngine {
    pub fn new(filter: ConnectionFilter, metrics: MetricsRecorder) -> Self {
        Self {
            resolver: FlowResolver::new(),
            sessions: SessionManager::new(),
            filter,
            metrics,
            stats: CaptureStats::default(),
        }
    }

    pub fn on_connection_start(&mut self, flow_id: FlowId, tuple: ConnectionTuple) {
        self.resolver.on_connection_start(flow_id, tuple);
    }

    pub fn on_segment_ready(&mut self, delivery: SegmentDelivery) -> SegmentOutcome {
        self.stats.packets_processed += 1;
        self.metrics.record_packet();
        self.metrics
            .record_capture_latency(delivery.timestamp, Utc::now());

        let msg = parse(&delivery.payload, delivery.direction);
        if !msg.is_valid() {
            let preview = &delivery.payload[..delivery.payload.len().min(PREVIEW_LEN)];
            trace!(
                "flow={} dropped {} non-HTTP bytes: {}{}",
                delivery.flow_id,
                delivery.payload.len(),
                String::from_utf8_lossy(preview),
                if delivery.payload.len() > PREVIEW_LEN { " ..." } else { "" }
            );
            self.count_dropped();
            return SegmentOutcome::Dropped;
        }

        self.stats.http_messages += 1;
        match msg.kind() {
            MessageKind::Request => self.stats.http_requests += 1,
            MessageKind::Response => self.stats.http_responses += 1,
            MessageKind::Unknown => {}
        }
        self.metrics.record_http_message(msg.kind());

        let tuple = self.resolver.resolve(
            delivery.flow_id,
            delivery.direction,
            delivery.source,
            delivery.destination,
        );
        if !self.filter.allows(&tuple) {
            trace!("flow={} {} filtered by server port", delivery.flow_id, tuple);
            self.count_dropped();
            return SegmentOutcome::Filtered;
        }

        match self.sessions.add_message(&tuple, msg, delivery.timestamp) {
            Ok(outcome) => {
                if outcome.session_created {
                    self.metrics.record_session_created();
                    self.publish_active_sessions();
                }
                outcome.pairing.into()
            }
            Err(e) => {
                warn!("flow={} message dropped: {}", delivery.flow_id, e);
                self.record_error();
                self.count_dropped();
                SegmentOutcome::Rejected
            }
        }
    }

    /// Closes the session of a known flow, then forgets the flow.
    pub fn on_connection_end(
        &mut self,
        flow_id: FlowId,
        reason: ConnectionEndReason,
    ) -> Option<SessionClosed> {
        let closed = self
            .resolver
            .lookup(flow_id)
            .map(ConnectionTuple::session_key)
            .and_then(|key| self.sessions.close_session(&key));

        if let Some(closed) = &closed {
            debug!(
                "flow={} ended ({:?}), session {} closed",
                flow_id, reason, closed.session_id
            );
            self.metrics.record_session_closed(closed.duration);
            self.publish_active_sessions();
        }

        self.resolver.on_connection_end(flow_id);
        closed
    }

    /// Routes one collaborator event. Returns the outcome for segment events.
    pub fn dispatch(&mut self, event: CaptureEvent) -> Option<SegmentOutcome> {
        match event {
            CaptureEvent::ConnectionStart { flow_id, tuple } => {
                self.on_connection_start(flow_id, tuple);
                None
            }
            CaptureEvent::Segment(delivery) => Some(self.on_segment_ready(delivery)),
            CaptureEvent::ConnectionEnd { flow_id, reason } => {
                self.on_connection_end(flow_id, reason);
                None
            }
        }
    }

    /// An event the engine could not use: an unreadable input line or a refused message.
    pub fn record_error(&mut self) {
        self.stats.errors += 1;
        self.metrics.record_error();
    }

    /// Closes every remaining session. Safe to call more than once.
    pub fn shutdown(&mut self) -> Vec<SessionClosed> {
        let closed = self.sessions.close_all();
        for session in &closed {
            self.metrics.record_session_closed(session.duration);
        }
        self.metrics.set_active_sessions(0);
        debug!("Engine shut down, {} session(s) closed", closed.len());
        closed
    }

    pub fn snapshots(&self) -> SessionSnapshots {
        self.sessions.snapshots()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn resolver(&self) -> &FlowResolver {
        &self.resolver
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    fn count_dropped(&mut self) {
        self.stats.dropped_packets += 1;
        self.metrics.record_dropped();
    }

    fn publish_active_sessions(&self) {
        if self.metrics.is_enabled() {
            self.metrics
                .set_active_sessions(self.sessions.active_session_count());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::types::Direction;
    use chrono::{DateTime, Duration};
    use std::net::SocketAddr;

    const CLIENT: &str = "192.168.1.20:52000";
    const SERVER: &str = "10.1.1.1:80";

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn engine() -> CaptureEngine {
        let _ = env_logger::builder().is_test(true).try_init();
        CaptureEngine::new(ConnectionFilter::default(), MetricsRecorder::new(false))
    }

    fn start(engine: &mut CaptureEngine, flow: u32) {
        engine.dispatch(CaptureEvent::ConnectionStart {
            flow_id: FlowId(flow),
            tuple: ConnectionTuple::from_initiator(addr(CLIENT), addr(SERVER)),
        });
    }

    fn segment(flow: u32, direction: Direction, payload: &str, ms: i64) -> CaptureEvent {
        CaptureEvent::Segment(SegmentDelivery::new(FlowId(flow), direction, payload, at(ms)))
    }

    fn request(flow: u32, uri: &str, ms: i64) -> CaptureEvent {
        segment(
            flow,
            Direction::ClientToServer,
            &format!("GET {} HTTP/1.1\r\nHost: example.com\r\n\r\n", uri),
            ms,
        )
    }

    fn response(flow: u32, ms: i64) -> CaptureEvent {
        segment(flow, Direction::ServerToClient, "HTTP/1.1 200 OK\r\n\r\n", ms)
    }

    #[test]
    fn request_response_round_trip() {
        let mut engine = engine();
        start(&mut engine, 1);

        assert_eq!(engine.dispatch(request(1, "/", 0)), Some(SegmentOutcome::Opened));
        assert_eq!(engine.dispatch(response(1, 12)), Some(SegmentOutcome::Paired));

        let sessions = engine.snapshots().snapshot();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id(), "192.168.1.20:52000->10.1.1.1:80");
        assert_eq!(
            sessions[0].transactions()[0].duration(),
            Some(Duration::milliseconds(12))
        );

        let stats = engine.stats();
        assert_eq!(stats.packets_processed, 2);
        assert_eq!(stats.http_messages, 2);
        assert_eq!(stats.http_requests, 1);
        assert_eq!(stats.http_responses, 1);
        assert_eq!(stats.dropped_packets, 0);
    }

    #[test]
    fn pairing_order_through_engine() {
        let mut engine = engine();
        start(&mut engine, 1);
        engine.dispatch(request(1, "/r1", 0));
        engine.dispatch(request(1, "/r2", 1));
        engine.dispatch(response(1, 2));

        let session = &engine.snapshots().snapshot()[0];
        let txs = session.transactions();
        assert_eq!(txs.len(), 2);
        assert!(txs[1].is_complete());
        assert_eq!(txs[1].request().unwrap().uri(), "/r2");
        assert!(!txs[0].has_response());
    }

    #[test]
    fn non_http_segment_is_dropped() {
        let mut engine = engine();
        start(&mut engine, 1);
        let tls = CaptureEvent::Segment(SegmentDelivery::new(
            FlowId(1),
            Direction::ClientToServer,
            vec![0x16, 0x03, 0x01, 0x02, 0x00],
            at(0),
        ));
        assert_eq!(engine.dispatch(tls), Some(SegmentOutcome::Dropped));
        assert_eq!(engine.stats().dropped_packets, 1);
        assert_eq!(engine.stats().http_messages, 0);
        assert_eq!(engine.sessions().session_count(), 0);
    }

    #[test]
    fn unannounced_flows_with_same_addressing_share_a_session() {
        let mut engine = engine();
        let req = SegmentDelivery::new(
            FlowId(10),
            Direction::ClientToServer,
            "GET / HTTP/1.1\r\n\r\n",
            at(0),
        )
        .with_endpoints(addr(CLIENT), addr(SERVER));
        let resp = SegmentDelivery::new(
            FlowId(11),
            Direction::ServerToClient,
            "HTTP/1.1 204 No Content\r\n\r\n",
            at(5),
        )
        .with_endpoints(addr(SERVER), addr(CLIENT));

        // Response first: arrival order across deliveries does not change the key.
        assert_eq!(engine.on_segment_ready(resp), SegmentOutcome::Orphaned);
        assert_eq!(engine.on_segment_ready(req), SegmentOutcome::Opened);

        let sessions = engine.snapshots().snapshot();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].transaction_count(), 2);
        assert!(engine.resolver().is_empty());
    }

    #[test]
    fn missing_metadata_lands_in_placeholder_session() {
        let mut engine = engine();
        assert_eq!(engine.dispatch(request(99, "/", 0)), Some(SegmentOutcome::Opened));
        let sessions = engine.snapshots().snapshot();
        assert_eq!(sessions[0].id(), "unknown:0->unknown:0");
    }

    #[test]
    fn connection_end_closes_session_and_forgets_flow() {
        let mut engine = engine();
        start(&mut engine, 3);
        engine.dispatch(request(3, "/", 0));
        engine.dispatch(response(3, 20));

        let closed = engine
            .on_connection_end(FlowId(3), ConnectionEndReason::Fin)
            .unwrap();
        assert_eq!(closed.transaction_count, 1);
        assert!(engine.resolver().lookup(FlowId(3)).is_none());
        assert!(engine.snapshots().snapshot()[0].is_closed());

        // Ending again, or ending an unknown flow, is harmless.
        assert!(engine.on_connection_end(FlowId(3), ConnectionEndReason::Fin).is_none());
        assert!(engine.on_connection_end(FlowId(4), ConnectionEndReason::Manual).is_none());
    }

    #[test]
    fn message_for_closed_session_is_rejected() {
        let mut engine = engine();
        start(&mut engine, 5);
        engine.dispatch(request(5, "/", 0));
        engine.on_connection_end(FlowId(5), ConnectionEndReason::Fin);

        start(&mut engine, 5);
        assert_eq!(engine.dispatch(request(5, "/again", 10)), Some(SegmentOutcome::Rejected));
        assert_eq!(engine.stats().dropped_packets, 1);
        assert_eq!(engine.stats().errors, 1);
        assert_eq!(engine.snapshots().snapshot()[0].transaction_count(), 1);
    }

    #[test]
    fn port_filter_drops_other_servers() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut engine =
            CaptureEngine::new(ConnectionFilter::new(&[8080]), MetricsRecorder::new(false));
        start(&mut engine, 1);
        assert_eq!(engine.dispatch(request(1, "/", 0)), Some(SegmentOutcome::Filtered));
        assert_eq!(engine.stats().http_messages, 1);
        assert_eq!(engine.stats().dropped_packets, 1);
        assert_eq!(engine.sessions().session_count(), 0);
    }

    #[test]
    fn capture_reports_metrics() {
        use crate::observability::metrics::tests::{counter, gauge, histogram, metric_values};
        use crate::observability::metrics::{
            ACTIVE_SESSIONS, CAPTURE_LATENCY, DROPPED_PACKETS, ERRORS, HTTP_MESSAGES,
            HTTP_REQUESTS, HTTP_RESPONSES, PACKETS_PROCESSED, SESSIONS_CLOSED, SESSIONS_CREATED,
            SESSION_DURATION,
        };
        use metrics_util::debugging::DebuggingRecorder;

        let _ = env_logger::builder().is_test(true).try_init();
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        ::metrics::with_local_recorder(&recorder, || {
            let mut engine =
                CaptureEngine::new(ConnectionFilter::default(), MetricsRecorder::new(true));
            start(&mut engine, 1);
            engine.dispatch(request(1, "/", 0));
            engine.dispatch(response(1, 250));
            engine.dispatch(segment(1, Direction::ClientToServer, "\u{16}\u{3} hello", 300));
            engine.on_connection_end(FlowId(1), ConnectionEndReason::Fin);
            start(&mut engine, 1);
            assert_eq!(
                engine.dispatch(request(1, "/late", 400)),
                Some(SegmentOutcome::Rejected)
            );
            engine.shutdown();
        });

        let values = metric_values(&snapshotter);
        assert_eq!(counter(&values, PACKETS_PROCESSED), 4);
        assert_eq!(counter(&values, HTTP_MESSAGES), 3);
        assert_eq!(counter(&values, HTTP_REQUESTS), 2);
        assert_eq!(counter(&values, HTTP_RESPONSES), 1);
        assert_eq!(counter(&values, SESSIONS_CREATED), 1);
        assert_eq!(counter(&values, SESSIONS_CLOSED), 1);
        assert_eq!(counter(&values, DROPPED_PACKETS), 2);
        assert_eq!(counter(&values, ERRORS), 1);
        assert_eq!(gauge(&values, ACTIVE_SESSIONS), 0.0);
        assert_eq!(histogram(&values, SESSION_DURATION), vec![0.25]);
        assert_eq!(histogram(&values, CAPTURE_LATENCY).len(), 4);
    }

    #[test]
    fn shutdown_closes_everything_once() {
        let mut engine = engine();
        start(&mut engine, 1);
        engine.dispatch(request(1, "/", 0));
        engine.dispatch(CaptureEvent::ConnectionStart {
            flow_id: FlowId(2),
            tuple: ConnectionTuple::new("192.168.1.21", 52001, "10.1.1.1", 80),
        });
        engine.dispatch(request(2, "/", 0));

        assert_eq!(engine.shutdown().len(), 2);
        assert!(engine.shutdown().is_empty());
        assert_eq!(engine.snapshots().active_count(), 0);
    }
}
