//! # Flow Identity Resolver
//!
//! Maps a collaborator [`FlowId`] to the [`ConnectionTuple`] it was announced with.
//! Entries are inserted on connection start and removed on connection end; the table
//! is owned by whoever drives the capture and passed around explicitly.
//!
//! When a flow was never announced (capture started mid-connection, or the start
//! notification was lost) the tuple is synthesized from the delivery itself, and as
//! a last resort a placeholder `unknown:0` tuple keeps the pipeline flowing.

use std::collections::HashMap;
use std::net::SocketAddr;

use log::{debug, trace};

use super::types::{ConnectionTuple, FlowId};
use crate::data_capture::types::Direction;

#[derive(Debug, Default)]
pub struct FlowResolver {
    connections: HashMap<FlowId, ConnectionTuple>,
}

impl FlowResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the tuple for `flow_id`, replacing a stale entry if the id was reused.
    pub fn on_connection_start(&mut self, flow_id: FlowId, tuple: ConnectionTuple) {
        debug!("TCP connection started: flow={} {}", flow_id, tuple);
        if let Some(previous) = self.connections.insert(flow_id, tuple) {
            debug!(
                "flow={} was still mapped to {}; replaced",
                flow_id, previous
            );
        }
    }

    /// Forgets `flow_id`. A no-op when the flow was never announced.
    pub fn on_connection_end(&mut self, flow_id: FlowId) -> Option<ConnectionTuple> {
        let removed = self.connections.remove(&flow_id);
        match &removed {
            Some(tuple) => debug!("TCP connection ended: flow={} {}", flow_id, tuple),
            None => trace!("TCP connection ended for unannounced flow={}", flow_id),
        }
        removed
    }

    /// Returns the tuple for `flow_id`.
    ///
    /// Falls back to the delivery's `source`/`destination` (client chosen by
    /// `direction`) and finally to [`ConnectionTuple::placeholder`].
    pub fn resolve(
        &self,
        flow_id: FlowId,
        direction: Direction,
        source: Option<SocketAddr>,
        destination: Option<SocketAddr>,
    ) -> ConnectionTuple {
        if let Some(tuple) = self.connections.get(&flow_id) {
            return tuple.clone();
        }

        match (source, destination) {
            (Some(src), Some(dst)) => {
                let tuple = ConnectionTuple::from_delivery(src, dst, direction);
                trace!("flow={} not announced, using delivery addressing {}", flow_id, tuple);
                tuple
            }
            _ => {
                debug!("flow={} has no connection metadata, using placeholder tuple", flow_id);
                ConnectionTuple::placeholder()
            }
        }
    }

    /// Tuple recorded for `flow_id`, without any fallback.
    pub fn lookup(&self, flow_id: FlowId) -> Option<&ConnectionTuple> {
        self.connections.get(&flow_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple() -> ConnectionTuple {
        ConnectionTuple::new("10.0.0.1", 51000, "10.0.0.2", 80)
    }

    #[test]
    fn announced_flow_resolves_to_stored_tuple() {
        let mut resolver = FlowResolver::new();
        resolver.on_connection_start(FlowId(7), tuple());

        // Delivery addressing is ignored once the flow is known.
        let src: SocketAddr = "1.1.1.1:1".parse().unwrap();
        let dst: SocketAddr = "2.2.2.2:2".parse().unwrap();
        let resolved = resolver.resolve(FlowId(7), Direction::ServerToClient, Some(src), Some(dst));
        assert_eq!(resolved, tuple());
    }

    #[test]
    fn end_removes_mapping_and_is_idempotent() {
        let mut resolver = FlowResolver::new();
        resolver.on_connection_start(FlowId(1), tuple());
        assert_eq!(resolver.len(), 1);

        assert_eq!(resolver.on_connection_end(FlowId(1)), Some(tuple()));
        assert!(resolver.is_empty());
        assert_eq!(resolver.on_connection_end(FlowId(1)), None);
        assert_eq!(resolver.on_connection_end(FlowId(99)), None);
    }

    #[test]
    fn unknown_flow_falls_back_to_delivery_addressing() {
        let resolver = FlowResolver::new();
        let server: SocketAddr = "10.0.0.2:80".parse().unwrap();
        let client: SocketAddr = "10.0.0.1:51000".parse().unwrap();

        let resolved = resolver.resolve(FlowId(3), Direction::ServerToClient, Some(server), Some(client));
        assert_eq!(resolved, tuple());
    }

    #[test]
    fn unknown_flow_without_addressing_gets_placeholder() {
        let resolver = FlowResolver::new();
        let src: SocketAddr = "10.0.0.1:51000".parse().unwrap();

        let resolved = resolver.resolve(FlowId(3), Direction::ClientToServer, Some(src), None);
        assert!(resolved.is_placeholder());
        assert_eq!(resolved.client_port, 0);
    }

    #[test]
    fn reused_flow_id_replaces_previous_tuple() {
        let mut resolver = FlowResolver::new();
        resolver.on_connection_start(FlowId(5), tuple());
        let other = ConnectionTuple::new("10.0.0.9", 40000, "10.0.0.2", 80);
        resolver.on_connection_start(FlowId(5), other.clone());

        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.lookup(FlowId(5)), Some(&other));
    }
}
