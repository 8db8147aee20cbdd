use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::data_capture::types::Direction;

/// Address reported when the resolver has nothing better.
pub const UNKNOWN_HOST: &str = "unknown";

/// Collaborator-assigned identifier of one TCP connection, only stable while it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u32);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two endpoints of a logical connection, with the initiator as client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionTuple {
    pub client_ip: String,
    pub client_port: u16,
    pub server_ip: String,
    pub server_port: u16,
}

impl ConnectionTuple {
    pub fn new(
        client_ip: impl Into<String>,
        client_port: u16,
        server_ip: impl Into<String>,
        server_port: u16,
    ) -> Self {
        Self {
            client_ip: client_ip.into(),
            client_port,
            server_ip: server_ip.into(),
            server_port,
        }
    }

    /// Tuple from a connection-start notification: the initiating side is the client.
    pub fn from_initiator(client: SocketAddr, server: SocketAddr) -> Self {
        Self::new(
            client.ip().to_string(),
            client.port(),
            server.ip().to_string(),
            server.port(),
        )
    }

    /// Tuple derived from a single delivery's addressing.
    ///
    /// Bytes travelling client→server have the client as source; the reverse
    /// direction has it as destination.
    pub fn from_delivery(source: SocketAddr, destination: SocketAddr, direction: Direction) -> Self {
        if direction.is_client_to_server() {
            Self::from_initiator(source, destination)
        } else {
            Self::from_initiator(destination, source)
        }
    }

    pub fn placeholder() -> Self {
        Self::new(UNKNOWN_HOST, 0, UNKNOWN_HOST, 0)
    }

    pub fn is_placeholder(&self) -> bool {
        self.client_ip == UNKNOWN_HOST && self.server_ip == UNKNOWN_HOST
    }

    /// Deterministic session key: `{clientIp}:{clientPort}->{serverIp}:{serverPort}`.
    pub fn session_key(&self) -> String {
        format!(
            "{}:{}->{}:{}",
            self.client_ip, self.client_port, self.server_ip, self.server_port
        )
    }
}

impl fmt::Display for ConnectionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.session_key())
    }
}
