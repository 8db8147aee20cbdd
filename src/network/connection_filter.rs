use super::types::ConnectionTuple;

/// Keeps only connections whose server port is in the configured list.
///
/// An empty list lets everything through.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    server_ports: Vec<u16>,
}

impl ConnectionFilter {
    pub fn new(server_ports: &[u16]) -> Self {
        Self {
            server_ports: server_ports.to_vec(),
        }
    }

    pub fn allows(&self, tuple: &ConnectionTuple) -> bool {
        self.server_ports.is_empty() || self.server_ports.contains(&tuple.server_port)
    }
}
