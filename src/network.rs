//! Connection identity: flow ids, connection tuples, the flow resolver and the
//! server-port filter applied before messages reach the correlator.

pub mod connection_filter;
pub mod flow_resolver;
pub mod types;

pub use connection_filter::ConnectionFilter;
pub use flow_resolver::FlowResolver;
pub use types::{ConnectionTuple, FlowId};
