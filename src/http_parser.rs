//! HTTP/1.x message reconstruction from delivered byte buffers.

pub mod message;
pub mod parser;
pub mod status;

pub use message::{HttpMessage, MessageKind};
pub use parser::{looks_like_http, parse};
