//! Session management core module.
//!
//! One [`session::Session`] per connection tuple, holding the ordered
//! [`transaction::Transaction`]s that pair requests with responses. The
//! [`session_manager::SessionManager`] is the only writer; other threads read through
//! [`session_manager::SessionSnapshots`].

/// Submodule for session data structures and the pairing state machine.
pub mod session;
/// Submodule for the session correlator and its read-only snapshot handle.
pub mod session_manager;
/// Submodule for request/response pairs.
pub mod transaction;

pub use session::{PairingOutcome, Session};
pub use session_manager::{MessageOutcome, SessionClosed, SessionManager, SessionSnapshots};
pub use transaction::Transaction;

/// Lifecycle of a session.
///
/// Variants:
/// - `Active`: the session accepts new messages.
/// - `Closed`: terminal and read-only, reached through an explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Closed,
}
