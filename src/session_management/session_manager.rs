//! # Session/Transaction Correlator
//!
//! [`SessionManager`] is the single writer of the session table: the capture thread
//! feeds it every parsed message. Readers on other threads hold a
//! [`SessionSnapshots`] handle and only ever see whole sessions, copied out under the
//! same lock the writer mutates them under.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::info;

use super::session::{PairingOutcome, Session};
use crate::error_handling::types::SessionError;
use crate::http_parser::{HttpMessage, MessageKind};
use crate::network::types::ConnectionTuple;

type SessionTable = BTreeMap<String, Session>;

fn lock(table: &Mutex<SessionTable>) -> MutexGuard<'_, SessionTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of feeding one message to the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutcome {
    pub session_id: String,
    /// The message was the first one seen for this tuple.
    pub session_created: bool,
    pub pairing: PairingOutcome,
}

/// Summary of a session that just transitioned to closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosed {
    pub session_id: String,
    pub duration: Option<Duration>,
    pub transaction_count: usize,
}

impl SessionClosed {
    fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            duration: session.duration(),
            transaction_count: session.transaction_count(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<SessionTable>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a parsed message to [`Self::on_request`] or [`Self::on_response`].
    pub fn add_message(
        &mut self,
        tuple: &ConnectionTuple,
        msg: HttpMessage,
        ts: DateTime<Utc>,
    ) -> Result<MessageOutcome, SessionError> {
        match msg.kind() {
            MessageKind::Request => self.on_request(tuple, msg, ts),
            MessageKind::Response => self.on_response(tuple, msg, ts),
            MessageKind::Unknown => Err(SessionError::UnknownMessage),
        }
    }

    pub fn on_request(
        &mut self,
        tuple: &ConnectionTuple,
        msg: HttpMessage,
        ts: DateTime<Utc>,
    ) -> Result<MessageOutcome, SessionError> {
        self.with_session(tuple, |session| session.add_request(msg, ts))
    }

    pub fn on_response(
        &mut self,
        tuple: &ConnectionTuple,
        msg: HttpMessage,
        ts: DateTime<Utc>,
    ) -> Result<MessageOutcome, SessionError> {
        self.with_session(tuple, |session| session.add_response(msg, ts))
    }

    /// Closes the session stored under `key`.
    ///
    /// `None` when there is no such session or it was already closed.
    pub fn close_session(&mut self, key: &str) -> Option<SessionClosed> {
        let mut sessions = lock(&self.sessions);
        let session = sessions.get_mut(key)?;
        session
            .close()
            .then(|| SessionClosed::from_session(session))
    }

    /// Closes every session still active.
    pub fn close_all(&mut self) -> Vec<SessionClosed> {
        let mut sessions = lock(&self.sessions);
        sessions
            .values_mut()
            .filter_map(|session| session.close().then(|| SessionClosed::from_session(session)))
            .collect()
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn active_session_count(&self) -> usize {
        lock(&self.sessions)
            .values()
            .filter(|session| !session.is_closed())
            .count()
    }

    pub fn get(&self, key: &str) -> Option<Session> {
        lock(&self.sessions).get(key).cloned()
    }

    /// Read-only handle for another thread.
    pub fn snapshots(&self) -> SessionSnapshots {
        SessionSnapshots {
            sessions: Arc::clone(&self.sessions),
        }
    }

    fn with_session<F>(&mut self, tuple: &ConnectionTuple, f: F) -> Result<MessageOutcome, SessionError>
    where
        F: FnOnce(&mut Session) -> Result<PairingOutcome, SessionError>,
    {
        let key = tuple.session_key();
        let mut sessions = lock(&self.sessions);

        let session_created = !sessions.contains_key(&key);
        let session = sessions.entry(key.clone()).or_insert_with(|| {
            info!("New session: {}", key);
            Session::new(tuple.clone())
        });

        let pairing = f(session)?;
        Ok(MessageOutcome {
            session_id: key,
            session_created,
            pairing,
        })
    }
}

/// Cloneable read handle over the correlator's session table.
#[derive(Debug, Clone)]
pub struct SessionSnapshots {
    sessions: Arc<Mutex<SessionTable>>,
}

impl SessionSnapshots {
    /// Point-in-time copy of every session, ordered by session key.
    pub fn snapshot(&self) -> Vec<Session> {
        lock(&self.sessions).values().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.sessions)
            .values()
            .filter(|session| !session.is_closed())
            .count()
    }
}
