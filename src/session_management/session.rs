use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::transaction::Transaction;
use super::SessionStatus;
use crate::error_handling::types::SessionError;
use crate::http_parser::HttpMessage;
use crate::network::types::ConnectionTuple;

/// What happened to a message handed to a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// A request opened a new transaction. `superseded` is set when an unanswered
    /// request was still open and is now orphaned for good.
    Opened { superseded: bool },
    /// A response completed the open transaction.
    Paired { duration: Option<Duration> },
    /// A response arrived with no open request and was stored on its own.
    Orphaned,
}

/// All traffic observed on one connection tuple.
///
/// # Fields Overview
///
/// - `id`: deterministic key derived from `tuple`
/// - `start_time` / `end_time`: first and most recent message timestamps, unset until
///   the first message. `end_time` never moves backwards.
/// - `transactions`: arrival-ordered request/response pairs
/// - `open_transaction`: index of the one transaction that can still receive a response
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    tuple: ConnectionTuple,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    status: SessionStatus,
    transactions: Vec<Transaction>,
    open_transaction: Option<usize>,
}

impl Session {
    pub fn new(tuple: ConnectionTuple) -> Self {
        Self {
            id: tuple.session_key(),
            tuple,
            start_time: None,
            end_time: None,
            status: SessionStatus::Active,
            transactions: Vec::new(),
            open_transaction: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tuple(&self) -> &ConnectionTuple {
        &self.tuple
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.status == SessionStatus::Closed
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn open_transaction(&self) -> Option<&Transaction> {
        self.open_transaction.and_then(|i| self.transactions.get(i))
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Appends a request-only transaction and makes it the open one.
    pub fn add_request(
        &mut self,
        msg: HttpMessage,
        ts: DateTime<Utc>,
    ) -> Result<PairingOutcome, SessionError> {
        self.ensure_active()?;
        self.touch(ts);

        let superseded = self.open_transaction().is_some_and(|tx| !tx.has_response());
        if superseded {
            debug!(
                "Session {}: unanswered request superseded, left orphaned",
                self.id
            );
        }

        debug!(
            "Session {}: Added request {} {}",
            self.id,
            msg.method(),
            msg.uri()
        );
        self.transactions.push(Transaction::from_request(msg, ts));
        self.open_transaction = Some(self.transactions.len() - 1);

        Ok(PairingOutcome::Opened { superseded })
    }

    /// Attaches a response to the open transaction, or stores it response-only.
    pub fn add_response(
        &mut self,
        msg: HttpMessage,
        ts: DateTime<Utc>,
    ) -> Result<PairingOutcome, SessionError> {
        self.ensure_active()?;
        self.touch(ts);

        let open = self
            .open_transaction
            .take()
            .and_then(|i| self.transactions.get_mut(i))
            .filter(|tx| !tx.has_response());

        match open {
            Some(tx) => {
                debug!(
                    "Session {}: Paired response {} with request {}",
                    self.id,
                    msg.status_code(),
                    tx.request().map(|r| r.uri()).unwrap_or_default()
                );
                tx.set_response(msg, ts);
                Ok(PairingOutcome::Paired {
                    duration: tx.duration(),
                })
            }
            None => {
                warn!(
                    "Session {}: Received response {} without matching request",
                    self.id,
                    msg.status_code()
                );
                self.transactions.push(Transaction::from_response(msg, ts));
                Ok(PairingOutcome::Orphaned)
            }
        }
    }

    /// Marks the session closed. Returns `false` when it already was.
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.status = SessionStatus::Closed;
        debug!(
            "Session {} closed with {} transactions",
            self.id,
            self.transactions.len()
        );
        true
    }

    /// Copy of this session with `f` applied to every stored message.
    pub fn map_messages<F>(&self, f: F) -> Self
    where
        F: Fn(&HttpMessage) -> HttpMessage,
    {
        Self {
            transactions: self
                .transactions
                .iter()
                .map(|tx| tx.map_messages(&f))
                .collect(),
            ..self.clone()
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed(self.id.clone()));
        }
        Ok(())
    }

    fn touch(&mut self, ts: DateTime<Utc>) {
        if self.start_time.is_none() {
            self.start_time = Some(ts);
        }
        self.end_time = Some(self.end_time.map_or(ts, |end| end.max(ts)));
    }
}
