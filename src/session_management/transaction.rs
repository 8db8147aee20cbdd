use chrono::{DateTime, Duration, Utc};

use crate::http_parser::HttpMessage;

/// One request and the response paired with it. Either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    request: Option<HttpMessage>,
    request_time: Option<DateTime<Utc>>,
    response: Option<HttpMessage>,
    response_time: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn from_request(msg: HttpMessage, ts: DateTime<Utc>) -> Self {
        Self {
            request: Some(msg),
            request_time: Some(ts),
            ..Default::default()
        }
    }

    pub fn from_response(msg: HttpMessage, ts: DateTime<Utc>) -> Self {
        Self {
            response: Some(msg),
            response_time: Some(ts),
            ..Default::default()
        }
    }

    pub(crate) fn set_response(&mut self, msg: HttpMessage, ts: DateTime<Utc>) {
        self.response = Some(msg);
        self.response_time = Some(ts);
    }

    pub fn request(&self) -> Option<&HttpMessage> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&HttpMessage> {
        self.response.as_ref()
    }

    pub fn request_time(&self) -> Option<DateTime<Utc>> {
        self.request_time
    }

    pub fn response_time(&self) -> Option<DateTime<Utc>> {
        self.response_time
    }

    pub fn has_request(&self) -> bool {
        self.request.is_some()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.has_request() && self.has_response()
    }

    /// `response_time - request_time`, only once both sides are present.
    pub fn duration(&self) -> Option<Duration> {
        match (self.request_time, self.response_time) {
            (Some(req), Some(resp)) if self.is_complete() => Some(resp - req),
            _ => None,
        }
    }

    /// Copy of this transaction with `f` applied to every message it holds.
    pub fn map_messages<F>(&self, f: F) -> Self
    where
        F: Fn(&HttpMessage) -> HttpMessage,
    {
        Self {
            request: self.request.as_ref().map(&f),
            request_time: self.request_time,
            response: self.response.as_ref().map(&f),
            response_time: self.response_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::types::Direction;
    use crate::http_parser::parse;

    #[test]
    fn duration_needs_both_sides() {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t1 = t0 + Duration::milliseconds(250);

        let mut tx = Transaction::from_request(
            parse(b"GET / HTTP/1.1\r\n\r\n", Direction::ClientToServer),
            t0,
        );
        assert!(!tx.is_complete());
        assert_eq!(tx.duration(), None);

        tx.set_response(
            parse(b"HTTP/1.1 200 OK\r\n\r\n", Direction::ServerToClient),
            t1,
        );
        assert!(tx.is_complete());
        assert_eq!(tx.duration(), Some(Duration::milliseconds(250)));
    }

    #[test]
    fn response_only_has_no_duration() {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let tx = Transaction::from_response(
            parse(b"HTTP/1.1 204 No Content\r\n\r\n", Direction::ServerToClient),
            t0,
        );
        assert!(!tx.has_request());
        assert!(tx.has_response());
        assert_eq!(tx.duration(), None);
    }
}
