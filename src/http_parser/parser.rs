//! # Tolerant HTTP/1.x parser
//!
//! Turns one delivered buffer into an [`HttpMessage`]. The parser never fails: anything
//! it cannot make sense of comes back as [`MessageKind::Unknown`], so a single garbage
//! segment cannot abort the stream.
//!
//! ## Limitations
//!
//! - Each buffer is parsed on its own; a message split across deliveries is not
//!   reassembled.
//! - `Content-Length` and chunked framing are not enforced; the body is everything
//!   after the header terminator.
//! - Classification is a substring/prefix heuristic isolated in [`looks_like_http`].

use std::collections::BTreeMap;

use log::trace;

use super::message::{HttpMessage, MessageKind};
use super::status::default_reason_phrase;
use crate::data_capture::types::Direction;

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const VERSION_PREFIX: &str = "HTTP/";

const KNOWN_METHODS: [&[u8]; 7] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
    b"PATCH ",
];

/// Cheap pre-filter deciding whether a buffer is worth parsing.
///
/// Accepts buffers containing `HTTP/` anywhere, or starting with a known method
/// token. A body that merely mentions `HTTP/` passes too; a stricter grammar check
/// would replace this function without touching callers.
pub fn looks_like_http(buffer: &[u8]) -> bool {
    find(buffer, VERSION_PREFIX.as_bytes(), 0).is_some()
        || KNOWN_METHODS.iter().any(|method| buffer.starts_with(method))
}

/// Parses `buffer` delivered in `direction`.
pub fn parse(buffer: &[u8], direction: Direction) -> HttpMessage {
    let mut msg = HttpMessage::unknown(buffer.len(), direction);

    if !looks_like_http(buffer) {
        return msg;
    }

    let Some(first_line_end) = find(buffer, CRLF, 0) else {
        trace!("no CRLF in {} byte buffer, not an HTTP message", buffer.len());
        return msg;
    };

    let start_line = &buffer[..first_line_end];
    let line = String::from_utf8_lossy(start_line);

    let Some((first, rest)) = next_token(&line) else {
        return msg;
    };

    if let Some(version) = first.strip_prefix(VERSION_PREFIX) {
        msg.kind = MessageKind::Response;
        msg.version = version.to_string();

        let (status, remainder) = next_token(rest).unwrap_or(("", ""));
        // Numeric but outside the HTTP range (e.g. 70000) is kept as seen; anything else is 0.
        msg.status_code = status.parse().unwrap_or(0);

        let reason = remainder.strip_prefix(' ').unwrap_or(remainder);
        let reason = reason.trim_end_matches([' ', '\r']);
        msg.reason_phrase = if reason.is_empty() {
            default_reason_phrase(msg.status_code).to_string()
        } else {
            reason.to_string()
        };
    } else {
        msg.kind = MessageKind::Request;
        msg.method = first.to_string();

        let (uri, remainder) = next_token(rest).unwrap_or(("", ""));
        msg.uri = uri.to_string();

        if let Some((version, _)) = next_token(remainder) {
            if let Some(version) = version.strip_prefix(VERSION_PREFIX) {
                msg.version = version.to_string();
            }
        }
    }
    msg.start_line = start_line.to_vec();

    if msg.direction.is_client_to_server() != msg.is_request() {
        trace!(
            "{:?} parsed from a {:?} delivery",
            msg.kind,
            msg.direction
        );
    }

    // The search starts at the status line's own CRLF, so `GET / HTTP/1.1\r\n\r\nbody`
    // has no headers but still keeps `body`.
    if let Some(terminator) = find(buffer, HEADER_TERMINATOR, first_line_end) {
        let headers_start = first_line_end + CRLF.len();
        if terminator > headers_start {
            msg.headers = parse_headers(&buffer[headers_start..terminator]);
        }
        msg.body = buffer[terminator + HEADER_TERMINATOR.len()..].to_vec();
    }

    msg
}

fn parse_headers(section: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut headers = BTreeMap::new();
    for line in section.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let name = String::from_utf8_lossy(&line[..colon]).into_owned();
        let value = trim_blanks(&line[colon + 1..]).to_vec();
        headers.insert(name, value);
    }
    headers
}

fn trim_blanks(value: &[u8]) -> &[u8] {
    let is_blank = |b: &u8| *b == b' ' || *b == b'\t';
    let start = value.iter().position(|b| !is_blank(b)).unwrap_or(value.len());
    let end = value.iter().rposition(|b| !is_blank(b)).map_or(start, |i| i + 1);
    &value[start..end]
}

/// Splits off the next whitespace-delimited token; the remainder starts right after it.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some(s.split_at(end))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &str) -> HttpMessage {
        parse(raw.as_bytes(), Direction::ClientToServer)
    }

    fn response(raw: &str) -> HttpMessage {
        parse(raw.as_bytes(), Direction::ServerToClient)
    }

    #[test]
    fn parses_request_with_headers_and_body() {
        let raw = "POST /api/login HTTP/1.1\r\nHost: example.com\r\nContent-Type:  application/json\t\r\n\r\n{\"user\":\"bob\"}";
        let msg = request(raw);

        assert_eq!(msg.kind(), MessageKind::Request);
        assert_eq!(msg.method(), "POST");
        assert_eq!(msg.uri(), "/api/login");
        assert_eq!(msg.version(), "1.1");
        assert_eq!(msg.header_str("Host"), Some("example.com"));
        assert_eq!(msg.content_type(), Some("application/json"));
        assert_eq!(msg.body(), b"{\"user\":\"bob\"}");
        assert_eq!(msg.len(), raw.len());
    }

    #[test]
    fn request_line_round_trips() {
        for (method, uri, version) in [
            ("GET", "/", "1.1"),
            ("DELETE", "/items/42?force=true", "1.0"),
            ("OPTIONS", "*", "1.1"),
            ("PATCH", "/a/b%20c", "2"),
        ] {
            let line = format!("{} {} HTTP/{}", method, uri, version);
            let msg = request(&format!("{}\r\nHost: x\r\n\r\n", line));
            assert_eq!(msg.first_line(), line);
            assert_eq!(msg.raw_start_line(), line.as_bytes());
        }
    }

    #[test]
    fn parses_response_status_line() {
        let msg = response("HTTP/1.1 201 Created\r\nLocation: /items/1\r\n\r\n");
        assert_eq!(msg.kind(), MessageKind::Response);
        assert_eq!(msg.version(), "1.1");
        assert_eq!(msg.status_code(), 201);
        assert_eq!(msg.reason_phrase(), "Created");
        assert_eq!(msg.first_line(), "HTTP/1.1 201 Created");
    }

    #[test]
    fn multi_word_reason_phrase_is_kept() {
        let msg = response("HTTP/1.1 500 Something Went Wrong  \r\n\r\n");
        assert_eq!(msg.reason_phrase(), "Something Went Wrong");
    }

    #[test]
    fn missing_reason_uses_default_table() {
        assert_eq!(response("HTTP/1.1 404\r\n\r\n").reason_phrase(), "Not Found");
        assert_eq!(response("HTTP/1.1 299 \r\n\r\n").reason_phrase(), "Unknown");
    }

    #[test]
    fn bad_status_code_defaults_to_zero() {
        let msg = response("HTTP/1.1 abc\r\n\r\n");
        assert_eq!(msg.kind(), MessageKind::Response);
        assert_eq!(msg.status_code(), 0);
        assert_eq!(msg.reason_phrase(), "Unknown");

        let msg = response("HTTP/1.0\r\n\r\n");
        assert_eq!(msg.status_code(), 0);
    }

    #[test]
    fn out_of_range_status_code_is_kept() {
        let msg = response("HTTP/1.1 70000 Odd\r\n\r\n");
        assert_eq!(msg.status_code(), 70000);
        assert_eq!(msg.reason_phrase(), "Odd");

        let msg = response("HTTP/1.1 -1\r\n\r\n");
        assert_eq!(msg.status_code(), 0);
    }

    #[test]
    fn status_line_only_without_terminator() {
        let msg = request("GET /partial HTTP/1.1\r\nHost: example.com\r\n");
        assert_eq!(msg.kind(), MessageKind::Request);
        assert!(msg.headers().is_empty());
        assert!(msg.body().is_empty());
    }

    #[test]
    fn no_headers_still_yields_body() {
        let msg = response("HTTP/1.1 200 OK\r\n\r\nhello");
        assert!(msg.headers().is_empty());
        assert_eq!(msg.body(), b"hello");
    }

    #[test]
    fn duplicate_headers_last_wins_case_preserved() {
        let msg = response("HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nX-Empty:\r\nno colon here\r\n\r\n");
        assert_eq!(msg.headers().len(), 2);
        assert_eq!(msg.header("Set-Cookie"), Some(&b"b=2"[..]));
        assert_eq!(msg.header("set-cookie"), Some(&b"b=2"[..]));
        assert_eq!(msg.header("X-Empty"), Some(&b""[..]));
        assert!(msg.headers().contains_key("Set-Cookie"));
    }

    #[test]
    fn header_value_split_at_first_colon() {
        let msg = request("GET / HTTP/1.1\r\nHost: example.com:8080\r\n\r\n");
        assert_eq!(msg.header_str("Host"), Some("example.com:8080"));
    }

    #[test]
    fn request_without_version_token() {
        let msg = request("GET /legacy\r\n\r\n");
        assert_eq!(msg.kind(), MessageKind::Request);
        assert_eq!(msg.uri(), "/legacy");
        assert_eq!(msg.version(), "");
    }

    #[test]
    fn non_http_text_is_unknown() {
        let msg = request("SSH-2.0-OpenSSH_9.6\r\n");
        assert_eq!(msg.kind(), MessageKind::Unknown);
        assert!(!msg.is_valid());
        assert_eq!(msg.first_line(), "");
    }

    #[test]
    fn missing_crlf_is_unknown() {
        assert_eq!(request("GET / HTTP/1.1").kind(), MessageKind::Unknown);
    }

    #[test]
    fn lowercase_method_is_not_classified() {
        assert_eq!(request("get / \r\n\r\n").kind(), MessageKind::Unknown);
    }

    #[test]
    fn arbitrary_binary_is_unknown() {
        let mut seed: u32 = 0x2545_f491;
        for len in [0usize, 1, 7, 64, 1500, 4096] {
            let mut buf = Vec::with_capacity(len);
            for _ in 0..len {
                // high bit set: no ASCII method token or version marker can appear
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                buf.push((seed as u8) | 0x80);
            }
            let msg = parse(&buf, Direction::ServerToClient);
            assert_eq!(msg.kind(), MessageKind::Unknown);
            assert_eq!(msg.len(), len);
        }
    }

    #[test]
    fn embedded_http_marker_passes_the_heuristic() {
        // Known imprecision: any buffer mentioning HTTP/ is considered.
        assert!(looks_like_http(b"\x00\x01 see HTTP/1.1 spec"));
        let msg = parse(b"random text HTTP/1.1\r\n", Direction::ClientToServer);
        assert_eq!(msg.kind(), MessageKind::Request);
        assert_eq!(msg.method(), "random");
    }

    #[test]
    fn trim_blanks_handles_all_blank_values() {
        assert_eq!(trim_blanks(b" \t "), b"");
        assert_eq!(trim_blanks(b"\tv a\t"), b"v a");
    }

    #[test]
    fn find_respects_offset() {
        assert_eq!(find(b"abab", b"ab", 1), Some(2));
        assert_eq!(find(b"ab", b"abc", 0), None);
        assert_eq!(find(b"ab", b"a", 5), None);
    }
}
