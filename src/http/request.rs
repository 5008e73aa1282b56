//! Inbound request parsing and inspection.
//!
//! # Responsibilities
//! - Incrementally parse an HTTP/1.1 request head from raw bytes
//! - Case-insensitive header lookup
//! - Keep-alive and upgrade semantics

use thiserror::Error;

/// Upper bound on distinct headers in one request head.
const MAX_HEADERS: usize = 32;

/// Error type for request parsing.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed http request: {0}")]
    Malformed(httparse::Error),

    #[error("request head too large")]
    HeadTooLarge,
}

/// One parsed inbound HTTP request.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    /// HTTP minor version (0 for HTTP/1.0, 1 for HTTP/1.1).
    pub version: u8,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Outcome of a head-parse attempt over a partially-read buffer.
#[derive(Debug)]
pub enum ParsedHead {
    /// More bytes are needed before the head is complete.
    Partial,
    /// Head parsed; `consumed` bytes of the buffer belong to it. The body
    /// (if any) follows and is read separately per `Content-Length`.
    Complete {
        request: HttpRequest,
        consumed: usize,
    },
}

impl HttpRequest {
    /// Parse a request head from the front of `buf`.
    pub fn parse_head(buf: &[u8]) -> Result<ParsedHead, HttpError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);

        let consumed = match parsed.parse(buf) {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) => return Ok(ParsedHead::Partial),
            Err(httparse::Error::TooManyHeaders) => return Err(HttpError::HeadTooLarge),
            Err(e) => return Err(HttpError::Malformed(e)),
        };

        let request = HttpRequest {
            method: parsed.method.unwrap_or_default().to_string(),
            target: parsed.path.unwrap_or_default().to_string(),
            version: parsed.version.unwrap_or(1),
            headers: parsed
                .headers
                .iter()
                .map(|h| {
                    (
                        h.name.to_string(),
                        String::from_utf8_lossy(h.value).trim().to_string(),
                    )
                })
                .collect(),
            body: Vec::new(),
        };

        Ok(ParsedHead::Complete { request, consumed })
    }

    /// First header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared body length; absent or unparseable means zero.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Whether the `Connection` header carries the given token.
    fn connection_has(&self, token: &str) -> bool {
        self.header("Connection")
            .map(|v| {
                v.split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    }

    /// Whether the client asked for the connection to outlive this
    /// exchange. HTTP/1.1 defaults to yes, HTTP/1.0 to no.
    pub fn keep_alive(&self) -> bool {
        if self.version == 0 {
            self.connection_has("keep-alive")
        } else {
            !self.connection_has("close")
        }
    }

    /// Whether the request declares the HTTP upgrade mechanism.
    pub fn is_upgrade(&self) -> bool {
        self.connection_has("upgrade")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> HttpRequest {
        match HttpRequest::parse_head(raw.as_bytes()).expect("head should parse") {
            ParsedHead::Complete { request, .. } => request,
            ParsedHead::Partial => panic!("head unexpectedly partial"),
        }
    }

    #[test]
    fn parses_method_target_and_headers() {
        let request = parse(
            "POST /rpc HTTP/1.1\r\nHost: node\r\nContent-Length: 12\r\n\r\n",
        );
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/rpc");
        assert_eq!(request.header("host"), Some("node"));
        assert_eq!(request.content_length(), 12);
    }

    #[test]
    fn incomplete_head_is_partial() {
        let outcome = HttpRequest::parse_head(b"POST / HTTP/1.1\r\nHost: n").unwrap();
        assert!(matches!(outcome, ParsedHead::Partial));
    }

    #[test]
    fn keep_alive_defaults_by_version() {
        assert!(parse("POST / HTTP/1.1\r\n\r\n").keep_alive());
        assert!(!parse("POST / HTTP/1.1\r\nConnection: close\r\n\r\n").keep_alive());

        let http10 = HttpRequest {
            version: 0,
            ..HttpRequest::default()
        };
        assert!(!http10.keep_alive());
    }

    #[test]
    fn upgrade_requires_connection_token() {
        let upgrading = parse("GET / HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n");
        assert!(upgrading.is_upgrade());

        let plain = parse("GET / HTTP/1.1\r\nUpgrade: websocket\r\n\r\n");
        assert!(!plain.is_upgrade());
    }

    #[test]
    fn garbage_is_malformed() {
        let outcome = HttpRequest::parse_head(b"\x00\x01\x02garbage\r\n\r\n");
        assert!(matches!(outcome, Err(HttpError::Malformed(_))));
    }
}
