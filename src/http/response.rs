//! Raw HTTP reply construction.

/// Build a complete HTTP/1.1 reply.
///
/// Successful RPC replies carry a JSON body; every rejection path carries a
/// short plain-text message. RPC-level errors still travel inside a 200
/// body, so callers decide the status independently of the payload.
pub fn http_reply(status: u16, body: &str) -> Vec<u8> {
    let content_type = if status == 200 {
        "application/json"
    } else {
        "text/plain"
    };

    format!(
        "HTTP/1.1 {} {}\r\nServer: ledger-gateway\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        status,
        reason_phrase(status),
        content_type,
        body.len(),
        body
    )
    .into_bytes()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
