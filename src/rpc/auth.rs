//! HTTP Basic credential checks.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::config::setup::Port;
use crate::http::request::HttpRequest;

/// Whether the request may use this port at all.
///
/// Ports without configured credentials accept everyone. Otherwise the
/// request must carry `Authorization: Basic <base64(user:password)>` with
/// an exact match on both parts; any structural defect is unauthorized.
pub fn authorized(port: &Port, request: &HttpRequest) -> bool {
    let (user, password) = match (port.user.as_deref(), port.password.as_deref()) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => return true,
    };

    let Some(value) = request.header("Authorization") else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = BASE64.decode(encoded.trim()) else {
        return false;
    };
    let Ok(pair) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((got_user, got_password)) = pair.split_once(':') else {
        return false;
    };

    got_user == user && got_password == password
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn port_with(user: Option<&str>, password: Option<&str>) -> Port {
        Port {
            name: "rpc".into(),
            ip: "127.0.0.1".parse().unwrap(),
            port: 5005,
            protocol: BTreeSet::new(),
            user: user.map(String::from),
            password: password.map(String::from),
            admin_ips: Vec::new(),
            admin_user: None,
            admin_password: None,
            secure_gateway: None,
            ssl_key: None,
            ssl_cert: None,
            ssl_chain: None,
            limit: 0,
        }
    }

    fn request_with_auth(value: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: "POST".into(),
            headers: value
                .map(|v| vec![("Authorization".to_string(), v.to_string())])
                .unwrap_or_default(),
            ..HttpRequest::default()
        }
    }

    #[test]
    fn open_port_authorizes_everyone() {
        let port = port_with(None, None);
        assert!(authorized(&port, &request_with_auth(None)));
        assert!(authorized(&port, &request_with_auth(Some("Basic garbage"))));
    }

    #[test]
    fn exact_credentials_round_trip() {
        let port = port_with(Some("user"), Some("pass"));
        // base64("user:pass")
        assert!(authorized(
            &port,
            &request_with_auth(Some("Basic dXNlcjpwYXNz"))
        ));
    }

    #[test]
    fn any_mutation_of_the_encoding_fails() {
        let port = port_with(Some("user"), Some("pass"));
        let encoded = "dXNlcjpwYXNz";

        for i in 0..encoded.len() {
            let mut mutated: Vec<u8> = encoded.as_bytes().to_vec();
            mutated[i] = if mutated[i] == b'A' { b'B' } else { b'A' };
            let header = format!("Basic {}", String::from_utf8(mutated).unwrap());
            assert!(
                !authorized(&port, &request_with_auth(Some(&header))),
                "mutation at {} should fail",
                i
            );
        }
    }

    #[test]
    fn structural_defects_are_unauthorized() {
        let port = port_with(Some("user"), Some("pass"));

        // Missing header.
        assert!(!authorized(&port, &request_with_auth(None)));
        // Wrong scheme.
        assert!(!authorized(
            &port,
            &request_with_auth(Some("Bearer dXNlcjpwYXNz"))
        ));
        // No colon in the decoded pair: base64("userpass").
        assert!(!authorized(
            &port,
            &request_with_auth(Some("Basic dXNlcnBhc3M="))
        ));
        // Not base64 at all.
        assert!(!authorized(&port, &request_with_auth(Some("Basic %%%%"))));
    }
}
