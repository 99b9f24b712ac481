//! Caller-identity resolution.
//!
//! The identifier is only used to bucket rate-limit state; it is trusted
//! input from a potentially untrusted proxy and is deliberately not validated
//! as a well-formed address.

use http::HeaderMap;
use std::net::SocketAddr;

/// Derive a stable caller identifier from proxy headers or the transport peer.
///
/// Precedence: first `X-Forwarded-For` entry (trimmed), then `X-Real-IP`
/// verbatim, then the peer address, then the literal `"unknown"`.
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.7:4242".parse().unwrap())
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9 , 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(resolve(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn real_ip_used_when_no_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(resolve(&headers, peer()), "198.51.100.2");
    }

    #[test]
    fn falls_back_to_peer_address() {
        assert_eq!(resolve(&HeaderMap::new(), peer()), "192.0.2.7");
    }

    #[test]
    fn unknown_when_nothing_available() {
        assert_eq!(resolve(&HeaderMap::new(), None), "unknown");
    }
}
