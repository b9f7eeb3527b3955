//! Client identification for rate limiting

use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// Proxy headers consulted for the client address, in priority order
pub const FORWARDING_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "client-ip",
];

/// Addresses that are never counted
pub const WHITELIST: [&str; 3] = ["127.0.0.1", "::1", "localhost"];

const FALLBACK_IP: &str = "127.0.0.1";

/// Address and hashed fingerprint of the calling client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: String,
    pub fingerprint: String,
}

impl ClientIdentity {
    pub fn new(ip: impl Into<String>, user_agent: &str) -> Self {
        let ip = ip.into();
        let fingerprint = fingerprint(&ip, user_agent);
        Self { ip, fingerprint }
    }

    pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or("unknown");

        Self::new(client_ip(headers, peer), user_agent)
    }

    pub fn is_whitelisted(&self) -> bool {
        WHITELIST.contains(&self.ip.as_str())
    }

    /// First eight fingerprint characters, for display
    pub fn short_id(&self) -> String {
        let prefix: String = self.fingerprint.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

/// First public address found in the forwarding headers, else the peer
/// address, else loopback.
///
/// Only the first comma-separated entry of each header is considered.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in FORWARDING_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };

        let first = value.split(',').next().unwrap_or_default().trim();
        if let Ok(ip) = first.parse::<IpAddr>() {
            if is_public(&ip) {
                return ip.to_string();
            }
        }
    }

    peer.map(|addr| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|| FALLBACK_IP.to_string())
}

/// Not private, loopback, link-local or otherwise reserved
fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let first = v4.octets()[0];
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || first == 0
                || first >= 240)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (head & 0xfe00) == 0xfc00
                || (head & 0xffc0) == 0xfe80)
        }
    }
}

/// Hex SHA-256 of `ip|user_agent`
pub fn fingerprint(ip: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn peer(addr: &str) -> Option<SocketAddr> {
        Some(addr.parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let h = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(client_ip(&h, peer("10.0.0.2:4000")), "203.0.113.9");
    }

    #[test]
    fn test_private_forwarded_address_skipped() {
        let h = headers(&[
            ("x-forwarded-for", "192.168.1.4"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(client_ip(&h, None), "198.51.100.7");
    }

    #[test]
    fn test_peer_then_fallback() {
        let h = headers(&[("x-forwarded-for", "garbage")]);
        assert_eq!(client_ip(&h, peer("10.1.2.3:555")), "10.1.2.3");
        assert_eq!(client_ip(&h, None), "127.0.0.1");
    }

    #[test]
    fn test_mapped_loopback_peer_is_whitelisted() {
        let identity = ClientIdentity::from_request(&HeaderMap::new(), peer("[::ffff:127.0.0.1]:80"));
        assert_eq!(identity.ip, "127.0.0.1");
        assert!(identity.is_whitelisted());
    }

    #[test]
    fn test_same_address_and_agent_share_fingerprint() {
        let a = ClientIdentity::new("203.0.113.9", "curl/8.0");
        let b = ClientIdentity::new("203.0.113.9", "curl/8.0");
        let c = ClientIdentity::new("203.0.113.9", "firefox");

        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
        assert!(!a.is_whitelisted());
    }

    #[test]
    fn test_missing_user_agent_defaults_to_unknown() {
        let identity = ClientIdentity::from_request(&HeaderMap::new(), peer("203.0.113.1:1"));
        assert_eq!(identity.fingerprint, fingerprint("203.0.113.1", "unknown"));
        assert_eq!(identity.short_id().len(), 11);
    }
}
