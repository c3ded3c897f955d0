//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Trait for types that provide access to HTTP headers and extensions.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract the client IP address.
///
/// With `trust_proxy`, the first hop of `X-Forwarded-For` wins when present
/// and parseable. Otherwise the peer address from `ConnectInfo` is used.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    trust_proxy: bool,
) -> Result<IpAddr, &'static str> {
    if trust_proxy {
        let forwarded = source
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return Ok(ip);
        }
    }

    source
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .ok_or("No client IP available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn request(forwarded: Option<&str>, peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = forwarded {
            builder = builder.header(FORWARDED_FOR, value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(addr) = peer {
            request
                .extensions_mut()
                .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        }
        request
    }

    #[test]
    fn test_peer_address() {
        let req = request(None, Some("10.0.0.7:5000"));
        assert_eq!(
            extract_client_ip(&req, false).unwrap().to_string(),
            "10.0.0.7"
        );
    }

    #[test]
    fn test_forwarded_ignored_without_trust() {
        let req = request(Some("203.0.113.9"), Some("10.0.0.7:5000"));
        assert_eq!(
            extract_client_ip(&req, false).unwrap().to_string(),
            "10.0.0.7"
        );
    }

    #[test]
    fn test_forwarded_first_hop() {
        let req = request(Some("203.0.113.9, 10.0.0.1"), Some("10.0.0.7:5000"));
        assert_eq!(
            extract_client_ip(&req, true).unwrap().to_string(),
            "203.0.113.9"
        );
    }

    #[test]
    fn test_garbage_forwarded_falls_back_to_peer() {
        let req = request(Some("not-an-ip"), Some("10.0.0.7:5000"));
        assert_eq!(
            extract_client_ip(&req, true).unwrap().to_string(),
            "10.0.0.7"
        );
    }

    #[test]
    fn test_no_ip() {
        let req = request(None, None);
        assert!(extract_client_ip(&req, true).is_err());
    }
}
