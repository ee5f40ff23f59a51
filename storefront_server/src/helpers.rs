use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace};
use regex::Regex;
use sha2::Sha256;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    remote_ip_from_parts(
        req.headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok()),
        req.headers().get("Forwarded").and_then(|v| v.to_str().ok()),
        req.connection_info().peer_addr(),
        use_x_forwarded_for,
        use_forwarded,
    )
}

/// The header-level logic behind [`get_remote_ip`], usable from middleware that only has a `ServiceRequest`.
pub fn remote_ip_from_parts(
    x_forwarded_for: Option<&str>,
    forwarded: Option<&str>,
    peer_addr: Option<&str>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = x_forwarded_for.and_then(|s| s.split(',').next()).and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = forwarded
            .and_then(|v| forwarded_for_regex()?.captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str().trim_matches('"'))
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        trace!("Using Peer address for remote address: {peer_addr:?}");
        peer_addr.and_then(peer_ip)
    })
}

fn forwarded_for_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"for=(?P<ip>[^;,]+)"#).ok()).as_ref()
}

/// Accepts both bare addresses and `ip:port` socket addresses.
fn peer_ip(s: &str) -> Option<IpAddr> {
    IpAddr::from_str(s).ok().or_else(|| std::net::SocketAddr::from_str(s).ok().map(|a| a.ip()))
}

/// HMAC-SHA256 of `data` keyed with `secret`, base64-encoded.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(data);
    Some(base64::encode(mac.finalize().into_bytes()))
}
