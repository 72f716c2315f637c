use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace, warn};
use regex::Regex;

const FORWARDED_FOR_PATTERN: &str = r#"for=(?P<ip>[^;,]+)"#;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

/// Extracts the first `for=` address from a `Forwarded` header, e.g. `for=192.0.2.60;proto=http` or
/// `for="[2001:db8::1]"`.
fn parse_forwarded_for(value: &str) -> Option<IpAddr> {
    let re = Regex::new(FORWARDED_FOR_PATTERN).ok()?;
    let ip = re.captures(value)?.name("ip")?.as_str();
    let ip = ip.trim().trim_matches('"').trim_start_matches('[').trim_end_matches(']');
    IpAddr::from_str(ip).ok()
}

/// Decides whether a request from `peer` may pass. No whitelist means everyone may.
pub fn is_whitelisted(peer: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if !allowed {
                warn!("💻️ Request from {ip} is not on the whitelist");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("💻️ No IP address found for the remote peer, denying access.");
            false
        },
    }
}
