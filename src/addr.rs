//! Strict `host:port` resolution.
//!
//! Stricter than `ToSocketAddrs`: the host must be a literal IP address
//! (no DNS), and neither host nor port may be empty.

use std::net::{IpAddr, SocketAddr};

use crate::error::AddressError;

/// Resolve an address string into a socket address.
///
/// Accepts `1.2.3.4:80` and `[::1]:80`. Unbracketed IPv6 literals such as
/// `::1:80` are also accepted for compatibility with older tor releases that
/// did not bracket them: everything after the last colon is taken as the port.
pub fn resolve_address(input: &str) -> Result<SocketAddr, AddressError> {
    let (host, port) = match split_host_port(input) {
        Ok(parts) => parts,
        Err(reason) => legacy_split(input).ok_or_else(|| AddressError::new(input, reason))?,
    };

    if host.is_empty() {
        return Err(AddressError::new(input, "address lacks a host part"));
    }
    if port.is_empty() {
        return Err(AddressError::new(input, "address lacks a port part"));
    }

    let ip: IpAddr = host
        .parse()
        .map_err(|_| AddressError::new(input, "host is not a literal IP address"))?;
    let port = parse_port(&port).ok_or_else(|| AddressError::new(input, "invalid port"))?;

    Ok(SocketAddr::new(ip, port))
}

/// Retry the split after bracketing everything before the last colon.
fn legacy_split(input: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = input.split(':').collect();
    if parts.len() <= 2 {
        return None;
    }
    let (port, host) = parts.split_last()?;
    let bracketed = format!("[{}]:{}", host.join(":"), port);
    split_host_port(&bracketed).ok()
}

/// Split `host:port` or `[host]:port`, mirroring the usual socket-library rules.
fn split_host_port(input: &str) -> Result<(String, String), &'static str> {
    let (host, port) = if let Some(rest) = input.strip_prefix('[') {
        let end = rest.find(']').ok_or("missing ']' in address")?;
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or("missing port after ']'")?;
        (host, port)
    } else {
        let idx = input.rfind(':').ok_or("missing port in address")?;
        let host = &input[..idx];
        if host.contains(':') {
            return Err("too many colons in address");
        }
        (host, &input[idx + 1..])
    };

    if host.contains('[') || host.contains(']') || port.contains('[') || port.contains(']') {
        return Err("unexpected bracket in address");
    }

    Ok((host.to_string(), port.to_string()))
}

fn parse_port(port: &str) -> Option<u16> {
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}
