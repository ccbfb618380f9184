//! Parsing of the comma-separated listen-address lists used in
//! configuration (`"[::1]:6677, 10.0.0.1"`).

use std::net::{IpAddr, SocketAddr};

/// Error parsing a listen-address list entry.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    #[error("\"{0}\" is not a valid host[:port] address")]
    Invalid(String),
}

/// Parses a comma-separated list of `host`, `host:port`, or `[ipv6]:port`
/// entries, applying `default_port` to any entry that omits one.
pub fn parse_addrs(spec: &str, default_port: u16) -> Result<Vec<SocketAddr>, AddrError> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| parse_one(entry, default_port))
        .collect()
}

fn parse_one(entry: &str, default_port: u16) -> Result<SocketAddr, AddrError> {
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(|| AddrError::Invalid(entry.to_string()))?;
        let ip: IpAddr = host.parse().map_err(|_| AddrError::Invalid(entry.to_string()))?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| AddrError::Invalid(entry.to_string()))?,
            None => default_port,
        };
        return Ok(SocketAddr::new(ip, port));
    }

    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let (host, port_str) = entry.split_once(':').ok_or_else(|| AddrError::Invalid(entry.to_string()))?;
    let ip: IpAddr = host.parse().map_err(|_| AddrError::Invalid(entry.to_string()))?;
    let port: u16 = port_str.parse().map_err(|_| AddrError::Invalid(entry.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}
