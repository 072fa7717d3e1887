use std::fmt;
use std::str::FromStr;

use crate::base::error::ConnectError;

/// A `host:port` connection target.
///
/// The host is kept as a string because resolution happens inside the raw
/// connector, not here. IPv6 literals use bracket form (`[::1]:50051`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port }
    }

    /// The `host:port` authority string, suitable for a CONNECT request
    /// line or a Host header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

impl FromStr for Target {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Bracketed IPv6 literal: [::1]:50051
        if let Some(rest) = s.strip_prefix('[') {
            let (host, port) = rest
                .split_once("]:")
                .ok_or_else(|| ConnectError::connect(format!("invalid target: {s}")))?;
            let port = port
                .parse::<u16>()
                .map_err(|_| ConnectError::connect(format!("invalid port in target: {s}")))?;
            return Ok(Target::new(host, port));
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConnectError::connect(format!("target missing port: {s}")))?;
        if host.is_empty() || host.contains(':') {
            return Err(ConnectError::connect(format!("invalid target: {s}")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ConnectError::connect(format!("invalid port in target: {s}")))?;
        Ok(Target::new(host, port))
    }
}
