//! `address:port` join targets

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
    #[error("join target must be formatted as address:port, got '{0}'")]
    MissingPort(String),

    #[error("invalid port in join target '{0}'")]
    InvalidPort(String),

    #[error("join target '{0}' has an empty address")]
    EmptyAddress(String),
}

/// Host address and port a peer connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    pub address: String,
    pub port: u16,
}

impl JoinTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl FromStr for JoinTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the last colon so bracketed IPv6 literals keep their own colons.
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TargetParseError::MissingPort(s.to_string()))?;

        let address = address.trim_start_matches('[').trim_end_matches(']');
        if address.is_empty() {
            return Err(TargetParseError::EmptyAddress(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| TargetParseError::InvalidPort(s.to_string()))?;

        Ok(Self::new(address, port))
    }
}

impl fmt::Display for JoinTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}
