use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid lanchat TOML", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot render config as TOML")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override that does not parse
    #[error("invalid {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// A loaded config that parses but cannot drive a session
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// File the error came from, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } | Self::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}
