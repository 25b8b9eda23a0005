use std::{io, net::SocketAddr, path::PathBuf};

use crate::registry::ConnectionId;

/// Failures of the listening side. Only `Bind` and `Resolve` are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to resolve listen address {addr}: {source}")]
    Resolve { addr: String, source: io::Error },

    #[error("no usable address for {0}")]
    NoAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// I/O failure inside one session; the session treats it as a disconnect.
#[derive(Debug, thiserror::Error)]
#[error("session i/o error: {0}")]
pub struct SessionError(#[from] pub io::Error);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
