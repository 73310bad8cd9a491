//! Error types for decoding, relaying and whitelisting.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// A DNS message that cannot be decoded.
///
/// Decoding never returns a partial message: any of these aborts the whole
/// datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("truncated message: need {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("compression pointer at offset {offset} targets {target}, past the end of the message")]
    PointerOutOfRange { offset: usize, target: usize },

    #[error("compression pointer loop through offset {target}")]
    PointerLoop { target: usize },

    #[error("reserved label type {byte:#04x} at offset {offset}")]
    ReservedLabelType { offset: usize, byte: u8 },

    #[error("non-ASCII label at offset {offset}")]
    NonAsciiLabel { offset: usize },

    #[error("name starting at offset {offset} exceeds 255 octets")]
    NameTooLong { offset: usize },
}

/// A resource record that does not carry an IPv4 address.
///
/// Callers skip these; it is not a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("record of type {rtype} with {len} byte payload is not an A record")]
pub struct NotAnARecord {
    pub rtype: u16,
    pub len: usize,
}

/// Failure of a single client exchange. Never affects other exchanges.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Malformed(#[from] MalformedMessage),

    #[error("no reply from upstream {upstream} within {timeout:?}")]
    UpstreamTimeout {
        upstream: SocketAddr,
        timeout: Duration,
    },

    #[error("upstream {upstream} unreachable: {source}")]
    UpstreamUnreachable {
        upstream: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to send reply to {client}: {source}")]
    ClientUnreachable {
        client: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// The external whitelist program could not be run or reported failure.
#[derive(Error, Debug)]
pub enum WhitelistError {
    #[error("failed to start whitelist command {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("whitelist command {program} exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
}

/// Invalid startup configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("failed to read patterns file {}: {source}", .path.display())]
    PatternsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fatal error while starting or running the proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}
