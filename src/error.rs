//! Error types for the bearer-token SOCKS5 client.

use std::io;

use thiserror::Error;

use crate::protocol::ServerStatus;

/// Result type alias for tunnel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing a tunnel.
///
/// Every variant is terminal: the handshake is never retried internally and
/// the stream must be discarded by the caller after a failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Peer is not speaking SOCKS version 5
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u8, actual: u8 },

    /// Peer did not select the bearer-token method
    #[error("unsupported authentication method: expected 0x{expected:02x}, got 0x{actual:02x}")]
    UnsupportedAuthMethod { expected: u8, actual: u8 },

    /// Peer's authentication sub-negotiation version is not 1
    #[error("authentication version mismatch: expected {expected}, got {actual}")]
    AuthVersionMismatch { expected: u8, actual: u8 },

    /// Token or routing identifier declined by the proxy
    #[error("authentication rejected by proxy")]
    AuthenticationRejected,

    /// Proxy refused the connect command
    #[error("connect rejected by proxy: {0}")]
    ConnectRejected(ServerStatus),

    /// A length-prefixed field does not fit its length prefix
    #[error("malformed {field}: {len} bytes exceeds maximum of {max}")]
    MalformedAddress {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Connect reply echoed an address type whose length is undefined
    #[error("unsupported address type in connect reply: 0x{0:02x}")]
    UnsupportedAddressType(u8),

    /// Underlying stream read or write failed
    #[error("transport error: {0}")]
    Transport(io::Error),

    /// Peer closed the stream in the middle of a frame
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Handshake driven out of sequence (step after completion or failure)
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Driver supplied the wrong number of reply bytes
    #[error("buffer error: expected {expected} bytes, got {actual}")]
    Buffer { expected: usize, actual: usize },

    /// Proxy discovery or client configuration failed
    #[error("configuration error: {0}")]
    Config(String),

    /// Connecting to the proxy timed out
    #[error("connection timeout after {0}ms")]
    Timeout(u64),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEndOfStream
        } else {
            Error::Transport(err)
        }
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new handshake sequencing error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Check if the state machine was driven incorrectly
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Handshake(_) | Error::Buffer { .. })
    }

    /// Create a length precondition error
    pub fn malformed(field: &'static str, len: usize, max: usize) -> Self {
        Error::MalformedAddress { field, len, max }
    }

    /// Check if this error was raised before any byte was written
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::MalformedAddress { .. })
    }

    /// Check if the proxy understood the request and refused it
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationRejected | Error::ConnectRejected(_)
        )
    }

    /// Check if this error originates from the underlying stream
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::UnexpectedEndOfStream | Error::Timeout(_)
        )
    }

    /// Server status carried by a connect rejection
    pub fn server_status(&self) -> Option<ServerStatus> {
        match self {
            Error::ConnectRejected(status) => Some(*status),
            _ => None,
        }
    }
}
