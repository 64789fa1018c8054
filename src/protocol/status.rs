//! Connect reply status codes.

use std::fmt;

/// Status byte of a connect reply.
///
/// Only ever decoded from the wire; the client never sends one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    /// Connection established
    Succeeded,
    /// General SOCKS server failure
    GeneralFailure,
    /// Connection not allowed by ruleset
    Forbidden,
    /// Network unreachable
    NetworkUnreachable,
    /// Host unreachable
    HostUnreachable,
    /// Connection refused by the target
    ConnectionRefused,
    /// TTL expired
    TtlExpired,
    /// Command not supported
    CommandNotSupported,
    /// Address type not supported
    AddressTypeNotSupported,
    /// Any other status byte
    Unknown(u8),
}

impl ServerStatus {
    /// Whether the proxy accepted the connect command.
    pub fn is_success(&self) -> bool {
        matches!(self, ServerStatus::Succeeded)
    }

    /// Raw status byte.
    pub fn code(&self) -> u8 {
        match self {
            ServerStatus::Succeeded => 0x00,
            ServerStatus::GeneralFailure => 0x01,
            ServerStatus::Forbidden => 0x02,
            ServerStatus::NetworkUnreachable => 0x03,
            ServerStatus::HostUnreachable => 0x04,
            ServerStatus::ConnectionRefused => 0x05,
            ServerStatus::TtlExpired => 0x06,
            ServerStatus::CommandNotSupported => 0x07,
            ServerStatus::AddressTypeNotSupported => 0x08,
            ServerStatus::Unknown(code) => *code,
        }
    }
}

impl From<u8> for ServerStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ServerStatus::Succeeded,
            0x01 => ServerStatus::GeneralFailure,
            0x02 => ServerStatus::Forbidden,
            0x03 => ServerStatus::NetworkUnreachable,
            0x04 => ServerStatus::HostUnreachable,
            0x05 => ServerStatus::ConnectionRefused,
            0x06 => ServerStatus::TtlExpired,
            0x07 => ServerStatus::CommandNotSupported,
            0x08 => ServerStatus::AddressTypeNotSupported,
            other => ServerStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Succeeded => f.write_str("success"),
            ServerStatus::GeneralFailure => f.write_str("general failure"),
            ServerStatus::Forbidden => f.write_str("forbidden by ruleset"),
            ServerStatus::NetworkUnreachable => f.write_str("network unreachable"),
            ServerStatus::HostUnreachable => f.write_str("host unreachable"),
            ServerStatus::ConnectionRefused => f.write_str("connection refused"),
            ServerStatus::TtlExpired => f.write_str("TTL expired"),
            ServerStatus::CommandNotSupported => f.write_str("command not supported"),
            ServerStatus::AddressTypeNotSupported => f.write_str("address type not supported"),
            ServerStatus::Unknown(code) => write!(f, "unknown (0x{:02x})", code),
        }
    }
}
