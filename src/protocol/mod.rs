//! SOCKS5 wire format with the bearer-token authentication extension.
//!
//! All frames are exact byte sequences with no padding. Multi-byte integers
//! are big-endian.
//!
//! ```text
//! Client                                        Proxy
//!   |  05 01 80           (offer method 0x80)     |
//!   |--------------------------------------------->|
//!   |  05 80              (method selected)        |
//!   |<---------------------------------------------|
//!   |  01 len32 token len8 routing-id              |
//!   |--------------------------------------------->|
//!   |  01 00              (authenticated)          |
//!   |<---------------------------------------------|
//!   |  05 01 00 atyp addr port                     |
//!   |--------------------------------------------->|
//!   |  05 00 00 atyp addr port                     |
//!   |<---------------------------------------------|
//!   |================ tunnel =====================|
//! ```

mod address;
mod frame;
mod status;

pub use address::{AddressKind, TargetAddress};
pub use frame::{
    check_auth_reply, check_connect_header, check_method_reply, encode_auth_request,
    encode_connect_request, encode_method_request, reply_address_len, ReplyTail,
};
pub(crate) use frame::{length_prefix_u32, length_prefix_u8};
pub use status::ServerStatus;

/// SOCKS protocol version
pub const SOCKS_VERSION: u8 = 0x05;

/// Bearer-token authentication method, from the private range 0x80..=0xFE
pub const BEARER_AUTH_METHOD: u8 = 0x80;

/// Version of the bearer-token sub-negotiation
pub const BEARER_AUTH_VERSION: u8 = 0x01;

/// Authentication status signalling success
pub const AUTH_SUCCESS: u8 = 0x00;

/// CONNECT command
pub const CMD_CONNECT: u8 = 0x01;

/// Reserved byte in requests
pub const RESERVED: u8 = 0x00;

/// Address type: IPv4 literal
pub const ATYP_IPV4: u8 = 0x01;

/// Address type: length-prefixed domain name
pub const ATYP_DOMAIN: u8 = 0x03;

/// Largest value a one-byte length prefix can carry
pub const MAX_SHORT_FIELD: usize = u8::MAX as usize;

/// Largest value the four-byte token length prefix can carry
pub const MAX_TOKEN_LEN: usize = u32::MAX as usize;

/// Size of every two-byte reply (method, auth, connect header)
pub const REPLY_HEADER_SIZE: usize = 2;
