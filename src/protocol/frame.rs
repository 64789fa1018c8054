//! Request encoding and reply validation for each handshake phase.
//!
//! Encoders append to any [`BufMut`] so callers control the buffer (the
//! handshake keeps the auth frame in a zeroizing buffer). Reply checks take
//! the fixed two-byte headers and fail fast on the first deviation.

use bytes::BufMut;

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::protocol::{
    ServerStatus, TargetAddress, ATYP_DOMAIN, ATYP_IPV4, AUTH_SUCCESS, BEARER_AUTH_METHOD,
    BEARER_AUTH_VERSION, CMD_CONNECT, MAX_SHORT_FIELD, MAX_TOKEN_LEN, RESERVED, SOCKS_VERSION,
};

/// Remaining bytes of a connect reply after `rsv | atyp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTail {
    /// Fixed number of address and port bytes
    Fixed(usize),
    /// One length byte, then `length + 2` bytes of domain and port
    LengthPrefixed,
}

/// Append the method negotiation request: `05 01 80`.
pub fn encode_method_request(buf: &mut impl BufMut) {
    buf.put_u8(SOCKS_VERSION);
    buf.put_u8(1);
    buf.put_u8(BEARER_AUTH_METHOD);
}

/// Append the bearer-token sub-negotiation request.
///
/// `01 | token_len (u32 BE) | token | id_len (u8) | id`
pub fn encode_auth_request(credentials: &Credentials, buf: &mut impl BufMut) -> Result<()> {
    let token = credentials.token().as_bytes();
    let routing_id = credentials.routing_id().as_bytes();

    let token_len = length_prefix_u32("token", token.len())?;
    let id_len = length_prefix_u8("routing id", routing_id.len())?;

    buf.put_u8(BEARER_AUTH_VERSION);
    buf.put_u32(token_len);
    buf.put_slice(token);
    buf.put_u8(id_len);
    buf.put_slice(routing_id);
    Ok(())
}

/// Append the connect request: `05 01 00 | atyp | addr | port (u16 BE)`.
pub fn encode_connect_request(target: &TargetAddress, buf: &mut impl BufMut) -> Result<()> {
    target.validate()?;
    let kind = target.kind();

    buf.put_u8(SOCKS_VERSION);
    buf.put_u8(CMD_CONNECT);
    buf.put_u8(RESERVED);
    kind.put(buf);
    buf.put_u16(target.port);
    Ok(())
}

/// Validate the method selection reply `[version, method]`.
pub fn check_method_reply(reply: [u8; 2]) -> Result<()> {
    let [version, method] = reply;
    if version != SOCKS_VERSION {
        return Err(Error::ProtocolVersionMismatch {
            expected: SOCKS_VERSION,
            actual: version,
        });
    }
    if method != BEARER_AUTH_METHOD {
        return Err(Error::UnsupportedAuthMethod {
            expected: BEARER_AUTH_METHOD,
            actual: method,
        });
    }
    Ok(())
}

/// Validate the authentication reply `[subversion, status]`.
pub fn check_auth_reply(reply: [u8; 2]) -> Result<()> {
    let [version, status] = reply;
    if version != BEARER_AUTH_VERSION {
        return Err(Error::AuthVersionMismatch {
            expected: BEARER_AUTH_VERSION,
            actual: version,
        });
    }
    if status != AUTH_SUCCESS {
        return Err(Error::AuthenticationRejected);
    }
    Ok(())
}

/// Validate the connect reply header `[version, status]` and decode the status.
///
/// A non-success status is returned, not raised: the caller still has to
/// drain the rest of the reply before surfacing the rejection.
pub fn check_connect_header(reply: [u8; 2]) -> Result<ServerStatus> {
    let [version, status] = reply;
    if version != SOCKS_VERSION {
        return Err(Error::ProtocolVersionMismatch {
            expected: SOCKS_VERSION,
            actual: version,
        });
    }
    Ok(ServerStatus::from(status))
}

/// Length of the reply remainder for the address type the proxy echoed.
pub fn reply_address_len(atyp: u8) -> Result<ReplyTail> {
    match atyp {
        ATYP_IPV4 => Ok(ReplyTail::Fixed(4 + 2)),
        ATYP_DOMAIN => Ok(ReplyTail::LengthPrefixed),
        other => Err(Error::UnsupportedAddressType(other)),
    }
}

pub(crate) fn length_prefix_u32(field: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::malformed(field, len, MAX_TOKEN_LEN))
}

pub(crate) fn length_prefix_u8(field: &'static str, len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| Error::malformed(field, len, MAX_SHORT_FIELD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::RoutingId;
    use bytes::BytesMut;

    #[test]
    fn test_method_request() {
        let mut buf = BytesMut::new();
        encode_method_request(&mut buf);
        assert_eq!(&buf[..], &[0x05, 0x01, 0x80]);
    }

    #[test]
    fn test_auth_request_layout() {
        let credentials = Credentials::new("tok", RoutingId::raw("id")).unwrap();
        let mut buf = BytesMut::new();
        encode_auth_request(&credentials, &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x01, 0x00, 0x00, 0x00, 0x03, b't', b'o', b'k', 0x02, b'i', b'd']
        );
    }

    #[test]
    fn test_auth_request_empty_routing_id() {
        let credentials = Credentials::new("t", RoutingId::from_location(None)).unwrap();
        let mut buf = BytesMut::new();
        encode_auth_request(&credentials, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x00, 0x00, 0x00, 0x01, b't', 0x00]);
    }

    #[test]
    fn test_connect_request_ipv4() {
        let mut buf = BytesMut::new();
        encode_connect_request(&TargetAddress::new("93.184.216.34", 443), &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x05, 0x01, 0x00, 0x01, 0x5D, 0xB8, 0xD8, 0x22, 0x01, 0xBB]
        );
    }

    #[test]
    fn test_connect_request_domain() {
        let mut buf = BytesMut::new();
        encode_connect_request(&TargetAddress::new("example.com", 80), &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[
                0x05, 0x01, 0x00, 0x03, 0x0B, 0x65, 0x78, 0x61, 0x6D, 0x70, 0x6C, 0x65, 0x2E,
                0x63, 0x6F, 0x6D, 0x00, 0x50
            ]
        );
    }

    #[test]
    fn test_connect_request_out_of_range_octet_is_domain() {
        let mut buf = BytesMut::new();
        encode_connect_request(&TargetAddress::new("256.1.1.1", 22), &mut buf).unwrap();
        assert_eq!(buf[3], ATYP_DOMAIN);
        assert_eq!(buf[4], 9);
        assert_eq!(&buf[5..14], b"256.1.1.1");
        assert_eq!(&buf[14..], &[0x00, 0x16]);
    }

    #[test]
    fn test_connect_request_rejects_long_host() {
        let mut buf = BytesMut::new();
        let err = encode_connect_request(&TargetAddress::new("h".repeat(300), 80), &mut buf)
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_method_reply() {
        assert!(check_method_reply([0x05, 0x80]).is_ok());
        assert!(matches!(
            check_method_reply([0x05, 0x00]),
            Err(Error::UnsupportedAuthMethod { expected: 0x80, actual: 0x00 })
        ));
        assert!(matches!(
            check_method_reply([0x05, 0xFF]),
            Err(Error::UnsupportedAuthMethod { actual: 0xFF, .. })
        ));
        assert!(matches!(
            check_method_reply([0x04, 0x80]),
            Err(Error::ProtocolVersionMismatch { expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn test_auth_reply() {
        assert!(check_auth_reply([0x01, 0x00]).is_ok());
        assert!(matches!(
            check_auth_reply([0x01, 0x01]),
            Err(Error::AuthenticationRejected)
        ));
        assert!(matches!(
            check_auth_reply([0x02, 0x00]),
            Err(Error::AuthVersionMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_connect_header() {
        assert_eq!(check_connect_header([0x05, 0x00]).unwrap(), ServerStatus::Succeeded);
        assert_eq!(
            check_connect_header([0x05, 0x05]).unwrap(),
            ServerStatus::ConnectionRefused
        );
        assert!(matches!(
            check_connect_header([0x00, 0x00]),
            Err(Error::ProtocolVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_reply_address_len() {
        assert_eq!(reply_address_len(0x01).unwrap(), ReplyTail::Fixed(6));
        assert_eq!(reply_address_len(0x03).unwrap(), ReplyTail::LengthPrefixed);
        assert!(matches!(
            reply_address_len(0x04),
            Err(Error::UnsupportedAddressType(0x04))
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_token_length_prefix_overflow() {
        let err = length_prefix_u32("token", u32::MAX as usize + 1).unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(length_prefix_u32("token", 7).unwrap(), 7);
    }

    #[test]
    fn test_short_length_prefix_overflow() {
        assert_eq!(length_prefix_u8("routing id", 255).unwrap(), 255);
        assert!(length_prefix_u8("routing id", 256).unwrap_err().is_precondition());
    }
}
