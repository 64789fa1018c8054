//! Three-phase handshake state machine.
//!
//! [`Handshake`] is sans-IO: it says what to send and how many bytes to read
//! next, and validates what was read. The blocking and tokio drivers in the
//! submodules move the bytes; both produce identical frames and errors.
//!
//! ```text
//! Greeting -> MethodReply -> Auth -> AuthReply -> Connect -> ConnectHeader
//!          -> ReplyPrefix -> [DomainLength] -> ReplyAddress -> Done
//! ```
//!
//! Any failed step ends the handshake. There is no retry.

mod blocking;
mod nonblocking;

use zeroize::Zeroizing;

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::protocol::{
    self, ReplyTail, ServerStatus, TargetAddress, MAX_SHORT_FIELD, REPLY_HEADER_SIZE,
};

/// Largest single read the handshake asks for: a domain and its port.
pub const MAX_READ_CHUNK: usize = MAX_SHORT_FIELD + 2;

/// Handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Send the method offer
    Greeting,
    /// Await `[version, method]`
    MethodReply,
    /// Send token and routing id
    Auth,
    /// Await `[subversion, status]`
    AuthReply,
    /// Send the connect command
    Connect,
    /// Await `[version, status]`
    ConnectHeader,
    /// Await `[reserved, atyp]`
    ReplyPrefix,
    /// Await the echoed domain length
    DomainLength,
    /// Await and discard the echoed address and port
    ReplyAddress(usize),
    /// Tunnel ready
    Done,
    /// Handshake ended with an error
    Failed,
}

/// Next I/O action requested by the state machine.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<'a> {
    /// Write this whole frame and flush
    Send(&'a [u8]),
    /// Read exactly this many bytes and pass them to [`Handshake::receive`]
    Receive(usize),
    /// Handshake succeeded
    Complete,
}

/// Handshake in progress over one stream.
pub struct Handshake<'a> {
    credentials: &'a Credentials,
    target: &'a TargetAddress,
    phase: Phase,
    outbound: Zeroizing<Vec<u8>>,
    status: ServerStatus,
}

impl<'a> Handshake<'a> {
    /// Start a handshake. Lengths are checked here, before anything is sent.
    pub fn new(credentials: &'a Credentials, target: &'a TargetAddress) -> Result<Self> {
        target.validate()?;
        Ok(Self {
            credentials,
            target,
            phase: Phase::Greeting,
            outbound: Zeroizing::new(Vec::with_capacity(64)),
            status: ServerStatus::Succeeded,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance to the next I/O action.
    ///
    /// Send steps encode their frame on the fly; the connect request
    /// classifies the target host again each time it is built.
    pub fn next_step(&mut self) -> Result<Step<'_>> {
        match self.phase {
            Phase::Greeting => {
                self.outbound.clear();
                protocol::encode_method_request(&mut *self.outbound);
                self.enter(Phase::MethodReply);
                Ok(Step::Send(&self.outbound))
            }
            Phase::Auth => {
                self.outbound.clear();
                self.guard(|hs| protocol::encode_auth_request(hs.credentials, &mut *hs.outbound))?;
                self.enter(Phase::AuthReply);
                Ok(Step::Send(&self.outbound))
            }
            Phase::Connect => {
                self.outbound.clear();
                self.guard(|hs| protocol::encode_connect_request(hs.target, &mut *hs.outbound))?;
                self.enter(Phase::ConnectHeader);
                Ok(Step::Send(&self.outbound))
            }
            Phase::MethodReply
            | Phase::AuthReply
            | Phase::ConnectHeader
            | Phase::ReplyPrefix => Ok(Step::Receive(REPLY_HEADER_SIZE)),
            Phase::DomainLength => Ok(Step::Receive(1)),
            Phase::ReplyAddress(len) => Ok(Step::Receive(len)),
            Phase::Done => {
                if self.status.is_success() {
                    Ok(Step::Complete)
                } else {
                    self.phase = Phase::Failed;
                    Err(Error::ConnectRejected(self.status))
                }
            }
            Phase::Failed => Err(Error::handshake("handshake already failed")),
        }
    }

    /// Consume bytes read for the last [`Step::Receive`].
    pub fn receive(&mut self, data: &[u8]) -> Result<()> {
        self.guard(|hs| hs.process(data))
    }

    fn process(&mut self, data: &[u8]) -> Result<()> {
        match self.phase {
            Phase::MethodReply => {
                protocol::check_method_reply(pair(data)?)?;
                self.enter(Phase::Auth);
            }
            Phase::AuthReply => {
                protocol::check_auth_reply(pair(data)?)?;
                self.enter(Phase::Connect);
            }
            Phase::ConnectHeader => {
                self.status = protocol::check_connect_header(pair(data)?)?;
                self.enter(Phase::ReplyPrefix);
            }
            Phase::ReplyPrefix => {
                let [_reserved, atyp] = pair(data)?;
                match protocol::reply_address_len(atyp)? {
                    ReplyTail::Fixed(len) => self.enter(Phase::ReplyAddress(len)),
                    ReplyTail::LengthPrefixed => self.enter(Phase::DomainLength),
                }
            }
            Phase::DomainLength => {
                let len = *data
                    .first()
                    .ok_or_else(|| unexpected_len(1, data.len()))?;
                self.enter(Phase::ReplyAddress(usize::from(len) + 2));
            }
            Phase::ReplyAddress(len) => {
                if data.len() != len {
                    return Err(unexpected_len(len, data.len()));
                }
                self.enter(Phase::Done);
            }
            phase => {
                return Err(Error::handshake(format!(
                    "no reply expected in phase {:?}",
                    phase
                )))
            }
        }
        tracing::trace!(reply = %hex::encode(data), "reply accepted");
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "handshake phase");
        self.phase = phase;
    }

    fn guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }
}

fn pair(data: &[u8]) -> Result<[u8; 2]> {
    data.try_into()
        .map_err(|_| unexpected_len(REPLY_HEADER_SIZE, data.len()))
}

fn unexpected_len(expected: usize, actual: usize) -> Error {
    Error::Buffer { expected, actual }
}

/// Drives the handshake for one connection attempt.
///
/// The engine never opens or closes the stream. On success the stream is a
/// transparent tunnel to the target; on failure it must be discarded.
#[derive(Debug)]
pub struct HandshakeEngine {
    credentials: Credentials,
    target: TargetAddress,
}

impl HandshakeEngine {
    /// Create an engine, rejecting hosts that do not fit the wire format.
    pub fn new(credentials: Credentials, target: TargetAddress) -> Result<Self> {
        target.validate()?;
        Ok(Self {
            credentials,
            target,
        })
    }

    /// Destination of the connect command.
    pub fn target(&self) -> &TargetAddress {
        &self.target
    }

    fn handshake(&self) -> Result<Handshake<'_>> {
        Handshake::new(&self.credentials, &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::RoutingId;

    fn credentials() -> Credentials {
        Credentials::new("jwt", RoutingId::raw("loc")).unwrap()
    }

    fn expect_send(hs: &mut Handshake<'_>) -> Vec<u8> {
        match hs.next_step().unwrap() {
            Step::Send(frame) => frame.to_vec(),
            other => panic!("expected send, got {:?}", other),
        }
    }

    fn expect_receive(hs: &mut Handshake<'_>) -> usize {
        match hs.next_step().unwrap() {
            Step::Receive(n) => n,
            other => panic!("expected receive, got {:?}", other),
        }
    }

    #[test]
    fn test_full_sequence_ipv4_reply() {
        let credentials = credentials();
        let target = TargetAddress::new("10.1.2.3", 8080);
        let mut hs = Handshake::new(&credentials, &target).unwrap();

        assert_eq!(expect_send(&mut hs), vec![0x05, 0x01, 0x80]);
        assert_eq!(expect_receive(&mut hs), 2);
        hs.receive(&[0x05, 0x80]).unwrap();

        let auth = expect_send(&mut hs);
        assert_eq!(auth[0], 0x01);
        assert_eq!(&auth[1..5], &3u32.to_be_bytes());
        assert_eq!(expect_receive(&mut hs), 2);
        hs.receive(&[0x01, 0x00]).unwrap();

        assert_eq!(
            expect_send(&mut hs),
            vec![0x05, 0x01, 0x00, 0x01, 10, 1, 2, 3, 0x1F, 0x90]
        );
        assert_eq!(expect_receive(&mut hs), 2);
        hs.receive(&[0x05, 0x00]).unwrap();
        assert_eq!(expect_receive(&mut hs), 2);
        hs.receive(&[0x00, 0x01]).unwrap();
        assert_eq!(expect_receive(&mut hs), 6);
        hs.receive(&[0; 6]).unwrap();

        assert_eq!(hs.next_step().unwrap(), Step::Complete);
        assert_eq!(hs.phase(), Phase::Done);
    }

    #[test]
    fn test_domain_reply_drains_length_plus_port() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();
        hs.phase = Phase::ConnectHeader;

        hs.receive(&[0x05, 0x00]).unwrap();
        hs.receive(&[0x00, 0x03]).unwrap();
        assert_eq!(expect_receive(&mut hs), 1);
        hs.receive(&[4]).unwrap();
        assert_eq!(expect_receive(&mut hs), 6);
        hs.receive(b"host\x01\xbb").unwrap();
        assert_eq!(hs.next_step().unwrap(), Step::Complete);
    }

    #[test]
    fn test_rejection_surfaces_after_drain() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();
        hs.phase = Phase::ConnectHeader;

        hs.receive(&[0x05, 0x04]).unwrap();
        assert_eq!(expect_receive(&mut hs), 2);
        hs.receive(&[0x00, 0x01]).unwrap();
        assert_eq!(expect_receive(&mut hs), 6);
        hs.receive(&[0; 6]).unwrap();

        let err = hs.next_step().unwrap_err();
        assert!(matches!(
            err,
            Error::ConnectRejected(ServerStatus::HostUnreachable)
        ));
        assert_eq!(hs.phase(), Phase::Failed);
    }

    #[test]
    fn test_unknown_reply_atyp_fails() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();
        hs.phase = Phase::ReplyPrefix;

        let err = hs.receive(&[0x00, 0x04]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAddressType(0x04)));
        assert_eq!(hs.phase(), Phase::Failed);
        assert!(hs.next_step().is_err());
    }

    #[test]
    fn test_failure_is_terminal() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();

        expect_send(&mut hs);
        let err = hs.receive(&[0x05, 0x00]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAuthMethod { .. }));
        assert!(hs.next_step().is_err());
    }

    #[test]
    fn test_short_reply_is_buffer_error() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();

        expect_send(&mut hs);
        let err = hs.receive(&[0x05]).unwrap_err();
        assert!(matches!(err, Error::Buffer { expected: 2, actual: 1 }));
        assert!(err.is_misuse());

        let err = hs.next_step().unwrap_err();
        assert!(matches!(err, Error::Handshake(_)));
        assert!(err.is_misuse());
    }

    #[test]
    fn test_reply_when_sending_is_handshake_error() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();

        let err = hs.receive(&[0x05, 0x80]).unwrap_err();
        assert!(matches!(err, Error::Handshake(_)));
    }

    #[test]
    fn test_wrong_drain_length_is_buffer_error() {
        let credentials = credentials();
        let target = TargetAddress::new("example.com", 443);
        let mut hs = Handshake::new(&credentials, &target).unwrap();
        hs.phase = Phase::ReplyAddress(6);

        let err = hs.receive(&[0; 4]).unwrap_err();
        assert!(matches!(err, Error::Buffer { expected: 6, actual: 4 }));
    }

    #[test]
    fn test_engine_rejects_long_host_up_front() {
        let err = HandshakeEngine::new(credentials(), TargetAddress::new("x".repeat(256), 1))
            .unwrap_err();
        assert!(err.is_precondition());
    }
}
