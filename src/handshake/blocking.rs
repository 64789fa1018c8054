//! Blocking driver over `std::io` streams.

use std::io::{Read, Write};

use crate::error::Result;
use crate::handshake::{Handshake, HandshakeEngine, Step, MAX_READ_CHUNK};
use crate::tunnel::Tunnel;

impl HandshakeEngine {
    /// Run the handshake over a connected blocking stream.
    ///
    /// Each phase writes a complete frame, flushes, then blocks until the
    /// expected reply has been read. Read timeouts are the transport's
    /// concern and must be configured beforehand.
    pub fn perform<S: Read + Write>(self, stream: &mut S) -> Result<()> {
        let handshake = self.handshake()?;
        drive(handshake, stream)
    }

    /// Run the handshake and wrap the stream into a [`Tunnel`].
    ///
    /// On failure the stream is dropped.
    pub fn establish<S: Read + Write>(self, mut stream: S) -> Result<Tunnel<S>> {
        drive(self.handshake()?, &mut stream)?;
        tracing::debug!(destination = %self.target, "tunnel established");
        Ok(Tunnel::new(stream, self.target.clone()))
    }
}

fn drive<S: Read + Write>(mut handshake: Handshake<'_>, stream: &mut S) -> Result<()> {
    let mut scratch = [0u8; MAX_READ_CHUNK];

    loop {
        match handshake.next_step()? {
            Step::Send(frame) => {
                stream.write_all(frame)?;
                stream.flush()?;
            }
            Step::Receive(len) => {
                let buf = &mut scratch[..len];
                stream.read_exact(buf)?;
                handshake.receive(buf)?;
            }
            Step::Complete => return Ok(()),
        }
    }
}
