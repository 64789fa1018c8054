//! Tokio driver over `AsyncRead + AsyncWrite` streams.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::handshake::{Handshake, HandshakeEngine, Step, MAX_READ_CHUNK};
use crate::tunnel::Tunnel;

impl HandshakeEngine {
    /// Run the handshake over a connected async stream.
    ///
    /// Same frames and failures as [`HandshakeEngine::perform`]; phases run
    /// strictly in sequence on the calling task.
    pub async fn perform_async<S>(self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake = self.handshake()?;
        drive(handshake, stream).await
    }

    /// Run the handshake and wrap the stream into a [`Tunnel`].
    pub async fn establish_async<S>(self, mut stream: S) -> Result<Tunnel<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        drive(self.handshake()?, &mut stream).await?;
        tracing::debug!(destination = %self.target, "tunnel established");
        Ok(Tunnel::new(stream, self.target.clone()))
    }
}

async fn drive<S>(mut handshake: Handshake<'_>, stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut scratch = [0u8; MAX_READ_CHUNK];

    loop {
        match handshake.next_step()? {
            Step::Send(frame) => {
                stream.write_all(frame).await?;
                stream.flush().await?;
            }
            Step::Receive(len) => {
                let buf = &mut scratch[..len];
                stream.read_exact(buf).await?;
                handshake.receive(buf)?;
            }
            Step::Complete => return Ok(()),
        }
    }
}
