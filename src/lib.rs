//! # tokensocks
//!
//! Client side of a SOCKS5 tunnel authenticated with a bearer token and a
//! routing identifier instead of username/password.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Connector (proxy discovery, TCP connect, timeout)      │
//! ├─────────────────────────────────────────────────────────┤
//! │  HandshakeEngine (blocking and tokio drivers)           │
//! ├─────────────────────────────────────────────────────────┤
//! │  Handshake state machine (sans-IO)                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  Protocol (frame encoding, reply checks, status codes)  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::net::TcpStream;
//!
//! use tokensocks::{Credentials, HandshakeEngine, RoutingId, TargetAddress};
//!
//! # fn main() -> tokensocks::Result<()> {
//! let credentials = Credentials::new("eyJhbGciOi...", RoutingId::from_location(Some("loc1")))?;
//! let engine = HandshakeEngine::new(credentials, TargetAddress::new("db.internal", 5432))?;
//!
//! let stream = TcpStream::connect("proxy.internal:20004")?;
//! let tunnel = engine.establish(stream)?;
//! # drop(tunnel);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod connector;
pub mod credentials;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod tunnel;

pub use config::{ClientConfig, CloudFoundryLocator, ProxyAddress, ProxyLocator, StaticLocator};
pub use connector::Connector;
pub use credentials::{Credentials, RoutingId};
pub use error::{Error, Result};
pub use handshake::{Handshake, HandshakeEngine, Phase, Step};
pub use protocol::{AddressKind, ServerStatus, TargetAddress};
pub use tunnel::Tunnel;
