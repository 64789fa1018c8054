//! Bearer token and routing identifier.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;
use crate::protocol::{length_prefix_u32, length_prefix_u8};

/// Transport-safe routing identifier sent alongside the token.
///
/// The proxy uses it to pick the downstream network segment (the "location").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingId(String);

impl RoutingId {
    /// Encode a free-form location as standard base64.
    ///
    /// No location yields an empty identifier, which the proxy treats as the
    /// default segment.
    pub fn from_location(location: Option<&str>) -> Self {
        match location {
            Some(location) => Self(STANDARD.encode(location.as_bytes())),
            None => Self(String::new()),
        }
    }

    /// Use text that is already in its transport-safe form.
    pub fn raw(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Immutable credentials for the bearer-token method.
///
/// The token is zeroized on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    token: String,
    routing_id: String,
}

impl Credentials {
    /// Create credentials, checking both fields fit their length prefixes.
    pub fn new(token: impl Into<String>, routing_id: RoutingId) -> Result<Self> {
        let token = token.into();
        length_prefix_u32("token", token.len())?;
        length_prefix_u8("routing id", routing_id.0.len())?;

        Ok(Self {
            token,
            routing_id: routing_id.0,
        })
    }

    /// Bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Encoded routing identifier.
    pub fn routing_id(&self) -> &str {
        &self.routing_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .field("routing_id", &self.routing_id)
            .finish()
    }
}
