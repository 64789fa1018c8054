//! Client configuration and proxy discovery.
//!
//! The handshake engine never reads the environment. Where the proxy lives is
//! answered by a [`ProxyLocator`], picked from [`ClientConfig`].

use std::env;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::{Credentials, RoutingId};
use crate::error::{Error, Result};

/// Environment variable holding the bound-services document.
pub const SERVICES_ENV_VAR: &str = "VCAP_SERVICES";

/// Service entry carrying the proxy credentials.
pub const CONNECTIVITY_SERVICE: &str = "connectivity";

const PROXY_HOST_KEY: &str = "onpremise_proxy_host";
const PROXY_PORT_KEY: &str = "onpremise_socks5_proxy_port";

/// Host of the local end of an SSH tunnel to the proxy.
pub const SSH_TUNNEL_HOST: &str = "localhost";

/// Port of the local end of an SSH tunnel to the proxy.
pub const SSH_TUNNEL_PORT: u16 = 20004;

/// Network address of the SOCKS5 proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAddress {
    /// Proxy hostname or IP
    pub host: String,
    /// Proxy port
    pub port: u16,
}

impl ProxyAddress {
    /// Create a new proxy address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Answers where the proxy is.
pub trait ProxyLocator {
    /// Look up the proxy address.
    fn locate(&self) -> Result<ProxyAddress>;
}

/// Fixed proxy address.
#[derive(Debug, Clone)]
pub struct StaticLocator(ProxyAddress);

impl StaticLocator {
    /// Always answer with `address`.
    pub fn new(address: ProxyAddress) -> Self {
        Self(address)
    }

    /// Local end of an SSH tunnel forwarding to the proxy.
    pub fn ssh_tunnel() -> Self {
        Self(ProxyAddress::new(SSH_TUNNEL_HOST, SSH_TUNNEL_PORT))
    }
}

impl ProxyLocator for StaticLocator {
    fn locate(&self) -> Result<ProxyAddress> {
        Ok(self.0.clone())
    }
}

/// Reads the proxy address from a Cloud Foundry style services document.
///
/// ```text
/// { "connectivity": [ { "credentials": {
///     "onpremise_proxy_host": "proxy.internal",
///     "onpremise_socks5_proxy_port": "20004" } } ] }
/// ```
#[derive(Debug, Clone)]
pub struct CloudFoundryLocator {
    document: Option<String>,
}

impl CloudFoundryLocator {
    /// Read [`SERVICES_ENV_VAR`] on every lookup.
    pub fn from_env() -> Self {
        Self { document: None }
    }

    /// Use a document supplied by the caller.
    pub fn from_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
        }
    }

    fn load(&self) -> Result<String> {
        match &self.document {
            Some(document) => Ok(document.clone()),
            None => env::var(SERVICES_ENV_VAR)
                .map_err(|e| Error::config(format!("{} unavailable: {}", SERVICES_ENV_VAR, e))),
        }
    }
}

impl ProxyLocator for CloudFoundryLocator {
    fn locate(&self) -> Result<ProxyAddress> {
        let document = self.load()?;
        parse_services_document(&document)
    }
}

fn parse_services_document(document: &str) -> Result<ProxyAddress> {
    let root: Value = serde_json::from_str(document)
        .map_err(|e| Error::config(format!("invalid services document: {}", e)))?;

    let credentials = root
        .get(CONNECTIVITY_SERVICE)
        .and_then(|services| services.get(0))
        .and_then(|service| service.get("credentials"))
        .ok_or_else(|| Error::config("no connectivity service credentials bound"))?;

    let host = credentials
        .get(PROXY_HOST_KEY)
        .and_then(Value::as_str)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| Error::config(format!("missing {}", PROXY_HOST_KEY)))?;

    let port = match credentials.get(PROXY_PORT_KEY) {
        Some(Value::String(port)) => port
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::config(format!("invalid {}: {}", PROXY_PORT_KEY, e)))?,
        Some(Value::Number(port)) => port
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| Error::config(format!("invalid {}: {}", PROXY_PORT_KEY, port)))?,
        _ => return Err(Error::config(format!("missing {}", PROXY_PORT_KEY))),
    };

    Ok(ProxyAddress::new(host, port))
}

/// Configuration for a tunneling client.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bearer token presented to the proxy
    pub token: String,

    /// Location the proxy should route to, base64-encoded before sending
    #[serde(default)]
    pub location_id: Option<String>,

    /// Explicit proxy address, skipping discovery
    #[serde(default)]
    pub proxy: Option<ProxyAddress>,

    /// Reach the proxy through a local SSH tunnel
    #[serde(default)]
    pub use_ssh_tunnel: bool,

    /// Timeout for opening the TCP connection to the proxy
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl ClientConfig {
    /// Create a configuration that discovers the proxy from the environment.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            location_id: None,
            proxy: None,
            use_ssh_tunnel: false,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Set the location id.
    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Use a fixed proxy address.
    pub fn with_proxy(mut self, proxy: ProxyAddress) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.token.is_empty() {
            return Err("token cannot be empty".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be positive".to_string());
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.is_empty() {
                return Err("proxy host cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Build the credentials sent during authentication.
    pub fn credentials(&self) -> Result<Credentials> {
        let routing_id = RoutingId::from_location(self.location_id.as_deref());
        Credentials::new(self.token.clone(), routing_id)
    }

    /// Pick the proxy locator: explicit address, then SSH tunnel, then
    /// the services document in the environment.
    pub fn locator(&self) -> Box<dyn ProxyLocator + Send + Sync> {
        if let Some(proxy) = &self.proxy {
            Box::new(StaticLocator::new(proxy.clone()))
        } else if self.use_ssh_tunnel {
            Box::new(StaticLocator::ssh_tunnel())
        } else {
            Box::new(CloudFoundryLocator::from_env())
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("location_id", &self.location_id)
            .field("proxy", &self.proxy)
            .field("use_ssh_tunnel", &self.use_ssh_tunnel)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}
