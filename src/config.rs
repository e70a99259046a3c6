//! Forwarding node configuration.
//!
//! The host node reads an optional JSON file. Every field has a default, so
//! an empty object (or no file at all) yields a working node with an empty
//! route table.
//!
//! ```json
//! {
//!   "vrb": { "capacity": 16, "entry_timeout_ms": 3000, "gc_interval_ms": 1000 },
//!   "stats_port": 8080,
//!   "ipv6": {
//!     "local": ["2001:db8::1"],
//!     "routes": [
//!       { "prefix": "2001:db8:1::", "prefix_len": 48, "interface": 1, "next_hop": "00:02" }
//!     ]
//!   },
//!   "ndn": { "interface": 1, "routes": [ { "prefix": "/sensors", "face": "00:03" } ] }
//! }
//! ```

use serde::Deserialize;
use std::net::Ipv6Addr;
use std::path::Path;
use std::time::Duration;

use crate::routing::{Ipv6Resolver, NdnName, NdnResolver, NextHop, RouteError, StaticRoutes};
use crate::stats_server::DEFAULT_STATS_PORT;
use crate::vrb::{InterfaceId, LinkAddress, VrbConfig, VrbError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not valid JSON for [`NodeConfig`].
    Parse(serde_json::Error),
    /// A value is out of range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {}", e),
            Self::Parse(e) => write!(f, "cannot parse config: {}", e),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<VrbError> for ConfigError {
    fn from(e: VrbError) -> Self {
        Self::Invalid(e.to_string())
    }
}

impl From<RouteError> for ConfigError {
    fn from(e: RouteError) -> Self {
        Self::Invalid(e.to_string())
    }
}

/// VRB parameters as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VrbSection {
    pub capacity: usize,
    pub entry_timeout_ms: u64,
    pub gc_interval_ms: u64,
}

impl Default for VrbSection {
    fn default() -> Self {
        let defaults = VrbConfig::default();
        Self {
            capacity: defaults.capacity,
            entry_timeout_ms: defaults.entry_timeout.as_millis() as u64,
            gc_interval_ms: defaults.gc_interval.as_millis() as u64,
        }
    }
}

impl VrbSection {
    /// Convert to a validated [`VrbConfig`].
    pub fn to_config(&self) -> Result<VrbConfig, ConfigError> {
        let config = VrbConfig {
            capacity: self.capacity,
            entry_timeout: Duration::from_millis(self.entry_timeout_ms),
            gc_interval: Duration::from_millis(self.gc_interval_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

/// A static IPv6 route.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSection {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub interface: u16,
    /// Next hop link-layer address, colon-separated hex.
    pub next_hop: String,
}

/// IPv6 forwarding settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ipv6Section {
    pub local: Vec<Ipv6Addr>,
    pub routes: Vec<RouteSection>,
}

impl Ipv6Section {
    pub fn to_resolver(&self) -> Result<Ipv6Resolver, ConfigError> {
        let mut routes = StaticRoutes::new();
        for addr in &self.local {
            routes.add_local(*addr);
        }
        for route in &self.routes {
            let next_hop = NextHop::new(
                InterfaceId(route.interface),
                parse_link_address(&route.next_hop)?,
            );
            routes.add_route(route.prefix, route.prefix_len, next_hop)?;
        }
        Ok(Ipv6Resolver::new(routes))
    }
}

/// An NDN FIB route.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NdnRouteSection {
    pub prefix: String,
    pub face: String,
}

/// NDN forwarding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NdnSection {
    /// Relay interface all faces live on.
    pub interface: u16,
    #[serde(default)]
    pub routes: Vec<NdnRouteSection>,
}

impl NdnSection {
    pub fn to_resolver(&self) -> Result<NdnResolver, ConfigError> {
        let resolver = NdnResolver::new(InterfaceId(self.interface));
        for route in &self.routes {
            resolver.add_route(NdnName::from_uri(&route.prefix), parse_link_address(&route.face)?);
        }
        Ok(resolver)
    }
}

/// Complete host node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub vrb: VrbSection,
    /// Port of the `/stats` endpoint; 0 disables it.
    pub stats_port: u16,
    pub ipv6: Ipv6Section,
    /// Absent means no NDN forwarding.
    pub ndn: Option<NdnSection>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            vrb: VrbSection::default(),
            stats_port: DEFAULT_STATS_PORT,
            ipv6: Ipv6Section::default(),
            ndn: None,
        }
    }
}

impl NodeConfig {
    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Parse `aa:bb:...` into a link-layer address.
pub fn parse_link_address(s: &str) -> Result<LinkAddress, ConfigError> {
    let bytes = s
        .split(':')
        .map(|part| u8::from_str_radix(part, 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| ConfigError::Invalid(format!("bad link-layer address {:?}: {}", s, e)))?;
    Ok(LinkAddress::new(&bytes)?)
}
