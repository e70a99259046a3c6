//! Next-hop selection for the first fragment of a datagram.
//!
//! The first fragment carries the network-layer header. Its protocol picks
//! exactly one resolver; there is no fallback to another protocol's table.
//! A resolved next hop becomes a new VRB entry.

use log::debug;
use std::collections::HashMap;

use crate::vrb::{FragmentBase, InterfaceId, LinkAddress, Vrb, VrbEntry, VrbError, VrbTable};

/// Network protocol of a forwarded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolTag {
    /// IPv6 (after header decompression).
    Ipv6,
    /// NDN TLV (information-centric networking).
    Ndn,
    /// Any other protocol, by dispatch value.
    Other(u8),
}

impl std::fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ipv6 => write!(f, "IPv6"),
            Self::Ndn => write!(f, "NDN"),
            Self::Other(v) => write!(f, "protocol {:#04x}", v),
        }
    }
}

/// The network-layer header found in a datagram's first fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingHeader {
    pub protocol: ProtocolTag,
    /// Header bytes; may be cut short by the fragment boundary.
    pub data: Vec<u8>,
}

impl ForwardingHeader {
    pub fn new(protocol: ProtocolTag, data: impl Into<Vec<u8>>) -> Self {
        Self {
            protocol,
            data: data.into(),
        }
    }
}

/// Where to send a datagram next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    /// Outgoing interface.
    pub interface: InterfaceId,
    /// Link-layer address of the next hop.
    pub address: LinkAddress,
}

impl NextHop {
    pub fn new(interface: InterfaceId, address: LinkAddress) -> Self {
        Self { interface, address }
    }
}

/// Error type for route dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No resolver registered for the header's protocol.
    NoResolver(ProtocolTag),
    /// Header too short or unparsable.
    MalformedHeader(&'static str),
    /// The resolver knows no next hop for the destination.
    NoRoute,
    /// The next hop was found but no entry could be created.
    Table(VrbError),
    /// A configured route prefix is longer than the address.
    InvalidPrefixLength(u8),
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoResolver(tag) => write!(f, "no resolver for {}", tag),
            Self::MalformedHeader(msg) => write!(f, "malformed header: {}", msg),
            Self::NoRoute => write!(f, "no route"),
            Self::Table(e) => write!(f, "{}", e),
            Self::InvalidPrefixLength(len) => write!(f, "invalid prefix length {}", len),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Table(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VrbError> for RouteError {
    fn from(e: VrbError) -> Self {
        Self::Table(e)
    }
}

/// Resolves the next hop for a forwarded header.
pub trait NextHopResolver: Send + Sync {
    /// Find the next hop for `header`, which arrived on `in_interface`.
    fn resolve(
        &self,
        header: &ForwardingHeader,
        in_interface: InterfaceId,
    ) -> Result<NextHop, RouteError>;
}

/// Registry of resolvers, one per protocol.
///
/// # Example
///
/// ```
/// use sixlowpan_vrb::routing::{ForwardingHeader, ProtocolTag, RouteDispatch, RouteError};
/// use sixlowpan_vrb::vrb::{FragmentBase, InterfaceId, LinkAddress, Vrb, VrbConfig};
///
/// let vrb = Vrb::new(VrbConfig::default()).unwrap();
/// let dispatch = RouteDispatch::new();
///
/// let base = FragmentBase::new(LinkAddress::short([0, 1]), 1, 200);
/// let header = ForwardingHeader::new(ProtocolTag::Other(0x42), vec![0u8; 8]);
///
/// let result = dispatch.from_route(&vrb, &base, InterfaceId(1), &header);
/// assert_eq!(result.unwrap_err(), RouteError::NoResolver(ProtocolTag::Other(0x42)));
/// assert!(vrb.is_empty());
/// ```
#[derive(Default)]
pub struct RouteDispatch {
    resolvers: HashMap<ProtocolTag, Box<dyn NextHopResolver>>,
}

impl RouteDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the resolver for `protocol`, returning the one it replaces.
    pub fn register(
        &mut self,
        protocol: ProtocolTag,
        resolver: impl NextHopResolver + 'static,
    ) -> Option<Box<dyn NextHopResolver>> {
        self.resolvers.insert(protocol, Box::new(resolver))
    }

    /// Remove the resolver for `protocol`.
    pub fn unregister(&mut self, protocol: ProtocolTag) -> Option<Box<dyn NextHopResolver>> {
        self.resolvers.remove(&protocol)
    }

    /// Check if a resolver is registered for `protocol`.
    pub fn has_resolver(&self, protocol: ProtocolTag) -> bool {
        self.resolvers.contains_key(&protocol)
    }

    /// Ask the resolver for `header`'s protocol for a next hop.
    pub fn resolve(
        &self,
        header: &ForwardingHeader,
        in_interface: InterfaceId,
    ) -> Result<NextHop, RouteError> {
        if header.data.is_empty() {
            return Err(RouteError::MalformedHeader("empty header"));
        }
        let resolver = self.resolvers.get(&header.protocol).ok_or_else(|| {
            debug!("vrb: unknown forwarding header type {}", header.protocol);
            RouteError::NoResolver(header.protocol)
        })?;
        resolver.resolve(header, in_interface)
    }

    /// Resolve the next hop for a first fragment and create its entry.
    ///
    /// The resolver runs without holding the table lock. Nothing is added
    /// to the table unless resolution succeeds.
    pub fn from_route(
        &self,
        vrb: &Vrb,
        base: &FragmentBase,
        in_interface: InterfaceId,
        header: &ForwardingHeader,
    ) -> Result<VrbEntry, RouteError> {
        let hop = match self.resolve(header, in_interface) {
            Ok(hop) => hop,
            Err(e) => {
                debug!("vrb: cannot route {}: {}", base.key, e);
                vrb.stats().record_route_failure();
                return Err(e);
            }
        };
        // a full table is already counted by the table itself
        Ok(vrb.add(base, hop.interface, hop.address)?)
    }

    /// Like [`from_route`](Self::from_route), for a table the caller
    /// already has exclusive access to.
    pub fn from_route_in<'t>(
        &self,
        table: &'t mut VrbTable,
        base: &FragmentBase,
        in_interface: InterfaceId,
        header: &ForwardingHeader,
    ) -> Result<&'t VrbEntry, RouteError> {
        let hop = match self.resolve(header, in_interface) {
            Ok(hop) => hop,
            Err(e) => {
                debug!("vrb: cannot route {}: {}", base.key, e);
                table.stats().record_route_failure();
                return Err(e);
            }
        };
        Ok(table.add(base, hop.interface, hop.address)?)
    }
}
