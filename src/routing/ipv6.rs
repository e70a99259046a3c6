//! IPv6 next-hop resolution.
//!
//! Reads the destination from the (decompressed) IPv6 header of the first
//! fragment and looks it up in a static route table. Link-local
//! destinations and this node's own addresses are never forwarded.

use log::debug;
use std::net::Ipv6Addr;

use super::dispatch::{ForwardingHeader, NextHop, NextHopResolver, RouteError};
use crate::vrb::InterfaceId;

/// Length of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;

/// Offset of the destination address within the IPv6 header.
const DESTINATION_OFFSET: usize = 24;

/// Extract the destination address from an IPv6 header.
pub fn destination(header: &[u8]) -> Result<Ipv6Addr, RouteError> {
    let bytes: [u8; 16] = header
        .get(DESTINATION_OFFSET..IPV6_HEADER_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or(RouteError::MalformedHeader("IPv6 header too short"))?;
    Ok(Ipv6Addr::from(bytes))
}

/// Whether `addr` is in `fe80::/10`.
pub fn is_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xffc0 == 0xfe80
}

/// A route to all destinations under a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Route {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub next_hop: NextHop,
}

impl Ipv6Route {
    fn matches(&self, addr: &Ipv6Addr) -> bool {
        let mask = match self.prefix_len {
            0 => 0,
            len => u128::MAX << (128 - u32::from(len)),
        };
        u128::from(*addr) & mask == u128::from(self.prefix) & mask
    }
}

/// Static forwarding table with longest-prefix matching.
#[derive(Debug, Clone, Default)]
pub struct StaticRoutes {
    routes: Vec<Ipv6Route>,
    local: Vec<Ipv6Addr>,
}

impl StaticRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. A later route for the same prefix replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPrefixLength`] if `prefix_len` exceeds 128.
    pub fn add_route(
        &mut self,
        prefix: Ipv6Addr,
        prefix_len: u8,
        next_hop: NextHop,
    ) -> Result<(), RouteError> {
        if prefix_len > 128 {
            return Err(RouteError::InvalidPrefixLength(prefix_len));
        }
        let route = Ipv6Route {
            prefix,
            prefix_len,
            next_hop,
        };
        self.routes
            .retain(|r| !(r.prefix_len == prefix_len && r.matches(&prefix)));
        self.routes.push(route);
        Ok(())
    }

    /// Register an address assigned to this node.
    pub fn add_local(&mut self, addr: Ipv6Addr) {
        if !self.local.contains(&addr) {
            self.local.push(addr);
        }
    }

    /// Whether `addr` is assigned to this node.
    pub fn is_local(&self, addr: &Ipv6Addr) -> bool {
        self.local.contains(addr)
    }

    /// Longest-prefix lookup.
    pub fn lookup(&self, addr: &Ipv6Addr) -> Option<&Ipv6Route> {
        self.routes
            .iter()
            .filter(|r| r.matches(addr))
            .max_by_key(|r| r.prefix_len)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if there are no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// IPv6 resolver over a [`StaticRoutes`] table.
#[derive(Debug, Clone, Default)]
pub struct Ipv6Resolver {
    routes: StaticRoutes,
}

impl Ipv6Resolver {
    pub fn new(routes: StaticRoutes) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &StaticRoutes {
        &self.routes
    }
}

impl NextHopResolver for Ipv6Resolver {
    fn resolve(
        &self,
        header: &ForwardingHeader,
        _in_interface: InterfaceId,
    ) -> Result<NextHop, RouteError> {
        let dst = destination(&header.data)?;
        if is_link_local(&dst) || self.routes.is_local(&dst) {
            debug!("vrb: IPv6 destination {} is not forwarded", dst);
            return Err(RouteError::NoRoute);
        }
        match self.routes.lookup(&dst) {
            Some(route) => {
                debug!("vrb: route for IPv6 destination {} found", dst);
                Ok(route.next_hop)
            }
            None => {
                debug!("vrb: no route for IPv6 destination {} found", dst);
                Err(RouteError::NoRoute)
            }
        }
    }
}
