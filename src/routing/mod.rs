//! Route dispatch for first fragments.
//!
//! This module provides:
//! - [`RouteDispatch`]: Per-protocol resolver registry creating VRB entries
//! - [`Ipv6Resolver`]: Longest-prefix next-hop lookup for IPv6 datagrams
//! - [`NdnResolver`]: FIB/PIT next-hop lookup for NDN datagrams

mod dispatch;
pub mod ipv6;
pub mod ndn;

pub use dispatch::{
    ForwardingHeader, NextHop, NextHopResolver, ProtocolTag, RouteDispatch, RouteError,
};
pub use ipv6::{Ipv6Resolver, Ipv6Route, StaticRoutes};
pub use ndn::{NdnName, NdnResolver};
