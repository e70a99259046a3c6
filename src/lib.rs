//! 6LoWPAN fragment forwarding library.
//!
//! A forwarding node relays fragments of a datagram without reassembling it.
//! The first fragment is routed; the resulting label swap (incoming link
//! source and tag to outgoing interface, next hop and tag) is kept in a
//! Virtual Reassembly Buffer so that the following fragments of the same
//! datagram can be relayed by lookup alone.

pub mod config;
pub mod gc;
pub mod routing;
pub mod stats;
pub mod stats_server;
pub mod vrb;

// Re-export commonly used items
pub use config::{ConfigError, NodeConfig};
pub use gc::spawn_collector;
pub use routing::{ForwardingHeader, NextHop, NextHopResolver, ProtocolTag, RouteDispatch, RouteError};
pub use stats::{StatsReport, StatsSnapshot, VrbStats};
pub use stats_server::StatsServer;
pub use vrb::{
    FragmentBase, InterfaceId, LinkAddress, TagCounter, Vrb, VrbConfig, VrbEntry, VrbError,
    VrbTable,
};
