//! Virtual reassembly buffer for fragment forwarding.
//!
//! This module provides:
//! - [`VrbTable`]: Bounded table mapping incoming fragment flows to outgoing labels
//! - [`Vrb`]: Thread-safe shared handle to a table
//! - [`Interval`]: Shared byte-range lists owned by the fragmentation buffer
//! - [`TagCounter`]: Wrapping datagram tag allocator

mod address;
pub mod interval;
mod shared;
mod table;
mod tag;

pub use address::{InterfaceId, LinkAddress, MAX_ADDRESS_LEN};
pub use interval::{Interval, IntervalRef, MergeOutcome};
pub use shared::Vrb;
pub use table::{ForwardingKey, FragmentBase, VrbConfig, VrbEntry, VrbError, VrbTable};
pub use tag::TagCounter;
