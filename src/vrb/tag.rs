//! Datagram tag allocation.
//!
//! Outgoing tags come from one counter shared by everything on this node
//! that originates or relabels fragmented datagrams. The counter wraps at
//! 16 bits and does not check whether a value is still held by a live
//! forwarding entry.

use rand_core::{OsRng, RngCore};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, OnceLock};

/// Monotonic, wrapping 16-bit datagram tag counter.
#[derive(Debug, Default)]
pub struct TagCounter {
    current: AtomicU16,
}

static GLOBAL: OnceLock<Arc<TagCounter>> = OnceLock::new();

impl TagCounter {
    /// Create a counter whose first allocated tag is `start + 1`.
    pub const fn starting_at(start: u16) -> Self {
        Self {
            current: AtomicU16::new(start),
        }
    }

    /// Create a counter seeded from the OS random number generator.
    pub fn random() -> Self {
        Self::starting_at(OsRng.next_u32() as u16)
    }

    /// The process-wide counter, seeded randomly on first use.
    pub fn global() -> Arc<TagCounter> {
        GLOBAL.get_or_init(|| Arc::new(Self::random())).clone()
    }

    /// Allocate the next tag.
    pub fn next_tag(&self) -> u16 {
        // fetch_add wraps on overflow
        self.current.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// The most recently allocated tag.
    pub fn current(&self) -> u16 {
        self.current.load(Ordering::Relaxed)
    }
}
