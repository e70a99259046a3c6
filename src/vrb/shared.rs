//! Thread-safe handle to a [`VrbTable`].
//!
//! Forwarding threads and the collector task all go through one lock, held
//! for the whole of each operation. Entries handed out are snapshots; they
//! stay valid after the lock is released but do not see later merges.

use log::warn;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::address::{InterfaceId, LinkAddress};
use super::table::{FragmentBase, ForwardingKey, VrbConfig, VrbEntry, VrbError, VrbTable};
use crate::stats::VrbStats;

/// Cloneable, shared virtual reassembly buffer.
#[derive(Clone)]
pub struct Vrb {
    inner: Arc<Mutex<VrbTable>>,
    stats: Arc<VrbStats>,
}

impl Vrb {
    /// Create a shared table with the given configuration.
    pub fn new(config: VrbConfig) -> Result<Self, VrbError> {
        Ok(Self::from_table(VrbTable::new(config)?))
    }

    /// Share an existing table.
    pub fn from_table(table: VrbTable) -> Self {
        let stats = table.stats().clone();
        Self {
            inner: Arc::new(Mutex::new(table)),
            stats,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VrbTable> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("vrb table mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Run `f` with exclusive access to the table.
    pub fn with_table<R>(&self, f: impl FnOnce(&mut VrbTable) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`VrbTable::add`].
    pub fn add(
        &self,
        base: &FragmentBase,
        out_interface: InterfaceId,
        out_destination: LinkAddress,
    ) -> Result<VrbEntry, VrbError> {
        self.lock()
            .add(base, out_interface, out_destination)
            .cloned()
    }

    /// See [`VrbTable::get`].
    pub fn get(&self, source: &LinkAddress, tag: u16) -> Option<VrbEntry> {
        self.lock().get(source, tag).cloned()
    }

    /// See [`VrbTable::reverse`].
    pub fn reverse(&self, interface: InterfaceId, address: &LinkAddress, tag: u16) -> Option<VrbEntry> {
        self.lock().reverse(interface, address, tag).cloned()
    }

    /// See [`VrbTable::remove`].
    pub fn remove(&self, key: &ForwardingKey) -> Option<VrbEntry> {
        self.lock().remove(key)
    }

    /// See [`VrbTable::gc`].
    pub fn gc(&self) -> usize {
        self.lock().gc()
    }

    /// See [`VrbTable::gc_at`].
    pub fn gc_at(&self, now: Instant) -> usize {
        self.lock().gc_at(now)
    }

    /// See [`VrbTable::reset`].
    pub fn reset(&self) {
        self.lock().reset()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Counters, readable without taking the table lock.
    pub fn stats(&self) -> &Arc<VrbStats> {
        &self.stats
    }
}
