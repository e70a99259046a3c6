//! Shared interval lists describing already-forwarded byte ranges.
//!
//! Interval nodes are allocated by the fragmentation buffer. A forwarding
//! entry only holds a handle to the head of a chain and may link further
//! chains onto its tail; it never copies or frees nodes. Two handles refer
//! to the same node iff [`Arc::ptr_eq`] holds.

use log::warn;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to an interval node.
pub type IntervalRef = Arc<Interval>;

/// A contiguous byte range `[start, end]` of the original datagram.
#[derive(Debug)]
pub struct Interval {
    /// First byte offset of the range.
    pub start: u16,
    /// Last byte offset of the range (inclusive).
    pub end: u16,
    next: Mutex<Option<IntervalRef>>,
}

impl Interval {
    /// Allocate a standalone interval node.
    pub fn new(start: u16, end: u16) -> IntervalRef {
        Arc::new(Self {
            start,
            end,
            next: Mutex::new(None),
        })
    }

    /// Build a chain from ranges, returning its head.
    pub fn chain(ranges: &[(u16, u16)]) -> Option<IntervalRef> {
        let mut head: Option<IntervalRef> = None;
        for &(start, end) in ranges.iter().rev() {
            let node = Self::new(start, end);
            node.set_next(head.take());
            head = Some(node);
        }
        head
    }

    /// The next node in the chain, if any.
    pub fn next(&self) -> Option<IntervalRef> {
        self.lock_next().clone()
    }

    /// Replace the successor link.
    pub fn set_next(&self, next: Option<IntervalRef>) {
        *self.lock_next() = next;
    }

    fn lock_next(&self) -> MutexGuard<'_, Option<IntervalRef>> {
        match self.next.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("interval link mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Iterator over a chain, starting at a head handle.
pub struct IntervalIter {
    cur: Option<IntervalRef>,
}

impl Iterator for IntervalIter {
    type Item = IntervalRef;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur.take()?;
        self.cur = node.next();
        Some(node)
    }
}

/// Walk a chain from `head`.
pub fn iter(head: Option<&IntervalRef>) -> IntervalIter {
    IntervalIter {
        cur: head.cloned(),
    }
}

/// Whether `needle` is one of the nodes reachable from `head`.
pub fn contains(head: &IntervalRef, needle: &IntervalRef) -> bool {
    iter(Some(head)).any(|node| Arc::ptr_eq(&node, needle))
}

/// Outcome of merging a supplied chain into an entry's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The entry had no chain and adopted the supplied one.
    Adopted,
    /// The supplied chain was linked onto the entry chain's tail.
    Appended,
    /// The supplied chain already contained the entry chain and became its head.
    Replaced,
    /// Nothing to do: already linked, or linking would create a cycle.
    Unchanged,
}

/// Merge `incoming` into the chain rooted at `head`.
///
/// The result is always acyclic provided both inputs are.
pub fn merge(head: &mut Option<IntervalRef>, incoming: &IntervalRef) -> MergeOutcome {
    let current = match head {
        Some(current) => current.clone(),
        None => {
            *head = Some(incoming.clone());
            return MergeOutcome::Adopted;
        }
    };
    if contains(&current, incoming) {
        return MergeOutcome::Unchanged;
    }

    let mut tail = current.clone();
    while let Some(next) = tail.next() {
        tail = next;
    }

    if contains(incoming, &tail) {
        // incoming already runs into our chain; only take it over when it
        // covers the whole chain, otherwise leave both untouched
        if contains(incoming, &current) {
            *head = Some(incoming.clone());
            return MergeOutcome::Replaced;
        }
        return MergeOutcome::Unchanged;
    }

    tail.set_next(Some(incoming.clone()));
    MergeOutcome::Appended
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(head: Option<&IntervalRef>) -> Vec<(u16, u16)> {
        iter(head).map(|n| (n.start, n.end)).collect()
    }

    #[test]
    fn test_chain_builds_in_order() {
        let head = Interval::chain(&[(0, 63), (64, 127)]);
        assert_eq!(ranges(head.as_ref()), vec![(0, 63), (64, 127)]);
        assert!(Interval::chain(&[]).is_none());
    }

    #[test]
    fn test_merge_into_empty_adopts() {
        let mut head = None;
        let incoming = Interval::new(0, 10);
        assert_eq!(merge(&mut head, &incoming), MergeOutcome::Adopted);
        assert!(Arc::ptr_eq(head.as_ref().unwrap(), &incoming));
    }

    #[test]
    fn test_merge_appends_at_tail() {
        let mut head = Interval::chain(&[(0, 9), (10, 19)]);
        let incoming = Interval::new(20, 29);
        assert_eq!(merge(&mut head, &incoming), MergeOutcome::Appended);
        assert_eq!(ranges(head.as_ref()), vec![(0, 9), (10, 19), (20, 29)]);
    }

    #[test]
    fn test_double_merge_does_not_cycle() {
        let mut head = Interval::chain(&[(0, 9)]);
        let incoming = Interval::new(10, 19);
        merge(&mut head, &incoming);
        // merging the tail node again must not link it to itself
        assert_eq!(merge(&mut head, &incoming), MergeOutcome::Unchanged);
        assert_eq!(ranges(head.as_ref()).len(), 2);
    }

    #[test]
    fn test_merge_of_own_head_is_noop() {
        let mut head = Interval::chain(&[(0, 9), (10, 19)]);
        let same = head.clone().unwrap();
        assert_eq!(merge(&mut head, &same), MergeOutcome::Unchanged);
        assert_eq!(ranges(head.as_ref()).len(), 2);
    }

    #[test]
    fn test_superset_chain_replaces_head() {
        let existing = Interval::new(10, 19);
        let incoming = Interval::new(0, 9);
        incoming.set_next(Some(existing.clone()));

        let mut head = Some(existing);
        assert_eq!(merge(&mut head, &incoming), MergeOutcome::Replaced);
        assert_eq!(ranges(head.as_ref()), vec![(0, 9), (10, 19)]);
    }

    #[test]
    fn test_partial_overlap_left_alone() {
        let shared_tail = Interval::new(20, 29);
        let existing = Interval::new(0, 9);
        existing.set_next(Some(shared_tail.clone()));
        let incoming = Interval::new(10, 19);
        incoming.set_next(Some(shared_tail));

        let mut head = Some(existing);
        assert_eq!(merge(&mut head, &incoming), MergeOutcome::Unchanged);
        assert_eq!(ranges(head.as_ref()), vec![(0, 9), (20, 29)]);
    }
}
