//! Superseding layout results.
//!
//! Rapid edits can start several repacks in a row. Each one takes a ticket;
//! only the result of the most recently started run is kept. A run that has
//! been superseded is dropped even if its successor has not finished yet, so
//! an outdated map is never shown in between.
//! Renderers read an `Arc` snapshot and never see a page map change under
//! them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::PageMap;

/// Identifies one packing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct LayoutSnapshots {
    issued: AtomicU64,
    latest: Mutex<Option<(Ticket, Arc<PageMap>)>>,
}

impl LayoutSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a packing run.
    pub fn begin(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no newer run has started since `ticket` was issued.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Publish a result. Returns `false` and drops the map if a newer run
    /// has started since `ticket` was issued.
    pub fn publish(&self, ticket: Ticket, page_map: PageMap) -> bool {
        let mut latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !self.is_current(ticket) {
            log::debug!("discarding stale page map {:?}", ticket);
            return false;
        }
        *latest = Some((ticket, Arc::new(page_map)));
        true
    }

    /// The most recent published page map.
    pub fn latest(&self) -> Option<Arc<PageMap>> {
        let latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        latest.as_ref().map(|(_, map)| Arc::clone(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pages: usize) -> PageMap {
        PageMap {
            total_pages: pages,
            pages: Vec::new(),
        }
    }

    #[test]
    fn newer_result_supersedes() {
        let snapshots = LayoutSnapshots::new();
        let first = snapshots.begin();
        let second = snapshots.begin();
        assert!(!snapshots.is_current(first));
        assert!(snapshots.is_current(second));

        assert!(snapshots.publish(second, map(2)));
        // The slow first run finishes late and is dropped
        assert!(!snapshots.publish(first, map(1)));
        assert_eq!(snapshots.latest().unwrap().total_pages, 2);
    }

    #[test]
    fn superseded_run_is_dropped_before_successor_finishes() {
        let snapshots = LayoutSnapshots::new();
        let t1 = snapshots.begin();
        assert!(snapshots.publish(t1, map(1)));
        let stale = snapshots.begin();
        let _fresh = snapshots.begin();
        assert!(!snapshots.publish(stale, map(2)));
        assert_eq!(snapshots.latest().unwrap().total_pages, 1);
    }

    #[test]
    fn snapshot_survives_later_publish() {
        let snapshots = LayoutSnapshots::new();
        let t1 = snapshots.begin();
        snapshots.publish(t1, map(1));
        let held = snapshots.latest().unwrap();
        let t2 = snapshots.begin();
        snapshots.publish(t2, map(3));
        assert_eq!(held.total_pages, 1);
        assert_eq!(snapshots.latest().unwrap().total_pages, 3);
    }
}
