//! Idle tile eviction and rate-limited teardown
//!
//! Removing links and navigation data from the backend is expensive, so
//! eviction only queues handles. The queues are drained a bounded batch per
//! tick: links first, and data only once no link is left queued.

use crate::backend::{LinkHandle, NavDataHandle, SurfaceBaker};
use crate::config::NavTileConfig;
use crate::tile::{StitchLink, TileKey};
use crate::tile_store::TileStore;
use std::collections::VecDeque;

/// A queued handle and the order it was enqueued in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedRemoval<H> {
    pub handle: H,
    pub seq: u64,
}

/// Outcome of one drain call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub links_removed: usize,
    pub data_removed: usize,
    /// The backend refused a removal; the entry stays queued
    pub stalled: bool,
}

#[derive(Debug, Default)]
pub struct RemovalQueues {
    links: VecDeque<QueuedRemoval<LinkHandle>>,
    data: VecDeque<QueuedRemoval<NavDataHandle>>,
    next_seq: u64,
}

impl RemovalQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn queue_link(&mut self, handle: LinkHandle) {
        let seq = self.next_seq();
        self.links.push_back(QueuedRemoval { handle, seq });
    }

    pub fn queue_links(&mut self, links: impl IntoIterator<Item = StitchLink>) {
        for link in links {
            self.queue_link(link.handle);
        }
    }

    pub fn queue_data(&mut self, handle: NavDataHandle) {
        let seq = self.next_seq();
        self.data.push_back(QueuedRemoval { handle, seq });
    }

    pub fn link_len(&self) -> usize {
        self.links.len()
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.data.is_empty()
    }

    pub fn queued_links(&self) -> impl Iterator<Item = &QueuedRemoval<LinkHandle>> {
        self.links.iter()
    }

    pub fn queued_data(&self) -> impl Iterator<Item = &QueuedRemoval<NavDataHandle>> {
        self.data.iter()
    }

    /// Removes one bounded batch from the backend.
    ///
    /// Links go first, `max(floor, len / divisor)` per call. Data handles are
    /// only touched once the link queue is empty, `data_drain_batch` per call.
    pub fn drain<B: SurfaceBaker + ?Sized>(
        &mut self,
        baker: &mut B,
        config: &NavTileConfig,
    ) -> DrainReport {
        let mut report = DrainReport::default();

        if !self.links.is_empty() {
            let batch = config.link_drain_batch(self.links.len());
            while report.links_removed < batch {
                let Some(entry) = self.links.front().copied() else {
                    break;
                };
                if let Err(e) = baker.remove_link(entry.handle) {
                    log::warn!("Failed to remove link {:?}, will retry: {}", entry.handle, e);
                    report.stalled = true;
                    return report;
                }
                self.links.pop_front();
                report.links_removed += 1;
            }
            return report;
        }

        while report.data_removed < config.data_drain_batch {
            let Some(entry) = self.data.front().copied() else {
                break;
            };
            if let Err(e) = baker.remove_data(entry.handle) {
                log::warn!(
                    "Failed to remove nav data {:?}, will retry: {}",
                    entry.handle,
                    e
                );
                report.stalled = true;
                return report;
            }
            self.data.pop_front();
            report.data_removed += 1;
        }

        report
    }
}

/// Removes tiles that have not been poked for longer than the timeout
#[derive(Debug)]
pub struct Evictor {
    timeout: f64,
    evicted_total: u64,
}

impl Evictor {
    pub fn new(timeout: f64) -> Self {
        Self {
            timeout,
            evicted_total: 0,
        }
    }

    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    /// Evicts at most one expired tile.
    ///
    /// The tile's links are queued before its data handle, then the entry is
    /// dropped from the store.
    pub fn tick(
        &mut self,
        now: f64,
        store: &mut TileStore,
        queues: &mut RemovalQueues,
    ) -> Option<TileKey> {
        let key = store
            .iter()
            .find(|tile| now - tile.poke_time > self.timeout)
            .map(|tile| tile.key)?;

        let mut tile = store.remove(&key)?;
        let links = tile.take_all_links();
        let link_count = links.len();
        queues.queue_links(links);
        if let Some(data) = tile.data.take() {
            queues.queue_data(data);
        }

        self.evicted_total += 1;
        log::debug!(
            "Evicted tile {} after {:.1}s idle ({} links queued)",
            key,
            now - tile.poke_time,
            link_count
        );
        Some(key)
    }
}
