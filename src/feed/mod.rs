//! # Live Update Feed
//!
//! Push-based delivery of full [`ListSnapshot`]s. The publisher stamps every
//! snapshot with the next generation number and replaces the current one in a
//! single step; subscribers that fall behind skip straight to the latest list.
//! Snapshots are never diffs, so a consumer can always do a fresh key lookup.
//!
//! ```rust
//! use meshpeers::feed::SnapshotFeed;
//! use meshpeers::list::{ItemKey, ListItem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut feed = SnapshotFeed::new();
//!     let mut sub = feed.subscribe();
//!     feed.publish(vec![ListItem::new(ItemKey::new("peer1"), "Alice")]);
//!     let snap = sub.next().await.unwrap();
//!     assert_eq!(snap.len(), 1);
//! }
//! ```

use tokio::sync::watch;

use crate::list::{ListItem, ListSnapshot};
use crate::metrics;

/// Publishing side of the feed.
pub struct SnapshotFeed<P> {
    tx: watch::Sender<ListSnapshot<P>>,
    generation: u64,
}

impl<P> SnapshotFeed<P> {
    /// A feed whose current value is an empty generation-0 snapshot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ListSnapshot::empty(0));
        Self { tx, generation: 0 }
    }

    /// Replace the current snapshot. Rows with a key already seen earlier in
    /// `items` are dropped.
    pub fn publish(&mut self, items: Vec<ListItem<P>>) -> ListSnapshot<P> {
        self.generation += 1;
        let (snapshot, dropped) = ListSnapshot::dedup(self.generation, items);
        if dropped > 0 {
            log::warn!(
                "feed: dropped {} duplicate row(s) from generation {}",
                dropped,
                self.generation
            );
        }
        self.tx.send_replace(snapshot.clone());
        metrics::inc_snapshots_published();
        log::debug!(
            "feed: published generation {} ({} rows, {} subscriber(s))",
            snapshot.generation(),
            snapshot.len(),
            self.tx.receiver_count()
        );
        snapshot
    }

    pub fn current(&self) -> ListSnapshot<P> {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&self) -> FeedSubscription<P> {
        FeedSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl<P> Default for SnapshotFeed<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the feed.
pub struct FeedSubscription<P> {
    rx: watch::Receiver<ListSnapshot<P>>,
}

impl<P> Clone for FeedSubscription<P> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<P> FeedSubscription<P> {
    /// Latest snapshot, without waiting and without marking it seen.
    pub fn current(&self) -> ListSnapshot<P> {
        self.rx.borrow().clone()
    }

    /// Latest snapshot, marked seen so [`next`](Self::next) waits for a newer one.
    pub fn latest(&mut self) -> ListSnapshot<P> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for a snapshot newer than the last one returned. `None` once the
    /// publisher is gone.
    pub async fn next(&mut self) -> Option<ListSnapshot<P>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ItemKey;

    fn rows(keys: &[&str]) -> Vec<ListItem<u32>> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| ListItem::new(ItemKey::new(*k), i as u32))
            .collect()
    }

    #[tokio::test]
    async fn generations_increase_per_publish() {
        let mut feed = SnapshotFeed::new();
        let mut sub = feed.subscribe();
        feed.publish(rows(&["a"]));
        assert_eq!(sub.next().await.unwrap().generation(), 1);
        feed.publish(rows(&["a", "b"]));
        let snap = sub.next().await.unwrap();
        assert_eq!(snap.generation(), 2);
        assert_eq!(snap.len(), 2);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_only_latest() {
        let mut feed = SnapshotFeed::new();
        let mut sub = feed.subscribe();
        feed.publish(rows(&["a"]));
        feed.publish(rows(&["a", "b"]));
        feed.publish(rows(&["c"]));
        let snap = sub.next().await.unwrap();
        assert_eq!(snap.generation(), 3);
        assert_eq!(snap.get(0).unwrap().key, ItemKey::new("c"));
    }

    #[tokio::test]
    async fn closes_when_publisher_dropped() {
        let feed: SnapshotFeed<u32> = SnapshotFeed::new();
        let mut sub = feed.subscribe();
        drop(feed);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn latest_marks_snapshot_seen() {
        let mut feed = SnapshotFeed::new();
        let mut sub = feed.subscribe();
        feed.publish(rows(&["a"]));
        assert_eq!(sub.latest().generation(), 1);
        feed.publish(rows(&["b"]));
        assert_eq!(sub.next().await.unwrap().generation(), 2);
    }

    #[test]
    fn duplicates_are_dropped_on_publish() {
        let mut feed = SnapshotFeed::new();
        let snap = feed.publish(rows(&["a", "b", "a"]));
        assert_eq!(snap.len(), 2);
        assert!(feed.current().ptr_eq(&snap));
    }
}
