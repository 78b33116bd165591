//! # Keyed List Snapshots
//!
//! Immutable, ordered views of a live list (discovered peers, map markers) in
//! which every row is identified by a stable [`ItemKey`] rather than by its
//! position. Indices shift every time the list is refreshed; keys do not.
//!
//! ## Components
//!
//! - [`ItemKey`] / [`ListItem`] - fingerprinted rows, compared by key only
//! - [`ListSnapshot`] - one complete ordered list at a point in time
//! - [`anchor`] - tracks the user's reading position as `(key, pixel offset)`
//! - [`reconcile`] - maps that position onto a newly arrived snapshot
//!
//! ## Example
//!
//! ```rust
//! use meshpeers::list::{AnchorTracker, ItemKey, ListItem, ListSnapshot, Reconciler};
//!
//! let items = |keys: &[&str]| -> Vec<ListItem<()>> {
//!     keys.iter().map(|k| ListItem::new(ItemKey::new(*k), ())).collect()
//! };
//! let first = ListSnapshot::new(1, items(&["a", "b", "c"])).unwrap();
//! let mut tracker = AnchorTracker::new();
//! tracker.on_scroll_settled(1, 40, &first);
//!
//! let second = ListSnapshot::new(2, items(&["new", "a", "b", "c"])).unwrap();
//! let mut reconciler = Reconciler::new(1);
//! let cmd = reconciler.apply(&mut tracker, &second).scroll().unwrap();
//! assert_eq!((cmd.index, cmd.pixel_offset), (2, 40));
//! ```

pub mod anchor;
pub mod reconcile;

pub use anchor::{Anchor, AnchorTracker, TrackOutcome};
pub use reconcile::{reconcile, Reconciler, Reconciliation, ScrollCommand};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::validation::{validate_destination_hash, ValidationError, DESTINATION_HASH_LEN};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ListError {
    #[error("duplicate key {key} at positions {first} and {second}")]
    DuplicateKey {
        key: ItemKey,
        first: usize,
        second: usize,
    },
}

/// Stable identifier of a list row.
///
/// For peers this is the lowercase hex destination hash; other lists may use any
/// string that survives reordering, or derive one from content with [`ItemKey::from_content`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(key: impl Into<String>) -> Self {
        ItemKey(key.into())
    }

    pub fn from_hash(hash: &[u8; DESTINATION_HASH_LEN]) -> Self {
        ItemKey(hex::encode(hash))
    }

    /// Parse a hex destination hash, normalising case.
    pub fn parse_hash(input: &str) -> Result<Self, ValidationError> {
        validate_destination_hash(input).map(ItemKey)
    }

    /// Truncated SHA-256 of `content`, the same length as a destination hash.
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        ItemKey(hex::encode(&digest[..DESTINATION_HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row of a snapshot: a key plus whatever the screen displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem<P> {
    pub key: ItemKey,
    pub payload: P,
}

impl<P> ListItem<P> {
    pub fn new(key: ItemKey, payload: P) -> Self {
        Self { key, payload }
    }

    /// Reconciliation identity: two rows are the same row when their keys match,
    /// whatever their payloads say.
    pub fn same_key(&self, other: &ListItem<P>) -> bool {
        self.key == other.key
    }
}

struct SnapshotInner<P> {
    generation: u64,
    items: Vec<ListItem<P>>,
    positions: HashMap<ItemKey, usize>,
}

/// One complete, ordered list at a moment in time.
///
/// Snapshots are never modified after construction; clones share storage.
pub struct ListSnapshot<P> {
    inner: Arc<SnapshotInner<P>>,
}

impl<P> Clone for ListSnapshot<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for ListSnapshot<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListSnapshot")
            .field("generation", &self.inner.generation)
            .field("items", &self.inner.items)
            .finish()
    }
}

impl<P> ListSnapshot<P> {
    /// Build a snapshot, rejecting duplicate keys.
    pub fn new(generation: u64, items: Vec<ListItem<P>>) -> Result<Self, ListError> {
        let mut positions = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if let Some(first) = positions.insert(item.key.clone(), i) {
                return Err(ListError::DuplicateKey {
                    key: item.key.clone(),
                    first,
                    second: i,
                });
            }
        }
        Ok(Self::from_parts(generation, items, positions))
    }

    /// Build a snapshot, keeping the first row for each key and dropping the rest.
    /// Returns the snapshot and how many rows were dropped.
    pub fn dedup(generation: u64, items: Vec<ListItem<P>>) -> (Self, usize) {
        let mut positions = HashMap::with_capacity(items.len());
        let mut kept = Vec::with_capacity(items.len());
        let mut dropped = 0usize;
        for item in items {
            if positions.contains_key(&item.key) {
                dropped += 1;
                continue;
            }
            positions.insert(item.key.clone(), kept.len());
            kept.push(item);
        }
        (Self::from_parts(generation, kept, positions), dropped)
    }

    pub fn empty(generation: u64) -> Self {
        Self::from_parts(generation, Vec::new(), HashMap::new())
    }

    fn from_parts(
        generation: u64,
        items: Vec<ListItem<P>>,
        positions: HashMap<ItemKey, usize>,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                generation,
                items,
                positions,
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }

    pub fn items(&self) -> &[ListItem<P>] {
        &self.inner.items
    }

    pub fn get(&self, index: usize) -> Option<&ListItem<P>> {
        self.inner.items.get(index)
    }

    pub fn index_of(&self, key: &ItemKey) -> Option<usize> {
        self.inner.positions.get(key).copied()
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.inner.positions.contains_key(key)
    }

    /// Rows of page `page` (zero based) when the list is split into pages of
    /// `page_size`. Out-of-range pages are empty.
    pub fn page(&self, page: usize, page_size: usize) -> &[ListItem<P>] {
        if page_size == 0 {
            return &[];
        }
        let len = self.inner.items.len();
        let start = page.saturating_mul(page_size).min(len);
        let end = start.saturating_add(page_size).min(len);
        &self.inner.items[start..end]
    }

    /// True when both handles point at the same underlying snapshot.
    pub fn ptr_eq(&self, other: &ListSnapshot<P>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
pub(crate) fn keyed(generation: u64, keys: &[&str]) -> ListSnapshot<()> {
    let items = keys
        .iter()
        .map(|k| ListItem::new(ItemKey::new(*k), ()))
        .collect();
    ListSnapshot::new(generation, items).expect("unique test keys")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_keys() {
        let items = vec![
            ListItem::new(ItemKey::new("a"), 1),
            ListItem::new(ItemKey::new("b"), 2),
            ListItem::new(ItemKey::new("a"), 3),
        ];
        let err = ListSnapshot::new(1, items).unwrap_err();
        assert_eq!(
            err,
            ListError::DuplicateKey {
                key: ItemKey::new("a"),
                first: 0,
                second: 2
            }
        );
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let items = vec![
            ListItem::new(ItemKey::new("a"), "first"),
            ListItem::new(ItemKey::new("b"), "b"),
            ListItem::new(ItemKey::new("a"), "second"),
        ];
        let (snap, dropped) = ListSnapshot::dedup(4, items);
        assert_eq!(dropped, 1);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get(0).unwrap().payload, "first");
        assert_eq!(snap.index_of(&ItemKey::new("b")), Some(1));
        assert_eq!(snap.generation(), 4);
    }

    #[test]
    fn equality_is_by_key_only() {
        let a = ListItem::new(ItemKey::new("peer"), "Alice");
        let b = ListItem::new(ItemKey::new("peer"), "Alice (renamed)");
        assert!(a.same_key(&b));
    }

    #[test]
    fn paging_clamps_to_bounds() {
        let snap = keyed(1, &["a", "b", "c", "d", "e"]);
        assert_eq!(snap.page(0, 2).len(), 2);
        assert_eq!(snap.page(2, 2).len(), 1);
        assert!(snap.page(3, 2).is_empty());
        assert!(snap.page(0, 0).is_empty());
        assert_eq!(snap.page(1, 2)[0].key, ItemKey::new("c"));
    }

    #[test]
    fn content_keys_are_stable_and_hash_sized() {
        let a = ItemKey::from_content(b"marker:51.5,-0.12");
        let b = ItemKey::from_content(b"marker:51.5,-0.12");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), DESTINATION_HASH_LEN * 2);
        assert_ne!(a, ItemKey::from_content(b"marker:48.8,2.35"));
    }

    #[test]
    fn hash_keys_normalise_case() {
        let parsed = ItemKey::parse_hash("ABCDEF0123456789ABCDEF0123456789").unwrap();
        assert_eq!(parsed.as_str(), "abcdef0123456789abcdef0123456789");
        let raw = [0xabu8; DESTINATION_HASH_LEN];
        assert_eq!(ItemKey::from_hash(&raw).as_str(), "ab".repeat(16));
    }

    #[test]
    fn clones_share_storage() {
        let snap = keyed(1, &["a"]);
        let copy = snap.clone();
        assert!(snap.ptr_eq(&copy));
        assert!(!snap.ptr_eq(&keyed(1, &["a"])));
    }
}
