//! Position anchor tracking.
//!
//! The tracker turns viewport scroll-settle samples `(first visible index, pixel
//! offset)` into an [`Anchor`]: the key of the row at that index plus the offset.
//! Because the anchor names a key and not an index, it stays meaningful after
//! rows are inserted or removed around it.

use serde::{Deserialize, Serialize};

use super::{ItemKey, ListSnapshot};

/// The user's reading position in a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub key: ItemKey,
    pub pixel_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The anchor now points at this row.
    Updated(Anchor),
    /// The index did not resolve to a row; the previous anchor is kept.
    Unresolved,
    /// The sample was produced by a programmatic scroll and was ignored.
    Suppressed,
    /// The sample was measured against a snapshot that has since been replaced.
    Stale,
}

/// Holds at most one anchor for one viewport.
#[derive(Debug, Default, Clone)]
pub struct AnchorTracker {
    anchor: Option<Anchor>,
    suppress_remaining: u32,
}

impl AnchorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }

    /// Settle events still to be ignored.
    pub fn suppressed_remaining(&self) -> u32 {
        self.suppress_remaining
    }

    /// Record a scroll-settle sample against the snapshot currently on screen.
    pub fn on_scroll_settled<P>(
        &mut self,
        index: usize,
        pixel_offset: i32,
        snapshot: &ListSnapshot<P>,
    ) -> TrackOutcome {
        if self.suppress_remaining > 0 {
            self.suppress_remaining -= 1;
            log::trace!(
                "anchor: settle at {}+{}px suppressed ({} left)",
                index,
                pixel_offset,
                self.suppress_remaining
            );
            return TrackOutcome::Suppressed;
        }

        // Transient empty lists must not lose the reading position.
        let Some(item) = snapshot.get(index) else {
            log::trace!(
                "anchor: index {} unresolvable in generation {} (len {})",
                index,
                snapshot.generation(),
                snapshot.len()
            );
            return TrackOutcome::Unresolved;
        };

        let anchor = Anchor {
            key: item.key.clone(),
            pixel_offset,
        };
        self.anchor = Some(anchor.clone());
        TrackOutcome::Updated(anchor)
    }

    /// Ignore the next `count` settle events. Re-arming replaces the window.
    pub fn suppress_next(&mut self, count: u32) {
        self.suppress_remaining = count;
    }

    /// Viewport teardown.
    pub fn clear(&mut self) {
        self.anchor = None;
        self.suppress_remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::keyed;

    #[test]
    fn resolves_index_to_key() {
        let snap = keyed(1, &["a", "b", "c"]);
        let mut tracker = AnchorTracker::new();
        let outcome = tracker.on_scroll_settled(2, 15, &snap);
        let expected = Anchor {
            key: ItemKey::new("c"),
            pixel_offset: 15,
        };
        assert_eq!(outcome, TrackOutcome::Updated(expected.clone()));
        assert_eq!(tracker.anchor(), Some(&expected));
    }

    #[test]
    fn unresolvable_index_keeps_previous_anchor() {
        let snap = keyed(1, &["a", "b"]);
        let mut tracker = AnchorTracker::new();
        tracker.on_scroll_settled(1, 8, &snap);

        assert_eq!(
            tracker.on_scroll_settled(5, 0, &snap),
            TrackOutcome::Unresolved
        );
        assert_eq!(
            tracker.on_scroll_settled(0, 0, &keyed(2, &[])),
            TrackOutcome::Unresolved
        );
        assert_eq!(tracker.anchor().unwrap().key, ItemKey::new("b"));
        assert_eq!(tracker.anchor().unwrap().pixel_offset, 8);
    }

    #[test]
    fn suppression_swallows_exactly_the_window() {
        let snap = keyed(1, &["a", "b", "c"]);
        let mut tracker = AnchorTracker::new();
        tracker.on_scroll_settled(0, 0, &snap);
        tracker.suppress_next(1);

        assert_eq!(
            tracker.on_scroll_settled(2, 0, &snap),
            TrackOutcome::Suppressed
        );
        assert_eq!(tracker.anchor().unwrap().key, ItemKey::new("a"));
        assert!(matches!(
            tracker.on_scroll_settled(2, 0, &snap),
            TrackOutcome::Updated(_)
        ));
    }

    #[test]
    fn rearming_does_not_accumulate() {
        let mut tracker = AnchorTracker::new();
        tracker.suppress_next(1);
        tracker.suppress_next(1);
        assert_eq!(tracker.suppressed_remaining(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let snap = keyed(1, &["a"]);
        let mut tracker = AnchorTracker::new();
        tracker.on_scroll_settled(0, 3, &snap);
        tracker.suppress_next(2);
        tracker.clear();
        assert!(tracker.anchor().is_none());
        assert_eq!(tracker.suppressed_remaining(), 0);
    }
}
