//! Reconciliation of a tracked anchor against a freshly delivered snapshot.
//!
//! [`reconcile`] is the pure lookup. [`Reconciler`] adds the two pieces of
//! state the viewport needs around it: idempotence per snapshot generation, and
//! arming the tracker's suppression window so the programmatic scroll it issues
//! is not read back as a user scroll.

use super::{Anchor, AnchorTracker, ItemKey, ListSnapshot};

/// Instruction for the viewport: bring `index` to the top at `pixel_offset`.
/// Always a programmatic scroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollCommand {
    pub key: ItemKey,
    pub index: usize,
    pub pixel_offset: i32,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Scroll(ScrollCommand),
    /// The anchored row is gone; scroll position stays where it is.
    Missing,
    /// Nothing to scroll.
    EmptyList,
    /// No reading position has been recorded yet.
    NoAnchor,
    /// This anchor was already reconciled against this snapshot.
    AlreadyApplied,
}

impl Reconciliation {
    pub fn scroll(self) -> Option<ScrollCommand> {
        match self {
            Reconciliation::Scroll(cmd) => Some(cmd),
            _ => None,
        }
    }
}

/// Find where `anchor` lives in `snapshot`.
pub fn reconcile<P>(anchor: Option<&Anchor>, snapshot: &ListSnapshot<P>) -> Reconciliation {
    if snapshot.is_empty() {
        return Reconciliation::EmptyList;
    }
    let Some(anchor) = anchor else {
        return Reconciliation::NoAnchor;
    };
    match snapshot.index_of(&anchor.key) {
        Some(index) => Reconciliation::Scroll(ScrollCommand {
            key: anchor.key.clone(),
            index,
            pixel_offset: anchor.pixel_offset,
            generation: snapshot.generation(),
        }),
        None => Reconciliation::Missing,
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    suppress_settles: u32,
    last_applied: Option<(u64, Anchor)>,
}

impl Reconciler {
    /// `suppress_settles` is how many settle events to ignore after each scroll issued.
    pub fn new(suppress_settles: u32) -> Self {
        Self {
            suppress_settles,
            last_applied: None,
        }
    }

    pub fn apply<P>(
        &mut self,
        tracker: &mut AnchorTracker,
        snapshot: &ListSnapshot<P>,
    ) -> Reconciliation {
        self.apply_from(tracker, snapshot, None)
    }

    /// Like [`apply`](Self::apply), with `shown` the `(index, pixel_offset)` the
    /// viewport currently sits at. A scroll to that exact spot moves nothing and
    /// produces no settle event, so it arms no suppression.
    pub fn apply_from<P>(
        &mut self,
        tracker: &mut AnchorTracker,
        snapshot: &ListSnapshot<P>,
        shown: Option<(usize, i32)>,
    ) -> Reconciliation {
        if let (Some((generation, applied)), Some(current)) =
            (self.last_applied.as_ref(), tracker.anchor())
        {
            if *generation == snapshot.generation() && applied == current {
                return Reconciliation::AlreadyApplied;
            }
        }

        let outcome = reconcile(tracker.anchor(), snapshot);
        if let Reconciliation::Scroll(cmd) = &outcome {
            let moves = shown != Some((cmd.index, cmd.pixel_offset));
            if moves && self.suppress_settles > 0 {
                tracker.suppress_next(self.suppress_settles);
            }
            self.last_applied = Some((
                cmd.generation,
                Anchor {
                    key: cmd.key.clone(),
                    pixel_offset: cmd.pixel_offset,
                },
            ));
        }
        outcome
    }

    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}
