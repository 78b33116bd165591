//! # Viewport Reconciliation Loop
//!
//! Joins the live feed with the viewport's scroll-settle samples on a single
//! task. Samples update the anchor; each new snapshot is reconciled against it
//! and may produce one programmatic [`ScrollCommand`]. Nothing here is shared
//! across tasks, so nothing is locked.
//!
//! ```text
//!  settle samples ──┐
//!                   ├──► ViewportSession ──► ScrollCommand ──► viewport
//!  snapshot feed ───┘
//! ```

use tokio::sync::mpsc;

use crate::feed::FeedSubscription;
use crate::list::{
    Anchor, AnchorTracker, ListSnapshot, Reconciler, Reconciliation, ScrollCommand, TrackOutcome,
};
use crate::logutil::short_key;
use crate::metrics;

/// One scroll-settle sample: the first visible row, how far it is scrolled,
/// and the snapshot generation that was on screen when it was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleEvent {
    pub index: usize,
    pub pixel_offset: i32,
    pub generation: u64,
}

/// Anchor state for one on-screen list.
pub struct ViewportSession<P> {
    tracker: AnchorTracker,
    reconciler: Reconciler,
    snapshot: Option<ListSnapshot<P>>,
    /// Where the viewport sits: the last current settle, or the last scroll issued.
    position: Option<(usize, i32)>,
}

impl<P> ViewportSession<P> {
    pub fn new(suppress_settle_events: u32) -> Self {
        Self {
            tracker: AnchorTracker::new(),
            reconciler: Reconciler::new(suppress_settle_events),
            snapshot: None,
            position: None,
        }
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        self.tracker.anchor()
    }

    pub fn snapshot(&self) -> Option<&ListSnapshot<P>> {
        self.snapshot.as_ref()
    }

    /// Record where the user stopped scrolling, against the snapshot on screen.
    pub fn on_settle(&mut self, event: SettleEvent) -> TrackOutcome {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return TrackOutcome::Unresolved;
        };
        // An index is only meaningful in the list it was measured in. Late echoes of
        // earlier programmatic scrolls are dropped without using up the suppression window.
        if event.generation != snapshot.generation() {
            log::trace!(
                "viewport: settle from generation {} ignored (showing {})",
                event.generation,
                snapshot.generation()
            );
            return TrackOutcome::Stale;
        }
        self.position = Some((event.index, event.pixel_offset));
        let outcome = self
            .tracker
            .on_scroll_settled(event.index, event.pixel_offset, snapshot);
        match &outcome {
            TrackOutcome::Suppressed => metrics::inc_settles_suppressed(),
            TrackOutcome::Updated(anchor) => log::trace!(
                "viewport: anchored at {}+{}px",
                short_key(anchor.key.as_str()),
                anchor.pixel_offset
            ),
            TrackOutcome::Unresolved | TrackOutcome::Stale => {}
        }
        outcome
    }

    /// Swap in a new snapshot and work out where to scroll, if anywhere.
    pub fn on_snapshot(&mut self, snapshot: ListSnapshot<P>) -> Option<ScrollCommand> {
        let outcome = self
            .reconciler
            .apply_from(&mut self.tracker, &snapshot, self.position);
        self.snapshot = Some(snapshot);
        match outcome {
            Reconciliation::Scroll(cmd) => {
                self.position = Some((cmd.index, cmd.pixel_offset));
                metrics::inc_scrolls_issued();
                log::debug!(
                    "viewport: generation {} keeps {} at row {}",
                    cmd.generation,
                    short_key(cmd.key.as_str()),
                    cmd.index
                );
                Some(cmd)
            }
            Reconciliation::Missing => {
                metrics::inc_anchor_misses();
                log::debug!("viewport: anchored row gone; holding position");
                None
            }
            Reconciliation::EmptyList
            | Reconciliation::NoAnchor
            | Reconciliation::AlreadyApplied => None,
        }
    }

    /// Viewport torn down (user navigated away).
    pub fn teardown(&mut self) {
        self.tracker.clear();
        self.reconciler.reset();
        self.snapshot = None;
        self.position = None;
    }
}

/// Drive `session` until the viewport goes away (settle channel closed, or the
/// command receiver dropped) or the feed ends. Pending commands are dropped.
pub async fn run_viewport<P>(
    mut session: ViewportSession<P>,
    mut feed: FeedSubscription<P>,
    mut settles: mpsc::Receiver<SettleEvent>,
    commands: mpsc::UnboundedSender<ScrollCommand>,
) -> ViewportSession<P> {
    if let Some(cmd) = session.on_snapshot(feed.latest()) {
        if commands.send(cmd).is_err() {
            session.teardown();
            return session;
        }
    }

    loop {
        tokio::select! {
            biased;
            settle = settles.recv() => {
                match settle {
                    Some(ev) => { session.on_settle(ev); }
                    None => break,
                }
            }
            snap = feed.next() => {
                let Some(snap) = snap else { break };
                if let Some(cmd) = session.on_snapshot(snap) {
                    if commands.send(cmd).is_err() {
                        break;
                    }
                }
            }
        }
    }
    log::debug!("viewport loop ended");
    session.teardown();
    session
}

/// In-memory stand-in for a scrolling list widget.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedViewport {
    pub first_index: usize,
    pub pixel_offset: i32,
    /// Generation of the snapshot being drawn.
    pub generation: u64,
}

impl SimulatedViewport {
    /// Draw a new snapshot without moving.
    pub fn render(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// User scroll to a position; returns the settle sample it produces.
    pub fn scroll_to(&mut self, index: usize, pixel_offset: i32) -> SettleEvent {
        self.first_index = index;
        self.pixel_offset = pixel_offset;
        self.settle()
    }

    /// Programmatic scroll, which also means the command's snapshot is on screen.
    /// Like a real list widget, a scroll that does not move emits no settle.
    pub fn apply(&mut self, cmd: &ScrollCommand) -> Option<SettleEvent> {
        self.generation = cmd.generation;
        if (self.first_index, self.pixel_offset) == (cmd.index, cmd.pixel_offset) {
            return None;
        }
        Some(self.scroll_to(cmd.index, cmd.pixel_offset))
    }

    pub fn settle(&self) -> SettleEvent {
        SettleEvent {
            index: self.first_index,
            pixel_offset: self.pixel_offset,
            generation: self.generation,
        }
    }
}
