use meshpeers::list::{
    reconcile, AnchorTracker, ItemKey, ListItem, ListSnapshot, Reconciler, Reconciliation,
    TrackOutcome,
};
use meshpeers::viewport::{SimulatedViewport, ViewportSession};

fn peers(generation: u64, names: &[String]) -> ListSnapshot<String> {
    let items = names
        .iter()
        .map(|n| ListItem::new(ItemKey::new(n.clone()), format!("payload of {n}")))
        .collect();
    ListSnapshot::new(generation, items).expect("unique keys")
}

fn names(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("{prefix}{i}")).collect()
}

fn anchored_on(key: &str, offset: i32, snap: &ListSnapshot<String>) -> AnchorTracker {
    let mut tracker = AnchorTracker::new();
    let idx = snap.index_of(&ItemKey::new(key)).expect("key present");
    assert!(matches!(
        tracker.on_scroll_settled(idx, offset, snap),
        TrackOutcome::Updated(_)
    ));
    tracker
}

#[test]
fn scenario_a_insertions_before_anchor() {
    let old = peers(1, &names("peer", 0..20));
    let mut tracker = anchored_on("peer7", 40, &old);

    let mut next = names("fresh", 0..3);
    next.extend(names("peer", 0..20));
    let new = peers(2, &next);

    let mut reconciler = Reconciler::new(1);
    let cmd = reconciler
        .apply(&mut tracker, &new)
        .scroll()
        .expect("scroll expected");
    assert_eq!(cmd.index, 7 + 3);
    assert_eq!(cmd.pixel_offset, 40);
    assert_eq!(cmd.key, ItemKey::new("peer7"));
}

#[test]
fn scenario_b_anchor_deleted() {
    let old = peers(1, &names("peer", 0..20));
    let mut tracker = anchored_on("peer7", 40, &old);

    let remaining: Vec<String> = names("peer", 0..20)
        .into_iter()
        .filter(|n| n != "peer7")
        .collect();
    let new = peers(2, &remaining);

    let mut session_view = SimulatedViewport::default();
    session_view.scroll_to(7, 40);
    let before = session_view;

    let mut reconciler = Reconciler::new(1);
    assert_eq!(reconciler.apply(&mut tracker, &new), Reconciliation::Missing);
    assert_eq!(session_view, before);
    // Stale until the next natural settle.
    assert_eq!(tracker.anchor().unwrap().key, ItemKey::new("peer7"));
    assert_eq!(tracker.suppressed_remaining(), 0);

    tracker.on_scroll_settled(7, 40, &new);
    assert_eq!(tracker.anchor().unwrap().key, ItemKey::new("peer8"));
}

#[test]
fn scenario_c_list_cleared_then_repopulated() {
    let mut session = ViewportSession::new(1);
    let mut view = SimulatedViewport::default();
    session.on_snapshot(peers(1, &names("peer", 0..5)));
    view.render(1);
    session.on_settle(view.scroll_to(3, 12));

    assert!(session.on_snapshot(peers(2, &[])).is_none());
    view.render(2);
    // A settle against the empty list cannot resolve and must not drop the anchor.
    assert_eq!(session.on_settle(view.settle()), TrackOutcome::Unresolved);
    assert_eq!(session.anchor().unwrap().key, ItemKey::new("peer3"));

    let mut back = names("new", 0..2);
    back.extend(names("peer", 0..5));
    let cmd = session.on_snapshot(peers(3, &back)).expect("anchor resolvable again");
    assert_eq!(cmd.index, 5);
    assert_eq!(cmd.pixel_offset, 12);
}

#[test]
fn anchor_stability_under_mixed_mutations() {
    let base = names("peer", 0..30);
    for anchor_idx in [0usize, 1, 14, 29] {
        for inserted_before in [0usize, 1, 5] {
            for removed_after in [0usize, 3] {
                let old = peers(1, &base);
                let key = base[anchor_idx].clone();
                let mut tracker = anchored_on(&key, 17, &old);

                // Insert new rows at the top, drop some rows after the anchor.
                let mut next = names("ins", 0..inserted_before);
                next.extend(
                    base.iter()
                        .enumerate()
                        .filter(|(i, _)| !(*i > anchor_idx && *i <= anchor_idx + removed_after))
                        .map(|(_, n)| n.clone()),
                );
                let new = peers(2, &next);

                let cmd = Reconciler::new(1)
                    .apply(&mut tracker, &new)
                    .scroll()
                    .expect("anchor still present");
                let mut view = SimulatedViewport::default();
                view.apply(&cmd);
                assert_eq!(new.get(view.first_index).unwrap().key, ItemKey::new(key.clone()));
                assert_eq!(view.pixel_offset, 17);
            }
        }
    }
}

#[test]
fn repeated_reconciliation_is_idempotent() {
    let old = peers(1, &names("peer", 0..10));
    let mut tracker = anchored_on("peer4", 0, &old);
    let new = peers(2, &names("peer", 2..10));

    let mut reconciler = Reconciler::new(1);
    let first = reconciler.apply(&mut tracker, &new);
    assert!(matches!(first, Reconciliation::Scroll(_)));
    for _ in 0..5 {
        assert!(reconciler.apply(&mut tracker, &new).scroll().is_none());
    }
}

#[test]
fn empty_snapshot_never_scrolls() {
    let empty: ListSnapshot<String> = ListSnapshot::empty(9);
    assert_eq!(reconcile(None, &empty), Reconciliation::EmptyList);

    let old = peers(1, &names("peer", 0..3));
    let mut tracker = anchored_on("peer1", 5, &old);
    let mut reconciler = Reconciler::new(1);
    assert_eq!(reconciler.apply(&mut tracker, &empty), Reconciliation::EmptyList);
    assert_eq!(tracker.suppressed_remaining(), 0);
}

#[test]
fn rapid_churn_keeps_anchor_with_single_suppression() {
    let mut session = ViewportSession::new(1);
    let mut view = SimulatedViewport::default();
    session.on_snapshot(peers(1, &names("peer", 0..20)));
    view.render(1);
    session.on_settle(view.scroll_to(7, 40));

    // Several snapshots land before the viewport reports any settle.
    let mut pending_echoes = Vec::new();
    for generation in 2..8u64 {
        let mut next = names(&format!("g{generation}-"), 0..(generation as usize));
        next.extend(names("peer", 0..20));
        if let Some(cmd) = session.on_snapshot(peers(generation, &next)) {
            pending_echoes.extend(view.apply(&cmd));
        }
    }
    assert_eq!(pending_echoes.len(), 6);

    // The echoes arrive late and in a burst. All but the last were measured against
    // replaced snapshots; the last one is the programmatic scroll itself.
    let last_echo = pending_echoes.pop().unwrap();
    for echo in pending_echoes {
        assert_eq!(session.on_settle(echo), TrackOutcome::Stale);
    }
    assert_eq!(session.on_settle(last_echo), TrackOutcome::Suppressed);
    assert_eq!(session.anchor().unwrap().key, ItemKey::new("peer7"));
    assert_eq!(session.anchor().unwrap().pixel_offset, 40);

    let last = session.snapshot().unwrap();
    assert_eq!(last.get(view.first_index).unwrap().key, ItemKey::new("peer7"));
}
