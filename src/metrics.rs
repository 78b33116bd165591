//! Process-wide counters for the announce stream and viewport reconciliation.
use std::sync::atomic::{AtomicU64, Ordering};

static ANNOUNCES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static ANNOUNCES_REJECTED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_PUBLISHED: AtomicU64 = AtomicU64::new(0);
static PEERS_EVICTED: AtomicU64 = AtomicU64::new(0);
static SCROLLS_ISSUED: AtomicU64 = AtomicU64::new(0);
static ANCHOR_MISSES: AtomicU64 = AtomicU64::new(0);
static SETTLES_SUPPRESSED: AtomicU64 = AtomicU64::new(0);
static OWN_ANNOUNCES_SENT: AtomicU64 = AtomicU64::new(0);

pub fn inc_announces_received() {
    ANNOUNCES_RECEIVED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_announces_rejected() {
    ANNOUNCES_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_snapshots_published() {
    SNAPSHOTS_PUBLISHED.fetch_add(1, Ordering::Relaxed);
}
pub fn add_peers_evicted(n: u64) {
    PEERS_EVICTED.fetch_add(n, Ordering::Relaxed);
}
pub fn inc_scrolls_issued() {
    SCROLLS_ISSUED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_anchor_misses() {
    ANCHOR_MISSES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_settles_suppressed() {
    SETTLES_SUPPRESSED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_own_announces_sent() {
    OWN_ANNOUNCES_SENT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub announces_received: u64,
    pub announces_rejected: u64,
    pub snapshots_published: u64,
    pub peers_evicted: u64,
    pub scrolls_issued: u64,
    pub anchor_misses: u64,
    pub settles_suppressed: u64,
    pub own_announces_sent: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        announces_received: ANNOUNCES_RECEIVED.load(Ordering::Relaxed),
        announces_rejected: ANNOUNCES_REJECTED.load(Ordering::Relaxed),
        snapshots_published: SNAPSHOTS_PUBLISHED.load(Ordering::Relaxed),
        peers_evicted: PEERS_EVICTED.load(Ordering::Relaxed),
        scrolls_issued: SCROLLS_ISSUED.load(Ordering::Relaxed),
        anchor_misses: ANCHOR_MISSES.load(Ordering::Relaxed),
        settles_suppressed: SETTLES_SUPPRESSED.load(Ordering::Relaxed),
        own_announces_sent: OWN_ANNOUNCES_SENT.load(Ordering::Relaxed),
    }
}
