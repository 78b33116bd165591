//! Announce stream service.
//!
//! A single task owns the [`PeerStore`], the active [`PeerFilter`] and the
//! [`SnapshotFeed`]. Everything else talks to it through an
//! [`AnnounceStreamHandle`], so the store is never shared and never locked.
//! Any command that can change the visible list republishes a full snapshot.
//!
//! Commands:
//! * `announce` - record a received announce (fire and forget).
//! * `delete` / `delete_all` / `set_favorite` - repository edits.
//! * `set_search_query` / `set_node_types` / `set_show_audio` - filter state.
//!   A query sent after shutdown fails with [`QueryError::StreamClosed`].
//! * `trigger_announce` - ask the network layer to announce us; the result is
//!   the success/error signal for the caller.
//! * `stats` / `shutdown`.
//!
//! A housekeeping tick evicts stale peers and republishes when anything went.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use crate::config::StreamConfig;
use crate::feed::{FeedSubscription, SnapshotFeed};
use crate::list::ItemKey;
use crate::logutil::{escape_log, short_key};
use crate::metrics;
use crate::peers::{AnnounceEvent, DiscoveredPeer, NodeType, PeerFilter, PeerStore, RecordOutcome};
use crate::validation::{normalize_query, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnounceError {
    #[error("announce rate limited; retry in {retry_in:?}")]
    RateLimited { retry_in: Duration },
    #[error("transport is not accepting announces")]
    TransportClosed,
    #[error("announce stream has shut down")]
    StreamClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("announce stream has shut down")]
    StreamClosed,
}

/// Request for the network layer to announce our own destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnAnnounce {
    pub display_name: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub display_name: String,
    pub reachable_window: chrono::Duration,
    pub stale_after: chrono::Duration,
    pub housekeeping_interval: Duration,
    pub announce_min_interval: Duration,
    pub max_peers: usize,
    pub max_query_chars: usize,
}

impl From<&StreamConfig> for StreamSettings {
    fn from(cfg: &StreamConfig) -> Self {
        Self {
            display_name: cfg.display_name.clone(),
            reachable_window: cfg.reachable_window(),
            stale_after: cfg.stale_after(),
            housekeeping_interval: cfg.housekeeping_interval(),
            announce_min_interval: cfg.announce_min_interval(),
            max_peers: cfg.max_peers(),
            max_query_chars: cfg.max_query_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub total_peers: usize,
    pub visible_peers: usize,
    pub reachable_peers: usize,
    pub generation: u64,
    pub announces_processed: u64,
    pub announces_rejected: u64,
}

pub enum StreamCommand {
    Announce(AnnounceEvent),
    Delete(ItemKey, oneshot::Sender<bool>),
    DeleteAll(oneshot::Sender<usize>),
    SetFavorite(ItemKey, bool, oneshot::Sender<bool>),
    SetSearchQuery(String, oneshot::Sender<Result<(), ValidationError>>),
    SetNodeTypes(BTreeSet<NodeType>),
    SetShowAudio(bool),
    TriggerAnnounce(oneshot::Sender<Result<(), AnnounceError>>),
    Stats(oneshot::Sender<StreamStats>),
    Shutdown(oneshot::Sender<PeerStore>),
}

#[derive(Clone)]
pub struct AnnounceStreamHandle {
    tx: mpsc::UnboundedSender<StreamCommand>,
    feed: FeedSubscription<DiscoveredPeer>,
}

impl AnnounceStreamHandle {
    pub fn announce(&self, event: AnnounceEvent) {
        let _ = self.tx.send(StreamCommand::Announce(event));
    }

    pub async fn delete(&self, key: ItemKey) -> bool {
        self.request(|tx| StreamCommand::Delete(key, tx))
            .await
            .unwrap_or(false)
    }

    pub async fn delete_all(&self) -> usize {
        self.request(StreamCommand::DeleteAll).await.unwrap_or(0)
    }

    pub async fn set_favorite(&self, key: ItemKey, favorite: bool) -> bool {
        self.request(|tx| StreamCommand::SetFavorite(key, favorite, tx))
            .await
            .unwrap_or(false)
    }

    pub async fn set_search_query(&self, query: &str) -> Result<(), QueryError> {
        let query = query.to_string();
        match self.request(|tx| StreamCommand::SetSearchQuery(query, tx)).await {
            Some(result) => result.map_err(QueryError::from),
            None => Err(QueryError::StreamClosed),
        }
    }

    pub fn set_node_types(&self, types: BTreeSet<NodeType>) {
        let _ = self.tx.send(StreamCommand::SetNodeTypes(types));
    }

    pub fn set_show_audio(&self, show: bool) {
        let _ = self.tx.send(StreamCommand::SetShowAudio(show));
    }

    pub async fn trigger_announce(&self) -> Result<(), AnnounceError> {
        self.request(StreamCommand::TriggerAnnounce)
            .await
            .unwrap_or(Err(AnnounceError::StreamClosed))
    }

    pub async fn stats(&self) -> Option<StreamStats> {
        self.request(StreamCommand::Stats).await
    }

    /// Stop the task and take back the store (for persisting).
    pub async fn shutdown(&self) -> Option<PeerStore> {
        self.request(StreamCommand::Shutdown).await
    }

    pub fn subscribe(&self) -> FeedSubscription<DiscoveredPeer> {
        self.feed.clone()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> StreamCommand) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(make(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }
}

struct StreamState {
    settings: StreamSettings,
    store: PeerStore,
    filter: PeerFilter,
    feed: SnapshotFeed<DiscoveredPeer>,
    outbound: mpsc::UnboundedSender<OwnAnnounce>,
    last_own_announce: Option<Instant>,
    processed: u64,
    rejected: u64,
}

impl StreamState {
    fn publish(&mut self) {
        let rows = self.filter.apply(&self.store);
        self.feed.publish(rows);
    }

    fn record(&mut self, event: AnnounceEvent) -> bool {
        metrics::inc_announces_received();
        match self.store.record_announce(&event) {
            Ok(outcome) => {
                self.processed += 1;
                if let RecordOutcome::New { evicted: Some(_) } = outcome {
                    metrics::add_peers_evicted(1);
                }
                true
            }
            Err(e) => {
                self.rejected += 1;
                metrics::inc_announces_rejected();
                log::warn!(
                    "rejected announce from {}: {}",
                    escape_log(&event.destination_hash),
                    e
                );
                false
            }
        }
    }

    fn trigger_announce(&mut self) -> Result<(), AnnounceError> {
        let now = Instant::now();
        if let Some(last) = self.last_own_announce {
            let elapsed = now.duration_since(last);
            if elapsed < self.settings.announce_min_interval {
                return Err(AnnounceError::RateLimited {
                    retry_in: self.settings.announce_min_interval - elapsed,
                });
            }
        }
        let req = OwnAnnounce {
            display_name: self.settings.display_name.clone(),
            requested_at: Utc::now(),
        };
        self.outbound
            .send(req)
            .map_err(|_| AnnounceError::TransportClosed)?;
        self.last_own_announce = Some(now);
        metrics::inc_own_announces_sent();
        log::info!("announce sent as '{}'", escape_log(&self.settings.display_name));
        Ok(())
    }

    fn housekeeping(&mut self) {
        let removed = self
            .store
            .remove_stale(Utc::now(), self.settings.stale_after);
        if removed > 0 {
            metrics::add_peers_evicted(removed as u64);
            log::info!("housekeeping: evicted {} stale peer(s)", removed);
            self.publish();
        }
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            total_peers: self.store.len(),
            visible_peers: self.feed.current().len(),
            reachable_peers: self
                .store
                .reachable_count(Utc::now(), self.settings.reachable_window),
            generation: self.feed.generation(),
            announces_processed: self.processed,
            announces_rejected: self.rejected,
        }
    }
}

/// Spawn the announce stream task. The initial snapshot reflects `store` as given.
pub fn start_announce_stream(
    settings: StreamSettings,
    mut store: PeerStore,
    outbound: mpsc::UnboundedSender<OwnAnnounce>,
) -> AnnounceStreamHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<StreamCommand>();
    store.set_capacity_limit(settings.max_peers);
    let feed = SnapshotFeed::new();
    let handle = AnnounceStreamHandle {
        tx,
        feed: feed.subscribe(),
    };

    let mut state = StreamState {
        settings,
        store,
        filter: PeerFilter::default(),
        feed,
        outbound,
        last_own_announce: None,
        processed: 0,
        rejected: 0,
    };
    state.publish();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.settings.housekeeping_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match cmd {
                        StreamCommand::Announce(event) => {
                            if state.record(event) {
                                state.publish();
                            }
                        }
                        StreamCommand::Delete(key, resp) => {
                            let removed = state.store.delete(&key);
                            if removed {
                                log::info!("deleted peer {}", short_key(key.as_str()));
                                state.publish();
                            }
                            let _ = resp.send(removed);
                        }
                        StreamCommand::DeleteAll(resp) => {
                            let n = state.store.delete_all();
                            log::info!("deleted all {} peer(s)", n);
                            state.publish();
                            let _ = resp.send(n);
                        }
                        StreamCommand::SetFavorite(key, favorite, resp) => {
                            let found = state.store.set_favorite(&key, favorite);
                            if found {
                                state.publish();
                            }
                            let _ = resp.send(found);
                        }
                        StreamCommand::SetSearchQuery(query, resp) => {
                            match normalize_query(&query, state.settings.max_query_chars) {
                                Ok(q) => {
                                    if q != state.filter.search_query {
                                        state.filter.search_query = q;
                                        state.publish();
                                    }
                                    let _ = resp.send(Ok(()));
                                }
                                Err(e) => { let _ = resp.send(Err(e)); }
                            }
                        }
                        StreamCommand::SetNodeTypes(types) => {
                            if types != state.filter.node_types {
                                state.filter.node_types = types;
                                state.publish();
                            }
                        }
                        StreamCommand::SetShowAudio(show) => {
                            if show != state.filter.show_audio {
                                state.filter.show_audio = show;
                                state.publish();
                            }
                        }
                        StreamCommand::TriggerAnnounce(resp) => {
                            let result = state.trigger_announce();
                            if let Err(e) = &result {
                                log::warn!("announce trigger failed: {}", e);
                            }
                            let _ = resp.send(result);
                        }
                        StreamCommand::Stats(resp) => { let _ = resp.send(state.stats()); }
                        StreamCommand::Shutdown(done) => {
                            let _ = done.send(state.store);
                            log::debug!("announce stream shut down");
                            return;
                        }
                    }
                }
                _ = ticker.tick() => state.housekeeping(),
            }
        }
        log::debug!("announce stream loop terminated");
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StreamSettings {
        StreamSettings {
            display_name: "tester".into(),
            reachable_window: chrono::Duration::minutes(30),
            stale_after: chrono::Duration::hours(24),
            housekeeping_interval: Duration::from_secs(3600),
            announce_min_interval: Duration::from_secs(60),
            max_peers: 100,
            max_query_chars: 16,
        }
    }

    #[tokio::test]
    async fn trigger_is_rate_limited() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let handle = start_announce_stream(settings(), PeerStore::new(), out_tx);

        assert_eq!(handle.trigger_announce().await, Ok(()));
        let sent = out_rx.recv().await.unwrap();
        assert_eq!(sent.display_name, "tester");
        assert!(matches!(
            handle.trigger_announce().await,
            Err(AnnounceError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn trigger_reports_closed_transport() {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        drop(out_rx);
        let handle = start_announce_stream(settings(), PeerStore::new(), out_tx);
        assert_eq!(
            handle.trigger_announce().await,
            Err(AnnounceError::TransportClosed)
        );
    }

    #[tokio::test]
    async fn shutdown_returns_store_and_closes_handle() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let handle = start_announce_stream(settings(), PeerStore::new(), out_tx);
        handle.announce(AnnounceEvent::new("ab".repeat(16), NodeType::Peer, Utc::now()));
        let store = handle.shutdown().await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(handle.stats().await.is_none());
        assert_eq!(
            handle.trigger_announce().await,
            Err(AnnounceError::StreamClosed)
        );
        assert_eq!(
            handle.set_search_query("alice").await,
            Err(QueryError::StreamClosed)
        );
    }

    #[tokio::test]
    async fn overlong_query_is_rejected() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let handle = start_announce_stream(settings(), PeerStore::new(), out_tx);
        assert!(matches!(
            handle.set_search_query(&"x".repeat(40)).await,
            Err(QueryError::Invalid(ValidationError::QueryTooLong { max: 16 }))
        ));
        assert!(handle.set_search_query("ok").await.is_ok());
    }
}
