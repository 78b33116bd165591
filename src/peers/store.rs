//! Peer repository keyed by destination hash, persisted as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{AnnounceEvent, DiscoveredPeer, NodeType, PeerError};
use crate::list::ItemKey;
use crate::logutil::{escape_log, short_key};

/// Default cap on stored peers before least-recently-heard eviction kicks in.
pub const DEFAULT_MAX_PEERS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    New { evicted: Option<ItemKey> },
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerStore {
    peers: HashMap<ItemKey, DiscoveredPeer>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip, default = "default_max_peers")]
    max_peers: usize,
}

fn default_max_peers() -> usize {
    DEFAULT_MAX_PEERS
}

impl PeerStore {
    pub fn new() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_PEERS)
    }

    pub fn with_capacity_limit(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            last_updated: Utc::now(),
            max_peers: max_peers.max(1),
        }
    }

    pub fn set_capacity_limit(&mut self, max_peers: usize) {
        self.max_peers = max_peers.max(1);
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&DiscoveredPeer> {
        self.peers.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredPeer> {
        self.peers.values()
    }

    /// Insert or refresh the peer an announce came from.
    pub fn record_announce(&mut self, event: &AnnounceEvent) -> Result<RecordOutcome, PeerError> {
        let key = event.key()?;
        let node_type = NodeType::from_aspect(&event.aspect)?;
        let at = event.received_at()?;

        if let Some(peer) = self.peers.get_mut(&key) {
            if let Some(name) = crate::validation::sanitize_display_name(&event.app_data) {
                peer.display_name = Some(name);
            }
            peer.node_type = node_type;
            peer.hops = event.hop_count();
            if event.interface.is_some() {
                peer.interface = event.interface.clone();
            }
            // Announces can be replayed out of order; never move last_seen backwards.
            if at > peer.last_seen {
                peer.last_seen = at;
            }
            peer.announce_count = peer.announce_count.saturating_add(1);
            self.last_updated = Utc::now();
            return Ok(RecordOutcome::Updated);
        }

        let evicted = if self.peers.len() >= self.max_peers {
            // Favorites are never evicted to make room, so a store full of them refuses newcomers.
            match self.evict_oldest() {
                Some(victim) => Some(victim),
                None => return Err(PeerError::StoreFull { max: self.max_peers }),
            }
        } else {
            None
        };

        let peer = DiscoveredPeer::from_announce(key.clone(), node_type, event, at);
        log::debug!(
            "new {} {} '{}' ({} hops)",
            node_type,
            short_key(key.as_str()),
            escape_log(&peer.label()),
            peer.hops
        );
        self.peers.insert(key, peer);
        self.last_updated = Utc::now();
        Ok(RecordOutcome::New { evicted })
    }

    fn evict_oldest(&mut self) -> Option<ItemKey> {
        let victim = self
            .peers
            .values()
            .filter(|p| !p.favorite)
            .min_by(|a, b| a.last_seen.cmp(&b.last_seen).then(a.key.cmp(&b.key)))
            .map(|p| p.key.clone())?;
        self.peers.remove(&victim);
        log::debug!("peer store full; evicted {}", short_key(victim.as_str()));
        Some(victim)
    }

    pub fn delete(&mut self, key: &ItemKey) -> bool {
        let removed = self.peers.remove(key).is_some();
        if removed {
            self.last_updated = Utc::now();
        }
        removed
    }

    pub fn delete_all(&mut self) -> usize {
        let n = self.peers.len();
        self.peers.clear();
        self.last_updated = Utc::now();
        n
    }

    pub fn set_favorite(&mut self, key: &ItemKey, favorite: bool) -> bool {
        match self.peers.get_mut(key) {
            Some(peer) => {
                peer.favorite = favorite;
                self.last_updated = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Peers heard within `window` of `now`.
    pub fn reachable_count(&self, now: DateTime<Utc>, window: chrono::Duration) -> usize {
        self.peers
            .values()
            .filter(|p| p.heard_within(now, window))
            .count()
    }

    /// Drop non-favorite peers not heard within `max_age`. Returns how many went.
    pub fn remove_stale(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) -> usize {
        // A window reaching past the representable range means nothing is stale yet.
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return 0;
        };
        let initial = self.peers.len();
        self.peers.retain(|_, p| p.favorite || p.last_seen > cutoff);
        let removed = initial - self.peers.len();
        if removed > 0 {
            self.last_updated = Utc::now();
        }
        removed
    }

    pub fn count_by_type(&self) -> HashMap<NodeType, usize> {
        let mut counts = HashMap::new();
        for peer in self.peers.values() {
            *counts.entry(peer.node_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PeerError> {
        let content = std::fs::read_to_string(path)?;
        // Interrupted writes have been seen to leave leading NULs behind.
        let cleaned = content.trim_start_matches('\0');
        let store: PeerStore = serde_json::from_str(cleaned)?;
        Ok(store)
    }

    /// Write atomically: temp file in the same directory, fsync, rename.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PeerError> {
        use std::fs::{self as sfs, File, OpenOptions};
        use std::io::Write;
        let path_ref = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                sfs::create_dir_all(parent)?;
            }
        }

        let dir = match path_ref.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let base = path_ref
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("peers.json");
        let mut counter = 0u32;
        let tmp_path = loop {
            let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    tmp.write_all(content.as_bytes())?;
                    tmp.flush()?;
                    let _ = tmp.sync_all();
                    break candidate;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                    continue;
                }
                Err(e) => return Err(PeerError::Io(e)),
            }
        };

        sfs::rename(&tmp_path, path_ref)?;
        if let Ok(dir_file) = File::open(dir) {
            let _ = dir_file.sync_all();
        }
        Ok(())
    }
}

impl Default for PeerStore {
    fn default() -> Self {
        Self::new()
    }
}
