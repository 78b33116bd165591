//! Announce stream filter: search text, node types, audio toggle.

use std::collections::BTreeSet;

use super::{DiscoveredPeer, NodeType, PeerStore};
use crate::list::ListItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFilter {
    /// Lowercased; matched against display names and hash prefixes.
    pub search_query: String,
    /// Types to show. Empty means every type.
    pub node_types: BTreeSet<NodeType>,
    /// When false, `call.audio` announces are hidden regardless of `node_types`.
    pub show_audio: bool,
}

impl Default for PeerFilter {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            node_types: BTreeSet::new(),
            show_audio: true,
        }
    }
}

impl PeerFilter {
    pub fn matches(&self, peer: &DiscoveredPeer) -> bool {
        if !self.show_audio && peer.node_type == NodeType::Audio {
            return false;
        }
        if !self.node_types.is_empty() && !self.node_types.contains(&peer.node_type) {
            return false;
        }
        if self.search_query.is_empty() {
            return true;
        }
        let q = self.search_query.as_str();
        peer.key.as_str().starts_with(q)
            || peer
                .display_name
                .as_ref()
                .map(|n| n.to_lowercase().contains(q))
                .unwrap_or(false)
    }

    /// Visible rows, most recently heard first, ties by key.
    pub fn apply(&self, store: &PeerStore) -> Vec<ListItem<DiscoveredPeer>> {
        let mut rows: Vec<&DiscoveredPeer> = store.iter().filter(|p| self.matches(p)).collect();
        rows.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.key.cmp(&b.key)));
        rows.into_iter()
            .map(|p| ListItem::new(p.key.clone(), p.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::AnnounceEvent;
    use chrono::{Duration, Utc};

    fn store() -> PeerStore {
        let now = Utc::now();
        let mut store = PeerStore::new();
        let rows = [
            ("aa", NodeType::Peer, "Alice", 3),
            ("bb", NodeType::Audio, "Alice phone", 2),
            ("cc", NodeType::PropagationNode, "Relay Hill", 1),
            ("dd", NodeType::Peer, "Bob", 0),
        ];
        for (h, ty, name, age) in rows {
            let ev = AnnounceEvent::new(h.repeat(16), ty, now - Duration::minutes(age)).with_name(name);
            store.record_announce(&ev).unwrap();
        }
        store
    }

    fn keys(rows: &[ListItem<DiscoveredPeer>]) -> Vec<String> {
        rows.iter().map(|r| r.key.as_str()[..2].to_string()).collect()
    }

    #[test]
    fn default_shows_everything_newest_first() {
        let rows = PeerFilter::default().apply(&store());
        assert_eq!(keys(&rows), ["dd", "cc", "bb", "aa"]);
    }

    #[test]
    fn audio_toggle_hides_audio_even_when_selected() {
        let filter = PeerFilter {
            show_audio: false,
            node_types: [NodeType::Audio, NodeType::Peer].into_iter().collect(),
            ..PeerFilter::default()
        };
        assert_eq!(keys(&filter.apply(&store())), ["dd", "aa"]);
    }

    #[test]
    fn search_matches_name_or_hash_prefix() {
        let by_name = PeerFilter {
            search_query: "alice".into(),
            ..PeerFilter::default()
        };
        assert_eq!(keys(&by_name.apply(&store())), ["bb", "aa"]);

        let by_hash = PeerFilter {
            search_query: "cccc".into(),
            ..PeerFilter::default()
        };
        assert_eq!(keys(&by_hash.apply(&store())), ["cc"]);
    }
}
