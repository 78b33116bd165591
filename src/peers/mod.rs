//! # Discovered Peers
//!
//! Everything the announce stream knows about other destinations on the mesh.
//!
//! - [`AnnounceEvent`] - one decoded announce as handed over by the network layer
//! - [`NodeType`] - what kind of destination announced, derived from its aspect
//! - [`DiscoveredPeer`] - the accumulated record for one destination hash
//! - [`store::PeerStore`] - the repository (upsert, delete, reachability, eviction, persistence)
//! - [`filter::PeerFilter`] - search query, node-type set and audio toggle
//!
//! Announces for different aspects of one identity carry different destination
//! hashes, so each destination is its own row.

pub mod filter;
pub mod store;

pub use filter::PeerFilter;
pub use store::{PeerStore, RecordOutcome};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::list::ItemKey;
use crate::logutil::short_key;
use crate::validation::{sanitize_display_name, ValidationError};

/// Hop count Reticulum reports when no path is known.
pub const PATHFINDER_M: u8 = 128;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("invalid announce: {0}")]
    Validation(#[from] ValidationError),

    #[error("announce timestamp {0} ms is out of range")]
    InvalidTimestamp(i64),

    #[error("peer store full ({max} peers, all favorites)")]
    StoreFull { max: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer cache format error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// LXMF messaging endpoint (`lxmf.delivery`).
    Peer,
    /// LXMF propagation node (`lxmf.propagation`).
    PropagationNode,
    /// Voice call endpoint (`call.audio`).
    Audio,
    /// NomadNet page server (`nomadnetwork.node`).
    NomadNode,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Peer,
        NodeType::PropagationNode,
        NodeType::Audio,
        NodeType::NomadNode,
    ];

    pub fn from_aspect(aspect: &str) -> Result<Self, ValidationError> {
        match aspect.trim() {
            "lxmf.delivery" => Ok(NodeType::Peer),
            "lxmf.propagation" => Ok(NodeType::PropagationNode),
            "call.audio" => Ok(NodeType::Audio),
            "nomadnetwork.node" => Ok(NodeType::NomadNode),
            other => Err(ValidationError::UnknownAspect(other.to_string())),
        }
    }

    pub fn aspect(self) -> &'static str {
        match self {
            NodeType::Peer => "lxmf.delivery",
            NodeType::PropagationNode => "lxmf.propagation",
            NodeType::Audio => "call.audio",
            NodeType::NomadNode => "nomadnetwork.node",
        }
    }

    /// Parse a user-facing name (`peer`, `propagation`, `audio`, `nomad`) or an aspect.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "peer" | "peers" => Ok(NodeType::Peer),
            "propagation" | "propagation_node" => Ok(NodeType::PropagationNode),
            "audio" => Ok(NodeType::Audio),
            "nomad" | "nomad_node" => Ok(NodeType::NomadNode),
            _ => Self::from_aspect(name),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeType::Peer => "peer",
            NodeType::PropagationNode => "propagation",
            NodeType::Audio => "audio",
            NodeType::NomadNode => "nomad",
        };
        f.write_str(label)
    }
}

/// A received announce, already decoded by the network layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceEvent {
    /// Hex destination hash.
    pub destination_hash: String,
    /// Aspect the announce matched, e.g. `lxmf.delivery`.
    pub aspect: String,
    /// Raw app data (hex encoded on the wire); for LXMF this carries the display name.
    #[serde(default, with = "hex_bytes")]
    pub app_data: Vec<u8>,
    #[serde(default)]
    pub hops: Option<u8>,
    /// Receive time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    #[serde(default)]
    pub interface: Option<String>,
}

impl AnnounceEvent {
    pub fn new(destination_hash: impl Into<String>, node_type: NodeType, timestamp: DateTime<Utc>) -> Self {
        Self {
            destination_hash: destination_hash.into(),
            aspect: node_type.aspect().to_string(),
            app_data: Vec::new(),
            hops: None,
            timestamp_ms: timestamp.timestamp_millis(),
            interface: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.app_data = name.as_bytes().to_vec();
        self
    }

    pub fn with_hops(mut self, hops: u8) -> Self {
        self.hops = Some(hops);
        self
    }

    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    /// Hops to the destination; unknown paths count as direct.
    pub fn hop_count(&self) -> u8 {
        match self.hops {
            Some(h) if h < PATHFINDER_M => h,
            _ => 0,
        }
    }

    pub fn received_at(&self) -> Result<DateTime<Utc>, PeerError> {
        Utc.timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or(PeerError::InvalidTimestamp(self.timestamp_ms))
    }

    pub fn key(&self) -> Result<ItemKey, ValidationError> {
        ItemKey::parse_hash(&self.destination_hash)
    }
}

/// Accumulated record for one announcing destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPeer {
    pub key: ItemKey,
    pub node_type: NodeType,
    pub display_name: Option<String>,
    pub hops: u8,
    pub interface: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub announce_count: u64,
    #[serde(default)]
    pub favorite: bool,
}

impl DiscoveredPeer {
    pub(crate) fn from_announce(
        key: ItemKey,
        node_type: NodeType,
        event: &AnnounceEvent,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            node_type,
            display_name: sanitize_display_name(&event.app_data),
            hops: event.hop_count(),
            interface: event.interface.clone(),
            first_seen: at,
            last_seen: at,
            announce_count: 1,
            favorite: false,
        }
    }

    /// Name to show: the announced display name, else the abbreviated hash.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => short_key(self.key.as_str()),
        }
    }

    pub fn heard_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_seen) <= window
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspects_map_to_node_types() {
        for ty in NodeType::ALL {
            assert_eq!(NodeType::from_aspect(ty.aspect()).unwrap(), ty);
        }
        assert!(matches!(
            NodeType::from_aspect("rnstransport.probe"),
            Err(ValidationError::UnknownAspect(_))
        ));
        assert_eq!(NodeType::parse("Audio").unwrap(), NodeType::Audio);
        assert_eq!(NodeType::parse("lxmf.propagation").unwrap(), NodeType::PropagationNode);
    }

    #[test]
    fn unknown_path_counts_as_direct() {
        let ev = AnnounceEvent::new("00".repeat(16), NodeType::Peer, Utc::now());
        assert_eq!(ev.hop_count(), 0);
        assert_eq!(ev.clone().with_hops(PATHFINDER_M).hop_count(), 0);
        assert_eq!(ev.with_hops(3).hop_count(), 3);
    }

    #[test]
    fn announce_json_uses_hex_app_data() {
        let line = r#"{"destination_hash":"0123456789abcdef0123456789abcdef","aspect":"lxmf.delivery","app_data":"416c696365","hops":2,"timestamp_ms":1700000000000,"interface":"RNodeInterface[LoRa]"}"#;
        let ev: AnnounceEvent = serde_json::from_str(line).unwrap();
        assert_eq!(ev.app_data, b"Alice");
        assert_eq!(ev.hop_count(), 2);
        assert_eq!(ev.received_at().unwrap().timestamp(), 1_700_000_000);

        let back = serde_json::to_string(&ev).unwrap();
        assert!(back.contains("\"app_data\":\"416c696365\""));
    }

    #[test]
    fn label_falls_back_to_short_hash() {
        let ev = AnnounceEvent::new("ab".repeat(16), NodeType::Peer, Utc::now());
        let key = ev.key().unwrap();
        let peer = DiscoveredPeer::from_announce(key, NodeType::Peer, &ev, Utc::now());
        assert_eq!(peer.label(), "<abababab…>");
    }
}
