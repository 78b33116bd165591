//! # Meshpeers - Discovered-Peer Announce Stream for Mesh Messaging Clients
//!
//! Meshpeers keeps the list of destinations heard on a Reticulum-style mesh
//! (messaging peers, propagation nodes, audio endpoints, NomadNet nodes) and
//! publishes it as a stream of immutable snapshots. A viewport showing that list
//! keeps the user's reading position while peers arrive and disappear: the
//! position is remembered as the *key* of the top row plus a pixel offset, and
//! every new snapshot is reconciled against it.
//!
//! ## Features
//!
//! - **Keyed Snapshots**: rows identified by destination hash, never by index.
//! - **Anchor Tracking**: scroll-settle samples become `(key, offset)` anchors; transient empty lists keep the last one.
//! - **Reconciliation**: new snapshots scroll back to the anchored row; removed rows leave the view alone; repeats are no-ops.
//! - **Feedback Suppression**: programmatic scrolls are not mistaken for user scrolls.
//! - **Peer Repository**: upsert from announces, delete one/all, reachable count, stale eviction, atomic JSON cache.
//! - **Filtering**: search text, node-type set and an audio-announce toggle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshpeers::config::Config;
//! use meshpeers::peers::PeerStore;
//! use meshpeers::stream::{start_announce_stream, StreamSettings};
//! use meshpeers::viewport::{run_viewport, ViewportSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (announce_tx, _announce_rx) = tokio::sync::mpsc::unbounded_channel();
//!     let stream = start_announce_stream(
//!         StreamSettings::from(&config.stream),
//!         PeerStore::new(),
//!         announce_tx,
//!     );
//!
//!     let (_settle_tx, settle_rx) = tokio::sync::mpsc::channel(32);
//!     let (scroll_tx, _scroll_rx) = tokio::sync::mpsc::unbounded_channel();
//!     let session = ViewportSession::new(config.viewport.suppress_settle_events);
//!     run_viewport(session, stream.subscribe(), settle_rx, scroll_tx).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`list`] - keys, snapshots, anchor tracker and reconciliation
//! - [`feed`] - push-based snapshot delivery
//! - [`peers`] - announce events, peer repository and filter
//! - [`stream`] - the announce stream task and its handle
//! - [`viewport`] - the reconciliation loop for one on-screen list
//! - [`config`] - configuration management and validation
//! - [`validation`] - hash and display-name validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Announce Stream │ ← PeerStore + PeerFilter, one task
//! └─────────────────┘
//!          │ full snapshots
//! ┌─────────────────┐
//! │  Snapshot Feed  │
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Viewport Loop   │ ← anchor tracking + reconciliation
//! └─────────────────┘
//! ```

pub mod config;
pub mod feed;
pub mod list;
pub mod logutil;
pub mod metrics;
pub mod peers;
pub mod stream;
pub mod validation;
pub mod viewport;
