//! Binary entrypoint for the Meshpeers CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `status` - summarise the persisted peer cache
//! - `replay --file <announces.jsonl>` - feed recorded announces through the
//!   announce stream and a simulated viewport, printing every scroll correction
//!
//! See the library crate docs for module‑level details: `meshpeers::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::Path;

use meshpeers::config::Config;
use meshpeers::list::TrackOutcome;
use meshpeers::peers::{AnnounceEvent, NodeType, PeerStore};
use meshpeers::stream::{start_announce_stream, OwnAnnounce, StreamSettings};
use meshpeers::viewport::{SimulatedViewport, ViewportSession};

#[derive(Parser)]
#[command(name = "meshpeers")]
#[command(about = "Discovered-peer announce stream with stable scroll anchoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show peer cache statistics
    Status,
    /// Replay announces (JSON lines) through the stream and a simulated viewport
    Replay {
        /// File with one announce per line
        #[arg(short, long)]
        file: String,
        /// Scroll the viewport after this many announces (0 = never)
        #[arg(long, default_value_t = 0)]
        anchor_after: usize,
        /// Row to scroll to
        #[arg(long, default_value_t = 0)]
        anchor_index: usize,
        /// Pixel offset of that row
        #[arg(long, default_value_t = 0)]
        anchor_offset: i32,
        /// Search query applied before replay
        #[arg(short, long)]
        query: Option<String>,
        /// Node types to show (peer, propagation, audio, nomad); repeatable
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
        /// Hide call.audio announces
        #[arg(long)]
        hide_audio: bool,
        /// Start from an empty list instead of the peer cache
        #[arg(long)]
        fresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            let cfg = Config::default();
            if let Some(parent) = Path::new(&cfg.storage.peer_cache).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let store = load_store(&config, false);
            let now = chrono::Utc::now();
            println!("Peer cache: {}", config.storage.peer_cache);
            println!("Peers: {}", store.len());
            println!(
                "Reachable (last {} min): {}",
                config.stream.reachable_window_minutes,
                store.reachable_count(now, config.stream.reachable_window())
            );
            let counts = store.count_by_type();
            for ty in NodeType::ALL {
                println!("  {:<12} {}", ty.to_string(), counts.get(&ty).copied().unwrap_or(0));
            }
            println!("Last updated: {}", store.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        Commands::Replay {
            file,
            anchor_after,
            anchor_index,
            anchor_offset,
            query,
            types,
            hide_audio,
            fresh,
        } => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting Meshpeers v{} replay of {}", env!("CARGO_PKG_VERSION"), file);

            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| anyhow!("Failed to read announce file {}: {}", file, e))?;

            let mut node_types = BTreeSet::new();
            for t in &types {
                node_types.insert(NodeType::parse(t)?);
            }

            let (announce_tx, mut announce_rx) = tokio::sync::mpsc::unbounded_channel::<OwnAnnounce>();
            tokio::spawn(async move {
                while let Some(req) = announce_rx.recv().await {
                    info!("(transport) would announce as '{}'", req.display_name);
                }
            });

            let stream = start_announce_stream(
                StreamSettings::from(&config.stream),
                load_store(&config, fresh),
                announce_tx,
            );
            if let Some(q) = &query {
                stream.set_search_query(q).await?;
            }
            if !node_types.is_empty() {
                stream.set_node_types(node_types);
            }
            if hide_audio {
                stream.set_show_audio(false);
            }

            let feed = stream.subscribe();
            let mut session = ViewportSession::new(config.viewport.suppress_settle_events);
            let mut view = SimulatedViewport::default();
            let mut last_generation = None;

            for (n, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match serde_json::from_str::<AnnounceEvent>(line) {
                    Ok(event) => stream.announce(event),
                    Err(e) => {
                        warn!("line {}: not an announce: {}", n + 1, e);
                        continue;
                    }
                }
                // Round trip through the task so the announce has been applied.
                let _ = stream.stats().await;
                let snap = feed.current();
                if last_generation != Some(snap.generation()) {
                    last_generation = Some(snap.generation());
                    view.render(snap.generation());
                    if let Some(cmd) = session.on_snapshot(snap) {
                        println!(
                            "line {:>4}: generation {:>4} -> scroll to row {} (+{}px) to keep {}",
                            n + 1,
                            cmd.generation,
                            cmd.index,
                            cmd.pixel_offset,
                            cmd.key
                        );
                        if let Some(echo) = view.apply(&cmd) {
                            session.on_settle(echo);
                        }
                    }
                }

                if anchor_after > 0 && n + 1 == anchor_after {
                    match session.on_settle(view.scroll_to(anchor_index, anchor_offset)) {
                        TrackOutcome::Updated(anchor) => {
                            println!("line {:>4}: anchored on {} (+{}px)", n + 1, anchor.key, anchor.pixel_offset)
                        }
                        other => println!("line {:>4}: anchor not set ({:?})", n + 1, other),
                    }
                }
            }

            if let Some(stats) = stream.stats().await {
                println!(
                    "Peers: {} total, {} visible, {} reachable; {} announces processed, {} rejected",
                    stats.total_peers,
                    stats.visible_peers,
                    stats.reachable_peers,
                    stats.announces_processed,
                    stats.announces_rejected
                );
            }
            if let Some(top) = session
                .snapshot()
                .and_then(|s| s.get(view.first_index).map(|row| row.payload.label()))
            {
                println!("Top row: {}", top);
            }
            let m = meshpeers::metrics::snapshot();
            println!(
                "Scrolls issued: {}, anchor misses: {}, settles suppressed: {}",
                m.scrolls_issued, m.anchor_misses, m.settles_suppressed
            );

            if let Some(store) = stream.shutdown().await {
                if config.storage.save_on_exit && !fresh {
                    store.save_to_file(&config.storage.peer_cache)?;
                    info!("Saved {} peer(s) to {}", store.len(), config.storage.peer_cache);
                }
            }
        }
    }

    Ok(())
}

fn load_store(config: &Config, fresh: bool) -> PeerStore {
    let path = &config.storage.peer_cache;
    if fresh || !Path::new(path).exists() {
        return PeerStore::with_capacity_limit(config.stream.max_peers());
    }
    match PeerStore::load_from_file(path) {
        Ok(mut store) => {
            store.set_capacity_limit(config.stream.max_peers());
            info!("Loaded {} peer(s) from {}", store.len(), path);
            store
        }
        Err(e) => {
            warn!("Failed to load peer cache {}: {} (starting empty)", path, e);
            PeerStore::with_capacity_limit(config.stream.max_peers())
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    let opened = log_file.as_ref().and_then(|file| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    });

    match opened {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Echo to the console only when someone is watching it
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
