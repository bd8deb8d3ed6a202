//! # trg
//!
//! Core of a remote client for the Transmission BitTorrent daemon.
//!
//! ## Features
//!
//! - **Bencode + .torrent parsing**: decode metainfo files into a payload tree
//!   with per-file wanted flags and priorities
//! - **RPC transport**: session-token handling and HTTP basic auth
//! - **Synchronization**: a local mirror of the daemon's torrents kept current
//!   by full and incremental refreshes
//! - **Async**: Built on Tokio; every request is non-blocking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trg::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default().hostname("seedbox.lan");
//!     let client = Client::new(config)?;
//!
//!     let mut events = client.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Modules
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod scheduler;
pub mod store;
pub mod torrent;
pub mod types;

// Re-exports for convenience
pub use client::Client;
pub use config::{ClientConfig, HttpConfig};
pub use error::{AuthErrorKind, ClientError, NetworkErrorKind, ProtocolErrorKind, Result};
pub use types::{
    ClientEvent, ConnectionState, Priority, SessionField, SessionState, Torrent, TorrentField,
    TorrentFile, TorrentId, TorrentSelector, TorrentStatus, Tracker,
};

// RPC exports
pub use rpc::{AddSource, AddTorrent, AddedTorrent, RpcRequest, RpcResponse};

// Collection exports
pub use store::{TorrentHandle, TorrentList};

// Scheduler exports
pub use scheduler::RefreshTimer;

// Torrent file exports
pub use torrent::{BencodeValue, FileNode, FileSelections, Metainfo};
