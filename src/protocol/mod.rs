//! Protocol types for trg
//!
//! This module contains all types that cross the client boundary:
//! - Events emitted by the synchronization engine
//! - Torrent and session models mirrored from the daemon
//! - Torrent selectors for mutation requests
//!
//! These types are designed for serialization and can be handed to a UI
//! layer or any message-passing interface.

mod events;
mod selector;
mod session;
mod torrent;
mod types;

// Re-export all protocol types
pub use events::ClientEvent;
pub use selector::TorrentSelector;
pub use session::{KeyStyle, SessionField, SessionState};
pub use torrent::{
    hyphenate, FileRow, FileStatRow, Torrent, TorrentField, TorrentFile, TorrentRow, Tracker,
    TrackerRow,
};
pub use types::{ConnectionState, Priority, TorrentId, TorrentStatus};
