//! Core types for trg
//!
//! This module re-exports the protocol types most callers need.
//! New code may import from `crate::protocol` directly.

pub use crate::protocol::{
    // Core types
    ConnectionState,
    Priority,
    TorrentId,
    TorrentStatus,
    // Models
    SessionField,
    SessionState,
    Torrent,
    TorrentField,
    TorrentFile,
    Tracker,
    // Selection
    TorrentSelector,
    // Events
    ClientEvent,
};
