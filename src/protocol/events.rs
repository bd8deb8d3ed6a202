//! Client events
//!
//! Events emitted by the synchronization engine. Subscribers (a UI, a log
//! sink) observe the collection through these and never mutate it.

use super::session::SessionField;
use super::torrent::TorrentField;
use super::types::{ConnectionState, TorrentId};
use serde::{Deserialize, Serialize};

/// Events emitted by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Connectivity to the daemon changed
    ConnectionChanged { state: ConnectionState },
    /// The collection was cleared or replaced wholesale
    TorrentsReset,
    /// A torrent was appended to the collection
    TorrentAdded { id: TorrentId },
    /// A torrent was dropped from the collection
    TorrentRemoved { id: TorrentId },
    /// Fields of a torrent were updated in place
    TorrentChanged {
        id: TorrentId,
        fields: Vec<TorrentField>,
    },
    /// A torrent went from downloading to seeding or finished
    TorrentCompleted { id: TorrentId, name: String },
    /// A session attribute was (re)written
    SessionChanged { field: SessionField },
    /// An RPC request produced no usable response
    RequestFailed {
        method: String,
        message: String,
        auth_required: bool,
    },
}
