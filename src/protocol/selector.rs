//! Torrent selection for mutation requests

use serde_json::{json, Value};

use super::torrent::Torrent;
use super::types::TorrentId;

const RECENTLY_ACTIVE: &str = "recently-active";

/// Which torrents a request applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSelector {
    /// Every torrent (no `ids` argument)
    All,
    /// A single torrent
    One(TorrentId),
    /// An explicit set of torrents
    Many(Vec<TorrentId>),
    /// Torrents changed since the last poll
    RecentlyActive,
}

impl TorrentSelector {
    /// Parse a textual selector; only `"recently-active"` is accepted.
    pub fn from_token(token: &str) -> Option<Self> {
        if token == RECENTLY_ACTIVE {
            Some(Self::RecentlyActive)
        } else {
            tracing::error!("Invalid torrent selector: {:?}", token);
            None
        }
    }

    /// Value of the `ids` argument, `None` when it is omitted
    pub fn ids(&self) -> Option<Value> {
        match self {
            Self::All => None,
            Self::One(id) => Some(json!(id)),
            Self::Many(ids) => Some(json!(ids)),
            Self::RecentlyActive => Some(json!(RECENTLY_ACTIVE)),
        }
    }

    /// Ids named explicitly; empty for `All` and `RecentlyActive`
    pub fn explicit_ids(&self) -> Vec<TorrentId> {
        match self {
            Self::One(id) => vec![*id],
            Self::Many(ids) => ids.clone(),
            Self::All | Self::RecentlyActive => Vec::new(),
        }
    }
}

impl From<TorrentId> for TorrentSelector {
    fn from(id: TorrentId) -> Self {
        Self::One(id)
    }
}

impl From<&Torrent> for TorrentSelector {
    fn from(torrent: &Torrent) -> Self {
        Self::One(torrent.id)
    }
}

impl From<Vec<TorrentId>> for TorrentSelector {
    fn from(ids: Vec<TorrentId>) -> Self {
        Self::Many(ids)
    }
}

impl From<&[Torrent]> for TorrentSelector {
    fn from(torrents: &[Torrent]) -> Self {
        Self::Many(torrents.iter().map(|t| t.id).collect())
    }
}
