//! Local torrent collection
//!
//! [`TorrentList`] mirrors the daemon's torrents. It is only mutated by the
//! client's response handlers; everyone else reads through
//! [`TorrentHandle`]s, which keep their identity across incremental updates.

use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::protocol::{
    ClientEvent, Torrent, TorrentField, TorrentId, TorrentRow, TorrentSelector, TorrentStatus,
};

/// Shared, read-only view of one torrent
#[derive(Debug)]
pub struct TorrentHandle {
    id: TorrentId,
    inner: RwLock<Torrent>,
}

impl TorrentHandle {
    fn new(torrent: Torrent) -> Arc<Self> {
        Arc::new(Self {
            id: torrent.id,
            inner: RwLock::new(torrent),
        })
    }

    pub fn id(&self) -> TorrentId {
        self.id
    }

    /// Borrow the current state
    pub fn read(&self) -> RwLockReadGuard<'_, Torrent> {
        self.inner.read()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Torrent {
        self.inner.read().clone()
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    pub fn status(&self) -> TorrentStatus {
        self.inner.read().status
    }

    fn update(&self, row: TorrentRow) -> Update {
        let mut torrent = self.inner.write();
        let was_downloading = torrent.status == TorrentStatus::Download;
        let was_finished = torrent.is_finished;

        let fields = torrent.update_from_row(row);

        let completed = was_downloading
            && !was_finished
            && !fields.is_empty()
            && (torrent.status.is_seeding() || torrent.is_finished);

        Update {
            fields,
            completed: completed.then(|| torrent.name.clone()),
        }
    }
}

impl From<&Arc<TorrentHandle>> for TorrentSelector {
    fn from(handle: &Arc<TorrentHandle>) -> Self {
        Self::One(handle.id())
    }
}

impl From<&[Arc<TorrentHandle>]> for TorrentSelector {
    fn from(handles: &[Arc<TorrentHandle>]) -> Self {
        Self::Many(handles.iter().map(|h| h.id()).collect())
    }
}

struct Update {
    fields: Vec<TorrentField>,
    completed: Option<String>,
}

/// Most tombstones kept between full snapshots; the oldest are forgotten first
pub const MAX_TOMBSTONES: usize = 1024;

/// Ordered collection of remote torrents
#[derive(Debug, Default)]
pub struct TorrentList {
    entries: Vec<Arc<TorrentHandle>>,
    /// Ids removed since the last full snapshot; rows for them are dropped
    removed: HashSet<TorrentId>,
    /// Tombstones in insertion order
    removed_order: VecDeque<TorrentId>,
}

impl TorrentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: TorrentId) -> Option<Arc<TorrentHandle>> {
        self.entries.iter().find(|h| h.id == id).cloned()
    }

    /// Handles in collection order
    pub fn handles(&self) -> Vec<Arc<TorrentHandle>> {
        self.entries.clone()
    }

    /// Copies of every torrent in collection order
    pub fn snapshot(&self) -> Vec<Torrent> {
        self.entries.iter().map(|h| h.snapshot()).collect()
    }

    pub fn is_tombstoned(&self, id: TorrentId) -> bool {
        self.removed.contains(&id)
    }

    /// Number of ids currently tombstoned
    pub fn tombstones(&self) -> usize {
        self.removed.len()
    }

    /// Drop everything, including tombstones
    pub fn clear(&mut self) -> Vec<ClientEvent> {
        self.entries.clear();
        self.clear_tombstones();
        vec![ClientEvent::TorrentsReset]
    }

    /// Replace the whole collection with a full snapshot
    pub fn apply_full(&mut self, rows: Vec<TorrentRow>) -> Vec<ClientEvent> {
        self.clear_tombstones();
        self.entries = Vec::with_capacity(rows.len());
        for row in rows {
            if self.position(row.id).is_some() {
                tracing::warn!("Duplicate torrent {} in snapshot", row.id);
                continue;
            }
            self.entries.push(TorrentHandle::new(Torrent::from_row(row)));
        }
        tracing::debug!("Collection replaced with {} torrents", self.entries.len());
        vec![ClientEvent::TorrentsReset]
    }

    /// Merge an incremental response: removals first, then updates in place,
    /// then appends for unknown ids
    pub fn apply_delta(&mut self, rows: Vec<TorrentRow>, removed: &[TorrentId]) -> Vec<ClientEvent> {
        let mut events = self.remove(removed);

        for row in rows {
            let id = row.id;
            if self.removed.contains(&id) {
                tracing::debug!("Ignoring update for removed torrent {}", id);
                continue;
            }

            match self.get(id) {
                Some(handle) => {
                    let update = handle.update(row);
                    if !update.fields.is_empty() {
                        events.push(ClientEvent::TorrentChanged {
                            id,
                            fields: update.fields,
                        });
                    }
                    if let Some(name) = update.completed {
                        tracing::info!("Torrent {} ({}) completed", id, name);
                        events.push(ClientEvent::TorrentCompleted { id, name });
                    }
                }
                None => {
                    self.entries.push(TorrentHandle::new(Torrent::from_row(row)));
                    events.push(ClientEvent::TorrentAdded { id });
                }
            }
        }

        events
    }

    /// Append a minimal entry for a just-added torrent.
    ///
    /// Known and tombstoned ids are left alone.
    pub fn append_stub(&mut self, id: TorrentId, name: &str) -> Option<ClientEvent> {
        if self.removed.contains(&id) || self.position(id).is_some() {
            return None;
        }
        self.entries
            .push(TorrentHandle::new(Torrent::new(id, name.to_string())));
        Some(ClientEvent::TorrentAdded { id })
    }

    /// Drop entries and tombstone their ids; unknown ids are only tombstoned
    pub fn remove(&mut self, ids: &[TorrentId]) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        for &id in ids {
            self.tombstone(id);
            if let Some(pos) = self.position(id) {
                self.entries.remove(pos);
                events.push(ClientEvent::TorrentRemoved { id });
            }
        }
        events
    }

    fn tombstone(&mut self, id: TorrentId) {
        if !self.removed.insert(id) {
            return;
        }
        self.removed_order.push_back(id);
        while self.removed_order.len() > MAX_TOMBSTONES {
            if let Some(oldest) = self.removed_order.pop_front() {
                self.removed.remove(&oldest);
            }
        }
    }

    fn clear_tombstones(&mut self) {
        self.removed.clear();
        self.removed_order.clear();
    }

    fn position(&self, id: TorrentId) -> Option<usize> {
        self.entries.iter().position(|h| h.id == id)
    }
}
