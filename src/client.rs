//! Remote Client - Main coordinator
//!
//! The [`Client`] is the primary entry point for the library. It owns the
//! RPC transport, mirrors the daemon's torrents and session state, drives
//! the periodic refresh timers, and emits [`ClientEvent`]s.
//!
//! Background refreshes never fail loudly: errors are logged, reported as
//! [`ClientEvent::RequestFailed`], and the next tick tries again. Explicit
//! operations also return their error to the caller.

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{
    ClientEvent, ConnectionState, KeyStyle, SessionField, SessionState, TorrentField, TorrentId,
    TorrentSelector,
};
use crate::rpc::{
    AddTorrent, AddedTorrent, Credentials, RpcRequest, RpcResponse, RpcTransport, TorrentAddArgs,
    TorrentGetArgs,
};
use crate::scheduler::RefreshTimer;
use crate::store::{TorrentHandle, TorrentList};

/// Maximum number of events to buffer
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Fields requested for a full snapshot
pub const FULL_FIELDS: &[TorrentField] = &[
    TorrentField::Id,
    TorrentField::Name,
    TorrentField::RateDownload,
    TorrentField::RateUpload,
    TorrentField::Eta,
    TorrentField::SizeWhenDone,
    TorrentField::PercentDone,
    TorrentField::TotalSize,
    TorrentField::Status,
    TorrentField::IsFinished,
    TorrentField::Trackers,
    TorrentField::DownloadDir,
];

/// Fields requested on each periodic refresh
pub const RECENT_FIELDS: &[TorrentField] = &[
    TorrentField::Id,
    TorrentField::Name,
    TorrentField::RateDownload,
    TorrentField::RateUpload,
    TorrentField::Eta,
    TorrentField::SizeWhenDone,
    TorrentField::PercentDone,
    TorrentField::TotalSize,
    TorrentField::Status,
    TorrentField::IsFinished,
];

/// Periodic refresh timers, created by the first full snapshot
struct Timers {
    refresh: RefreshTimer,
    session: RefreshTimer,
}

/// Client for one remote daemon
pub struct Client {
    /// Weak self-reference for spawning background tasks from `&self` methods
    self_ref: Weak<Self>,

    /// Configuration
    config: RwLock<ClientConfig>,

    /// HTTP transport
    transport: RpcTransport,

    /// Local mirror of the daemon's torrents
    torrents: RwLock<TorrentList>,

    /// Local mirror of session settings and statistics
    session: RwLock<SessionState>,

    /// Connectivity to the daemon
    state: RwLock<ConnectionState>,

    /// Refresh timers
    timers: Mutex<Option<Timers>>,

    /// Last reachability reported by the network monitor
    network_available: AtomicBool,

    /// Bumped whenever the daemon or credentials change; torrent responses
    /// from an older generation are dropped
    generation: AtomicU64,

    /// Event broadcaster
    event_tx: broadcast::Sender<ClientEvent>,

    /// Shutdown flag
    shutdown: CancellationToken,
}

impl Client {
    /// Obtain a strong `Arc<Self>` reference for spawning background tasks.
    fn arc(&self) -> Result<Arc<Self>> {
        self.self_ref.upgrade().ok_or(ClientError::Shutdown)
    }

    /// Create a client and start the first full refresh.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let transport = RpcTransport::new(&config)?;

        let client = Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            config: RwLock::new(config),
            transport,
            torrents: RwLock::new(TorrentList::new()),
            session: RwLock::new(SessionState::default()),
            state: RwLock::new(ConnectionState::Disconnected),
            timers: Mutex::new(None),
            network_available: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            event_tx,
            shutdown: CancellationToken::new(),
        });

        client.set_state(ConnectionState::Connecting);
        client.spawn_refresh_all(false);

        Ok(client)
    }

    /// Subscribe to client events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Get current configuration
    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// All torrents in collection order
    pub fn torrents(&self) -> Vec<Arc<TorrentHandle>> {
        self.torrents.read().handles()
    }

    pub fn torrent(&self, id: TorrentId) -> Option<Arc<TorrentHandle>> {
        self.torrents.read().get(id)
    }

    /// Current session settings and statistics
    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    /// Fetch every torrent and replace the collection with the result.
    ///
    /// With `remove`, the collection is cleared and the client marked
    /// disconnected before the request goes out. A connected client stays
    /// connected, even if the request fails. Success starts (or resumes) the
    /// periodic refresh timers.
    pub async fn refresh_all(&self, remove: bool) -> Result<()> {
        self.check_running()?;

        if remove {
            let events = self.torrents.write().clear();
            self.emit_all(events);
            self.set_state(ConnectionState::Disconnected);
        }
        if self.connection_state() == ConnectionState::Disconnected {
            self.set_state(ConnectionState::Connecting);
        }

        let generation = self.generation.load(Ordering::SeqCst);

        if self.timers.lock().is_some() {
            let client = self.arc()?;
            tokio::spawn(async move {
                if let Err(e) = client.refresh_stats().await {
                    tracing::debug!("Failed to refresh session stats: {}", e);
                }
            });
        }

        let response = self
            .call(self.torrent_get_request(&TorrentSelector::All, FULL_FIELDS))
            .await?;
        let args: TorrentGetArgs = response.parse_arguments()?;

        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!("Dropping full snapshot from a previous connection");
            return Ok(());
        }

        let events = self.torrents.write().apply_full(args.torrents);
        self.emit_all(events);

        self.start_timers();
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Poll soon without disturbing the regular schedule.
    ///
    /// Before the first full snapshot there is nothing to poll and this does
    /// nothing.
    pub fn refresh(&self) {
        if let Some(timers) = self.timers.lock().as_ref() {
            timers.refresh.run_once();
        }
    }

    /// Fetch session settings (`session-get`)
    pub async fn refresh_session(&self) -> Result<Vec<SessionField>> {
        let response = self.call(RpcRequest::new("session-get")).await?;
        Ok(self.apply_session(&response.arguments, KeyStyle::Hyphenated))
    }

    /// Change session settings
    pub async fn session_set(&self, arguments: Map<String, Value>) -> Result<()> {
        self.call(RpcRequest::new("session-set").with_arguments(arguments))
            .await?;
        Ok(())
    }

    /// Raw `session-stats` response
    pub async fn session_stats(&self) -> Result<RpcResponse> {
        self.call(RpcRequest::new("session-stats")).await
    }

    /// Raw `torrent-get` for the given fields
    pub async fn torrent_get(
        &self,
        selector: impl Into<TorrentSelector>,
        fields: &[TorrentField],
    ) -> Result<TorrentGetArgs> {
        let response = self
            .call(self.torrent_get_request(&selector.into(), fields))
            .await?;
        response.parse_arguments()
    }

    /// Add a torrent.
    ///
    /// When the daemon reports the new torrent, a minimal entry is appended
    /// immediately and its full field set is fetched in the background.
    pub async fn torrent_add(&self, add: &AddTorrent) -> Result<Option<AddedTorrent>> {
        let response = self
            .call(RpcRequest::new("torrent-add").with_arguments(add.to_arguments()))
            .await?;
        let args: TorrentAddArgs = response.parse_arguments()?;

        if let Some(dup) = &args.duplicate {
            tracing::info!("Torrent {} ({}) already added", dup.id, dup.name);
        }

        let Some(added) = args.added else {
            return Ok(args.duplicate);
        };

        tracing::info!("Added torrent {} ({})", added.id, added.name);
        let event = self.torrents.write().append_stub(added.id, &added.name);
        if let Some(event) = event {
            self.emit(event);
        }

        let client = self.arc()?;
        let id = added.id;
        tokio::spawn(async move {
            if let Err(e) = client.fetch_and_merge(id).await {
                tracing::warn!("Failed to fetch added torrent {}: {}", id, e);
            }
        });

        Ok(Some(added))
    }

    /// Start torrents
    pub async fn torrent_start(&self, selector: impl Into<TorrentSelector>) -> Result<()> {
        self.torrent_action("torrent-start", selector.into(), Map::new())
            .await
    }

    /// Stop torrents
    pub async fn torrent_stop(&self, selector: impl Into<TorrentSelector>) -> Result<()> {
        self.torrent_action("torrent-stop", selector.into(), Map::new())
            .await
    }

    /// Verify local data
    pub async fn torrent_verify(&self, selector: impl Into<TorrentSelector>) -> Result<()> {
        self.torrent_action("torrent-verify", selector.into(), Map::new())
            .await
    }

    /// Ask trackers for more peers
    pub async fn torrent_reannounce(&self, selector: impl Into<TorrentSelector>) -> Result<()> {
        self.torrent_action("torrent-reannounce", selector.into(), Map::new())
            .await
    }

    /// Remove torrents, optionally deleting their data.
    ///
    /// Explicitly named torrents leave the local collection at once and are
    /// not re-added by responses until the next full snapshot.
    pub async fn torrent_remove(
        &self,
        selector: impl Into<TorrentSelector>,
        delete_data: bool,
    ) -> Result<()> {
        let selector = selector.into();
        let mut args = Map::new();
        args.insert("delete-local-data".into(), json!(delete_data));
        let ids = selector.explicit_ids();
        self.torrent_action("torrent-remove", selector, args)
            .await?;

        let events = self.torrents.write().remove(&ids);
        self.emit_all(events);
        Ok(())
    }

    /// `torrent-set` with arbitrary arguments
    pub async fn torrent_set(
        &self,
        selector: impl Into<TorrentSelector>,
        arguments: Map<String, Value>,
    ) -> Result<()> {
        self.torrent_action("torrent-set", selector.into(), arguments)
            .await
    }

    /// Change the download location, moving data when `move_data` is set
    pub async fn torrent_move(
        &self,
        selector: impl Into<TorrentSelector>,
        location: &str,
        move_data: Option<bool>,
    ) -> Result<()> {
        let mut args = Map::new();
        args.insert("location".into(), json!(location));
        if let Some(move_data) = move_data {
            args.insert("move".into(), json!(move_data));
        }
        self.torrent_action("torrent-set-location", selector.into(), args)
            .await
    }

    /// Rename a file or directory inside a torrent
    pub async fn torrent_rename(
        &self,
        selector: impl Into<TorrentSelector>,
        path: &str,
        name: &str,
    ) -> Result<()> {
        let mut args = Map::new();
        args.insert("path".into(), json!(path));
        args.insert("name".into(), json!(name));
        self.torrent_action("torrent-rename-path", selector.into(), args)
            .await
    }

    /// Change credentials; a real change reconnects from scratch
    pub fn set_credentials(&self, username: &str, password: &str) {
        {
            let mut config = self.config.write();
            if config.username == username && config.password == password {
                return;
            }
            config.username = username.to_string();
            config.password = password.to_string();
        }

        tracing::info!("Credentials changed");
        self.transport
            .set_credentials(Credentials::new(username, password));
        self.reconnect();
    }

    /// Point at another daemon; a real change reconnects from scratch
    pub fn set_server(&self, hostname: &str, port: u16, tls: bool) -> Result<()> {
        let candidate = {
            let config = self.config.read();
            if config.hostname == hostname && config.port == port && config.tls == tls {
                return Ok(());
            }
            config.clone().hostname(hostname).port(port).tls(tls)
        };
        candidate.validate()?;
        let url = candidate.rpc_url()?;

        tracing::info!("Server information changed");
        *self.config.write() = candidate;
        self.transport.set_endpoint(url);
        self.reconnect();
        Ok(())
    }

    /// Change the periodic refresh interval
    pub fn set_refresh_interval(&self, secs: u64) -> Result<()> {
        if secs == 0 {
            return Err(ClientError::invalid_input(
                "refresh_interval_secs",
                "Must be at least 1",
            ));
        }
        self.config.write().refresh_interval_secs = secs;
        if let Some(timers) = self.timers.lock().as_ref() {
            timers
                .refresh
                .set_interval(std::time::Duration::from_secs(secs));
        }
        Ok(())
    }

    /// Report reachability from a network monitor.
    ///
    /// Loopback daemons are always considered reachable.
    pub fn set_network_available(&self, available: bool) {
        if self.config.read().is_loopback() {
            return;
        }
        if self.network_available.swap(available, Ordering::SeqCst) == available {
            return;
        }

        tracing::info!(
            "Network status changed to: {}",
            if available { "available" } else { "unavailable" }
        );

        if available {
            self.spawn_refresh_all(false);
        } else {
            self.generation.fetch_add(1, Ordering::SeqCst);
            let events = self.torrents.write().clear();
            self.emit_all(events);
            self.pause_timers();
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Stop timers and refuse further requests
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();
        self.timers.lock().take();
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    fn check_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            Err(ClientError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Send a request, reporting any failure as an event
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse> {
        self.check_running()?;

        let result = tokio::select! {
            _ = self.shutdown.cancelled() => Err(ClientError::Shutdown),
            res = self.transport.call(&request) => res,
        };

        if let Err(e) = &result {
            if !matches!(e, ClientError::Shutdown) {
                tracing::warn!("Request {} failed: {}", request.method, e);
                self.emit(ClientEvent::RequestFailed {
                    method: request.method.clone(),
                    message: e.to_string(),
                    auth_required: e.is_auth(),
                });
            }
        }
        result
    }

    fn torrent_get_request(&self, selector: &TorrentSelector, fields: &[TorrentField]) -> RpcRequest {
        let mut args = Map::new();
        if let Some(ids) = selector.ids() {
            args.insert("ids".into(), ids);
        }
        let fields: Vec<&str> = fields.iter().map(|f| f.wire_name()).collect();
        args.insert("fields".into(), json!(fields));
        RpcRequest::new("torrent-get").with_arguments(args)
    }

    async fn torrent_action(
        &self,
        method: &str,
        selector: TorrentSelector,
        mut args: Map<String, Value>,
    ) -> Result<()> {
        if let Some(ids) = selector.ids() {
            args.insert("ids".into(), ids);
        }
        self.call(RpcRequest::new(method).with_arguments(args))
            .await?;
        Ok(())
    }

    /// Periodic tick: recently active torrents plus session statistics
    async fn refresh_recent(&self) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);

        let (torrents, stats) = tokio::join!(
            self.call(self.torrent_get_request(&TorrentSelector::RecentlyActive, RECENT_FIELDS)),
            self.refresh_stats(),
        );

        let args: TorrentGetArgs = torrents?.parse_arguments()?;
        if generation == self.generation.load(Ordering::SeqCst) {
            let events = self
                .torrents
                .write()
                .apply_delta(args.torrents, &args.removed);
            self.emit_all(events);
        } else {
            tracing::debug!("Dropping refresh from a previous connection");
        }

        stats.map(|_| ())
    }

    async fn refresh_stats(&self) -> Result<Vec<SessionField>> {
        let response = self.session_stats().await?;
        Ok(self.apply_session(&response.arguments, KeyStyle::CamelCase))
    }

    /// Fetch the full field set of one torrent and merge it
    async fn fetch_and_merge(&self, id: TorrentId) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);
        let args = self.torrent_get(id, FULL_FIELDS).await?;
        if generation == self.generation.load(Ordering::SeqCst) {
            let events = self
                .torrents
                .write()
                .apply_delta(args.torrents, &args.removed);
            self.emit_all(events);
        }
        Ok(())
    }

    fn apply_session(&self, arguments: &Map<String, Value>, style: KeyStyle) -> Vec<SessionField> {
        let fields = self.session.write().apply(arguments, style);
        for &field in &fields {
            self.emit(ClientEvent::SessionChanged { field });
        }
        fields
    }

    /// Start the timers, or resume them if they already exist
    fn start_timers(&self) {
        let mut timers = self.timers.lock();
        if let Some(timers) = timers.as_ref() {
            timers.refresh.resume();
            timers.session.resume();
            return;
        }

        let config = self.config.read().clone();

        let weak = self.self_ref.clone();
        let refresh = RefreshTimer::new(
            "refresh",
            config.refresh_interval(),
            config.settle_delay(),
            move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(client) => client.refresh_recent().await,
                        None => Err(ClientError::Shutdown),
                    }
                }
            },
        );

        let weak = self.self_ref.clone();
        let session = RefreshTimer::new(
            "session",
            config.session_interval(),
            config.settle_delay(),
            move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(client) => client.refresh_session().await.map(|_| ()),
                        None => Err(ClientError::Shutdown),
                    }
                }
            },
        );

        *timers = Some(Timers { refresh, session });
    }

    fn pause_timers(&self) {
        if let Some(timers) = self.timers.lock().as_ref() {
            timers.refresh.pause();
            timers.session.pause();
        }
    }

    /// Forget the current connection and start over
    fn reconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pause_timers();
        self.spawn_refresh_all(true);
    }

    fn spawn_refresh_all(&self, remove: bool) {
        let client = match self.arc() {
            Ok(client) => client,
            Err(e) => {
                tracing::debug!("Not refreshing: {}", e);
                return;
            }
        };
        if remove {
            // Cleared before the request goes out
            let events = self.torrents.write().clear();
            self.emit_all(events);
            self.set_state(ConnectionState::Disconnected);
        }
        tokio::spawn(async move {
            if let Err(e) = client.refresh_all(false).await {
                tracing::warn!("Failed to refresh torrents: {}", e);
            }
        });
    }

    fn set_state(&self, state: ConnectionState) {
        {
            let mut current = self.state.write();
            if *current == state {
                return;
            }
            *current = state;
        }
        tracing::debug!("Connection state: {}", state);
        self.emit(ClientEvent::ConnectionChanged { state });
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_all(&self, events: Vec<ClientEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.transport.endpoint().as_str())
            .field("state", &self.connection_state())
            .field("torrents", &self.torrents.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lists() {
        assert!(FULL_FIELDS.contains(&TorrentField::Trackers));
        assert!(FULL_FIELDS.contains(&TorrentField::DownloadDir));
        assert!(!RECENT_FIELDS.contains(&TorrentField::Trackers));
        assert!(!RECENT_FIELDS.contains(&TorrentField::DownloadDir));
        assert_eq!(FULL_FIELDS.len(), RECENT_FIELDS.len() + 2);
    }

    #[tokio::test]
    async fn test_new_starts_connecting() {
        // Nothing listens on port 9; the initial refresh fails in the background
        let config = ClientConfig::new().hostname("127.0.0.1").port(9);
        let client = Client::new(config).unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Connecting);
        assert!(client.torrents().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = ClientConfig::new().port(0);
        assert!(Client::new(config).is_err());
    }

    #[tokio::test]
    async fn test_refresh_interval_validation() {
        let client = Client::new(ClientConfig::new().hostname("127.0.0.1").port(9)).unwrap();
        assert!(client.set_refresh_interval(0).is_err());
        client.set_refresh_interval(10).unwrap();
        assert_eq!(client.config().refresh_interval_secs, 10);
    }

    #[tokio::test]
    async fn test_loopback_ignores_network_changes() {
        let client = Client::new(ClientConfig::new().hostname("127.0.0.1").port(9)).unwrap();
        client.set_network_available(false);
        assert_eq!(client.connection_state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_requests() {
        let client = Client::new(ClientConfig::new().hostname("127.0.0.1").port(9)).unwrap();
        client.shutdown().await.unwrap();
        assert!(matches!(
            client.refresh_all(false).await,
            Err(ClientError::Shutdown)
        ));
    }
}
