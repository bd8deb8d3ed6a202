//! Core protocol types
//!
//! Fundamental types used throughout the protocol.

use serde::{Deserialize, Serialize};

/// Server-assigned torrent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(i64);

impl TorrentId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TorrentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TorrentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Torrent activity as reported by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TorrentStatus {
    /// Torrent is stopped
    #[default]
    Stopped,
    /// Queued to verify local data
    CheckWait,
    /// Verifying local data
    Check,
    /// Queued to download
    DownloadWait,
    /// Downloading
    Download,
    /// Queued to seed
    SeedWait,
    /// Seeding
    Seed,
}

impl TorrentStatus {
    pub fn is_seeding(self) -> bool {
        matches!(self, Self::Seed | Self::SeedWait)
    }
}

impl TryFrom<i64> for TorrentStatus {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Stopped,
            1 => Self::CheckWait,
            2 => Self::Check,
            3 => Self::DownloadWait,
            4 => Self::Download,
            5 => Self::SeedWait,
            6 => Self::Seed,
            other => return Err(format!("Unknown torrent status: {}", other)),
        })
    }
}

impl From<TorrentStatus> for i64 {
    fn from(status: TorrentStatus) -> Self {
        match status {
            TorrentStatus::Stopped => 0,
            TorrentStatus::CheckWait => 1,
            TorrentStatus::Check => 2,
            TorrentStatus::DownloadWait => 3,
            TorrentStatus::Download => 4,
            TorrentStatus::SeedWait => 5,
            TorrentStatus::Seed => 6,
        }
    }
}

/// Low/normal/high priority, for files and torrent bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl TryFrom<i64> for Priority {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Low),
            0 => Ok(Self::Normal),
            1 => Ok(Self::High),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => -1,
            Priority::Normal => 0,
            Priority::High => 1,
        }
    }
}

/// Connectivity to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_values() {
        let status: TorrentStatus = serde_json::from_str("4").unwrap();
        assert_eq!(status, TorrentStatus::Download);
        assert_eq!(serde_json::to_string(&TorrentStatus::Seed).unwrap(), "6");
        assert!(serde_json::from_str::<TorrentStatus>("9").is_err());
    }

    #[test]
    fn test_priority_wire_values() {
        let low: Priority = serde_json::from_str("-1").unwrap();
        assert_eq!(low, Priority::Low);
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "1");
    }

    #[test]
    fn test_torrent_id_transparent() {
        let id: TorrentId = serde_json::from_str("17").unwrap();
        assert_eq!(id, TorrentId::new(17));
        assert_eq!(id.to_string(), "17");
    }
}
