//! Torrent-specific protocol types
//!
//! [`Torrent`] is the local mirror of one daemon torrent. Rows arrive from
//! `torrent-get` as [`TorrentRow`]s with camelCase keys; the mapping from
//! wire names to local fields is the explicit table in [`TorrentField`].

use serde::{Deserialize, Serialize};

use super::types::{Priority, TorrentId, TorrentStatus};

/// A payload file of a remote torrent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    pub name: String,
    pub length: u64,
    pub bytes_completed: u64,
    pub wanted: bool,
    pub priority: Priority,
}

/// An announce endpoint of a remote torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: i64,
    pub announce: String,
    pub host: Option<String>,
    pub tier: i64,
}

/// Local state of one remote torrent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    pub id: TorrentId,
    pub name: String,
    pub status: TorrentStatus,
    pub error: i64,
    pub error_string: String,
    pub download_dir: String,
    pub total_size: u64,
    pub size_when_done: u64,
    /// 0.0 - 1.0
    pub percent_done: f64,
    pub rate_download: u64,
    pub rate_upload: u64,
    /// Seconds; negative values are daemon sentinels (unknown, not available)
    pub eta: i64,
    pub is_finished: bool,
    pub files: Vec<TorrentFile>,
    pub trackers: Vec<Tracker>,
}

/// Field of [`Torrent`] that reconciliation can update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TorrentField {
    Id,
    Name,
    Status,
    Error,
    ErrorString,
    DownloadDir,
    TotalSize,
    SizeWhenDone,
    PercentDone,
    RateDownload,
    RateUpload,
    Eta,
    IsFinished,
    Files,
    FileStats,
    Trackers,
}

impl TorrentField {
    pub const ALL: [TorrentField; 16] = [
        Self::Id,
        Self::Name,
        Self::Status,
        Self::Error,
        Self::ErrorString,
        Self::DownloadDir,
        Self::TotalSize,
        Self::SizeWhenDone,
        Self::PercentDone,
        Self::RateDownload,
        Self::RateUpload,
        Self::Eta,
        Self::IsFinished,
        Self::Files,
        Self::FileStats,
        Self::Trackers,
    ];

    /// Name used by the daemon in `torrent-get`
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Status => "status",
            Self::Error => "error",
            Self::ErrorString => "errorString",
            Self::DownloadDir => "downloadDir",
            Self::TotalSize => "totalSize",
            Self::SizeWhenDone => "sizeWhenDone",
            Self::PercentDone => "percentDone",
            Self::RateDownload => "rateDownload",
            Self::RateUpload => "rateUpload",
            Self::Eta => "eta",
            Self::IsFinished => "isFinished",
            Self::Files => "files",
            Self::FileStats => "fileStats",
            Self::Trackers => "trackers",
        }
    }

    /// Local (hyphenated) property name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Status => "status",
            Self::Error => "error",
            Self::ErrorString => "error-string",
            Self::DownloadDir => "download-dir",
            Self::TotalSize => "total-size",
            Self::SizeWhenDone => "size-when-done",
            Self::PercentDone => "percent-done",
            Self::RateDownload => "rate-download",
            Self::RateUpload => "rate-upload",
            Self::Eta => "eta",
            Self::IsFinished => "is-finished",
            Self::Files => "files",
            Self::FileStats => "file-stats",
            Self::Trackers => "trackers",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.wire_name() == name)
    }
}

impl std::fmt::Display for TorrentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a camelCase daemon key to the hyphenated local form
/// (`rateDownload` -> `rate-download`).
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_uppercase() {
            out.push('-');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `files` entry of a `torrent-get` row
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRow {
    pub name: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub bytes_completed: u64,
}

/// `fileStats` entry of a `torrent-get` row
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatRow {
    #[serde(default)]
    pub bytes_completed: u64,
    #[serde(default = "default_wanted")]
    pub wanted: bool,
    #[serde(default)]
    pub priority: Priority,
}

fn default_wanted() -> bool {
    true
}

/// `trackers` entry of a `torrent-get` row
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerRow {
    #[serde(default)]
    pub id: i64,
    pub announce: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub tier: i64,
}

/// One torrent as returned by `torrent-get`; only requested fields are set
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentRow {
    pub id: TorrentId,
    pub name: Option<String>,
    pub status: Option<TorrentStatus>,
    pub error: Option<i64>,
    pub error_string: Option<String>,
    pub download_dir: Option<String>,
    pub total_size: Option<u64>,
    pub size_when_done: Option<u64>,
    pub percent_done: Option<f64>,
    pub rate_download: Option<u64>,
    pub rate_upload: Option<u64>,
    pub eta: Option<i64>,
    pub is_finished: Option<bool>,
    pub files: Option<Vec<FileRow>>,
    pub file_stats: Option<Vec<FileStatRow>>,
    pub trackers: Option<Vec<TrackerRow>>,
}

/// Copy `$value` into `$slot` when present and different, recording `$field`
macro_rules! merge_field {
    ($changed:ident, $field:expr, $slot:expr, $value:expr) => {
        if let Some(value) = $value {
            if $slot != value {
                $slot = value;
                $changed.push($field);
            }
        }
    };
}

impl Torrent {
    /// Empty torrent with only an id and name
    pub fn new(id: TorrentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: TorrentStatus::default(),
            error: 0,
            error_string: String::new(),
            download_dir: String::new(),
            total_size: 0,
            size_when_done: 0,
            percent_done: 0.0,
            rate_download: 0,
            rate_upload: 0,
            eta: 0,
            is_finished: false,
            files: Vec::new(),
            trackers: Vec::new(),
        }
    }

    /// Build a torrent from a full row
    pub fn from_row(row: TorrentRow) -> Self {
        let mut torrent = Self::new(row.id, String::new());
        torrent.update_from_row(row);
        torrent
    }

    /// Apply a row in place, returning the fields whose values changed.
    ///
    /// The id is never touched; rows for another id are the caller's bug.
    pub fn update_from_row(&mut self, row: TorrentRow) -> Vec<TorrentField> {
        debug_assert_eq!(self.id, row.id);
        let mut changed = Vec::new();

        merge_field!(changed, TorrentField::Name, self.name, row.name);
        merge_field!(changed, TorrentField::Status, self.status, row.status);
        merge_field!(changed, TorrentField::Error, self.error, row.error);
        merge_field!(changed, TorrentField::ErrorString, self.error_string, row.error_string);
        merge_field!(changed, TorrentField::DownloadDir, self.download_dir, row.download_dir);
        merge_field!(changed, TorrentField::TotalSize, self.total_size, row.total_size);
        merge_field!(changed, TorrentField::SizeWhenDone, self.size_when_done, row.size_when_done);
        merge_field!(changed, TorrentField::PercentDone, self.percent_done, row.percent_done);
        merge_field!(changed, TorrentField::RateDownload, self.rate_download, row.rate_download);
        merge_field!(changed, TorrentField::RateUpload, self.rate_upload, row.rate_upload);
        merge_field!(changed, TorrentField::Eta, self.eta, row.eta);
        merge_field!(changed, TorrentField::IsFinished, self.is_finished, row.is_finished);

        if let Some(files) = Self::merge_files(&self.files, row.files, row.file_stats) {
            if files != self.files {
                self.files = files;
                changed.push(TorrentField::Files);
            }
        }

        if let Some(trackers) = row.trackers {
            let trackers: Vec<Tracker> = trackers
                .into_iter()
                .map(|t| Tracker {
                    id: t.id,
                    announce: t.announce,
                    host: t.host,
                    tier: t.tier,
                })
                .collect();
            if trackers != self.trackers {
                self.trackers = trackers;
                changed.push(TorrentField::Trackers);
            }
        }

        changed
    }

    /// New file list from `files`/`fileStats`, paired by position.
    ///
    /// `fileStats` alone only refreshes an existing list of the same length.
    fn merge_files(
        current: &[TorrentFile],
        files: Option<Vec<FileRow>>,
        stats: Option<Vec<FileStatRow>>,
    ) -> Option<Vec<TorrentFile>> {
        match (files, stats) {
            (Some(files), stats) => {
                let stats = stats.unwrap_or_default();
                Some(
                    files
                        .into_iter()
                        .enumerate()
                        .map(|(i, f)| {
                            let stat = stats.get(i);
                            TorrentFile {
                                name: f.name,
                                length: f.length,
                                bytes_completed: stat
                                    .map(|s| s.bytes_completed)
                                    .unwrap_or(f.bytes_completed),
                                wanted: stat.map(|s| s.wanted).unwrap_or(true),
                                priority: stat.map(|s| s.priority).unwrap_or_default(),
                            }
                        })
                        .collect(),
                )
            }
            (None, Some(stats)) if stats.len() == current.len() => Some(
                current
                    .iter()
                    .zip(stats)
                    .map(|(f, s)| TorrentFile {
                        bytes_completed: s.bytes_completed,
                        wanted: s.wanted,
                        priority: s.priority,
                        ..f.clone()
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}
