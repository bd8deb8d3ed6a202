//! Session state mirrored from the daemon
//!
//! Filled from `session-get` (hyphenated keys) and `session-stats`
//! (camelCase keys, converted with [`hyphenate`]). Keys that do not name a
//! [`SessionField`] are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::torrent::hyphenate;

/// Daemon-wide settings and statistics the client tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub download_dir: String,
    pub download_dir_free_space: u64,
    pub alt_speed_enabled: bool,
    pub download_speed: u64,
    pub upload_speed: u64,
}

/// Field of [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionField {
    DownloadDir,
    DownloadDirFreeSpace,
    AltSpeedEnabled,
    DownloadSpeed,
    UploadSpeed,
}

impl SessionField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DownloadDir => "download-dir",
            Self::DownloadDirFreeSpace => "download-dir-free-space",
            Self::AltSpeedEnabled => "alt-speed-enabled",
            Self::DownloadSpeed => "download-speed",
            Self::UploadSpeed => "upload-speed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "download-dir" => Self::DownloadDir,
            "download-dir-free-space" => Self::DownloadDirFreeSpace,
            "alt-speed-enabled" => Self::AltSpeedEnabled,
            "download-speed" => Self::DownloadSpeed,
            "upload-speed" => Self::UploadSpeed,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How keys in a session response are spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// `session-get`: already `download-dir`
    Hyphenated,
    /// `session-stats`: `downloadSpeed`
    CamelCase,
}

impl SessionState {
    /// Apply a response's `arguments`, returning every recognised field that
    /// was present with a value of the right type.
    pub fn apply(&mut self, arguments: &Map<String, Value>, style: KeyStyle) -> Vec<SessionField> {
        let mut touched = Vec::new();
        for (key, value) in arguments {
            let name = match style {
                KeyStyle::Hyphenated => key.clone(),
                KeyStyle::CamelCase => hyphenate(key),
            };
            let Some(field) = SessionField::from_name(&name) else {
                continue;
            };
            if self.set(field, value) {
                touched.push(field);
            } else {
                tracing::debug!("Ignoring session field {} with value {}", field, value);
            }
        }
        touched
    }

    fn set(&mut self, field: SessionField, value: &Value) -> bool {
        match field {
            SessionField::DownloadDir => value
                .as_str()
                .map(|v| self.download_dir = v.to_string())
                .is_some(),
            SessionField::DownloadDirFreeSpace => value
                .as_u64()
                .map(|v| self.download_dir_free_space = v)
                .is_some(),
            SessionField::AltSpeedEnabled => value
                .as_bool()
                .map(|v| self.alt_speed_enabled = v)
                .is_some(),
            SessionField::DownloadSpeed => value
                .as_u64()
                .map(|v| self.download_speed = v)
                .is_some(),
            SessionField::UploadSpeed => value
                .as_u64()
                .map(|v| self.upload_speed = v)
                .is_some(),
        }
    }
}
