//! RPC request and response bodies
//!
//! The daemon speaks a small JSON envelope: `{"method", "arguments", "tag"}`
//! out, `{"result", "arguments", "tag"}` back. Arguments stay an untyped map
//! at this layer; the typed views below are parsed on demand.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ClientError, ProtocolErrorKind, Result};
use crate::protocol::{Priority, TorrentId, TorrentRow};
use crate::torrent::metainfo::{FileSelections, Metainfo};

/// Value of `result` on a successful call
pub const RESULT_SUCCESS: &str = "success";

/// One outgoing RPC call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<i64>,
}

impl RpcRequest {
    /// Request without arguments
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: None,
            tag: None,
        }
    }

    /// Attach arguments; an empty map is sent as no arguments at all
    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = if arguments.is_empty() {
            None
        } else {
            Some(arguments)
        };
        self
    }

    pub fn with_tag(mut self, tag: i64) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Serialize for the request body
    pub fn to_body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A parsed response body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcResponse {
    pub result: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub tag: Option<i64>,
}

impl RpcResponse {
    pub fn is_success(&self) -> bool {
        self.result == RESULT_SUCCESS
    }

    /// Turn an application-level failure into an error
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Rpc {
                result: self.result,
            })
        }
    }

    /// Deserialize `arguments` into a typed view
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.arguments.clone())).map_err(|e| {
            ClientError::protocol(
                ProtocolErrorKind::InvalidResponse,
                format!("Unexpected arguments: {}", e),
            )
        })
    }
}

/// Arguments of a `torrent-get` response
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentGetArgs {
    #[serde(default)]
    pub torrents: Vec<TorrentRow>,
    /// Ids deleted since the last `recently-active` poll
    #[serde(default)]
    pub removed: Vec<TorrentId>,
}

/// Stub the daemon returns for a created or duplicate torrent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddedTorrent {
    pub id: TorrentId,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "hashString")]
    pub hash_string: Option<String>,
}

/// Arguments of a `torrent-add` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentAddArgs {
    #[serde(rename = "torrent-added")]
    pub added: Option<AddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    pub duplicate: Option<AddedTorrent>,
}

/// Where the daemon gets the torrent from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddSource {
    /// Base64 of a `.torrent` file
    Metainfo(String),
    /// URL or magnet link the daemon fetches itself
    Filename(String),
}

/// Arguments for `torrent-add`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrent {
    pub source: AddSource,
    pub download_dir: Option<String>,
    pub paused: bool,
    pub bandwidth_priority: Option<Priority>,
    pub selections: Option<FileSelections>,
}

impl AddTorrent {
    /// Add from a parsed `.torrent`, taking its current file choices
    pub fn from_metainfo(metainfo: &Metainfo) -> Self {
        Self {
            source: AddSource::Metainfo(metainfo.to_base64()),
            download_dir: None,
            paused: false,
            bandwidth_priority: None,
            selections: Some(metainfo.root.selections()),
        }
    }

    /// Add from a URL or magnet link
    pub fn from_filename(filename: impl Into<String>) -> Self {
        Self {
            source: AddSource::Filename(filename.into()),
            download_dir: None,
            paused: false,
            bandwidth_priority: None,
            selections: None,
        }
    }

    pub fn download_dir(mut self, dir: impl Into<String>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn bandwidth_priority(mut self, priority: Priority) -> Self {
        self.bandwidth_priority = Some(priority);
        self
    }

    /// Build the argument map
    pub fn to_arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        match &self.source {
            AddSource::Metainfo(data) => args.insert("metainfo".into(), json!(data)),
            AddSource::Filename(name) => args.insert("filename".into(), json!(name)),
        };
        if let Some(dir) = &self.download_dir {
            args.insert("download-dir".into(), json!(dir));
        }
        args.insert("paused".into(), json!(self.paused));
        if let Some(priority) = self.bandwidth_priority {
            args.insert("bandwidthPriority".into(), json!(priority));
        }
        if let Some(sel) = &self.selections {
            let lists = [
                ("files-wanted", &sel.wanted),
                ("files-unwanted", &sel.unwanted),
                ("priority-low", &sel.priority_low),
                ("priority-normal", &sel.priority_normal),
                ("priority-high", &sel.priority_high),
            ];
            for (key, indices) in lists {
                if !indices.is_empty() {
                    args.insert(key.into(), json!(indices));
                }
            }
        }
        args
    }
}
