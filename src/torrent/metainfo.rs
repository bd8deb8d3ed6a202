//! Torrent Metainfo Parser
//!
//! Turns a decoded `.torrent` file into a [`FileNode`] tree describing the
//! payload layout, keeping the raw bytes around for `torrent-add`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::bencode::{decode, BencodeDict, BencodeValue, Decoded};
use crate::error::{ClientError, Result};
use crate::protocol::Priority;

/// One file or directory in a torrent's payload
#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    /// File or directory name (one path segment)
    pub name: String,
    /// Position in the torrent's file list, `None` for directories
    pub index: Option<usize>,
    /// Whether the file should be downloaded
    pub wanted: bool,
    /// Download priority
    pub priority: Priority,
    /// Leaf size; directories compute theirs from `children`
    length: u64,
    /// Child nodes (directories only)
    pub children: Vec<FileNode>,
}

/// File indices grouped the way `torrent-add` expects them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelections {
    pub wanted: Vec<usize>,
    pub unwanted: Vec<usize>,
    pub priority_low: Vec<usize>,
    pub priority_normal: Vec<usize>,
    pub priority_high: Vec<usize>,
}

impl FileNode {
    /// Create a leaf file node
    pub fn file(name: impl Into<String>, length: u64, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            wanted: true,
            priority: Priority::Normal,
            length,
            children: Vec::new(),
        }
    }

    /// Create an empty directory node
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            wanted: true,
            priority: Priority::Normal,
            length: 0,
            children: Vec::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.index.is_none()
    }

    /// Size in bytes. Directories sum their children on every call.
    pub fn size(&self) -> u64 {
        if self.is_directory() {
            self.children
                .iter()
                .fold(0u64, |total, c| total.saturating_add(c.size()))
        } else {
            self.length
        }
    }

    /// Insert a file below this node, creating directories along `path`.
    ///
    /// The last segment names the file; the ones before it name directories,
    /// matched by exact name against existing child directories. A file child
    /// with the same name is never reused as a directory: a new directory
    /// node is created next to it.
    pub fn add_file(&mut self, path: &[String], length: u64, index: usize) -> Result<()> {
        let Some((file_name, dirs)) = path.split_last() else {
            return Err(ClientError::invalid_torrent(format!(
                "Empty path for file {}",
                index
            )));
        };

        let mut node = self;
        for dir in dirs {
            let pos = match node
                .children
                .iter()
                .position(|c| c.is_directory() && c.name == *dir)
            {
                Some(pos) => pos,
                None => {
                    node.children.push(FileNode::directory(dir.clone()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[pos];
        }

        node.children
            .push(FileNode::file(file_name.clone(), length, index));
        Ok(())
    }

    /// Find a file node by its index
    pub fn find(&self, index: usize) -> Option<&FileNode> {
        if self.index == Some(index) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(index))
    }

    /// Find a file node by its index, mutably
    pub fn find_mut(&mut self, index: usize) -> Option<&mut FileNode> {
        if self.index == Some(index) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(index))
    }

    /// Set the wanted flag on this node and everything below it
    pub fn set_wanted(&mut self, wanted: bool) {
        self.wanted = wanted;
        for child in &mut self.children {
            child.set_wanted(wanted);
        }
    }

    /// Set the priority on this node and everything below it
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
        for child in &mut self.children {
            child.set_priority(priority);
        }
    }

    /// All leaf files, depth first
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileNode>) {
        if !self.is_directory() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_files(out);
        }
    }

    /// Group leaf indices by wanted flag and priority
    pub fn selections(&self) -> FileSelections {
        let mut selections = FileSelections::default();
        for file in self.files() {
            let Some(index) = file.index else { continue };
            if file.wanted {
                selections.wanted.push(index);
            } else {
                selections.unwanted.push(index);
            }
            match file.priority {
                Priority::Low => selections.priority_low.push(index),
                Priority::Normal => selections.priority_normal.push(index),
                Priority::High => selections.priority_high.push(index),
            }
        }
        selections
    }
}

/// A parsed `.torrent` file
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// Root of the payload tree
    pub root: FileNode,
    /// The file exactly as read
    raw: Vec<u8>,
}

impl Metainfo {
    /// Parse a `.torrent` file from bytes
    pub fn parse(data: impl Into<Vec<u8>>) -> Result<Self> {
        let raw = data.into();
        let root = Self::build_tree(&raw)?;
        Ok(Self { root, raw })
    }

    /// Read and parse a local `.torrent` file.
    ///
    /// Cancelling `cancel` before the read finishes yields
    /// [`ClientError::Cancelled`] and no tree.
    pub async fn load(path: impl AsRef<Path>, cancel: &CancellationToken) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            res = tokio::fs::read(path) => res.map_err(|e| ClientError::Storage {
                path: path.to_path_buf(),
                message: format!("Failed to load file contents: {}", e),
            })?,
        };

        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        tracing::debug!("Loaded {} bytes from {:?}", data.len(), path);
        Self::parse(data)
    }

    /// Read and parse a `file://` URI
    pub async fn load_uri(uri: &str, cancel: &CancellationToken) -> Result<Self> {
        let url = Url::parse(uri)?;
        if url.scheme() != "file" {
            return Err(ClientError::invalid_input(
                "uri",
                format!("Unsupported scheme '{}'", url.scheme()),
            ));
        }
        let path = url
            .to_file_path()
            .map_err(|_| ClientError::invalid_input("uri", format!("Not a local path: {}", uri)))?;
        Self::load(path, cancel).await
    }

    /// Raw bytes of the file
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Base64 of the raw bytes, for the `metainfo` argument of `torrent-add`
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.raw)
    }

    /// Torrent name (root node name)
    pub fn name(&self) -> &str {
        &self.root.name
    }

    /// Total payload size
    pub fn total_size(&self) -> u64 {
        self.root.size()
    }

    fn build_tree(data: &[u8]) -> Result<FileNode> {
        let root = match decode(data)? {
            Decoded::Value(BencodeValue::Dict(dict)) => dict,
            _ => return Err(ClientError::invalid_torrent("Root must be a dictionary")),
        };

        let info = root
            .get(b"info")
            .ok_or_else(|| ClientError::invalid_torrent("Missing 'info' key"))?
            .as_dict()
            .ok_or_else(|| ClientError::invalid_torrent("'info' must be a dictionary"))?;

        let name = utf8_field(info, b"name")?;

        match info.get(b"files") {
            Some(files) => {
                let files = files
                    .as_list()
                    .ok_or_else(|| ClientError::invalid_torrent("'files' must be a list"))?;
                let mut dir = FileNode::directory(name);
                for (index, entry) in files.iter().enumerate() {
                    let entry = entry.as_dict().ok_or_else(|| {
                        ClientError::invalid_torrent("File entry must be a dictionary")
                    })?;
                    let path = Self::parse_path(entry, index)?;
                    let length = length_field(entry)?;
                    dir.add_file(&path, length, index)?;
                }
                Ok(dir)
            }
            None => {
                let length = length_field(info)?;
                Ok(FileNode::file(name, length, 0))
            }
        }
    }

    fn parse_path(entry: &BencodeDict, index: usize) -> Result<Vec<String>> {
        let segments = entry
            .get(b"path")
            .ok_or_else(|| {
                ClientError::invalid_torrent(format!("Missing 'path' in file entry {}", index))
            })?
            .as_list()
            .ok_or_else(|| ClientError::invalid_torrent("'path' must be a list of strings"))?;

        segments
            .iter()
            .map(|segment| {
                let bytes = segment.as_bytes().ok_or_else(|| {
                    ClientError::invalid_torrent("Path component must be a string")
                })?;
                String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ClientError::invalid_torrent(format!("Failed to decode UTF-8: {}", e))
                })
            })
            .collect()
    }
}

fn utf8_field(dict: &BencodeDict, key: &[u8]) -> Result<String> {
    let label = String::from_utf8_lossy(key);
    let bytes = dict
        .get(key)
        .ok_or_else(|| ClientError::invalid_torrent(format!("Missing '{}' key", label)))?
        .as_bytes()
        .ok_or_else(|| ClientError::invalid_torrent(format!("'{}' must be a string", label)))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ClientError::invalid_torrent(format!("Failed to decode UTF-8: {}", e)))
}

fn length_field(dict: &BencodeDict) -> Result<u64> {
    dict.get(b"length")
        .ok_or_else(|| ClientError::invalid_torrent("Missing 'length' key"))?
        .as_u64()
        .ok_or_else(|| ClientError::invalid_torrent("'length' must be a non-negative integer"))
}
