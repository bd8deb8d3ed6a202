//! Test Helpers
//!
//! This module provides helper functions and builders for creating test data
//! such as torrent files, daemon responses, and client configurations.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use trg::{ClientConfig, ClientEvent};
use wiremock::{MockServer, ResponseTemplate};

/// Builder for creating test torrent data
pub struct TestTorrentBuilder {
    name: String,
    piece_length: u64,
    files: Vec<TestFile>,
}

/// A file in the test torrent
struct TestFile {
    path: Vec<String>,
    length: u64,
}

impl TestTorrentBuilder {
    /// Create a new test torrent builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            piece_length: 16384,
            files: Vec::new(),
        }
    }

    /// Add a file at a `/`-separated path below the torrent root
    pub fn add_file(mut self, path: &str, length: u64) -> Self {
        self.files.push(TestFile {
            path: path.split('/').map(str::to_string).collect(),
            length,
        });
        self
    }

    /// Create a single-file torrent
    pub fn single_file(name: impl Into<String>, length: u64) -> Self {
        let name = name.into();
        Self::new(&name).add_file(&name, length)
    }

    /// Create a multi-file torrent with sample files
    pub fn multi_file(name: impl Into<String>) -> Self {
        Self::new(name)
            .add_file("file1.txt", 12)
            .add_file("file2.txt", 17)
            .add_file("subdir/file3.bin", 1000)
    }

    /// Build the bencoded torrent
    pub fn build(self) -> Vec<u8> {
        let is_single_file = self.files.len() == 1 && self.files[0].path == [self.name.clone()];
        let total: u64 = self.files.iter().map(|f| f.length).sum();
        let piece_count = total.div_ceil(self.piece_length).max(1) as usize;

        let mut info = HashMap::new();
        info.insert("name".to_string(), BencodeValue::String(self.name.clone()));
        info.insert(
            "piece length".to_string(),
            BencodeValue::Integer(self.piece_length as i64),
        );
        info.insert(
            "pieces".to_string(),
            BencodeValue::Bytes(vec![0u8; piece_count * 20]),
        );

        if is_single_file {
            info.insert(
                "length".to_string(),
                BencodeValue::Integer(self.files[0].length as i64),
            );
        } else {
            let files_list = self
                .files
                .iter()
                .map(|file| {
                    let mut file_dict = HashMap::new();
                    file_dict.insert(
                        "length".to_string(),
                        BencodeValue::Integer(file.length as i64),
                    );
                    file_dict.insert(
                        "path".to_string(),
                        BencodeValue::List(
                            file.path
                                .iter()
                                .map(|s| BencodeValue::String(s.clone()))
                                .collect(),
                        ),
                    );
                    BencodeValue::Dict(file_dict)
                })
                .collect();
            info.insert("files".to_string(), BencodeValue::List(files_list));
        }

        let mut torrent = HashMap::new();
        torrent.insert("info".to_string(), BencodeValue::Dict(info));
        torrent.insert(
            "announce".to_string(),
            BencodeValue::String("http://tracker.example.com/announce".to_string()),
        );

        bencode_encode(&BencodeValue::Dict(torrent))
    }
}

/// Simple bencode value for encoding
#[derive(Clone)]
enum BencodeValue {
    Integer(i64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<BencodeValue>),
    Dict(HashMap<String, BencodeValue>),
}

/// Encode a bencode value
fn bencode_encode(value: &BencodeValue) -> Vec<u8> {
    match value {
        BencodeValue::Integer(i) => format!("i{}e", i).into_bytes(),
        BencodeValue::String(s) => {
            let mut result = format!("{}:", s.len()).into_bytes();
            result.extend_from_slice(s.as_bytes());
            result
        }
        BencodeValue::Bytes(b) => {
            let mut result = format!("{}:", b.len()).into_bytes();
            result.extend_from_slice(b);
            result
        }
        BencodeValue::List(list) => {
            let mut result = vec![b'l'];
            for item in list {
                result.extend(bencode_encode(item));
            }
            result.push(b'e');
            result
        }
        BencodeValue::Dict(dict) => {
            // Keys must be sorted
            let mut keys: Vec<_> = dict.keys().collect();
            keys.sort();

            let mut result = vec![b'd'];
            for key in keys {
                result.extend(bencode_encode(&BencodeValue::String(key.clone())));
                result.extend(bencode_encode(&dict[key]));
            }
            result.push(b'e');
            result
        }
    }
}

/// Client configuration pointing at a mock daemon
pub fn config_for(server: &MockServer) -> ClientConfig {
    let addr = server.address();
    ClientConfig::new()
        .hostname(addr.ip().to_string())
        .port(addr.port())
}

/// `200` with `{"result": "success", "arguments": ...}`
pub fn rpc_success(arguments: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "result": "success",
        "arguments": arguments,
    }))
}

/// `200` with an application-level failure
pub fn rpc_failure(result: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": result }))
}

/// `torrent-get` response with the given rows and removed ids
pub fn torrent_get_response(torrents: Value, removed: &[i64]) -> ResponseTemplate {
    rpc_success(json!({
        "torrents": torrents,
        "removed": removed,
    }))
}

/// Wait for a specific event
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<ClientEvent>,
    predicate: F,
    timeout_duration: Duration,
) -> Option<ClientEvent>
where
    F: Fn(&ClientEvent) -> bool,
{
    let result = timeout(timeout_duration, async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    })
    .await;
    result.unwrap_or(None)
}

/// Wait for a condition with timeout
pub async fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_file_torrent() {
        let torrent_data = TestTorrentBuilder::single_file("test.txt", 32768).build();

        assert!(torrent_data.starts_with(b"d"));
        assert!(torrent_data.ends_with(b"e"));
        assert!(torrent_data
            .windows(b"6:lengthi32768e".len())
            .any(|w| w == b"6:lengthi32768e"));
    }

    #[test]
    fn test_multi_file_torrent() {
        let torrent_data = TestTorrentBuilder::multi_file("pack").build();
        assert!(torrent_data
            .windows(b"5:files".len())
            .any(|w| w == b"5:files"));
    }
}
