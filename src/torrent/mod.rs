//! Torrent File Module
//!
//! This module handles `.torrent` files on the client side:
//! - Bencode decoding
//! - Metainfo parsing into a payload file tree

pub mod bencode;
pub mod metainfo;

// Re-export commonly used types
pub use bencode::{BencodeDict, BencodeValue, Decoded};
pub use metainfo::{FileNode, FileSelections, Metainfo};
