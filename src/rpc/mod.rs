//! Daemon RPC
//!
//! JSON request/response envelopes and the HTTP transport that carries them.

pub mod request;
pub mod transport;

pub use request::{
    AddSource, AddTorrent, AddedTorrent, RpcRequest, RpcResponse, TorrentAddArgs, TorrentGetArgs,
};
pub use transport::{Credentials, RpcTransport, SESSION_ID_HEADER};
