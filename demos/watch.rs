//! Watch a daemon's torrents
//!
//! Connects to a Transmission daemon, prints every client event, and
//! optionally adds a `.torrent` file first.
//!
//! Usage: cargo run --example watch -- [host] [port] [file.torrent]
//!
//! Credentials are read from `TRG_USERNAME` / `TRG_PASSWORD`.

use std::env;
use tokio_util::sync::CancellationToken;
use trg::{AddTorrent, Client, ClientConfig, ClientEvent, Metainfo};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args.next().map(|p| p.parse::<u16>()).transpose()?.unwrap_or(9091);
    let torrent = args.next();

    let config = ClientConfig::default()
        .hostname(host)
        .port(port)
        .credentials(
            env::var("TRG_USERNAME").unwrap_or_default(),
            env::var("TRG_PASSWORD").unwrap_or_default(),
        )
        .refresh_interval_secs(5);

    let client = Client::new(config)?;
    let mut events = client.subscribe();

    if let Some(path) = torrent {
        let metainfo = Metainfo::load(&path, &CancellationToken::new()).await?;
        println!(
            "Adding {} ({} files, {} bytes)",
            metainfo.name(),
            metainfo.root.files().len(),
            metainfo.total_size()
        );
        let added = client.torrent_add(&AddTorrent::from_metainfo(&metainfo)).await?;
        println!("Daemon answered: {added:?}");
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { break };
                match &event {
                    ClientEvent::TorrentCompleted { name, .. } => {
                        println!("{name} has finished downloading.");
                    }
                    ClientEvent::ConnectionChanged { state } => {
                        println!("{state}: {} torrents", client.torrents().len());
                    }
                    other => println!("{other:?}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await?;
    Ok(())
}
