//! Network plumbing: the TCP accept loop and the per-connection handler
//! loop, plus the broadcast-based shutdown signal fanned out to both.

pub mod connection;
pub mod tcp;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::context::ServerContext;

/// Fans a single shutdown signal out to every listener/connection, and lets
/// the caller wait for every connection to finish draining via the
/// `mpsc::Sender` handles each connection holds (the channel itself carries
/// no data — its closing, detected by the corresponding `Receiver`, is the
/// signal that all clones have dropped).
pub struct Terminator {
    pub signal: broadcast::Sender<()>,
}

impl Terminator {
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        let (tx, rx) = broadcast::channel(1);
        (Self { signal: tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.signal.send(());
    }
}

pub async fn run(
    ctx: Arc<ServerContext>,
    host: String,
    port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let (drain_tx, mut drain_rx) = mpsc::channel::<()>(1);
    let listener = tcp::RawListener::bind(&host, port, ctx.clone(), drain_tx).await?;
    tokio::select! {
        res = listener.run() => {
            res?;
        }
        _ = shutdown_rx.recv() => {
            log::info!("shutdown signal received, no longer accepting connections");
        }
    }
    drop(listener);
    // Wait for every connection's drain sender clone to be dropped.
    let _ = drain_rx.recv().await;
    Ok(())
}
