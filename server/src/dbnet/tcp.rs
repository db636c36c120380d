//! The raw `TcpListener` accept loop, with an `Arc<Semaphore>` connection
//! cap and an exponential backoff on transient accept errors — the same
//! shape as the teacher's `RawListener`/`NetBackoff`.

use std::cell::Cell;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};

use super::connection::ConnectionHandler;
use crate::context::ServerContext;

/// Caps consecutive accept-error backoff at 64ms, same ceiling as the
/// teacher's listener.
struct NetBackoff {
    current: Cell<u8>,
}

const MAX_BACKOFF: u8 = 64;

impl NetBackoff {
    fn new() -> Self {
        Self { current: Cell::new(1) }
    }

    async fn spin(&self) {
        let backoff = self.current.get();
        tokio::time::sleep(std::time::Duration::from_millis(backoff as u64)).await;
        if backoff < MAX_BACKOFF {
            self.current.set(backoff * 2);
        }
    }

    fn reset(&self) {
        self.current.set(1);
    }
}

macro_rules! skip_loop_err {
    ($e:expr, $backoff:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => {
                log::error!("error while accepting connection: {e}");
                $backoff.spin().await;
                continue;
            }
        }
    };
}

pub struct RawListener {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    climit: Arc<Semaphore>,
    drain_tx: mpsc::Sender<()>,
}

impl RawListener {
    pub async fn bind(
        host: &str,
        port: u16,
        ctx: Arc<ServerContext>,
        drain_tx: mpsc::Sender<()>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let maxclients = ctx.config.read().maxclients as usize;
        log::info!("listening on {host}:{port}");
        Ok(Self {
            listener,
            ctx,
            climit: Arc::new(Semaphore::new(maxclients)),
            drain_tx,
        })
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let backoff = NetBackoff::new();
        loop {
            // Acquire-then-forget: the permit is handed to the connection
            // task, which releases it on drop.
            let permit = self.climit.clone().acquire_owned().await.expect("semaphore not closed");
            let (socket, addr) = skip_loop_err!(self.listener.accept().await, backoff);
            backoff.reset();
            self.ctx.stats.connections_received.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let ctx = self.ctx.clone();
            let drain_tx = self.drain_tx.clone();
            tokio::spawn(async move {
                let mut handler = ConnectionHandler::new(ctx, socket, addr, permit, drain_tx);
                if let Err(e) = handler.run().await {
                    log::debug!("connection {addr} terminated: {e}");
                }
            });
        }
    }
}
