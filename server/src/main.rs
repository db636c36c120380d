//! # valkd
//!
//! An in-memory, single-node key-value server speaking the RESP2/RESP3 wire
//! protocol. See the individual modules for their respective documentation.

use std::env;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use libsky::VERSION;

mod acl;
mod blocking;
mod client;
mod commands;
mod config;
mod context;
mod db;
mod dbnet;
mod params;
mod protocol;
mod router;
mod txn;
mod util;

use config::{Cli, Config};
use context::ServerContext;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
/// The default memory allocator for platforms other than msvc.
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    Builder::new()
        .parse_filters(&env::var("VALKD_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let cli = Cli::parse();
    let config = match Config::from_cli(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("Startup failure: {e}");
            std::process::exit(0x100);
        }
    };

    log::info!("valkd v{VERSION} starting up");
    let ctx = Arc::new(ServerContext::new(config));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("valkd-worker")
        .enable_all()
        .build()
        .expect("failed to start the tokio runtime");

    runtime.block_on(async move {
        let (terminator, shutdown_rx) = dbnet::Terminator::new();
        let (host, port) = {
            let config = ctx.config.read();
            (config.host.clone(), config.port)
        };
        let server = tokio::spawn(dbnet::run(ctx.clone(), host, port, shutdown_rx));
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("received interrupt, shutting down");
            }
        }
        terminator.shutdown();
        if let Err(e) = server.await.expect("server task panicked") {
            log::error!("server exited with error: {e}");
        }
    });

    log::info!("stopped accepting incoming connections, goodbye");
}
