//! Per-connection state: who the client is, what database it's pointed at,
//! its transaction and blocking state, and its negotiated protocol version.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::ProtoVer;
use crate::txn::Transaction;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

pub struct Client {
    pub id: u64,
    pub addr: SocketAddr,
    pub name: String,
    pub db_index: usize,
    pub proto: ProtoVer,
    pub authenticated_user: String,
    /// Cleared on connect whenever `requirepass` is set; `AUTH`/`HELLO AUTH`
    /// flips it back on, gating every other command until then.
    pub authenticated: bool,
    pub tx: Transaction,
    /// Set while a blocking command is awaiting a wake; `CLIENT UNBLOCK`
    /// targets this id.
    pub blocked_on: Option<u64>,
    /// Set for the life of a `MULTI` block and for every command run inside
    /// `EXEC`, so notifications fired during it are deferred (spec §4.6).
    pub in_multi: bool,
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            addr,
            name: String::new(),
            db_index: 0,
            proto: ProtoVer::Resp2,
            authenticated_user: "default".to_string(),
            authenticated: true,
            tx: Transaction::default(),
            blocked_on: None,
            in_multi: false,
        }
    }
}
