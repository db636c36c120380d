//! Process-wide shared state: every database, the ACL table, the blocking
//! registry, and the active configuration. One `Arc<ServerContext>` is
//! cloned into each connection task, matching the teacher's `CoreDB`/
//! `Corestore` shape of a small `Arc`-wrapped shell around the real state.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::acl::AclTable;
use crate::blocking::BlockingManager;
use crate::config::Config;
use crate::db::Database;
use crate::router::Router;

pub struct Stats {
    pub connections_received: AtomicU64,
    pub commands_processed: AtomicU64,
    pub expired_keys: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            connections_received: AtomicU64::new(0),
            commands_processed: AtomicU64::new(0),
            expired_keys: AtomicU64::new(0),
        }
    }
}

/// A connection task's entry in the process-wide client table, kept
/// up to date by its own loop and read by `CLIENT LIST`/`CLIENT KILL`/
/// `CLIENT UNBLOCK` running on other connections.
pub struct ClientHandle {
    pub id: u64,
    pub addr: SocketAddr,
    pub name: Mutex<String>,
    pub db_index: AtomicUsize,
    /// Set by `CLIENT KILL`; the owning connection's read loop polls this
    /// and closes the socket the next time it checks.
    pub kill: AtomicBool,
    /// Mirrors `Client::blocked_on` so `CLIENT UNBLOCK <id>` on one
    /// connection can resolve to the right waiter on another. `-1` means
    /// not currently blocked.
    pub blocked_on: AtomicI64,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<u64, Arc<ClientHandle>>>,
}

impl ClientRegistry {
    pub fn register(&self, id: u64, addr: SocketAddr) -> Arc<ClientHandle> {
        let handle = Arc::new(ClientHandle {
            id,
            addr,
            name: Mutex::new(String::new()),
            db_index: AtomicUsize::new(0),
            kill: AtomicBool::new(false),
            blocked_on: AtomicI64::new(-1),
        });
        self.clients.lock().insert(id, handle.clone());
        handle
    }

    pub fn unregister(&self, id: u64) {
        self.clients.lock().remove(&id);
    }

    pub fn list(&self) -> Vec<Arc<ClientHandle>> {
        self.clients.lock().values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<Arc<ClientHandle>> {
        self.clients.lock().get(&id).cloned()
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<Arc<ClientHandle>> {
        self.clients.lock().values().find(|h| h.addr == addr).cloned()
    }
}

pub struct ServerContext {
    pub databases: Vec<Database>,
    pub acl: AclTable,
    pub blocking: BlockingManager,
    /// Read-mostly, written only by `CONFIG SET`; a `RwLock` rather than a
    /// plain field since every command handler needs shared read access
    /// through `&ServerContext` alone.
    pub config: RwLock<Config>,
    pub stats: Stats,
    pub start_time_ms: u64,
    pub clients: ClientRegistry,
    pub router: Router,
}

impl ServerContext {
    pub fn new(config: Config) -> Self {
        let db_count = config.databases;
        let acl = AclTable::with_default_user();
        if let Some(pass) = &config.requirepass {
            if let Some(mut user) = acl.get("default") {
                user.nopass = false;
                user.password_hashes = vec![crate::acl::hash_password(pass.as_bytes())];
                acl.upsert(user);
            }
        }
        Self {
            databases: (0..db_count).map(|_| Database::new()).collect(),
            acl,
            blocking: BlockingManager::new(),
            config: RwLock::new(config),
            stats: Stats::default(),
            start_time_ms: crate::util::now_ms(),
            clients: ClientRegistry::default(),
            router: Router::new(crate::commands::table::COMMAND_TABLE),
        }
    }

    pub fn db(&self, index: usize) -> &Database {
        &self.databases[index]
    }

    /// Mirrors a client's blocking-wait registration into its process-wide
    /// [`ClientHandle`] so `CLIENT UNBLOCK <id>` on another connection can
    /// find the right waiter id; `None` marks the client as not blocked.
    pub fn set_blocked(&self, client_id: u64, waiter_id: Option<u64>) {
        if let Some(handle) = self.clients.get(client_id) {
            handle
                .blocked_on
                .store(waiter_id.map(|v| v as i64).unwrap_or(-1), Ordering::Relaxed);
        }
    }
}
