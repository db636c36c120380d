//! Per-key waiter registry backing `BLPOP`/`BRPOP`/`BLMOVE`/`BZPOPMIN`/
//! `XREAD BLOCK` and friends.
//!
//! Mirrors the control flow of `BlockingManagerBase.wait_for_lists` /
//! `notify` from the original implementation this server was distilled
//! from: a waiter first checks whether any of its keys already satisfy the
//! wait (no blocking needed), otherwise it registers itself against every
//! key it's interested in and awaits a single wake message; on each wake it
//! re-checks (level-triggered, not edge-triggered — a stale wake for a key
//! someone else already drained is not an error, the waiter just keeps
//! waiting), and it is guaranteed to be removed from every key's queue
//! exactly once, regardless of whether it woke via data, timeout, or
//! `CLIENT UNBLOCK`.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::util::error::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    KeyReady,
    Error,
}

pub struct Waiter {
    id: u64,
    tx: mpsc::Sender<WakeReason>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// key -> FIFO of waiters registered against it.
    by_key: HashMap<Bytes, Vec<Waiter>>,
    /// waiter id -> keys it is registered against, so removal on exit is O(keys) not O(all keys).
    keys_by_waiter: HashMap<u64, Vec<Bytes>>,
    /// Pending notifications queued while the notifying client is inside MULTI,
    /// flushed once EXEC completes.
    lazy: Vec<Bytes>,
}

pub struct BlockingManager {
    registry: Mutex<Registry>,
}

impl Default for BlockingManager {
    fn default() -> Self {
        Self { registry: Mutex::new(Registry::default()) }
    }
}

/// One client's live registration, used to deliver a `CLIENT UNBLOCK`.
pub struct Registration {
    id: u64,
    rx: mpsc::Receiver<WakeReason>,
}

impl BlockingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `keys`, returning a handle to await a wake on.
    pub fn register(&self, keys: &[Bytes]) -> Registration {
        let (tx, rx) = mpsc::channel(1);
        let mut reg = self.registry.lock();
        let id = reg.next_id;
        reg.next_id += 1;
        for key in keys {
            reg.by_key.entry(key.clone()).or_default().push(Waiter { id, tx: tx.clone() });
        }
        reg.keys_by_waiter.insert(id, keys.to_vec());
        Registration { id, rx }
    }

    pub fn unregister(&self, reg: &Registration) {
        let mut g = self.registry.lock();
        if let Some(keys) = g.keys_by_waiter.remove(&reg.id) {
            for key in keys {
                if let Some(list) = g.by_key.get_mut(&key) {
                    list.retain(|w| w.id != reg.id);
                    if list.is_empty() {
                        g.by_key.remove(&key);
                    }
                }
            }
        }
    }

    /// Wakes every waiter registered on `key`. If `in_multi`, the wake is
    /// deferred until [`BlockingManager::flush_lazy`] is called at `EXEC`.
    pub fn notify(&self, key: &Bytes, in_multi: bool) {
        if in_multi {
            self.registry.lock().lazy.push(key.clone());
            return;
        }
        self.notify_now(key);
    }

    fn notify_now(&self, key: &Bytes) {
        let waiters: Vec<Waiter> = {
            let g = self.registry.lock();
            g.by_key.get(key).cloned_waiters()
        };
        for w in waiters {
            let _ = w.tx.try_send(WakeReason::KeyReady);
        }
    }

    pub fn flush_lazy(&self) {
        let keys: Vec<Bytes> = std::mem::take(&mut self.registry.lock().lazy);
        for key in keys {
            self.notify_now(&key);
        }
    }

    /// Sends an out-of-band unblock signal to a specific waiter, used by
    /// `CLIENT UNBLOCK`. No-op if the waiter has already exited.
    pub fn unblock(&self, waiter_id: u64, error: bool) {
        let g = self.registry.lock();
        for waiters in g.by_key.values() {
            for w in waiters {
                if w.id == waiter_id {
                    let _ = w.tx.try_send(if error { WakeReason::Error } else { WakeReason::KeyReady });
                }
            }
        }
    }
}

impl Registration {
    pub fn waiter_id(&self) -> u64 {
        self.id
    }

    /// Awaits a single wake message, a timeout (`None` = block forever), or
    /// an explicit unblock. Returns `Ok(true)` if woken by data/unblock and
    /// the caller should re-check its keys, `Ok(false)` on timeout.
    pub async fn wait(&mut self, timeout_dur: Option<Duration>) -> Result<bool, ServerError> {
        let recv = self.rx.recv();
        let outcome = match timeout_dur {
            Some(d) => match timeout(d, recv).await {
                Ok(msg) => msg,
                Err(_) => return Ok(false),
            },
            None => recv.await,
        };
        match outcome {
            Some(WakeReason::Error) => Err(ServerError::unblocked()),
            Some(WakeReason::KeyReady) => Ok(true),
            None => Ok(false),
        }
    }
}

impl Clone for Waiter {
    fn clone(&self) -> Self {
        Waiter { id: self.id, tx: self.tx.clone() }
    }
}

trait ClonedWaiters {
    fn cloned_waiters(self) -> Vec<Waiter>;
}

impl ClonedWaiters for Option<&Vec<Waiter>> {
    fn cloned_waiters(self) -> Vec<Waiter> {
        self.map(|v| v.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wakes_registered_waiter_on_notify() {
        let mgr = BlockingManager::new();
        let key = Bytes::from_static(b"k");
        let mut reg = mgr.register(&[key.clone()]);
        mgr.notify(&key, false);
        let woke = reg.wait(Some(Duration::from_millis(100))).await.unwrap();
        assert!(woke);
        mgr.unregister(&reg);
    }

    #[tokio::test]
    async fn times_out_without_notify() {
        let mgr = BlockingManager::new();
        let key = Bytes::from_static(b"k");
        let mut reg = mgr.register(&[key.clone()]);
        let woke = reg.wait(Some(Duration::from_millis(20))).await.unwrap();
        assert!(!woke);
        mgr.unregister(&reg);
    }

    #[tokio::test]
    async fn lazy_notify_defers_until_flush() {
        let mgr = BlockingManager::new();
        let key = Bytes::from_static(b"k");
        let mut reg = mgr.register(&[key.clone()]);
        mgr.notify(&key, true);
        let woke = reg.wait(Some(Duration::from_millis(20))).await.unwrap();
        assert!(!woke, "lazy notification must not wake before flush");
        mgr.flush_lazy();
        let woke = reg.wait(Some(Duration::from_millis(100))).await.unwrap();
        assert!(woke);
        mgr.unregister(&reg);
    }
}
