//! `MULTI`/`EXEC`/`DISCARD`/`WATCH` state for one client connection.

use std::collections::HashMap;

use bytes::Bytes;

use crate::util::error::ServerError;

/// One command queued inside a `MULTI` block, already split into name and
/// args but not yet validated against the router (that happens at queue
/// time, so a bad command aborts the whole transaction at `EXEC`).
pub struct QueuedCommand {
    pub name: String,
    pub args: Vec<Bytes>,
}

#[derive(Default)]
pub struct Transaction {
    pub active: bool,
    pub dirty: bool,
    pub queue: Vec<QueuedCommand>,
    /// db index -> (key -> version at WATCH time).
    pub watched: HashMap<usize, HashMap<Bytes, u64>>,
}

impl Transaction {
    pub fn begin(&mut self) -> Result<(), ServerError> {
        if self.active {
            return Err(ServerError::generic("MULTI calls can not be nested"));
        }
        self.active = true;
        self.dirty = false;
        self.queue.clear();
        Ok(())
    }

    pub fn discard(&mut self) -> Result<(), ServerError> {
        if !self.active {
            return Err(ServerError::generic("DISCARD without MULTI"));
        }
        self.active = false;
        self.dirty = false;
        self.queue.clear();
        self.watched.clear();
        Ok(())
    }

    pub fn queue(&mut self, name: String, args: Vec<Bytes>) {
        self.queue.push(QueuedCommand { name, args });
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn watch(&mut self, db: usize, key: Bytes, version: u64) -> Result<(), ServerError> {
        if self.active {
            return Err(ServerError::generic("WATCH inside MULTI is not allowed"));
        }
        self.watched.entry(db).or_default().insert(key, version);
        Ok(())
    }

    pub fn unwatch(&mut self) {
        self.watched.clear();
    }

    /// Takes the queue out, ending the transaction, for the caller to
    /// execute. Call only after confirming watched keys are unchanged.
    pub fn take_for_exec(&mut self) -> Vec<QueuedCommand> {
        self.active = false;
        self.watched.clear();
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_multi_is_rejected() {
        let mut tx = Transaction::default();
        tx.begin().unwrap();
        assert!(tx.begin().is_err());
    }

    #[test]
    fn discard_clears_queue_and_watch() {
        let mut tx = Transaction::default();
        tx.begin().unwrap();
        tx.queue("SET".into(), vec![Bytes::from_static(b"k")]);
        tx.discard().unwrap();
        assert!(tx.queue.is_empty());
        assert!(!tx.active);
    }
}
