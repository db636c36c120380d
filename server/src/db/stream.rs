//! The append-only log type backing `XADD`/`XREAD`/consumer groups.
//!
//! Grounded on `pyvalkey`'s stream model: entries are keyed by a
//! `(milliseconds, sequence)` pair that only ever increases, consumer groups
//! track a "last delivered" cursor plus a pending-entries-list (PEL) of
//! entries handed out but not yet acknowledged, and each PEL entry also
//! lives in a per-consumer PEL so `XPENDING`/`XCLAIM`/`XAUTOCLAIM` can filter
//! by consumer.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::util::error::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    pub const MIN: EntryId = EntryId { ms: 0, seq: 0 };
    pub const MAX: EntryId = EntryId { ms: u64::MAX, seq: u64::MAX };

    pub fn format(self) -> String {
        format!("{}-{}", self.ms, self.seq)
    }

    /// Parses `<ms>` or `<ms>-<seq>`. `default_seq` fills in the missing
    /// sequence when only a millisecond timestamp is given, which differs
    /// between range-start (0) and range-end (u64::MAX) contexts.
    pub fn parse(s: &[u8], default_seq: u64) -> Result<EntryId, ServerError> {
        let s = std::str::from_utf8(s).map_err(|_| invalid_id())?;
        match s.split_once('-') {
            Some((ms, seq)) => {
                let ms: u64 = ms.parse().map_err(|_| invalid_id())?;
                let seq: u64 = seq.parse().map_err(|_| invalid_id())?;
                Ok(EntryId { ms, seq })
            }
            None => {
                let ms: u64 = s.parse().map_err(|_| invalid_id())?;
                Ok(EntryId { ms, seq: default_seq })
            }
        }
    }

    pub fn next(self) -> EntryId {
        if self.seq == u64::MAX {
            EntryId { ms: self.ms + 1, seq: 0 }
        } else {
            EntryId { ms: self.ms, seq: self.seq + 1 }
        }
    }

    pub fn prev(self) -> EntryId {
        if self.seq == 0 {
            if self.ms == 0 {
                EntryId::MIN
            } else {
                EntryId { ms: self.ms - 1, seq: u64::MAX }
            }
        } else {
            EntryId { ms: self.ms, seq: self.seq - 1 }
        }
    }
}

fn invalid_id() -> ServerError {
    ServerError::generic("Invalid stream ID specified as stream command argument")
}

pub type Fields = Vec<(Bytes, Bytes)>;

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub consumer: Bytes,
    pub delivery_time_ms: u64,
    pub delivery_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Consumer {
    pub seen_time_ms: u64,
    pub active_time_ms: u64,
    /// IDs currently pending for this consumer, kept in delivery order.
    pub pending: Vec<EntryId>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsumerGroup {
    pub last_delivered: EntryId,
    pub pending: BTreeMap<EntryId, PendingEntry>,
    pub consumers: std::collections::HashMap<Bytes, Consumer>,
    pub entries_read: u64,
}

impl ConsumerGroup {
    pub fn consumer_mut(&mut self, name: &Bytes) -> &mut Consumer {
        self.consumers.entry(name.clone()).or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub entries: BTreeMap<EntryId, Fields>,
    pub last_id: EntryId,
    pub max_deleted_id: EntryId,
    pub entries_added: u64,
    pub groups: std::collections::HashMap<Bytes, ConsumerGroup>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Computes the ID to use for an `XADD` call, given the requested id
    /// token (already split into ms/seq, with `auto_seq` set when the caller
    /// wrote e.g. `5-*`).
    pub fn next_id_for_add(&self, ms: u64, auto_seq: bool) -> Result<EntryId, ServerError> {
        let candidate = if auto_seq {
            if ms == self.last_id.ms {
                EntryId { ms, seq: self.last_id.seq + 1 }
            } else {
                EntryId { ms, seq: 0 }
            }
        } else {
            EntryId { ms, seq: 0 }
        };
        if candidate <= self.last_id && self.entries_added > 0 {
            return Err(ServerError::generic(
                "The ID specified in XADD is equal or smaller than the target stream top item",
            ));
        }
        Ok(candidate)
    }

    pub fn auto_id(&self, now_ms: u64) -> EntryId {
        if now_ms > self.last_id.ms {
            EntryId { ms: now_ms, seq: 0 }
        } else {
            EntryId { ms: self.last_id.ms, seq: self.last_id.seq + 1 }
        }
    }

    pub fn insert(&mut self, id: EntryId, fields: Fields) {
        self.entries.insert(id, fields);
        self.last_id = id;
        self.entries_added += 1;
    }

    pub fn trim_to_maxlen(&mut self, maxlen: usize) -> u64 {
        let mut removed = 0;
        while self.entries.len() > maxlen {
            if let Some((&id, _)) = self.entries.iter().next() {
                self.entries.remove(&id);
                if id > self.max_deleted_id {
                    self.max_deleted_id = id;
                }
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    pub fn trim_to_minid(&mut self, minid: EntryId) -> u64 {
        let to_remove: Vec<EntryId> = self.entries.range(..minid).map(|(id, _)| *id).collect();
        for id in &to_remove {
            self.entries.remove(id);
            if *id > self.max_deleted_id {
                self.max_deleted_id = *id;
            }
        }
        to_remove.len() as u64
    }

    pub fn range(&self, start: EntryId, end: EntryId, count: Option<usize>) -> Vec<(EntryId, Fields)> {
        let iter = self.entries.range(start..=end).map(|(id, f)| (*id, f.clone()));
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn range_rev(&self, start: EntryId, end: EntryId, count: Option<usize>) -> Vec<(EntryId, Fields)> {
        let iter = self.entries.range(end..=start).rev().map(|(id, f)| (*id, f.clone()));
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_seq_bumps_within_same_millisecond() {
        let mut s = Stream::new();
        s.insert(EntryId { ms: 5, seq: 0 }, vec![]);
        let id = s.next_id_for_add(5, true).unwrap();
        assert_eq!(id, EntryId { ms: 5, seq: 1 });
    }

    #[test]
    fn rejects_id_not_greater_than_last() {
        let mut s = Stream::new();
        s.insert(EntryId { ms: 5, seq: 0 }, vec![]);
        assert!(s.next_id_for_add(4, false).is_err());
    }

    #[test]
    fn trim_to_maxlen_drops_oldest_first() {
        let mut s = Stream::new();
        for i in 0..5u64 {
            s.insert(EntryId { ms: i, seq: 0 }, vec![]);
        }
        let removed = s.trim_to_maxlen(2);
        assert_eq!(removed, 3);
        assert_eq!(s.len(), 2);
        assert!(s.entries.contains_key(&EntryId { ms: 3, seq: 0 }));
        assert!(s.entries.contains_key(&EntryId { ms: 4, seq: 0 }));
    }
}
