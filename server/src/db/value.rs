//! The tagged value a key can hold, and the typed accessors every command
//! body uses to reach into it. A key maps to exactly one variant for its
//! whole lifetime between deletions — there is no implicit coercion between
//! kinds, so every accessor that doesn't match returns `WRONGTYPE`.

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;

use super::sorted_set::SortedSet;
use super::stream::Stream;
use crate::util::error::ServerError;

#[derive(Debug, Clone)]
pub enum Value {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(SortedSet),
    Stream(Stream),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
            Value::Stream(_) => "stream",
        }
    }

    pub fn as_str(&self) -> Result<&Bytes, ServerError> {
        match self {
            Value::Str(b) => Ok(b),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_str_mut(&mut self) -> Result<&mut Bytes, ServerError> {
        match self {
            Value::Str(b) => Ok(b),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_list(&self) -> Result<&VecDeque<Bytes>, ServerError> {
        match self {
            Value::List(l) => Ok(l),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_list_mut(&mut self) -> Result<&mut VecDeque<Bytes>, ServerError> {
        match self {
            Value::List(l) => Ok(l),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_hash(&self) -> Result<&HashMap<Bytes, Bytes>, ServerError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_hash_mut(&mut self) -> Result<&mut HashMap<Bytes, Bytes>, ServerError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_set(&self) -> Result<&HashSet<Bytes>, ServerError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_set_mut(&mut self) -> Result<&mut HashSet<Bytes>, ServerError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_zset(&self) -> Result<&SortedSet, ServerError> {
        match self {
            Value::SortedSet(z) => Ok(z),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_zset_mut(&mut self) -> Result<&mut SortedSet, ServerError> {
        match self {
            Value::SortedSet(z) => Ok(z),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream, ServerError> {
        match self {
            Value::Stream(s) => Ok(s),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream, ServerError> {
        match self {
            Value::Stream(s) => Ok(s),
            _ => Err(ServerError::wrong_type()),
        }
    }

    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
            Value::Stream(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_accessor_reports_wrongtype() {
        let v = Value::Str(Bytes::from_static(b"hi"));
        assert!(v.as_list().is_err());
        assert!(v.as_str().is_ok());
    }
}
