//! `HSET`/`HGET` and the rest of the hash-valued command family.

use bytes::Bytes;
use rand::seq::SliceRandom;

use crate::client::Client;
use crate::context::ServerContext;
use crate::db::value::Value;
use crate::params::{parse_f64, parse_i64, ArgReader};
use crate::protocol::Reply;
use crate::util::error::ServerError;

use super::DispatchResult;

pub fn hset(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hset", args);
    let key = r.next_bytes()?;
    if r.is_empty() || r.remaining() % 2 != 0 {
        return Err(ServerError::wrong_args("hset"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Hash(Default::default()))?;
    let h = v.as_hash_mut()?;
    let mut added = 0i64;
    while !r.is_empty() {
        let field = r.next_bytes()?;
        let value = r.next_bytes()?;
        if h.insert(field, value).is_none() {
            added += 1;
        }
    }
    Ok(Reply::Integer(added))
}

/// Deprecated alias for `HSET` that replies `+OK` instead of a field count.
pub fn hmset(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    hset(ctx, c, args)?;
    Ok(Reply::ok())
}

pub fn hsetnx(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hsetnx", args);
    let key = r.next_bytes()?;
    let field = r.next_bytes()?;
    let value = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Hash(Default::default()))?;
    let h = v.as_hash_mut()?;
    if h.contains_key(&field) {
        Ok(Reply::Integer(0))
    } else {
        h.insert(field, value);
        Ok(Reply::Integer(1))
    }
}

pub fn hget(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hget", args);
    let key = r.next_bytes()?;
    let field = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(v.as_hash()?.get(&field).cloned().map(Reply::Bulk).unwrap_or(Reply::Nil)),
        None => Ok(Reply::Nil),
    }
}

pub fn hmget(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hmget", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("hmget"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let hash = match db.get(&key) {
        Some(v) => Some(v.as_hash()?.clone()),
        None => None,
    };
    let out: Vec<Reply> = r
        .rest()
        .iter()
        .map(|f| match &hash {
            Some(h) => h.get(f).cloned().map(Reply::Bulk).unwrap_or(Reply::Nil),
            None => Reply::Nil,
        })
        .collect();
    Ok(Reply::Array(out))
}

pub fn hdel(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hdel", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("hdel"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let mut removed = 0;
    if let Some(v) = db.get_mut(&key) {
        let h = v.as_hash_mut()?;
        for field in r.rest() {
            if h.remove(field).is_some() {
                removed += 1;
            }
        }
    }
    db.remove_if_empty(&key);
    Ok(Reply::Integer(removed))
}

pub fn hexists(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hexists", args);
    let key = r.next_bytes()?;
    let field = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_hash()?.contains_key(&field) as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn hlen(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hlen", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_hash()?.len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn hstrlen(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hstrlen", args);
    let key = r.next_bytes()?;
    let field = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_hash()?.get(&field).map(|b| b.len()).unwrap_or(0) as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn hkeys(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hkeys", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Array(v.as_hash()?.keys().cloned().map(Reply::Bulk).collect())),
        None => Ok(Reply::Array(Vec::new())),
    }
}

pub fn hvals(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hvals", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Array(v.as_hash()?.values().cloned().map(Reply::Bulk).collect())),
        None => Ok(Reply::Array(Vec::new())),
    }
}

pub fn hgetall(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hgetall", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Map(
            v.as_hash()?.iter().map(|(k, val)| (Reply::Bulk(k.clone()), Reply::Bulk(val.clone()))).collect(),
        )),
        None => Ok(Reply::Map(Vec::new())),
    }
}

pub fn hincrby(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hincrby", args);
    let key = r.next_bytes()?;
    let field = r.next_bytes()?;
    let delta = r.next_i64()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Hash(Default::default()))?;
    let h = v.as_hash_mut()?;
    let entry = h.entry(field).or_insert_with(|| Bytes::from_static(b"0"));
    let current = parse_i64(entry)?;
    let updated = current
        .checked_add(delta)
        .ok_or_else(|| ServerError::generic("increment or decrement would overflow"))?;
    *entry = Bytes::from(updated.to_string());
    Ok(Reply::Integer(updated))
}

pub fn hincrbyfloat(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hincrbyfloat", args);
    let key = r.next_bytes()?;
    let field = r.next_bytes()?;
    let delta = r.next_f64()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Hash(Default::default()))?;
    let h = v.as_hash_mut()?;
    let entry = h.entry(field).or_insert_with(|| Bytes::from_static(b"0"));
    let current = parse_f64(entry)?;
    let updated = current + delta;
    let rendered = format!("{updated}");
    *entry = Bytes::from(rendered.clone());
    Ok(Reply::Bulk(Bytes::from(rendered)))
}

pub fn hrandfield(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hrandfield", args);
    let key = r.next_bytes()?;
    let count = if r.is_empty() { None } else { Some(r.next_i64()?) };
    let with_values = r.eat_keyword("WITHVALUES");
    let mut db = ctx.db(c.db_index).lock();
    let hash = match db.get(&key) {
        Some(v) => v.as_hash()?.clone(),
        None => return Ok(if count.is_some() { Reply::Array(vec![]) } else { Reply::Nil }),
    };
    let fields: Vec<(Bytes, Bytes)> = hash.into_iter().collect();
    let mut rng = rand::thread_rng();
    match count {
        None => match fields.choose(&mut rng) {
            Some((f, _)) => Ok(Reply::Bulk(f.clone())),
            None => Ok(Reply::Nil),
        },
        Some(n) => {
            let chosen = pick(&fields, n, &mut rng);
            let mut out = Vec::new();
            for (f, v) in chosen {
                out.push(Reply::Bulk(f));
                if with_values {
                    out.push(Reply::Bulk(v));
                }
            }
            Ok(Reply::Array(out))
        }
    }
}

fn pick<T: Clone>(items: &[T], n: i64, rng: &mut impl rand::Rng) -> Vec<T> {
    if n >= 0 {
        let mut shuffled: Vec<T> = items.to_vec();
        shuffled.as_mut_slice().shuffle(rng);
        shuffled.into_iter().take(n as usize).collect()
    } else {
        let count = (-n) as usize;
        (0..count)
            .filter_map(|_| items.choose(rng).cloned())
            .collect()
    }
}

/// `HSCAN key cursor [MATCH pattern] [COUNT n] [NOVALUES]` — the in-memory
/// `HashMap` backing a hash is small enough that a single pass covers it
/// entirely, so every call returns cursor `"0"` (scan complete) rather than
/// implementing incremental bucket cursoring.
pub fn hscan(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("hscan", args);
    let key = r.next_bytes()?;
    let _cursor = r.next_bytes()?;
    let mut pattern: Option<Bytes> = None;
    let mut novalues = false;
    loop {
        if r.eat_keyword("MATCH") {
            pattern = Some(r.next_bytes()?);
        } else if r.eat_keyword("COUNT") {
            let _ = r.next_i64()?;
        } else if r.eat_keyword("NOVALUES") {
            novalues = true;
        } else {
            break;
        }
    }
    r.expect_end()?;

    let mut db = ctx.db(c.db_index).lock();
    let mut out = Vec::new();
    if let Some(v) = db.get(&key) {
        let h = v.as_hash()?;
        for (field, value) in h {
            if let Some(p) = &pattern {
                if !crate::util::glob::glob_match(p, field) {
                    continue;
                }
            }
            out.push(Reply::Bulk(field.clone()));
            if !novalues {
                out.push(Reply::Bulk(value.clone()));
            }
        }
    }
    Ok(Reply::Array(vec![Reply::Bulk(Bytes::from_static(b"0")), Reply::Array(out)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn ctx() -> ServerContext {
        ServerContext::new(Config::default())
    }
    fn client() -> Client {
        Client::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
    }
    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn hset_reports_new_fields_only() {
        let ctx = ctx();
        let mut c = client();
        let r1 = hset(&ctx, &mut c, &[b("h"), b("a"), b("1")]).unwrap();
        assert!(matches!(r1, Reply::Integer(1)));
        let r2 = hset(&ctx, &mut c, &[b("h"), b("a"), b("2")]).unwrap();
        assert!(matches!(r2, Reply::Integer(0)));
    }

    #[test]
    fn hdel_removes_key_when_empty() {
        let ctx = ctx();
        let mut c = client();
        hset(&ctx, &mut c, &[b("h"), b("a"), b("1")]).unwrap();
        hdel(&ctx, &mut c, &[b("h"), b("a")]).unwrap();
        let mut db = ctx.db(0).lock();
        assert!(!db.exists(b"h"));
    }
}
