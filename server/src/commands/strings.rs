//! `GET`/`SET` and the rest of the string-valued command family.

use bytes::Bytes;

use crate::client::Client;
use crate::context::ServerContext;
use crate::db::value::Value;
use crate::params::{parse_f64, parse_i64, ArgReader};
use crate::protocol::Reply;
use crate::util::now_ms;

use super::DispatchResult;

pub fn get(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("get", args);
    let key = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Bulk(v.as_str()?.clone())),
        None => Ok(Reply::Nil),
    }
}

pub fn set(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("set", args);
    let key = r.next_bytes()?;
    let value = r.next_bytes()?;

    let mut nx = false;
    let mut xx = false;
    let mut get_old = false;
    let mut expire_at: Option<u64> = None;
    let mut keep_ttl = false;

    while !r.is_empty() {
        if r.eat_keyword("NX") {
            nx = true;
        } else if r.eat_keyword("XX") {
            xx = true;
        } else if r.eat_keyword("GET") {
            get_old = true;
        } else if r.eat_keyword("KEEPTTL") {
            keep_ttl = true;
        } else if r.eat_keyword("EX") {
            let secs = r.next_i64()?;
            expire_at = Some(now_ms() + (secs.max(0) as u64) * 1000);
        } else if r.eat_keyword("PX") {
            let ms = r.next_i64()?;
            expire_at = Some(now_ms() + ms.max(0) as u64);
        } else if r.eat_keyword("EXAT") {
            let secs = r.next_i64()?;
            expire_at = Some((secs.max(0) as u64) * 1000);
        } else if r.eat_keyword("PXAT") {
            let ms = r.next_i64()?;
            expire_at = Some(ms.max(0) as u64);
        } else {
            return Err(crate::util::error::ServerError::syntax());
        }
    }

    let mut db = ctx.db(c.db_index).lock();
    let existed = db.exists(&key);
    let old = if get_old {
        match db.get(&key) {
            Some(v) => Some(v.as_str()?.clone()),
            None => None,
        }
    } else {
        None
    };

    if (nx && existed) || (xx && !existed) {
        return Ok(if get_old {
            old.map(Reply::Bulk).unwrap_or(Reply::Nil)
        } else {
            Reply::Nil
        });
    }

    let prior_ttl = if keep_ttl { db.ttl_ms(&key).flatten() } else { None };
    db.set(key.clone(), Value::Str(value));
    if let Some(at) = expire_at {
        db.set_expiry(&key, Some(at));
    } else if keep_ttl {
        db.set_expiry(&key, prior_ttl);
    }

    if get_old {
        Ok(old.map(Reply::Bulk).unwrap_or(Reply::Nil))
    } else {
        Ok(Reply::ok())
    }
}

pub fn setnx(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("setnx", args);
    let key = r.next_bytes()?;
    let value = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    if db.exists(&key) {
        Ok(Reply::Integer(0))
    } else {
        db.set(key, Value::Str(value));
        Ok(Reply::Integer(1))
    }
}

pub fn setex(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    set_with_ttl(ctx, c, args, 1000)
}

pub fn psetex(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    set_with_ttl(ctx, c, args, 1)
}

fn set_with_ttl(ctx: &ServerContext, c: &mut Client, args: &[Bytes], unit_ms: u64) -> DispatchResult {
    let mut r = ArgReader::new("setex", args);
    let key = r.next_bytes()?;
    let ttl = r.next_i64()?;
    let value = r.next_bytes()?;
    r.expect_end()?;
    if ttl <= 0 {
        return Err(crate::util::error::ServerError::generic("invalid expire time in 'setex' command"));
    }
    let mut db = ctx.db(c.db_index).lock();
    db.set(key.clone(), Value::Str(value));
    db.set_expiry(&key, Some(now_ms() + ttl as u64 * unit_ms));
    Ok(Reply::ok())
}

pub fn getset(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("getset", args);
    let key = r.next_bytes()?;
    let value = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let old = match db.get(&key) {
        Some(v) => Some(v.as_str()?.clone()),
        None => None,
    };
    db.set(key, Value::Str(value));
    Ok(old.map(Reply::Bulk).unwrap_or(Reply::Nil))
}

pub fn getdel(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("getdel", args);
    let key = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => {
            let _ = v.as_str()?;
            let removed = db.remove(&key).unwrap();
            Ok(Reply::Bulk(removed.as_str().unwrap().clone()))
        }
        None => Ok(Reply::Nil),
    }
}

pub fn append(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("append", args);
    let key = r.next_bytes()?;
    let value = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Str(Bytes::new()))?;
    let s = v.as_str_mut()?;
    let mut buf = s.to_vec();
    buf.extend_from_slice(&value);
    *s = Bytes::from(buf);
    Ok(Reply::Integer(s.len() as i64))
}

pub fn strlen(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("strlen", args);
    let key = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_str()?.len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn getrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("getrange", args);
    let key = r.next_bytes()?;
    let start = r.next_i64()?;
    let end = r.next_i64()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let s = match db.get(&key) {
        Some(v) => v.as_str()?.clone(),
        None => return Ok(Reply::Bulk(Bytes::new())),
    };
    let (start, end) = normalize_range(start, end, s.len());
    if start > end || s.is_empty() {
        return Ok(Reply::Bulk(Bytes::new()));
    }
    Ok(Reply::Bulk(Bytes::copy_from_slice(&s[start..=end.min(s.len() - 1)])))
}

pub fn setrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("setrange", args);
    let key = r.next_bytes()?;
    let offset = r.next_i64()?;
    let value = r.next_bytes()?;
    r.expect_end()?;
    if offset < 0 {
        return Err(crate::util::error::ServerError::generic("offset is out of range"));
    }
    let offset = offset as usize;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Str(Bytes::new()))?;
    let s = v.as_str_mut()?;
    let mut buf = s.to_vec();
    if buf.len() < offset + value.len() {
        buf.resize(offset + value.len(), 0);
    }
    buf[offset..offset + value.len()].copy_from_slice(&value);
    *s = Bytes::from(buf);
    Ok(Reply::Integer(s.len() as i64))
}

fn normalize_range(start: i64, end: i64, len: usize) -> (usize, usize) {
    let len_i = len as i64;
    let mut s = if start < 0 { (len_i + start).max(0) } else { start };
    let mut e = if end < 0 { len_i + end } else { end };
    if e >= len_i {
        e = len_i - 1;
    }
    if s > e || len == 0 {
        s = 1;
        e = 0;
    }
    (s as usize, e.max(0) as usize)
}

pub fn mget(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut db = ctx.db(c.db_index).lock();
    let mut out = Vec::with_capacity(args.len());
    for key in args {
        let reply = match db.get(key) {
            Some(Value::Str(b)) => Reply::Bulk(b.clone()),
            _ => Reply::Nil,
        };
        out.push(reply);
    }
    Ok(Reply::Array(out))
}

pub fn mset(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(crate::util::error::ServerError::wrong_args("mset"));
    }
    let mut db = ctx.db(c.db_index).lock();
    for pair in args.chunks(2) {
        db.set(pair[0].clone(), Value::Str(pair[1].clone()));
    }
    Ok(Reply::ok())
}

pub fn msetnx(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(crate::util::error::ServerError::wrong_args("msetnx"));
    }
    let mut db = ctx.db(c.db_index).lock();
    if args.chunks(2).any(|pair| db.exists(&pair[0])) {
        return Ok(Reply::Integer(0));
    }
    for pair in args.chunks(2) {
        db.set(pair[0].clone(), Value::Str(pair[1].clone()));
    }
    Ok(Reply::Integer(1))
}

pub fn incr(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    incr_by(ctx, c, args, 1)
}

pub fn decr(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    incr_by(ctx, c, args, -1)
}

pub fn incrby(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("incrby", args);
    let key = r.next_bytes()?;
    let delta = r.next_i64()?;
    r.expect_end()?;
    apply_incr(ctx, c, &key, delta)
}

pub fn decrby(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("decrby", args);
    let key = r.next_bytes()?;
    let delta = r.next_i64()?;
    r.expect_end()?;
    apply_incr(ctx, c, &key, -delta)
}

fn incr_by(ctx: &ServerContext, c: &mut Client, args: &[Bytes], delta: i64) -> DispatchResult {
    let mut r = ArgReader::new("incr", args);
    let key = r.next_bytes()?;
    r.expect_end()?;
    apply_incr(ctx, c, &key, delta)
}

fn apply_incr(ctx: &ServerContext, c: &mut Client, key: &Bytes, delta: i64) -> DispatchResult {
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(key, || Value::Str(Bytes::from_static(b"0")))?;
    let s = v.as_str_mut()?;
    let current = parse_i64(s)?;
    let updated = current
        .checked_add(delta)
        .ok_or_else(|| crate::util::error::ServerError::generic("increment or decrement would overflow"))?;
    *s = Bytes::from(updated.to_string());
    Ok(Reply::Integer(updated))
}

pub fn incrbyfloat(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("incrbyfloat", args);
    let key = r.next_bytes()?;
    let delta = r.next_f64()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Str(Bytes::from_static(b"0")))?;
    let s = v.as_str_mut()?;
    let current = parse_f64(s)?;
    let updated = current + delta;
    let rendered = format!("{updated}");
    *s = Bytes::from(rendered.clone());
    Ok(Reply::Bulk(Bytes::from(rendered)))
}

pub fn getex(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("getex", args);
    let key = r.next_bytes()?;

    let mut persist = false;
    let mut expire_at: Option<Option<u64>> = None;
    if r.eat_keyword("EX") {
        let secs = r.next_i64()?;
        expire_at = Some(Some(now_ms() + (secs.max(0) as u64) * 1000));
    } else if r.eat_keyword("PX") {
        let ms = r.next_i64()?;
        expire_at = Some(Some(now_ms() + ms.max(0) as u64));
    } else if r.eat_keyword("EXAT") {
        let secs = r.next_i64()?;
        expire_at = Some(Some((secs.max(0) as u64) * 1000));
    } else if r.eat_keyword("PXAT") {
        let ms = r.next_i64()?;
        expire_at = Some(Some(ms.max(0) as u64));
    } else if r.eat_keyword("PERSIST") {
        persist = true;
    }
    r.expect_end()?;

    let mut db = ctx.db(c.db_index).lock();
    let value = match db.get(&key) {
        Some(v) => v.as_str()?.clone(),
        None => return Ok(Reply::Nil),
    };
    if persist {
        db.set_expiry(&key, None);
    } else if let Some(at) = expire_at {
        db.set_expiry(&key, at);
    }
    Ok(Reply::Bulk(value))
}

/// Longest common subsequence between two string keys, `LCS`-style: plain
/// O(n*m) dynamic programming table, same algorithm real clients expect,
/// with `LEN`/`IDX [MINMATCHLEN n] [WITHMATCHLEN]` result shaping.
pub fn lcs(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lcs", args);
    let key1 = r.next_bytes()?;
    let key2 = r.next_bytes()?;
    let mut want_len = false;
    let mut want_idx = false;
    let mut min_match_len = 0usize;
    let mut with_match_len = false;
    loop {
        if r.eat_keyword("LEN") {
            want_len = true;
        } else if r.eat_keyword("IDX") {
            want_idx = true;
        } else if r.eat_keyword("MINMATCHLEN") {
            min_match_len = r.next_i64()?.max(0) as usize;
        } else if r.eat_keyword("WITHMATCHLEN") {
            with_match_len = true;
        } else {
            break;
        }
    }
    r.expect_end()?;
    if want_len && want_idx {
        return Err(crate::util::error::ServerError::generic("If you want both the length and indexes, please just use IDX."));
    }

    let mut db = ctx.db(c.db_index).lock();
    let a = match db.get(&key1) {
        Some(v) => v.as_str()?.clone(),
        None => Bytes::new(),
    };
    let b = match db.get(&key2) {
        Some(v) => v.as_str()?.clone(),
        None => Bytes::new(),
    };
    drop(db);

    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    let lcs_len = dp[n][m] as i64;

    if want_len {
        return Ok(Reply::Integer(lcs_len));
    }

    // Walk back through the table to recover the subsequence, and (for IDX)
    // the maximal contiguous matching ranges in each string.
    let mut seq = Vec::new();
    // (a_start, a_end, b_start, b_end) tuples, one per maximal contiguous
    // match, discovered back-to-front during the table walk-back.
    let mut ranges: Vec<(usize, usize, usize, usize)> = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            seq.push(a[i - 1]);
            if let Some(last) = ranges.last_mut() {
                if last.0 == i && last.2 == j {
                    last.0 = i - 1;
                    last.2 = j - 1;
                    i -= 1;
                    j -= 1;
                    continue;
                }
            }
            ranges.push((i - 1, i - 1, j - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    seq.reverse();

    if !want_idx {
        return Ok(Reply::Bulk(Bytes::from(seq)));
    }

    let matches: Vec<Reply> = ranges
        .into_iter()
        .filter(|(a_start, a_end, _, _)| (a_end - a_start + 1) >= min_match_len)
        .map(|(a_start, a_end, b_start, b_end)| {
            let mut parts = vec![
                Reply::Array(vec![Reply::Integer(a_start as i64), Reply::Integer(a_end as i64)]),
                Reply::Array(vec![Reply::Integer(b_start as i64), Reply::Integer(b_end as i64)]),
            ];
            if with_match_len {
                parts.push(Reply::Integer((a_end - a_start + 1) as i64));
            }
            Reply::Array(parts)
        })
        .collect();

    Ok(Reply::Map(vec![
        (Reply::bulk_str("matches"), Reply::Array(matches)),
        (Reply::bulk_str("len"), Reply::Integer(lcs_len)),
    ]))
}

fn bit_offset(n: i64) -> Result<usize, crate::util::error::ServerError> {
    if n < 0 {
        return Err(crate::util::error::ServerError::generic("bit offset is not an integer or out of range"));
    }
    Ok(n as usize)
}

pub fn setbit(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("setbit", args);
    let key = r.next_bytes()?;
    let offset = bit_offset(r.next_i64()?)?;
    let bit = r.next_i64()?;
    r.expect_end()?;
    if bit != 0 && bit != 1 {
        return Err(crate::util::error::ServerError::generic("bit is not an integer or out of range"));
    }
    let byte_idx = offset / 8;
    let bit_idx = 7 - (offset % 8);

    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Str(Bytes::new()))?;
    let s = v.as_str_mut()?;
    let mut buf = s.to_vec();
    if buf.len() <= byte_idx {
        buf.resize(byte_idx + 1, 0);
    }
    let old = (buf[byte_idx] >> bit_idx) & 1;
    if bit == 1 {
        buf[byte_idx] |= 1 << bit_idx;
    } else {
        buf[byte_idx] &= !(1 << bit_idx);
    }
    *s = Bytes::from(buf);
    Ok(Reply::Integer(old as i64))
}

pub fn getbit(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("getbit", args);
    let key = r.next_bytes()?;
    let offset = bit_offset(r.next_i64()?)?;
    r.expect_end()?;
    let byte_idx = offset / 8;
    let bit_idx = 7 - (offset % 8);
    let mut db = ctx.db(c.db_index).lock();
    let bit = match db.get(&key) {
        Some(v) => {
            let s = v.as_str()?;
            if byte_idx < s.len() {
                (s[byte_idx] >> bit_idx) & 1
            } else {
                0
            }
        }
        None => 0,
    };
    Ok(Reply::Integer(bit as i64))
}

pub fn bitcount(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("bitcount", args);
    let key = r.next_bytes()?;
    let range = if !r.is_empty() {
        let start = r.next_i64()?;
        let end = r.next_i64()?;
        let bit_mode = r.eat_keyword("BIT");
        let _ = r.eat_keyword("BYTE");
        r.expect_end()?;
        Some((start, end, bit_mode))
    } else {
        None
    };

    let mut db = ctx.db(c.db_index).lock();
    let s = match db.get(&key) {
        Some(v) => v.as_str()?.clone(),
        None => return Ok(Reply::Integer(0)),
    };

    let count = match range {
        None => s.iter().map(|b| b.count_ones()).sum::<u32>() as i64,
        Some((start, end, true)) => {
            let total_bits = s.len() * 8;
            let (bit_start, bit_end) = normalize_range(start, end, total_bits);
            if bit_start > bit_end || total_bits == 0 {
                0
            } else {
                (bit_start..=bit_end.min(total_bits - 1))
                    .filter(|bit| {
                        let byte = bit / 8;
                        let idx = 7 - (bit % 8);
                        (s[byte] >> idx) & 1 == 1
                    })
                    .count() as i64
            }
        }
        Some((start, end, false)) => {
            let (s2, e2) = normalize_range(start, end, s.len());
            if s2 > e2 || s.is_empty() {
                0
            } else {
                s[s2..=e2.min(s.len() - 1)].iter().map(|b| b.count_ones()).sum::<u32>() as i64
            }
        }
    };
    Ok(Reply::Integer(count))
}

/// `BITOP op destkey key [key ...]`: every key but the leading operation token.
pub fn bitop_keys(args: &[Bytes]) -> Vec<Bytes> {
    args.iter().skip(1).cloned().collect()
}

pub fn bitop(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("bitop", args);
    let op = r.next_string()?.to_ascii_uppercase();
    let dest = r.next_bytes()?;
    if r.is_empty() {
        return Err(crate::util::error::ServerError::wrong_args("bitop"));
    }
    let sources: Vec<Bytes> = r.rest().to_vec();

    let mut db = ctx.db(c.db_index).lock();
    let mut strs: Vec<Bytes> = Vec::with_capacity(sources.len());
    for k in &sources {
        let s = match db.get(k) {
            Some(v) => v.as_str()?.clone(),
            None => Bytes::new(),
        };
        strs.push(s);
    }

    if op == "NOT" {
        if strs.len() != 1 {
            return Err(crate::util::error::ServerError::generic("BITOP NOT must be called with a single source key."));
        }
        let out: Vec<u8> = strs[0].iter().map(|b| !b).collect();
        let len = out.len();
        db.set(dest, Value::Str(Bytes::from(out)));
        return Ok(Reply::Integer(len as i64));
    }

    let maxlen = strs.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![0u8; maxlen];
    for (i, byte) in out.iter_mut().enumerate() {
        let mut acc: Option<u8> = None;
        for s in &strs {
            let b = s.get(i).copied().unwrap_or(0);
            acc = Some(match acc {
                None => b,
                Some(prev) => match op.as_str() {
                    "AND" => prev & b,
                    "OR" => prev | b,
                    "XOR" => prev ^ b,
                    _ => return Err(crate::util::error::ServerError::syntax()),
                },
            });
        }
        *byte = acc.unwrap_or(0);
    }
    let len = out.len();
    db.set(dest, Value::Str(Bytes::from(out)));
    Ok(Reply::Integer(len as i64))
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
    fn set_then_get_roundtrips() {
        let ctx = ctx();
        let mut c = client();
        set(&ctx, &mut c, &[b("k"), b("v")]).unwrap();
        let reply = get(&ctx, &mut c, &[b("k")]).unwrap();
        match reply {
            Reply::Bulk(v) => assert_eq!(v, b("v")),
            _ => panic!("expected bulk reply"),
        }
    }

    #[test]
    fn set_nx_refuses_existing_key() {
        let ctx = ctx();
        let mut c = client();
        set(&ctx, &mut c, &[b("k"), b("v")]).unwrap();
        let reply = set(&ctx, &mut c, &[b("k"), b("v2"), b("NX")]).unwrap();
        assert!(matches!(reply, Reply::Nil));
    }

    #[test]
    fn incr_on_missing_key_starts_at_delta() {
        let ctx = ctx();
        let mut c = client();
        let reply = incr(&ctx, &mut c, &[b("counter")]).unwrap();
        assert!(matches!(reply, Reply::Integer(1)));
    }

    #[test]
    fn getrange_handles_negative_indices() {
        let ctx = ctx();
        let mut c = client();
        set(&ctx, &mut c, &[b("k"), b("Hello World")]).unwrap();
        let reply = getrange(&ctx, &mut c, &[b("k"), b("-5"), b("-1")]).unwrap();
        match reply {
            Reply::Bulk(v) => assert_eq!(v, b("World")),
            _ => panic!("expected bulk reply"),
        }
    }
}
