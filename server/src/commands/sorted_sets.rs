//! `ZADD`/`ZRANGE` and the rest of the sorted-set command family, including
//! the cross-key `ZUNION`/`ZINTER`/`ZDIFF` operations and the blocking pop
//! variants.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::client::Client;
use crate::context::ServerContext;
use crate::db::sorted_set::{LexBound, SortedSet};
use crate::db::value::Value;
use crate::params::{parse_f64, ArgReader};
use crate::protocol::Reply;
use crate::router::BoxFuture;
use crate::util::error::ServerError;

use super::DispatchResult;

fn score_reply(score: f64) -> Reply {
    Reply::Double(score)
}

pub fn zadd(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zadd", args);
    let key = r.next_bytes()?;

    let mut nx = false;
    let mut xx = false;
    let mut gt = false;
    let mut lt = false;
    let mut ch = false;
    let mut incr = false;
    loop {
        if r.eat_keyword("NX") {
            nx = true;
        } else if r.eat_keyword("XX") {
            xx = true;
        } else if r.eat_keyword("GT") {
            gt = true;
        } else if r.eat_keyword("LT") {
            lt = true;
        } else if r.eat_keyword("CH") {
            ch = true;
        } else if r.eat_keyword("INCR") {
            incr = true;
        } else {
            break;
        }
    }
    if nx && (gt || lt) {
        return Err(ServerError::generic("GT, LT, and/or NX options at the same time are not compatible"));
    }
    if r.is_empty() || r.remaining() % 2 != 0 {
        return Err(ServerError::wrong_args("zadd"));
    }
    if incr && r.remaining() != 2 {
        return Err(ServerError::generic("INCR option supports a single increment-element pair"));
    }

    let mut pairs = Vec::with_capacity(r.remaining() / 2);
    while !r.is_empty() {
        let score = r.next_f64()?;
        let member = r.next_bytes()?;
        pairs.push((score, member));
    }

    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::SortedSet(SortedSet::new()))?;
    let z = v.as_zset_mut()?;

    let mut added = 0i64;
    let mut changed = 0i64;
    let mut last_score: Option<f64> = None;
    for (score, member) in pairs {
        let existing = z.score(&member);
        if nx && existing.is_some() {
            last_score = existing;
            continue;
        }
        if xx && existing.is_none() {
            continue;
        }
        let new_score = if incr {
            existing.unwrap_or(0.0) + score
        } else {
            score
        };
        if let Some(old) = existing {
            if (gt && new_score <= old) || (lt && new_score >= old) {
                last_score = Some(old);
                continue;
            }
            if new_score != old {
                changed += 1;
            }
        } else {
            added += 1;
            changed += 1;
        }
        z.insert(member, new_score);
        last_score = Some(new_score);
    }
    db.remove_if_empty(&key);
    drop(db);
    ctx.blocking.notify(&key, c.in_multi);

    if incr {
        Ok(last_score.map(score_reply).unwrap_or(Reply::Nil))
    } else {
        Ok(Reply::Integer(if ch { changed } else { added }))
    }
}

pub fn zcard(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zcard", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_zset()?.len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn zscore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zscore", args);
    let key = r.next_bytes()?;
    let member = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(v.as_zset()?.score(&member).map(score_reply).unwrap_or(Reply::Nil)),
        None => Ok(Reply::Nil),
    }
}

pub fn zmscore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zmscore", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("zmscore"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let z = match db.get(&key) {
        Some(v) => Some(v.as_zset()?.clone()),
        None => None,
    };
    let out = r
        .rest()
        .iter()
        .map(|m| z.as_ref().and_then(|z| z.score(m)).map(score_reply).unwrap_or(Reply::Nil))
        .collect();
    Ok(Reply::Array(out))
}

pub fn zincrby(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zincrby", args);
    let key = r.next_bytes()?;
    let delta = r.next_f64()?;
    let member = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::SortedSet(SortedSet::new()))?;
    let z = v.as_zset_mut()?;
    let new_score = z.score(&member).unwrap_or(0.0) + delta;
    if new_score.is_nan() {
        return Err(ServerError::generic("resulting score is not a number (NaN)"));
    }
    z.insert(member, new_score);
    drop(db);
    ctx.blocking.notify(&key, c.in_multi);
    Ok(score_reply(new_score))
}

pub fn zrank(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    rank_impl(ctx, c, args, false)
}

pub fn zrevrank(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    rank_impl(ctx, c, args, true)
}

fn rank_impl(ctx: &ServerContext, c: &mut Client, args: &[Bytes], reverse: bool) -> DispatchResult {
    let mut r = ArgReader::new("zrank", args);
    let key = r.next_bytes()?;
    let member = r.next_bytes()?;
    let with_score = r.eat_keyword("WITHSCORE");
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let z = match db.get(&key) {
        Some(v) => v.as_zset()?,
        None => return Ok(if with_score { Reply::Array(vec![]) } else { Reply::Nil }),
    };
    match z.rank(&member) {
        Some(rank) => {
            let rank = if reverse { z.len() - 1 - rank } else { rank };
            if with_score {
                let score = z.score(&member).unwrap();
                Ok(Reply::Array(vec![Reply::Integer(rank as i64), score_reply(score)]))
            } else {
                Ok(Reply::Integer(rank as i64))
            }
        }
        None => Ok(if with_score { Reply::Nil } else { Reply::Nil }),
    }
}

pub fn zcount(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zcount", args);
    let key = r.next_bytes()?;
    let (min, min_excl) = parse_score_bound(r.next()?)?;
    let (max, max_excl) = parse_score_bound(r.next()?)?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_zset()?.range_by_score(min, min_excl, max, max_excl).len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

/// Parses a `ZRANGEBYSCORE`-style score bound: a bare float, `+inf`/`-inf`,
/// or a `(`-prefixed exclusive float.
fn parse_score_bound(tok: &Bytes) -> Result<(f64, bool), ServerError> {
    if let Some(rest) = tok.strip_prefix(b"(") {
        Ok((parse_f64(rest)?, true))
    } else {
        Ok((parse_f64(tok)?, false))
    }
}

fn zset_range_reply(items: Vec<(Bytes, f64)>, with_scores: bool) -> Reply {
    if with_scores {
        let mut out = Vec::with_capacity(items.len() * 2);
        for (m, s) in items {
            out.push(Reply::Bulk(m));
            out.push(score_reply(s));
        }
        Reply::Array(out)
    } else {
        Reply::Array(items.into_iter().map(|(m, _)| Reply::Bulk(m)).collect())
    }
}

pub fn zrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zrange", args);
    let key = r.next_bytes()?;
    let min_tok = r.next_bytes()?;
    let max_tok = r.next_bytes()?;

    let mut by_score = false;
    let mut by_lex = false;
    let mut reverse = false;
    let mut with_scores = false;
    let mut limit: Option<(i64, i64)> = None;
    loop {
        if r.eat_keyword("BYSCORE") {
            by_score = true;
        } else if r.eat_keyword("BYLEX") {
            by_lex = true;
        } else if r.eat_keyword("REV") {
            reverse = true;
        } else if r.eat_keyword("WITHSCORES") {
            with_scores = true;
        } else if r.eat_keyword("LIMIT") {
            let off = r.next_i64()?;
            let cnt = r.next_i64()?;
            limit = Some((off, cnt));
        } else {
            break;
        }
    }
    r.expect_end()?;
    if limit.is_some() && !by_score && !by_lex {
        return Err(ServerError::syntax());
    }

    let mut db = ctx.db(c.db_index).lock();
    let z = match db.get(&key) {
        Some(v) => v.as_zset()?.clone(),
        None => return Ok(Reply::Array(Vec::new())),
    };
    drop(db);

    let items = range_generic(&z, &min_tok, &max_tok, by_score, by_lex, reverse, limit)?;
    Ok(zset_range_reply(items, with_scores))
}

pub fn zrevrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zrevrange", args);
    let key = r.next_bytes()?;
    let start = r.next_i64()?;
    let stop = r.next_i64()?;
    let with_scores = r.eat_keyword("WITHSCORES");
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let z = match db.get(&key) {
        Some(v) => v.as_zset()?.clone(),
        None => return Ok(Reply::Array(Vec::new())),
    };
    drop(db);
    let len = z.len() as i64;
    let (s, e) = normalize_rank_range(start, stop, len);
    let items = rank_range_reversed(&z, s, e);
    Ok(zset_range_reply(items, with_scores))
}

pub fn zrangebyscore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    score_range_cmd(ctx, c, args, false)
}

pub fn zrevrangebyscore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    score_range_cmd(ctx, c, args, true)
}

fn score_range_cmd(ctx: &ServerContext, c: &mut Client, args: &[Bytes], reverse: bool) -> DispatchResult {
    let mut r = ArgReader::new("zrangebyscore", args);
    let key = r.next_bytes()?;
    let first = r.next_bytes()?;
    let second = r.next_bytes()?;
    let (min_tok, max_tok) = if reverse { (second, first) } else { (first, second) };
    let mut with_scores = false;
    let mut limit = None;
    loop {
        if r.eat_keyword("WITHSCORES") {
            with_scores = true;
        } else if r.eat_keyword("LIMIT") {
            let off = r.next_i64()?;
            let cnt = r.next_i64()?;
            limit = Some((off, cnt));
        } else {
            break;
        }
    }
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let z = match db.get(&key) {
        Some(v) => v.as_zset()?.clone(),
        None => return Ok(Reply::Array(Vec::new())),
    };
    drop(db);
    let items = range_generic(&z, &min_tok, &max_tok, true, false, reverse, limit)?;
    Ok(zset_range_reply(items, with_scores))
}

pub fn zrangebylex(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    lex_range_cmd(ctx, c, args, false)
}

pub fn zrevrangebylex(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    lex_range_cmd(ctx, c, args, true)
}

fn lex_range_cmd(ctx: &ServerContext, c: &mut Client, args: &[Bytes], reverse: bool) -> DispatchResult {
    let mut r = ArgReader::new("zrangebylex", args);
    let key = r.next_bytes()?;
    let first = r.next_bytes()?;
    let second = r.next_bytes()?;
    let (min_tok, max_tok) = if reverse { (second, first) } else { (first, second) };
    let limit = if r.eat_keyword("LIMIT") {
        let off = r.next_i64()?;
        let cnt = r.next_i64()?;
        Some((off, cnt))
    } else {
        None
    };
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let z = match db.get(&key) {
        Some(v) => v.as_zset()?.clone(),
        None => return Ok(Reply::Array(Vec::new())),
    };
    drop(db);
    let items = range_generic(&z, &min_tok, &max_tok, false, true, reverse, limit)?;
    Ok(Reply::Array(items.into_iter().map(|(m, _)| Reply::Bulk(m)).collect()))
}

/// Shared range engine for `ZRANGE [BYSCORE|BYLEX] [REV] [LIMIT]` and the
/// dedicated `ZRANGEBYSCORE`/`ZRANGEBYLEX` commands: `min_tok`/`max_tok` are
/// always given in ascending (low, high) order regardless of `reverse`.
fn range_generic(
    z: &SortedSet,
    min_tok: &Bytes,
    max_tok: &Bytes,
    by_score: bool,
    by_lex: bool,
    reverse: bool,
    limit: Option<(i64, i64)>,
) -> Result<Vec<(Bytes, f64)>, ServerError> {
    let mut items = if by_score {
        let (min, min_excl) = parse_score_bound(min_tok)?;
        let (max, max_excl) = parse_score_bound(max_tok)?;
        z.range_by_score(min, min_excl, max, max_excl)
    } else if by_lex {
        let min = LexBound::parse(min_tok)?;
        let max = LexBound::parse(max_tok)?;
        z.range_by_lex(&min, &max).into_iter().map(|m| (m.clone(), z.score(&m).unwrap_or(0.0))).collect()
    } else {
        let start: i64 = std::str::from_utf8(min_tok).ok().and_then(|s| s.parse().ok()).ok_or_else(ServerError::not_an_integer)?;
        let stop: i64 = std::str::from_utf8(max_tok).ok().and_then(|s| s.parse().ok()).ok_or_else(ServerError::not_an_integer)?;
        let len = z.len() as i64;
        let (s, e) = normalize_rank_range(start, stop, len);
        z.range_by_rank(s, e)
    };
    if reverse {
        items.reverse();
    }
    if let Some((offset, count)) = limit {
        let offset = offset.max(0) as usize;
        items = items.into_iter().skip(offset).collect();
        if count >= 0 {
            items.truncate(count as usize);
        }
    }
    Ok(items)
}

fn normalize_rank_range(start: i64, stop: i64, len: i64) -> (usize, usize) {
    let mut s = if start < 0 { (len + start).max(0) } else { start };
    let mut e = if stop < 0 { len + stop } else { stop };
    if e >= len {
        e = len - 1;
    }
    if s > e || len == 0 {
        s = 1;
        e = 0;
    }
    (s.max(0) as usize, e.max(0) as usize)
}

fn rank_range_reversed(z: &SortedSet, start: usize, stop: usize) -> Vec<(Bytes, f64)> {
    let len = z.len();
    if start > stop || len == 0 {
        return Vec::new();
    }
    let lo = len.saturating_sub(stop + 1);
    let hi = len.saturating_sub(start + 1);
    let mut items = z.range_by_rank(lo, hi);
    items.reverse();
    items
}

pub fn zrangestore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("zrangestore", args);
    let dst = r.next_bytes()?;
    let rest: Vec<Bytes> = r.rest().to_vec();
    let reply = zrange(ctx, c, &rest)?;
    let items = match reply {
        Reply::Array(items) => items,
        _ => Vec::new(),
    };
    let mut db = ctx.db(c.db_index).lock();
    if items.is_empty() {
        db.remove(&dst);
        return Ok(Reply::Integer(0));
    }
    let mut z = SortedSet::new();
    // ZRANGE above doesn't return scores unless WITHSCORES was asked for, so
    // re-look the member scores up from the source key directly.
    let source_key = &rest[0];
    let source = match db.get(source_key) {
        Some(v) => v.as_zset()?.clone(),
        None => SortedSet::new(),
    };
    for item in items {
        if let Reply::Bulk(m) = item {
            if let Some(score) = source.score(&m) {
                z.insert(m, score);
            }
        }
    }
    let n = z.len();
    db.set(dst, Value::SortedSet(z));
    Ok(Reply::Integer(n as i64))
}

pub fn zpopmin(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    pop_extreme(ctx, c, args, false)
}

pub fn zpopmax(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    pop_extreme(ctx, c, args, true)
}

fn pop_extreme(ctx: &ServerContext, c: &mut Client, args: &[Bytes], max: bool) -> DispatchResult {
    let mut r = ArgReader::new("zpopmin", args);
    let key = r.next_bytes()?;
    let count = if r.is_empty() { 1 } else { r.next_i64()?.max(0) as usize };
    let mut db = ctx.db(c.db_index).lock();
    let v = match db.get_mut(&key) {
        Some(v) => v,
        None => return Ok(Reply::Array(Vec::new())),
    };
    let z = v.as_zset_mut()?;
    let take = count.min(z.len());
    let members: Vec<(Bytes, f64)> = if max {
        z.iter_ascending().rev().take(take).map(|(m, s)| (m.clone(), s)).collect()
    } else {
        z.iter_ascending().take(take).map(|(m, s)| (m.clone(), s)).collect()
    };
    for (m, _) in &members {
        z.remove(m);
    }
    db.remove_if_empty(&key);
    Ok(zset_range_reply(members, true))
}

fn load_zset(db: &mut crate::db::Guard<'_>, key: &Bytes) -> Result<HashMap<Bytes, f64>, ServerError> {
    match db.get(key) {
        Some(v) => Ok(v.as_zset()?.iter_ascending().map(|(m, s)| (m.clone(), s)).collect()),
        None => Ok(HashMap::new()),
    }
}

enum Aggregate {
    Sum,
    Min,
    Max,
}

fn aggregate(agg: &Aggregate, a: f64, b: f64) -> f64 {
    match agg {
        Aggregate::Sum => a + b,
        Aggregate::Min => a.min(b),
        Aggregate::Max => a.max(b),
    }
}

/// `numkeys key [key ...] [WEIGHTS w...] [AGGREGATE SUM|MIN|MAX]` — shared
/// by `ZUNION(STORE)`/`ZINTER(STORE)`/`ZDIFF(STORE)`/`ZINTERCARD`.
fn parse_numkeys_group(args: &[Bytes]) -> Result<(Vec<Bytes>, ArgReader<'_>), ServerError> {
    let numkeys: usize = std::str::from_utf8(args.first().map(|b| b.as_ref()).unwrap_or(b""))
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(ServerError::not_an_integer)?;
    if numkeys == 0 || args.len() < 1 + numkeys {
        return Err(ServerError::generic("at least 1 input key is needed"));
    }
    let keys = args[1..1 + numkeys].to_vec();
    let reader = ArgReader::new("zset-op", &args[1 + numkeys..]);
    Ok((keys, reader))
}

#[derive(Clone, Copy, PartialEq)]
enum SetOp {
    Union,
    Inter,
    Diff,
}

fn combine(
    db: &mut crate::db::Guard<'_>,
    keys: &[Bytes],
    mut r: ArgReader<'_>,
    op: SetOp,
) -> Result<(HashMap<Bytes, f64>, bool), ServerError> {
    let mut weights = vec![1.0; keys.len()];
    let mut agg = Aggregate::Sum;
    let mut with_scores = false;
    loop {
        if r.eat_keyword("WEIGHTS") {
            for w in weights.iter_mut() {
                *w = r.next_f64()?;
            }
        } else if r.eat_keyword("AGGREGATE") {
            if r.eat_keyword("SUM") {
                agg = Aggregate::Sum;
            } else if r.eat_keyword("MIN") {
                agg = Aggregate::Min;
            } else if r.eat_keyword("MAX") {
                agg = Aggregate::Max;
            } else {
                return Err(ServerError::syntax());
            }
        } else if r.eat_keyword("WITHSCORES") {
            with_scores = true;
        } else {
            break;
        }
    }
    r.expect_end()?;

    let mut acc: HashMap<Bytes, f64> = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        let weighted: HashMap<Bytes, f64> =
            load_zset(db, key)?.into_iter().map(|(m, s)| (m, s * weights[i])).collect();
        if i == 0 {
            acc = weighted;
        } else {
            acc = match op {
                SetOp::Union => union_op(&acc, weighted, &agg),
                SetOp::Inter => inter_op(&acc, weighted, &agg),
                SetOp::Diff => diff_op(&acc, weighted),
            };
        }
    }
    Ok((acc, with_scores))
}

fn union_op(a: &HashMap<Bytes, f64>, b: HashMap<Bytes, f64>, agg: &Aggregate) -> HashMap<Bytes, f64> {
    let mut out = a.clone();
    for (m, s) in b {
        out.entry(m).and_modify(|existing| *existing = aggregate(agg, *existing, s)).or_insert(s);
    }
    out
}

fn inter_op(a: &HashMap<Bytes, f64>, b: HashMap<Bytes, f64>, agg: &Aggregate) -> HashMap<Bytes, f64> {
    a.iter().filter_map(|(m, s)| b.get(m).map(|s2| (m.clone(), aggregate(agg, *s, *s2)))).collect()
}

fn diff_op(a: &HashMap<Bytes, f64>, b: HashMap<Bytes, f64>) -> HashMap<Bytes, f64> {
    a.iter().filter(|(m, _)| !b.contains_key(m.as_ref())).map(|(m, s)| (m.clone(), *s)).collect()
}

fn sorted_reply(map: HashMap<Bytes, f64>, with_scores: bool) -> Reply {
    let mut items: Vec<(Bytes, f64)> = map.into_iter().collect();
    items.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    zset_range_reply(items, with_scores)
}

pub fn zunion(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let (keys, r) = parse_numkeys_group(args)?;
    let mut db = ctx.db(c.db_index).lock();
    let (map, with_scores) = combine(&mut db, &keys, r, SetOp::Union)?;
    Ok(sorted_reply(map, with_scores))
}

pub fn zinter(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let (keys, r) = parse_numkeys_group(args)?;
    let mut db = ctx.db(c.db_index).lock();
    let (map, with_scores) = combine(&mut db, &keys, r, SetOp::Inter)?;
    Ok(sorted_reply(map, with_scores))
}

pub fn zdiff(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let (keys, r) = parse_numkeys_group(args)?;
    let mut db = ctx.db(c.db_index).lock();
    let (map, with_scores) = combine(&mut db, &keys, r, SetOp::Diff)?;
    Ok(sorted_reply(map, with_scores))
}

pub fn zintercard(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let (keys, mut r) = parse_numkeys_group(args)?;
    let limit = if r.eat_keyword("LIMIT") { Some(r.next_i64()?.max(0) as usize) } else { None };
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    let mut acc = load_zset(&mut db, &keys[0])?;
    for key in &keys[1..] {
        let other = load_zset(&mut db, key)?;
        acc.retain(|m, _| other.contains_key(m));
    }
    let n = limit.map(|l| acc.len().min(l)).unwrap_or(acc.len());
    Ok(Reply::Integer(n as i64))
}

fn store_zset(ctx: &ServerContext, c: &mut Client, dst: &Bytes, map: HashMap<Bytes, f64>) -> DispatchResult {
    let mut db = ctx.db(c.db_index).lock();
    let n = map.len();
    if map.is_empty() {
        db.remove(dst);
    } else {
        let mut z = SortedSet::new();
        for (m, s) in map {
            z.insert(m, s);
        }
        db.set(dst.clone(), Value::SortedSet(z));
    }
    Ok(Reply::Integer(n as i64))
}

pub fn zunionstore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let dst = args.first().cloned().ok_or_else(|| ServerError::wrong_args("zunionstore"))?;
    let (keys, r) = parse_numkeys_group(&args[1..])?;
    let mut db = ctx.db(c.db_index).lock();
    let (map, _) = combine(&mut db, &keys, r, SetOp::Union)?;
    drop(db);
    store_zset(ctx, c, &dst, map)
}

pub fn zinterstore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let dst = args.first().cloned().ok_or_else(|| ServerError::wrong_args("zinterstore"))?;
    let (keys, r) = parse_numkeys_group(&args[1..])?;
    let mut db = ctx.db(c.db_index).lock();
    let (map, _) = combine(&mut db, &keys, r, SetOp::Inter)?;
    drop(db);
    store_zset(ctx, c, &dst, map)
}

pub fn zdiffstore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let dst = args.first().cloned().ok_or_else(|| ServerError::wrong_args("zdiffstore"))?;
    let (keys, r) = parse_numkeys_group(&args[1..])?;
    let mut db = ctx.db(c.db_index).lock();
    let (map, _) = combine(&mut db, &keys, r, SetOp::Diff)?;
    drop(db);
    store_zset(ctx, c, &dst, map)
}

pub fn zmpop(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let numkeys: usize = std::str::from_utf8(args.first().map(|b| b.as_ref()).unwrap_or(b""))
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(ServerError::not_an_integer)?;
    if numkeys == 0 || args.len() < 1 + numkeys {
        return Err(ServerError::generic("at least 1 input key is needed"));
    }
    let keys = &args[1..1 + numkeys];
    let mut r = ArgReader::new("zmpop", &args[1 + numkeys..]);
    let max = if r.eat_keyword("MIN") {
        false
    } else if r.eat_keyword("MAX") {
        true
    } else {
        return Err(ServerError::syntax());
    };
    let count = if r.eat_keyword("COUNT") { r.next_i64()?.max(1) as usize } else { 1 };
    let mut db = ctx.db(c.db_index).lock();
    for key in keys {
        if let Some(v) = db.get_mut(key) {
            let z = v.as_zset_mut()?;
            if z.is_empty() {
                continue;
            }
            let take = count.min(z.len());
            let members: Vec<(Bytes, f64)> = if max {
                z.iter_ascending().rev().take(take).map(|(m, s)| (m.clone(), s)).collect()
            } else {
                z.iter_ascending().take(take).map(|(m, s)| (m.clone(), s)).collect()
            };
            for (m, _) in &members {
                z.remove(m);
            }
            db.remove_if_empty(key);
            let pairs = members
                .into_iter()
                .map(|(m, s)| Reply::Array(vec![Reply::Bulk(m), score_reply(s)]))
                .collect();
            return Ok(Reply::Array(vec![Reply::Bulk(key.clone()), Reply::Array(pairs)]));
        }
    }
    Ok(Reply::Nil)
}

/// Shared wait loop for `BZPOPMIN`/`BZPOPMAX`: identical structure to
/// `lists::blocking_pop`, specialized to the sorted-set extreme.
async fn blocking_pop_extreme(ctx: &ServerContext, c: &mut Client, keys: Vec<Bytes>, timeout_secs: f64, max: bool) -> DispatchResult {
    if timeout_secs < 0.0 {
        return Err(ServerError::generic("timeout is negative"));
    }
    loop {
        {
            let mut db = ctx.db(c.db_index).lock();
            for key in &keys {
                if let Some(v) = db.get_mut(key) {
                    let z = v.as_zset_mut()?;
                    if z.is_empty() {
                        continue;
                    }
                    let (m, s) = if max {
                        z.iter_ascending().next_back().map(|(m, s)| (m.clone(), s)).unwrap()
                    } else {
                        z.iter_ascending().next().map(|(m, s)| (m.clone(), s)).unwrap()
                    };
                    z.remove(&m);
                    db.remove_if_empty(key);
                    return Ok(Reply::Array(vec![Reply::Bulk(key.clone()), Reply::Bulk(m), score_reply(s)]));
                }
            }
        }
        if c.in_multi {
            return Ok(Reply::Nil);
        }
        let mut reg = ctx.blocking.register(&keys);
        c.blocked_on = Some(reg.waiter_id());
        ctx.set_blocked(c.id, c.blocked_on);
        let dur = if timeout_secs == 0.0 { None } else { Some(Duration::from_secs_f64(timeout_secs)) };
        let woke = reg.wait(dur).await;
        ctx.blocking.unregister(&reg);
        c.blocked_on = None;
        ctx.set_blocked(c.id, None);
        match woke {
            Ok(true) => continue,
            Ok(false) => return Ok(Reply::Nil),
            Err(e) => return Err(e),
        }
    }
}

pub fn bzpopmin<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move { bzpop_entry(ctx, c, args, false).await })
}

pub fn bzpopmax<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move { bzpop_entry(ctx, c, args, true).await })
}

async fn bzpop_entry(ctx: &ServerContext, c: &mut Client, args: &[Bytes], max: bool) -> DispatchResult {
    if args.len() < 2 {
        return Err(ServerError::wrong_args(if max { "bzpopmax" } else { "bzpopmin" }));
    }
    let (keys, timeout_arg) = args.split_at(args.len() - 1);
    let timeout_secs = crate::params::parse_f64(&timeout_arg[0])?;
    blocking_pop_extreme(ctx, c, keys.to_vec(), timeout_secs, max).await
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
    fn zadd_then_zrange_orders_by_score() {
        let ctx = ctx();
        let mut c = client();
        zadd(&ctx, &mut c, &[b("z"), b("1"), b("a"), b("2"), b("b"), b("3"), b("c")]).unwrap();
        let reply = zrangebyscore(&ctx, &mut c, &[b("z"), b("1"), b("2"), b("WITHSCORES")]).unwrap();
        match reply {
            Reply::Array(items) => assert_eq!(items.len(), 4),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn zrangebyscore_exclusive_lower_bound() {
        let ctx = ctx();
        let mut c = client();
        zadd(&ctx, &mut c, &[b("z"), b("1"), b("a"), b("2"), b("b"), b("3"), b("c")]).unwrap();
        let reply = zrangebyscore(&ctx, &mut c, &[b("z"), b("(1"), b("+inf")]).unwrap();
        match reply {
            Reply::Array(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn zadd_nx_skips_existing_member() {
        let ctx = ctx();
        let mut c = client();
        zadd(&ctx, &mut c, &[b("z"), b("1"), b("a")]).unwrap();
        zadd(&ctx, &mut c, &[b("z"), b("NX"), b("5"), b("a")]).unwrap();
        let reply = zscore(&ctx, &mut c, &[b("z"), b("a")]).unwrap();
        match reply {
            Reply::Double(s) => assert_eq!(s, 1.0),
            _ => panic!("expected double"),
        }
    }
}
