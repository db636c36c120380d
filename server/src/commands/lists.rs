//! `LPUSH`/`RPUSH` and the rest of the list-valued command family,
//! including the blocking pop/move variants.

use std::time::Duration;

use bytes::Bytes;

use crate::client::Client;
use crate::context::ServerContext;
use crate::db::value::Value;
use crate::params::ArgReader;
use crate::protocol::Reply;
use crate::router::BoxFuture;
use crate::util::error::ServerError;

use super::{first_two_args_keys, DispatchResult};

pub fn lpush(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    push(ctx, c, args, true, false)
}

pub fn rpush(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    push(ctx, c, args, false, false)
}

pub fn lpushx(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    push(ctx, c, args, true, true)
}

pub fn rpushx(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    push(ctx, c, args, false, true)
}

fn push(ctx: &ServerContext, c: &mut Client, args: &[Bytes], left: bool, only_if_exists: bool) -> DispatchResult {
    let mut r = ArgReader::new("lpush", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("lpush"));
    }
    let mut db = ctx.db(c.db_index).lock();
    if only_if_exists && !db.exists(&key) {
        return Ok(Reply::Integer(0));
    }
    let v = db.get_or_create(&key, || Value::List(Default::default()))?;
    let list = v.as_list_mut()?;
    while !r.is_empty() {
        let item = r.next_bytes()?;
        if left {
            list.push_front(item);
        } else {
            list.push_back(item);
        }
    }
    let len = list.len() as i64;
    drop(db);
    ctx.blocking.notify(&key, c.in_multi);
    Ok(Reply::Integer(len))
}

pub fn llen(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("llen", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_list()?.len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len_i = len as i64;
    let idx = if i < 0 { len_i + i } else { i };
    if idx < 0 || idx >= len_i {
        None
    } else {
        Some(idx as usize)
    }
}

pub fn lindex(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lindex", args);
    let key = r.next_bytes()?;
    let idx = r.next_i64()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => {
            let list = v.as_list()?;
            match normalize_index(idx, list.len()) {
                Some(i) => Ok(Reply::Bulk(list[i].clone())),
                None => Ok(Reply::Nil),
            }
        }
        None => Ok(Reply::Nil),
    }
}

pub fn lset(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lset", args);
    let key = r.next_bytes()?;
    let idx = r.next_i64()?;
    let value = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_mut(&key).ok_or_else(ServerError::no_such_key)?;
    let list = v.as_list_mut()?;
    let len = list.len();
    match normalize_index(idx, len) {
        Some(i) => {
            list[i] = value;
            Ok(Reply::ok())
        }
        None => Err(ServerError::generic("index out of range")),
    }
}

pub fn lrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lrange", args);
    let key = r.next_bytes()?;
    let start = r.next_i64()?;
    let stop = r.next_i64()?;
    let mut db = ctx.db(c.db_index).lock();
    let list = match db.get(&key) {
        Some(v) => v.as_list()?,
        None => return Ok(Reply::Array(Vec::new())),
    };
    let len = list.len() as i64;
    let mut s = if start < 0 { (len + start).max(0) } else { start };
    let mut e = if stop < 0 { len + stop } else { stop };
    if e >= len {
        e = len - 1;
    }
    if s > e || len == 0 {
        return Ok(Reply::Array(Vec::new()));
    }
    s = s.max(0);
    let items = list.iter().skip(s as usize).take((e - s + 1) as usize).cloned().map(Reply::Bulk).collect();
    Ok(Reply::Array(items))
}

pub fn ltrim(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("ltrim", args);
    let key = r.next_bytes()?;
    let start = r.next_i64()?;
    let stop = r.next_i64()?;
    let mut db = ctx.db(c.db_index).lock();
    if let Some(v) = db.get_mut(&key) {
        let list = v.as_list_mut()?;
        let len = list.len() as i64;
        let mut s = if start < 0 { (len + start).max(0) } else { start };
        let mut e = if stop < 0 { len + stop } else { stop };
        if e >= len {
            e = len - 1;
        }
        if s > e || len == 0 {
            list.clear();
        } else {
            s = s.max(0);
            let kept: std::collections::VecDeque<Bytes> =
                list.iter().skip(s as usize).take((e - s + 1) as usize).cloned().collect();
            *list = kept;
        }
    }
    db.remove_if_empty(&key);
    Ok(Reply::ok())
}

pub fn lrem(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lrem", args);
    let key = r.next_bytes()?;
    let count = r.next_i64()?;
    let value = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let removed = if let Some(v) = db.get_mut(&key) {
        let list = v.as_list_mut()?;
        remove_matching(list, count, &value)
    } else {
        0
    };
    db.remove_if_empty(&key);
    Ok(Reply::Integer(removed))
}

fn remove_matching(list: &mut std::collections::VecDeque<Bytes>, count: i64, value: &Bytes) -> i64 {
    let mut removed = 0i64;
    if count >= 0 {
        let limit = if count == 0 { usize::MAX } else { count as usize };
        let mut kept = std::collections::VecDeque::with_capacity(list.len());
        for item in list.drain(..) {
            if (removed as usize) < limit && &item == value {
                removed += 1;
            } else {
                kept.push_back(item);
            }
        }
        *list = kept;
    } else {
        let limit = (-count) as usize;
        let mut kept: Vec<Bytes> = Vec::with_capacity(list.len());
        for item in list.drain(..).rev() {
            if (removed as usize) < limit && &item == value {
                removed += 1;
            } else {
                kept.push(item);
            }
        }
        kept.reverse();
        *list = kept.into();
    }
    removed
}

pub fn linsert(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("linsert", args);
    let key = r.next_bytes()?;
    let before = if r.eat_keyword("BEFORE") {
        true
    } else if r.eat_keyword("AFTER") {
        false
    } else {
        return Err(ServerError::syntax());
    };
    let pivot = r.next_bytes()?;
    let value = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = match db.get_mut(&key) {
        Some(v) => v,
        None => return Ok(Reply::Integer(0)),
    };
    let list = v.as_list_mut()?;
    match list.iter().position(|x| x == &pivot) {
        Some(pos) => {
            let insert_at = if before { pos } else { pos + 1 };
            list.insert(insert_at, value);
            Ok(Reply::Integer(list.len() as i64))
        }
        None => Ok(Reply::Integer(-1)),
    }
}

pub fn lpos(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lpos", args);
    let key = r.next_bytes()?;
    let element = r.next_bytes()?;
    let mut rank = 1i64;
    let mut count: Option<i64> = None;
    while !r.is_empty() {
        if r.eat_keyword("RANK") {
            rank = r.next_i64()?;
            if rank == 0 {
                return Err(ServerError::generic("RANK can't be zero"));
            }
        } else if r.eat_keyword("COUNT") {
            count = Some(r.next_i64()?);
        } else if r.eat_keyword("MAXLEN") {
            let _ = r.next_i64()?;
        } else {
            return Err(ServerError::syntax());
        }
    }
    let mut db = ctx.db(c.db_index).lock();
    let list = match db.get(&key) {
        Some(v) => v.as_list()?,
        None => return Ok(if count.is_some() { Reply::Array(vec![]) } else { Reply::Nil }),
    };
    let want = count.unwrap_or(1).max(0) as usize;
    let unlimited = count == Some(0);
    let mut found = Vec::new();
    if rank > 0 {
        let mut skip = rank - 1;
        for (i, item) in list.iter().enumerate() {
            if item == &element {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
                found.push(i as i64);
                if !unlimited && found.len() >= want.max(1) {
                    break;
                }
            }
        }
    } else {
        let mut skip = -rank - 1;
        for (i, item) in list.iter().enumerate().rev() {
            if item == &element {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
                found.push(i as i64);
                if !unlimited && found.len() >= want.max(1) {
                    break;
                }
            }
        }
    }
    if count.is_some() {
        Ok(Reply::Array(found.into_iter().map(Reply::Integer).collect()))
    } else {
        Ok(found.first().copied().map(Reply::Integer).unwrap_or(Reply::Nil))
    }
}

pub fn lpop(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    pop(ctx, c, args, true)
}

pub fn rpop(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    pop(ctx, c, args, false)
}

fn pop(ctx: &ServerContext, c: &mut Client, args: &[Bytes], left: bool) -> DispatchResult {
    let mut r = ArgReader::new("lpop", args);
    let key = r.next_bytes()?;
    let count = if r.is_empty() { None } else { Some(r.next_i64()?.max(0) as usize) };
    let mut db = ctx.db(c.db_index).lock();
    let v = match db.get_mut(&key) {
        Some(v) => v,
        None => return Ok(if count.is_some() { Reply::Nil } else { Reply::Nil }),
    };
    let list = v.as_list_mut()?;
    let n = count.unwrap_or(1).min(list.len());
    let mut popped = Vec::with_capacity(n);
    for _ in 0..n {
        let item = if left { list.pop_front() } else { list.pop_back() };
        match item {
            Some(b) => popped.push(b),
            None => break,
        }
    }
    db.remove_if_empty(&key);
    match count {
        None => Ok(popped.into_iter().next().map(Reply::Bulk).unwrap_or(Reply::Nil)),
        Some(_) => {
            if popped.is_empty() {
                Ok(Reply::Nil)
            } else {
                Ok(Reply::Array(popped.into_iter().map(Reply::Bulk).collect()))
            }
        }
    }
}

pub fn rpoplpush(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("rpoplpush", args);
    let src = r.next_bytes()?;
    let dst = r.next_bytes()?;
    move_one(ctx, c, &src, &dst, false, true)
}

pub fn lmove(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("lmove", args);
    let src = r.next_bytes()?;
    let dst = r.next_bytes()?;
    let from_left = if r.eat_keyword("LEFT") {
        true
    } else if r.eat_keyword("RIGHT") {
        false
    } else {
        return Err(ServerError::syntax());
    };
    let to_left = if r.eat_keyword("LEFT") {
        true
    } else if r.eat_keyword("RIGHT") {
        false
    } else {
        return Err(ServerError::syntax());
    };
    move_one(ctx, c, &src, &dst, from_left, to_left)
}

fn move_one(ctx: &ServerContext, c: &mut Client, src: &Bytes, dst: &Bytes, from_left: bool, to_left: bool) -> DispatchResult {
    let mut db = ctx.db(c.db_index).lock();
    let item = match db.get_mut(src) {
        Some(v) => {
            let list = v.as_list_mut()?;
            let item = if from_left { list.pop_front() } else { list.pop_back() };
            match item {
                Some(i) => i,
                None => return Ok(Reply::Nil),
            }
        }
        None => return Ok(Reply::Nil),
    };
    db.remove_if_empty(src);
    let dv = db.get_or_create(dst, || Value::List(Default::default()))?;
    let dl = dv.as_list_mut()?;
    if to_left {
        dl.push_front(item.clone());
    } else {
        dl.push_back(item.clone());
    }
    drop(db);
    ctx.blocking.notify(dst, c.in_multi);
    Ok(Reply::Bulk(item))
}

fn pop_side(args: &mut ArgReader) -> Result<bool, ServerError> {
    if args.eat_keyword("LEFT") {
        Ok(true)
    } else if args.eat_keyword("RIGHT") {
        Ok(false)
    } else {
        Err(ServerError::syntax())
    }
}

/// Shared implementation for `BLPOP`/`BRPOP`: wait until any of `keys` has
/// an element, popping from the first one that does, FIFO across waiters
/// per key (registration order in [`crate::blocking::BlockingManager`]).
async fn blocking_pop(ctx: &ServerContext, c: &mut Client, keys: Vec<Bytes>, timeout_secs: f64, left: bool) -> DispatchResult {
    if timeout_secs < 0.0 {
        return Err(ServerError::generic("timeout is negative"));
    }
    loop {
        {
            let mut db = ctx.db(c.db_index).lock();
            for key in &keys {
                if let Some(v) = db.get_mut(key) {
                    let list = v.as_list_mut()?;
                    let item = if left { list.pop_front() } else { list.pop_back() };
                    if let Some(item) = item {
                        db.remove_if_empty(key);
                        return Ok(Reply::Array(vec![Reply::Bulk(key.clone()), Reply::Bulk(item)]));
                    }
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

pub fn blpop<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move { blocking_pop_entry(ctx, c, args, true).await })
}

pub fn brpop<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move { blocking_pop_entry(ctx, c, args, false).await })
}

async fn blocking_pop_entry(ctx: &ServerContext, c: &mut Client, args: &[Bytes], left: bool) -> DispatchResult {
    if args.len() < 2 {
        return Err(ServerError::wrong_args(if left { "blpop" } else { "brpop" }));
    }
    let (keys, timeout_arg) = args.split_at(args.len() - 1);
    let timeout_secs = crate::params::parse_f64(&timeout_arg[0])?;
    blocking_pop(ctx, c, keys.to_vec(), timeout_secs, left).await
}

pub fn blmove<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move {
        let mut r = ArgReader::new("blmove", args);
        let src = r.next_bytes()?;
        let dst = r.next_bytes()?;
        let from_left = pop_side(&mut r)?;
        let to_left = pop_side(&mut r)?;
        let timeout_secs = r.next_f64()?;
        if timeout_secs < 0.0 {
            return Err(ServerError::generic("timeout is negative"));
        }
        loop {
            let result = move_one(ctx, c, &src, &dst, from_left, to_left)?;
            if !matches!(result, Reply::Nil) {
                return Ok(result);
            }
            if c.in_multi {
                return Ok(Reply::Nil);
            }
            let mut reg = ctx.blocking.register(std::slice::from_ref(&src));
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
    })
}

pub fn brpoplpush<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move {
        let mut r = ArgReader::new("brpoplpush", args);
        let src = r.next_bytes()?;
        let dst = r.next_bytes()?;
        let timeout_secs = r.next_f64()?;
        loop {
            let result = move_one(ctx, c, &src, &dst, false, true)?;
            if !matches!(result, Reply::Nil) {
                return Ok(result);
            }
            if c.in_multi {
                return Ok(Reply::Nil);
            }
            let mut reg = ctx.blocking.register(std::slice::from_ref(&src));
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
    })
}

pub fn lmpop_keys(args: &[Bytes]) -> Vec<Bytes> {
    // numkeys key [key ...] LEFT|RIGHT [COUNT count]
    let numkeys: usize = std::str::from_utf8(args.first().map(|b| b.as_ref()).unwrap_or(b"0"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    args.iter().skip(1).take(numkeys).cloned().collect()
}

/// Shared non-blocking body for `LMPOP`/`BLMPOP`: pops up to `count`
/// elements from the first of `keys` that is a non-empty list, or returns
/// `None` if none of them currently have anything to pop.
fn lmpop_once(ctx: &ServerContext, c: &mut Client, keys: &[Bytes], left: bool, count: usize) -> Result<Option<Reply>, ServerError> {
    let mut db = ctx.db(c.db_index).lock();
    for key in keys {
        if let Some(v) = db.get_mut(key) {
            let list = v.as_list_mut()?;
            if list.is_empty() {
                continue;
            }
            let n = count.min(list.len());
            let mut popped = Vec::with_capacity(n);
            for _ in 0..n {
                let item = if left { list.pop_front() } else { list.pop_back() };
                if let Some(item) = item {
                    popped.push(Reply::Bulk(item));
                }
            }
            db.remove_if_empty(key);
            return Ok(Some(Reply::Array(vec![Reply::Bulk(key.clone()), Reply::Array(popped)])));
        }
    }
    Ok(None)
}

pub fn lmpop(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let keys = lmpop_keys(args);
    let mut r = ArgReader::new("lmpop", &args[1 + keys.len()..]);
    let left = pop_side(&mut r)?;
    let count = if r.eat_keyword("COUNT") { r.next_i64()?.max(1) as usize } else { 1 };
    Ok(lmpop_once(ctx, c, &keys, left, count)?.unwrap_or(Reply::Nil))
}

/// Key extractor for `BLMPOP timeout numkeys key [key ...] LEFT|RIGHT
/// [COUNT count]` — like [`lmpop_keys`] but skipping the leading timeout.
pub fn blmpop_keys(args: &[Bytes]) -> Vec<Bytes> {
    let numkeys: usize = args
        .get(1)
        .and_then(|b| std::str::from_utf8(b).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    args.iter().skip(2).take(numkeys).cloned().collect()
}

pub fn blmpop<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move {
        let mut r = ArgReader::new("blmpop", args);
        let timeout_secs = r.next_f64()?;
        if timeout_secs < 0.0 {
            return Err(ServerError::generic("timeout is negative"));
        }
        let numkeys = r.next_i64()?;
        if numkeys <= 0 {
            return Err(ServerError::generic("numkeys should be greater than 0"));
        }
        let mut keys = Vec::with_capacity(numkeys as usize);
        for _ in 0..numkeys {
            keys.push(r.next_bytes()?);
        }
        let left = pop_side(&mut r)?;
        let count = if r.eat_keyword("COUNT") { r.next_i64()?.max(1) as usize } else { 1 };
        r.expect_end()?;

        loop {
            if let Some(reply) = lmpop_once(ctx, c, &keys, left, count)? {
                return Ok(reply);
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
    })
}

pub use first_two_args_keys as lmove_keys;

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
    fn lpush_then_lrange_preserves_order() {
        let ctx = ctx();
        let mut c = client();
        lpush(&ctx, &mut c, &[b("k"), b("a"), b("b")]).unwrap();
        let reply = lrange(&ctx, &mut c, &[b("k"), b("0"), b("-1")]).unwrap();
        match reply {
            Reply::Array(items) => {
                assert_eq!(items.len(), 2);
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn lrem_positive_count_removes_from_head() {
        let ctx = ctx();
        let mut c = client();
        rpush(&ctx, &mut c, &[b("k"), b("a"), b("a"), b("b"), b("a")]).unwrap();
        let reply = lrem(&ctx, &mut c, &[b("k"), b("2"), b("a")]).unwrap();
        assert!(matches!(reply, Reply::Integer(2)));
    }

    #[test]
    fn lpop_on_missing_key_is_nil() {
        let ctx = ctx();
        let mut c = client();
        let reply = lpop(&ctx, &mut c, &[b("missing")]).unwrap();
        assert!(matches!(reply, Reply::Nil));
    }

    #[test]
    fn blmpop_keys_skips_timeout_and_numkeys() {
        let args = [b("0"), b("2"), b("k1"), b("k2"), b("LEFT")];
        assert_eq!(blmpop_keys(&args), vec![b("k1"), b("k2")]);
    }

    #[tokio::test]
    async fn blmpop_returns_immediately_when_a_key_is_ready() {
        let ctx = ctx();
        let mut c = client();
        rpush(&ctx, &mut c, &[b("k2"), b("a"), b("b")]).unwrap();
        let reply = blmpop(&ctx, &mut c, &[b("0"), b("2"), b("k1"), b("k2"), b("LEFT")]).await.unwrap();
        match reply {
            Reply::Array(items) => match &items[0] {
                Reply::Bulk(key) => assert_eq!(key, &b("k2")),
                _ => panic!("expected the winning key as the first element"),
            },
            _ => panic!("expected array"),
        }
    }

    #[tokio::test]
    async fn blmpop_times_out_when_nothing_ready() {
        let ctx = ctx();
        let mut c = client();
        let reply = blmpop(&ctx, &mut c, &[b("0.05"), b("1"), b("missing"), b("LEFT")]).await.unwrap();
        assert!(matches!(reply, Reply::Nil));
    }
}
