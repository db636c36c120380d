//! `SADD`/`SMEMBERS` and the rest of the set-valued command family,
//! including the cross-key SINTER/SUNION/SDIFF operations.

use std::collections::HashSet;

use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::client::Client;
use crate::context::ServerContext;
use crate::db::value::Value;
use crate::params::ArgReader;
use crate::protocol::Reply;
use crate::util::error::ServerError;

use super::{all_args_keys, DispatchResult};

pub fn sadd(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("sadd", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("sadd"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Set(Default::default()))?;
    let set = v.as_set_mut()?;
    let mut added = 0i64;
    for member in r.rest() {
        if set.insert(member.clone()) {
            added += 1;
        }
    }
    Ok(Reply::Integer(added))
}

pub fn srem(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("srem", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("srem"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let mut removed = 0;
    if let Some(v) = db.get_mut(&key) {
        let set = v.as_set_mut()?;
        for member in r.rest() {
            if set.remove(member) {
                removed += 1;
            }
        }
    }
    db.remove_if_empty(&key);
    Ok(Reply::Integer(removed))
}

pub fn sismember(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("sismember", args);
    let key = r.next_bytes()?;
    let member = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_set()?.contains(&member) as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn smismember(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("smismember", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("smismember"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let set = match db.get(&key) {
        Some(v) => Some(v.as_set()?.clone()),
        None => None,
    };
    let out = r
        .rest()
        .iter()
        .map(|m| Reply::Integer(set.as_ref().map(|s| s.contains(m)).unwrap_or(false) as i64))
        .collect();
    Ok(Reply::Array(out))
}

pub fn scard(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("scard", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_set()?.len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn smembers(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("smembers", args);
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Array(v.as_set()?.iter().cloned().map(Reply::Bulk).collect())),
        None => Ok(Reply::Array(Vec::new())),
    }
}

pub fn smove(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("smove", args);
    let src = r.next_bytes()?;
    let dst = r.next_bytes()?;
    let member = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let removed = match db.get_mut(&src) {
        Some(v) => v.as_set_mut()?.remove(&member),
        None => false,
    };
    if !removed {
        return Ok(Reply::Integer(0));
    }
    db.remove_if_empty(&src);
    let dv = db.get_or_create(&dst, || Value::Set(Default::default()))?;
    dv.as_set_mut()?.insert(member);
    Ok(Reply::Integer(1))
}

pub fn spop(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("spop", args);
    let key = r.next_bytes()?;
    let count = if r.is_empty() { None } else { Some(r.next_i64()?.max(0) as usize) };
    let mut db = ctx.db(c.db_index).lock();
    let v = match db.get_mut(&key) {
        Some(v) => v,
        None => return Ok(if count.is_some() { Reply::Array(vec![]) } else { Reply::Nil }),
    };
    let set = v.as_set_mut()?;
    let n = count.unwrap_or(1).min(set.len());
    let chosen: Vec<Bytes> = set.iter().take(n).cloned().collect();
    for m in &chosen {
        set.remove(m);
    }
    db.remove_if_empty(&key);
    match count {
        None => Ok(chosen.into_iter().next().map(Reply::Bulk).unwrap_or(Reply::Nil)),
        Some(_) => Ok(Reply::Array(chosen.into_iter().map(Reply::Bulk).collect())),
    }
}

pub fn srandmember(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("srandmember", args);
    let key = r.next_bytes()?;
    let count = if r.is_empty() { None } else { Some(r.next_i64()?) };
    let mut db = ctx.db(c.db_index).lock();
    let set: Vec<Bytes> = match db.get(&key) {
        Some(v) => v.as_set()?.iter().cloned().collect(),
        None => return Ok(if count.is_some() { Reply::Array(vec![]) } else { Reply::Nil }),
    };
    let mut rng = rand::thread_rng();
    match count {
        None => Ok(set.choose(&mut rng).cloned().map(Reply::Bulk).unwrap_or(Reply::Nil)),
        Some(n) if n >= 0 => {
            let mut shuffled = set;
            shuffled.shuffle(&mut rng);
            Ok(Reply::Array(shuffled.into_iter().take(n as usize).map(Reply::Bulk).collect()))
        }
        Some(n) => {
            let count = (-n) as usize;
            let out: Vec<Reply> = (0..count)
                .filter_map(|_| if set.is_empty() { None } else { Some(Reply::Bulk(set[rng.gen_range(0..set.len())].clone())) })
                .collect();
            Ok(Reply::Array(out))
        }
    }
}

fn load_set(db: &mut crate::db::Guard, key: &Bytes) -> Result<HashSet<Bytes>, ServerError> {
    match db.get(key) {
        Some(v) => Ok(v.as_set()?.clone()),
        None => Ok(HashSet::new()),
    }
}

pub fn sinter(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    if args.is_empty() {
        return Err(ServerError::wrong_args("sinter"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let mut result = load_set(&mut db, &args[0])?;
    for key in &args[1..] {
        let other = load_set(&mut db, key)?;
        result.retain(|m| other.contains(m));
    }
    Ok(Reply::Array(result.into_iter().map(Reply::Bulk).collect()))
}

pub fn sintercard(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let keys = all_args_keys(&args[..1]);
    let _ = keys;
    let numkeys: usize = std::str::from_utf8(&args[0]).ok().and_then(|s| s.parse().ok()).unwrap_or(0);
    let key_args = &args[1..1 + numkeys];
    let mut r = ArgReader::new("sintercard", &args[1 + numkeys..]);
    let limit = if r.eat_keyword("LIMIT") { Some(r.next_i64()?.max(0) as usize) } else { None };
    let mut db = ctx.db(c.db_index).lock();
    let mut result = load_set(&mut db, &key_args[0])?;
    for key in &key_args[1..] {
        let other = load_set(&mut db, key)?;
        result.retain(|m| other.contains(m));
    }
    let n = limit.map(|l| result.len().min(l)).unwrap_or(result.len());
    Ok(Reply::Integer(n as i64))
}

pub fn sunion(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    if args.is_empty() {
        return Err(ServerError::wrong_args("sunion"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let mut result = HashSet::new();
    for key in args {
        result.extend(load_set(&mut db, key)?);
    }
    Ok(Reply::Array(result.into_iter().map(Reply::Bulk).collect()))
}

pub fn sdiff(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    if args.is_empty() {
        return Err(ServerError::wrong_args("sdiff"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let mut result = load_set(&mut db, &args[0])?;
    for key in &args[1..] {
        let other = load_set(&mut db, key)?;
        result.retain(|m| !other.contains(m));
    }
    Ok(Reply::Array(result.into_iter().map(Reply::Bulk).collect()))
}

fn store_result(ctx: &ServerContext, c: &mut Client, dest: &Bytes, result: HashSet<Bytes>) -> DispatchResult {
    let mut db = ctx.db(c.db_index).lock();
    let n = result.len();
    if result.is_empty() {
        db.remove(dest);
    } else {
        db.set(dest.clone(), Value::Set(result));
    }
    Ok(Reply::Integer(n as i64))
}

pub fn sinterstore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let dest = args.first().cloned().ok_or_else(|| ServerError::wrong_args("sinterstore"))?;
    let reply = sinter(ctx, c, &args[1..])?;
    store_from_array(ctx, c, &dest, reply)
}

pub fn sunionstore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let dest = args.first().cloned().ok_or_else(|| ServerError::wrong_args("sunionstore"))?;
    let reply = sunion(ctx, c, &args[1..])?;
    store_from_array(ctx, c, &dest, reply)
}

pub fn sdiffstore(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let dest = args.first().cloned().ok_or_else(|| ServerError::wrong_args("sdiffstore"))?;
    let reply = sdiff(ctx, c, &args[1..])?;
    store_from_array(ctx, c, &dest, reply)
}

fn store_from_array(ctx: &ServerContext, c: &mut Client, dest: &Bytes, reply: Reply) -> DispatchResult {
    let items = match reply {
        Reply::Array(items) => items,
        _ => Vec::new(),
    };
    let set: HashSet<Bytes> = items
        .into_iter()
        .filter_map(|r| match r {
            Reply::Bulk(b) => Some(b),
            _ => None,
        })
        .collect();
    store_result(ctx, c, dest, set)
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
    fn sadd_then_sismember() {
        let ctx = ctx();
        let mut c = client();
        sadd(&ctx, &mut c, &[b("s"), b("a"), b("b")]).unwrap();
        let reply = sismember(&ctx, &mut c, &[b("s"), b("a")]).unwrap();
        assert!(matches!(reply, Reply::Integer(1)));
    }

    #[test]
    fn sinter_computes_common_members() {
        let ctx = ctx();
        let mut c = client();
        sadd(&ctx, &mut c, &[b("s1"), b("a"), b("b")]).unwrap();
        sadd(&ctx, &mut c, &[b("s2"), b("b"), b("c")]).unwrap();
        let reply = sinter(&ctx, &mut c, &[b("s1"), b("s2")]).unwrap();
        match reply {
            Reply::Array(items) => assert_eq!(items.len(), 1),
            _ => panic!("expected array"),
        }
    }
}
