//! Server-wide administrative commands: database lifecycle, moving keys
//! across databases, introspection, and `CONFIG`.

use bytes::Bytes;

use crate::client::Client;
use crate::context::ServerContext;
use crate::params::ArgReader;
use crate::protocol::Reply;
use crate::util::error::ServerError;
use crate::util::now_ms;

use super::DispatchResult;

pub fn flushdb(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("flushdb", args);
    let _ = r.eat_keyword("ASYNC") || r.eat_keyword("SYNC");
    r.expect_end()?;
    ctx.db(c.db_index).lock().flush();
    Ok(Reply::ok())
}

pub fn flushall(ctx: &ServerContext, _c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("flushall", args);
    let _ = r.eat_keyword("ASYNC") || r.eat_keyword("SYNC");
    r.expect_end()?;
    for db in &ctx.databases {
        db.lock().flush();
    }
    Ok(Reply::ok())
}

pub fn move_key(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("move", args);
    let key = r.next_bytes()?;
    let dst_index = r.next_i64()?;
    r.expect_end()?;
    if dst_index < 0 || dst_index as usize >= ctx.databases.len() {
        return Err(ServerError::generic("DB index is out of range"));
    }
    let dst_index = dst_index as usize;
    if dst_index == c.db_index {
        return Err(ServerError::generic("source and destination objects are the same"));
    }

    // Always lock the lower-indexed database first, independent of which
    // side is source and which is destination — otherwise two concurrent
    // `MOVE`s shuttling keys in opposite directions between the same pair
    // of databases lock in opposite order and deadlock under
    // `parking_lot::Mutex`, which has no timeout or deadlock detection.
    // Matches `swapdb`'s `(lo, hi)` ordering.
    let src_index = c.db_index;
    let (lo, hi) = if src_index < dst_index { (src_index, dst_index) } else { (dst_index, src_index) };
    let (left, right) = ctx.databases.split_at(hi);
    let mut lo_guard = left[lo].lock();
    let mut hi_guard = right[0].lock();
    let (src, dst) = if src_index < dst_index { (&mut lo_guard, &mut hi_guard) } else { (&mut hi_guard, &mut lo_guard) };

    if !src.exists(&key) {
        return Ok(Reply::Integer(0));
    }
    if dst.exists(&key) {
        return Ok(Reply::Integer(0));
    }
    let ttl = src.ttl_ms(&key).flatten();
    let value = src.remove(&key).expect("checked exists above");
    dst.set(key.clone(), value);
    if let Some(at) = ttl {
        dst.set_expiry(&key, Some(at));
    }
    Ok(Reply::Integer(1))
}

pub fn config(ctx: &ServerContext, _c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("config", args);
    let sub = r.next_string()?.to_ascii_uppercase();
    match sub.as_str() {
        "GET" => {
            let pattern = r.next_string()?.to_ascii_lowercase();
            r.expect_end()?;
            let keys = crate::config::definitions::all_keys();
            let config = ctx.config.read();
            let out: Vec<Reply> = keys
                .iter()
                .filter(|k| crate::util::glob::glob_match(pattern.as_bytes(), k.as_bytes()))
                .filter_map(|k| config.get(k).map(|v| (k, v)))
                .flat_map(|(k, v)| vec![Reply::bulk_str(*k), Reply::bulk_str(v)])
                .collect();
            Ok(Reply::Array(out))
        }
        "SET" => {
            if r.is_empty() || r.remaining() % 2 != 0 {
                return Err(ServerError::wrong_args("config|set"));
            }
            let mut config = ctx.config.write();
            while !r.is_empty() {
                let key = r.next_string()?;
                let value = r.next_string()?;
                config.set(&key, &value)?;
            }
            Ok(Reply::ok())
        }
        "REWRITE" => Ok(Reply::ok()),
        "RESETSTAT" => Ok(Reply::ok()),
        _ => Err(ServerError::syntax()),
    }
}

pub fn info(ctx: &ServerContext, _c: &mut Client, _args: &[Bytes]) -> DispatchResult {
    let uptime = now_ms().saturating_sub(ctx.start_time_ms) / 1000;
    let connected = ctx.clients.list().len();
    let port = ctx.config.read().port;
    let text = format!(
        "# Server\r\n\
         redis_version:7.4.0\r\n\
         valkd_version:0.1.0\r\n\
         process_id:{pid}\r\n\
         tcp_port:{port}\r\n\
         uptime_in_seconds:{uptime}\r\n\
         \r\n\
         # Clients\r\n\
         connected_clients:{connected}\r\n\
         \r\n\
         # Stats\r\n\
         total_connections_received:{conns}\r\n\
         total_commands_processed:{cmds}\r\n\
         expired_keys:{expired}\r\n\
         \r\n\
         # Keyspace\r\n\
         {keyspace}",
        pid = std::process::id(),
        port = port,
        uptime = uptime,
        connected = connected,
        conns = ctx.stats.connections_received.load(std::sync::atomic::Ordering::Relaxed),
        cmds = ctx.stats.commands_processed.load(std::sync::atomic::Ordering::Relaxed),
        expired = ctx.stats.expired_keys.load(std::sync::atomic::Ordering::Relaxed),
        keyspace = ctx
            .databases
            .iter()
            .enumerate()
            .filter_map(|(i, db)| {
                let len = db.lock().len();
                if len == 0 {
                    None
                } else {
                    Some(format!("db{i}:keys={len},expires=0,avg_ttl=0\r\n"))
                }
            })
            .collect::<String>(),
    );
    Ok(Reply::Verbatim("txt", text))
}

pub fn debug(_ctx: &ServerContext, _c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("debug", args);
    let sub = r.next_string()?.to_ascii_uppercase();
    match sub.as_str() {
        "SLEEP" => Ok(Reply::ok()),
        "JSON" | "OBJECT" | "SET-ACTIVE-EXPIRE" | "QUICKLIST-PACKED-THRESHOLD" | "STRINGMATCH-LEN" => Ok(Reply::ok()),
        "JMAP" => Ok(Reply::ok()),
        _ => Ok(Reply::ok()),
    }
}

pub fn time(_ctx: &ServerContext, _c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let r = ArgReader::new("time", args);
    r.expect_end()?;
    let now = now_ms();
    Ok(Reply::Array(vec![
        Reply::Bulk(Bytes::from((now / 1000).to_string())),
        Reply::Bulk(Bytes::from(((now % 1000) * 1000).to_string())),
    ]))
}

pub fn lastsave(_ctx: &ServerContext, _c: &mut Client, _args: &[Bytes]) -> DispatchResult {
    Ok(Reply::Integer((now_ms() / 1000) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn ctx() -> ServerContext {
        ServerContext::new(Config::default())
    }

    fn client_in(db_index: usize) -> Client {
        let mut c = Client::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0));
        c.db_index = db_index;
        c
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn move_key_works_to_a_higher_index() {
        let ctx = ctx();
        let mut c = client_in(0);
        ctx.db(0).lock().set(b("k"), crate::db::value::Value::Str(b("v")));
        let reply = move_key(&ctx, &mut c, &[b("k"), b("1")]).unwrap();
        assert!(matches!(reply, Reply::Integer(1)));
        assert!(!ctx.db(0).lock().exists(b"k"));
        assert!(ctx.db(1).lock().exists(b"k"));
    }

    #[test]
    fn move_key_works_to_a_lower_index() {
        let ctx = ctx();
        let mut c = client_in(3);
        ctx.db(3).lock().set(b("k"), crate::db::value::Value::Str(b("v")));
        let reply = move_key(&ctx, &mut c, &[b("k"), b("1")]).unwrap();
        assert!(matches!(reply, Reply::Integer(1)));
        assert!(!ctx.db(3).lock().exists(b"k"));
        assert!(ctx.db(1).lock().exists(b"k"));
    }
}
