//! `MULTI`/`EXEC`/`DISCARD`/`WATCH`/`UNWATCH`: the optimistic-transaction
//! surface built on [`crate::txn::Transaction`]. Queueing itself happens in
//! the connection loop (it has to run before a queued command is ever
//! looked up here); these handlers only run for the five control commands.

use bytes::Bytes;

use crate::client::Client;
use crate::context::ServerContext;
use crate::params::ArgReader;
use crate::protocol::Reply;
use crate::router::BoxFuture;
use crate::util::error::ServerError;

use super::DispatchResult;

pub fn multi(_ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let r = ArgReader::new("multi", args);
    r.expect_end()?;
    c.tx.begin()?;
    c.in_multi = true;
    Ok(Reply::ok())
}

pub fn discard(_ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let r = ArgReader::new("discard", args);
    r.expect_end()?;
    c.tx.discard()?;
    c.in_multi = false;
    Ok(Reply::ok())
}

pub fn watch(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("watch", args);
    if r.is_empty() {
        return Err(ServerError::wrong_args("watch"));
    }
    let mut db = ctx.db(c.db_index).lock();
    while !r.is_empty() {
        let key = r.next_bytes()?;
        let version = db.version_of(&key);
        c.tx.watch(c.db_index, key, version)?;
    }
    Ok(Reply::ok())
}

pub fn unwatch(_ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let r = ArgReader::new("unwatch", args);
    r.expect_end()?;
    c.tx.unwatch();
    Ok(Reply::ok())
}

/// Checks every key `WATCH`ed before this `EXEC` still carries the version
/// it had at `WATCH` time, across whichever databases were touched.
fn watched_keys_unchanged(ctx: &ServerContext, c: &Client) -> bool {
    for (&db_index, keys) in &c.tx.watched {
        let mut db = ctx.db(db_index).lock();
        for (key, version) in keys {
            if db.version_of(key) != *version {
                return false;
            }
        }
    }
    true
}

pub fn exec<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move {
        let r = ArgReader::new("exec", args);
        r.expect_end()?;
        if !c.tx.active {
            return Err(ServerError::generic("EXEC without MULTI"));
        }
        if c.tx.dirty {
            c.tx.discard()?;
            c.in_multi = false;
            return Err(ServerError::exec_abort());
        }
        if !watched_keys_unchanged(ctx, c) {
            c.tx.take_for_exec();
            c.in_multi = false;
            return Ok(Reply::Nil);
        }

        // `in_multi` stays set for the whole batch, matching the field's
        // documented purpose: every command run here defers its
        // notifications to `flush_lazy` below, so a blocked client never
        // observes the transaction's effects one command at a time.
        let queued = c.tx.take_for_exec();
        let mut replies = Vec::with_capacity(queued.len());
        for cmd in queued {
            let reply = match ctx.router.resolve(&cmd.name, &cmd.args) {
                Some((spec, rest)) => match spec.async_handler {
                    Some(handler) => handler(ctx, c, rest).await.unwrap_or_else(Reply::from_error),
                    None => (spec.handler)(ctx, c, rest).unwrap_or_else(Reply::from_error),
                },
                None => Reply::from_error(ServerError::unknown_command(&cmd.name, &cmd.args)),
            };
            replies.push(reply);
        }
        c.in_multi = false;
        ctx.blocking.flush_lazy();
        Ok(Reply::Array(replies))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn ctx() -> ServerContext {
        ServerContext::new(Config::default())
    }

    fn client() -> Client {
        Client::new("127.0.0.1:1".parse().unwrap())
    }

    #[test]
    fn multi_then_discard_resets_state() {
        let ctx = ctx();
        let mut c = client();
        multi(&ctx, &mut c, &[]).unwrap();
        assert!(c.tx.active);
        discard(&ctx, &mut c, &[]).unwrap();
        assert!(!c.tx.active);
    }

    #[test]
    fn watch_records_current_version() {
        let ctx = ctx();
        let mut c = client();
        watch(&ctx, &mut c, &[Bytes::from_static(b"k")]).unwrap();
        assert!(watched_keys_unchanged(&ctx, &c));
        ctx.db(0).lock().set(Bytes::from_static(b"k"), crate::db::value::Value::Str(Bytes::from_static(b"1")));
        assert!(!watched_keys_unchanged(&ctx, &c));
    }
}
