//! The `X*` stream command family: append-only log entries, range reads,
//! and consumer-group delivery/acknowledgement.

use std::time::Duration;

use bytes::Bytes;

use crate::client::Client;
use crate::context::ServerContext;
use crate::db::stream::{ConsumerGroup, EntryId, Fields, Stream};
use crate::db::value::Value;
use crate::params::ArgReader;
use crate::protocol::Reply;
use crate::router::BoxFuture;
use crate::util::error::{ErrorKind, ServerError};
use crate::util::now_ms;

use super::DispatchResult;

fn fields_reply(fields: &Fields) -> Reply {
    let mut out = Vec::with_capacity(fields.len() * 2);
    for (k, v) in fields {
        out.push(Reply::Bulk(k.clone()));
        out.push(Reply::Bulk(v.clone()));
    }
    Reply::Array(out)
}

fn entry_reply(id: EntryId, fields: &Fields) -> Reply {
    Reply::Array(vec![Reply::Bulk(Bytes::from(id.format())), fields_reply(fields)])
}

/// Consumes a trailing `LIMIT <n>` clause for `MAXLEN`/`MINID` trimming,
/// matching the original's rule that `LIMIT` only makes sense alongside the
/// approximate (`~`) form and must be non-negative.
fn parse_trim_limit(r: &mut ArgReader, approx: bool) -> Result<(), ServerError> {
    if r.eat_keyword("LIMIT") {
        if !approx {
            return Err(ServerError::generic("syntax error, LIMIT cannot be used without the special ~ option"));
        }
        let limit = r.next_i64()?;
        if limit < 0 {
            return Err(ServerError::generic("The LIMIT argument must be >= 0."));
        }
    }
    Ok(())
}

fn no_group(group: &[u8], key: &[u8]) -> ServerError {
    ServerError::new(
        ErrorKind::NoGroup,
        format!(
            "No such key '{}' or consumer group '{}' in XREADGROUP with GROUP option",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(group)
        ),
    )
}

fn get_group<'a>(stream: &'a mut Stream, group: &[u8]) -> Result<&'a mut ConsumerGroup, ServerError> {
    stream
        .groups
        .get_mut(group)
        .ok_or_else(|| ServerError::new(ErrorKind::NoGroup, "NOGROUP No such consumer group"))
}

pub fn xadd(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xadd", args);
    let key = r.next_bytes()?;
    let nomkstream = r.eat_keyword("NOMKSTREAM");

    let mut maxlen: Option<usize> = None;
    let mut minid: Option<EntryId> = None;
    loop {
        if r.eat_keyword("MAXLEN") {
            let approx = r.eat_keyword("~");
            let _ = approx || r.eat_keyword("=");
            maxlen = Some(r.next_u64()? as usize);
            parse_trim_limit(&mut r, approx)?;
        } else if r.eat_keyword("MINID") {
            let approx = r.eat_keyword("~");
            let _ = approx || r.eat_keyword("=");
            let token = r.next_bytes()?;
            minid = Some(EntryId::parse(&token, 0)?);
            parse_trim_limit(&mut r, approx)?;
        } else {
            break;
        }
    }

    let id_token = r.next_bytes()?;
    if r.is_empty() || r.remaining() % 2 != 0 {
        return Err(ServerError::wrong_args("xadd"));
    }
    let mut fields: Fields = Vec::new();
    while !r.is_empty() {
        let field = r.next_bytes()?;
        let value = r.next_bytes()?;
        fields.push((field, value));
    }

    let mut db = ctx.db(c.db_index).lock();
    if nomkstream && !db.exists(&key) {
        return Ok(Reply::Nil);
    }
    let v = db.get_or_create(&key, || Value::Stream(Stream::new()))?;
    let stream = v.as_stream_mut()?;

    let id = if id_token.as_ref() == b"*" {
        stream.auto_id(now_ms())
    } else if id_token.ends_with(b"-*") {
        let ms_part = &id_token[..id_token.len() - 2];
        let ms: u64 = std::str::from_utf8(ms_part)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ServerError::generic("Invalid stream ID specified as stream command argument"))?;
        stream.next_id_for_add(ms, true)?
    } else {
        let id = EntryId::parse(&id_token, 0)?;
        if id == EntryId::MIN {
            return Err(ServerError::generic("The ID specified in XADD must be greater than 0-0"));
        }
        if id <= stream.last_id && stream.entries_added > 0 {
            return Err(ServerError::generic(
                "The ID specified in XADD is equal or smaller than the target stream top item",
            ));
        }
        id
    };

    stream.insert(id, fields);
    if let Some(n) = maxlen {
        stream.trim_to_maxlen(n);
    }
    if let Some(m) = minid {
        stream.trim_to_minid(m);
    }
    let formatted = id.format();
    drop(db);
    ctx.blocking.notify(&key, c.in_multi);
    Ok(Reply::Bulk(Bytes::from(formatted)))
}

pub fn xlen(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xlen", args);
    let key = r.next_bytes()?;
    r.expect_end()?;
    let mut db = ctx.db(c.db_index).lock();
    match db.get(&key) {
        Some(v) => Ok(Reply::Integer(v.as_stream()?.len() as i64)),
        None => Ok(Reply::Integer(0)),
    }
}

pub fn xdel(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xdel", args);
    let key = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("xdel"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let v = match db.get_mut(&key) {
        Some(v) => v,
        None => return Ok(Reply::Integer(0)),
    };
    let stream = v.as_stream_mut()?;
    let mut removed = 0i64;
    while !r.is_empty() {
        let token = r.next_bytes()?;
        let id = EntryId::parse(&token, 0)?;
        if stream.entries.remove(&id).is_some() {
            if id > stream.max_deleted_id {
                stream.max_deleted_id = id;
            }
            removed += 1;
        }
    }
    Ok(Reply::Integer(removed))
}

pub fn xtrim(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xtrim", args);
    let key = r.next_bytes()?;
    let by_maxlen = if r.eat_keyword("MAXLEN") {
        true
    } else if r.eat_keyword("MINID") {
        false
    } else {
        return Err(ServerError::syntax());
    };
    let approx = r.eat_keyword("~");
    let _ = approx || r.eat_keyword("=");
    let token = r.next_bytes()?;
    parse_trim_limit(&mut r, approx)?;
    r.expect_end()?;

    let mut db = ctx.db(c.db_index).lock();
    let v = match db.get_mut(&key) {
        Some(v) => v,
        None => return Ok(Reply::Integer(0)),
    };
    let stream = v.as_stream_mut()?;
    let removed = if by_maxlen {
        let n: u64 = std::str::from_utf8(&token)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(ServerError::not_an_integer)?;
        stream.trim_to_maxlen(n as usize)
    } else {
        let id = EntryId::parse(&token, 0)?;
        stream.trim_to_minid(id)
    };
    Ok(Reply::Integer(removed as i64))
}

pub fn xrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    range_impl(ctx, c, args, false)
}

pub fn xrevrange(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    range_impl(ctx, c, args, true)
}

fn parse_range_bound(token: &[u8], default_seq: u64) -> Result<EntryId, ServerError> {
    match token {
        b"-" => Ok(EntryId::MIN),
        b"+" => Ok(EntryId::MAX),
        t if t.first() == Some(&b'(') => {
            let id = EntryId::parse(&t[1..], default_seq)?;
            Ok(if default_seq == 0 { id.next() } else { id.prev() })
        }
        t => EntryId::parse(t, default_seq),
    }
}

fn range_impl(ctx: &ServerContext, c: &mut Client, args: &[Bytes], rev: bool) -> DispatchResult {
    let mut r = ArgReader::new("xrange", args);
    let key = r.next_bytes()?;
    let (first_tok, second_tok) = (r.next_bytes()?, r.next_bytes()?);
    let (start_tok, end_tok) = if rev { (second_tok, first_tok) } else { (first_tok, second_tok) };
    let count = if r.eat_keyword("COUNT") { Some(r.next_i64()?.max(0) as usize) } else { None };
    r.expect_end()?;

    let start = parse_range_bound(&start_tok, 0)?;
    let end = parse_range_bound(&end_tok, u64::MAX)?;

    let mut db = ctx.db(c.db_index).lock();
    let entries = match db.get(&key) {
        Some(v) => {
            let stream = v.as_stream()?;
            if rev {
                stream.range_rev(end, start, count)
            } else {
                stream.range(start, end, count)
            }
        }
        None => Vec::new(),
    };
    Ok(Reply::Array(entries.iter().map(|(id, f)| entry_reply(*id, f)).collect()))
}

pub fn xread<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move { xread_impl(ctx, c, args, None).await })
}

pub fn xreadgroup<'a>(ctx: &'a ServerContext, c: &'a mut Client, args: &'a [Bytes]) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move {
        let mut r = ArgReader::new("xreadgroup", args);
        if !r.eat_keyword("GROUP") {
            return Err(ServerError::syntax());
        }
        let group = r.next_bytes()?;
        let consumer = r.next_bytes()?;
        xreadgroup_rest(ctx, c, r, group, consumer).await
    })
}

struct ReadOpts {
    count: Option<usize>,
    block_ms: Option<Option<u64>>,
    noack: bool,
}

fn parse_read_opts(r: &mut ArgReader, allow_noack: bool) -> Result<ReadOpts, ServerError> {
    let mut count = None;
    let mut block_ms = None;
    let mut noack = false;
    loop {
        if r.eat_keyword("COUNT") {
            count = Some(r.next_i64()?.max(0) as usize);
        } else if r.eat_keyword("BLOCK") {
            let ms = r.next_i64()?;
            block_ms = Some(if ms <= 0 { None } else { Some(ms as u64) });
        } else if allow_noack && r.eat_keyword("NOACK") {
            noack = true;
        } else {
            break;
        }
    }
    Ok(ReadOpts { count, block_ms, noack })
}

fn split_streams_clause(r: &mut ArgReader) -> Result<(Vec<Bytes>, Vec<Bytes>), ServerError> {
    if !r.eat_keyword("STREAMS") {
        return Err(ServerError::syntax());
    }
    let mut rest: Vec<Bytes> = Vec::with_capacity(r.remaining());
    while !r.is_empty() {
        rest.push(r.next_bytes()?);
    }
    if rest.len() % 2 != 0 || rest.is_empty() {
        return Err(ServerError::generic(
            "Unbalanced XREAD list of streams: for each stream key an ID or '$' must be specified.",
        ));
    }
    let n = rest.len() / 2;
    let keys = rest[..n].to_vec();
    let ids = rest[n..].to_vec();
    Ok((keys, ids))
}

async fn xread_impl(ctx: &ServerContext, c: &mut Client, args: &[Bytes], _unused: Option<()>) -> DispatchResult {
    let mut r = ArgReader::new("xread", args);
    let opts = parse_read_opts(&mut r, false)?;
    let (keys, id_tokens) = split_streams_clause(&mut r)?;

    let mut after: Vec<EntryId> = Vec::with_capacity(keys.len());
    {
        let mut db = ctx.db(c.db_index).lock();
        for (key, tok) in keys.iter().zip(id_tokens.iter()) {
            if tok.as_ref() == b"$" {
                let last = match db.get(key) {
                    Some(v) => v.as_stream()?.last_id,
                    None => EntryId::MIN,
                };
                after.push(last);
            } else {
                after.push(EntryId::parse(tok, 0)?);
            }
        }
    }

    loop {
        let mut results = Vec::new();
        {
            let mut db = ctx.db(c.db_index).lock();
            for (key, from) in keys.iter().zip(after.iter()) {
                if let Some(v) = db.get(key) {
                    let stream = v.as_stream()?;
                    let entries = stream.range(from.next(), EntryId::MAX, opts.count);
                    if !entries.is_empty() {
                        results.push(Reply::Array(vec![
                            Reply::Bulk(key.clone()),
                            Reply::Array(entries.iter().map(|(id, f)| entry_reply(*id, f)).collect()),
                        ]));
                    }
                }
            }
        }
        if !results.is_empty() {
            return Ok(Reply::Array(results));
        }
        match opts.block_ms {
            None => return Ok(Reply::Nil),
            Some(dur_ms) => {
                if c.in_multi {
                    return Ok(Reply::Nil);
                }
                let mut reg = ctx.blocking.register(&keys);
                c.blocked_on = Some(reg.waiter_id());
                ctx.set_blocked(c.id, c.blocked_on);
                let dur = dur_ms.map(Duration::from_millis);
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
    }
}

async fn xreadgroup_rest(ctx: &ServerContext, c: &mut Client, mut r: ArgReader<'_>, group: Bytes, consumer: Bytes) -> DispatchResult {
    let opts = parse_read_opts(&mut r, true)?;
    let (keys, id_tokens) = split_streams_clause(&mut r)?;

    loop {
        let mut results = Vec::new();
        {
            let mut db = ctx.db(c.db_index).lock();
            for (key, tok) in keys.iter().zip(id_tokens.iter()) {
                let v = db.get_mut(key).ok_or_else(|| no_group(&group, key))?;
                let stream = v.as_stream_mut()?;
                let now = now_ms();
                if tok.as_ref() == b">" {
                    let from = get_group(stream, &group)?.last_delivered;
                    let entries = stream.range(from.next(), EntryId::MAX, opts.count);
                    let grp = get_group(stream, &group)?;
                    let mut delivered = Vec::with_capacity(entries.len());
                    for (id, fields) in &entries {
                        grp.last_delivered = *id;
                        grp.entries_read += 1;
                        if !opts.noack {
                            grp.pending.insert(
                                *id,
                                crate::db::stream::PendingEntry {
                                    consumer: consumer.clone(),
                                    delivery_time_ms: now,
                                    delivery_count: 1,
                                },
                            );
                            grp.consumer_mut(&consumer).pending.push(*id);
                        }
                        delivered.push(entry_reply(*id, fields));
                    }
                    let cons = grp.consumer_mut(&consumer);
                    cons.seen_time_ms = now;
                    cons.active_time_ms = now;
                    if !delivered.is_empty() {
                        results.push(Reply::Array(vec![Reply::Bulk(key.clone()), Reply::Array(delivered)]));
                    }
                } else {
                    let from = EntryId::parse(tok, 0)?;
                    let grp = get_group(stream, &group)?;
                    let cons = grp.consumer_mut(&consumer);
                    let pending_ids: Vec<EntryId> = cons.pending.iter().filter(|id| **id >= from).copied().collect();
                    let mut delivered = Vec::with_capacity(pending_ids.len());
                    for id in pending_ids {
                        match stream.entries.get(&id) {
                            Some(fields) => delivered.push(entry_reply(id, fields)),
                            None => delivered.push(Reply::Array(vec![Reply::Bulk(Bytes::from(id.format())), Reply::Nil])),
                        }
                    }
                    results.push(Reply::Array(vec![Reply::Bulk(key.clone()), Reply::Array(delivered)]));
                }
            }
        }
        if !results.is_empty() || id_tokens.iter().any(|t| t.as_ref() != b">") {
            return Ok(Reply::Array(results));
        }
        match opts.block_ms {
            None => return Ok(Reply::Nil),
            Some(dur_ms) => {
                if c.in_multi {
                    return Ok(Reply::Nil);
                }
                let mut reg = ctx.blocking.register(&keys);
                c.blocked_on = Some(reg.waiter_id());
                ctx.set_blocked(c.id, c.blocked_on);
                let dur = dur_ms.map(Duration::from_millis);
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
    }
}

pub fn xack(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xack", args);
    let key = r.next_bytes()?;
    let group = r.next_bytes()?;
    if r.is_empty() {
        return Err(ServerError::wrong_args("xack"));
    }
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
    let stream = v.as_stream_mut()?;
    let grp = get_group(stream, &group)?;
    let mut acked = 0i64;
    while !r.is_empty() {
        let token = r.next_bytes()?;
        let id = EntryId::parse(&token, 0)?;
        if let Some(entry) = grp.pending.remove(&id) {
            if let Some(cons) = grp.consumers.get_mut(&entry.consumer) {
                cons.pending.retain(|x| *x != id);
            }
            acked += 1;
        }
    }
    Ok(Reply::Integer(acked))
}

pub fn xsetid(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xsetid", args);
    let key = r.next_bytes()?;
    let id_token = r.next_bytes()?;
    let mut entries_added: Option<u64> = None;
    let mut max_deleted: Option<EntryId> = None;
    loop {
        if r.eat_keyword("ENTRIESADDED") {
            entries_added = Some(r.next_u64()?);
        } else if r.eat_keyword("MAXDELETEDID") {
            let t = r.next_bytes()?;
            max_deleted = Some(EntryId::parse(&t, 0)?);
        } else {
            break;
        }
    }
    r.expect_end()?;

    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_or_create(&key, || Value::Stream(Stream::new()))?;
    let stream = v.as_stream_mut()?;
    stream.last_id = EntryId::parse(&id_token, 0)?;
    if let Some(n) = entries_added {
        stream.entries_added = n;
    }
    if let Some(id) = max_deleted {
        stream.max_deleted_id = id;
    }
    Ok(Reply::ok())
}

pub fn xgroup(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xgroup", args);
    let sub = r.next_string()?.to_ascii_uppercase();
    match sub.as_str() {
        "CREATE" => {
            let key = r.next_bytes()?;
            let group = r.next_bytes()?;
            let id_token = r.next_bytes()?;
            let mkstream = r.eat_keyword("MKSTREAM");
            let mut db = ctx.db(c.db_index).lock();
            if !db.exists(&key) {
                if !mkstream {
                    return Err(ServerError::generic(
                        "The XGROUP subcommand requires the key to exist. Note that for CREATE you may want to use the MKSTREAM option to create an empty stream automatically.",
                    ));
                }
                db.set(key.clone(), Value::Stream(Stream::new()));
            }
            let v = db.get_mut(&key).unwrap();
            let stream = v.as_stream_mut()?;
            if stream.groups.contains_key(&group) {
                return Err(ServerError::new(ErrorKind::BusyGroup, "BUSYGROUP Consumer Group name already exists"));
            }
            let last_delivered = if id_token.as_ref() == b"$" { stream.last_id } else { EntryId::parse(&id_token, 0)? };
            stream.groups.insert(
                group,
                ConsumerGroup { last_delivered, ..Default::default() },
            );
            Ok(Reply::ok())
        }
        "SETID" => {
            let key = r.next_bytes()?;
            let group = r.next_bytes()?;
            let id_token = r.next_bytes()?;
            let mut db = ctx.db(c.db_index).lock();
            let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
            let stream = v.as_stream_mut()?;
            let last_id = stream.last_id;
            let grp = get_group(stream, &group)?;
            grp.last_delivered = if id_token.as_ref() == b"$" { last_id } else { EntryId::parse(&id_token, 0)? };
            Ok(Reply::ok())
        }
        "DESTROY" => {
            let key = r.next_bytes()?;
            let group = r.next_bytes()?;
            let mut db = ctx.db(c.db_index).lock();
            let removed = match db.get_mut(&key) {
                Some(v) => v.as_stream_mut()?.groups.remove(&group).is_some(),
                None => false,
            };
            Ok(Reply::Integer(removed as i64))
        }
        "CREATECONSUMER" => {
            let key = r.next_bytes()?;
            let group = r.next_bytes()?;
            let consumer = r.next_bytes()?;
            let mut db = ctx.db(c.db_index).lock();
            let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
            let stream = v.as_stream_mut()?;
            let grp = get_group(stream, &group)?;
            let created = !grp.consumers.contains_key(&consumer);
            grp.consumer_mut(&consumer);
            Ok(Reply::Integer(created as i64))
        }
        "DELCONSUMER" => {
            let key = r.next_bytes()?;
            let group = r.next_bytes()?;
            let consumer = r.next_bytes()?;
            let mut db = ctx.db(c.db_index).lock();
            let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
            let stream = v.as_stream_mut()?;
            let grp = get_group(stream, &group)?;
            let removed = grp.consumers.remove(&consumer);
            let count = removed.as_ref().map(|c| c.pending.len()).unwrap_or(0);
            if let Some(cons) = removed {
                for id in cons.pending {
                    grp.pending.remove(&id);
                }
            }
            Ok(Reply::Integer(count as i64))
        }
        _ => Err(ServerError::syntax()),
    }
}

pub fn xpending(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xpending", args);
    let key = r.next_bytes()?;
    let group = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
    let stream = v.as_stream_mut()?;
    let grp = get_group(stream, &group)?;

    if r.is_empty() {
        if grp.pending.is_empty() {
            return Ok(Reply::Array(vec![Reply::Integer(0), Reply::Nil, Reply::Nil, Reply::Nil]));
        }
        let min = grp.pending.keys().next().copied().unwrap();
        let max = grp.pending.keys().next_back().copied().unwrap();
        let mut per_consumer: std::collections::HashMap<Bytes, i64> = std::collections::HashMap::new();
        for entry in grp.pending.values() {
            *per_consumer.entry(entry.consumer.clone()).or_insert(0) += 1;
        }
        let consumers = per_consumer
            .into_iter()
            .map(|(name, count)| Reply::Array(vec![Reply::Bulk(name), Reply::Bulk(Bytes::from(count.to_string()))]))
            .collect();
        return Ok(Reply::Array(vec![
            Reply::Integer(grp.pending.len() as i64),
            Reply::Bulk(Bytes::from(min.format())),
            Reply::Bulk(Bytes::from(max.format())),
            Reply::Array(consumers),
        ]));
    }

    let idle = if r.eat_keyword("IDLE") { Some(r.next_i64()?.max(0) as u64) } else { None };
    let start = parse_range_bound(&r.next_bytes()?, 0)?;
    let end = parse_range_bound(&r.next_bytes()?, u64::MAX)?;
    let count = r.next_i64()?.max(0) as usize;
    let consumer_filter = if r.is_empty() { None } else { Some(r.next_bytes()?) };
    r.expect_end()?;

    let now = now_ms();
    let out: Vec<Reply> = grp
        .pending
        .range(start..=end)
        .filter(|(_, e)| consumer_filter.as_ref().map(|f| &e.consumer == f).unwrap_or(true))
        .filter(|(_, e)| idle.map(|min| now.saturating_sub(e.delivery_time_ms) >= min).unwrap_or(true))
        .take(count)
        .map(|(id, e)| {
            Reply::Array(vec![
                Reply::Bulk(Bytes::from(id.format())),
                Reply::Bulk(e.consumer.clone()),
                Reply::Integer(now.saturating_sub(e.delivery_time_ms) as i64),
                Reply::Integer(e.delivery_count as i64),
            ])
        })
        .collect();
    Ok(Reply::Array(out))
}

pub fn xclaim(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xclaim", args);
    let key = r.next_bytes()?;
    let group = r.next_bytes()?;
    let consumer = r.next_bytes()?;
    let min_idle_ms = r.next_i64()?.max(0) as u64;

    let mut ids = Vec::new();
    loop {
        match r.peek() {
            Some(tok) if EntryId::parse(tok, 0).is_ok() => {
                ids.push(EntryId::parse(&r.next_bytes()?, 0)?);
            }
            _ => break,
        }
    }

    let mut justid = false;
    let mut force = false;
    let mut set_idle: Option<u64> = None;
    let mut set_time: Option<u64> = None;
    let mut set_retry: Option<u64> = None;
    loop {
        if r.eat_keyword("JUSTID") {
            justid = true;
        } else if r.eat_keyword("FORCE") {
            force = true;
        } else if r.eat_keyword("IDLE") {
            set_idle = Some(r.next_u64()?);
        } else if r.eat_keyword("TIME") {
            set_time = Some(r.next_u64()?);
        } else if r.eat_keyword("RETRYCOUNT") {
            set_retry = Some(r.next_u64()?);
        } else if r.eat_keyword("LASTID") {
            let _ = r.next_bytes()?;
        } else {
            break;
        }
    }

    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
    let stream = v.as_stream_mut()?;
    let now = now_ms();
    let exists: std::collections::HashSet<EntryId> = stream.entries.keys().copied().collect();
    let grp = get_group(stream, &group)?;
    let mut claimed = Vec::new();
    for id in ids {
        let age = grp.pending.get(&id).map(|e| now.saturating_sub(e.delivery_time_ms));
        let eligible = match age {
            Some(a) => a >= min_idle_ms,
            None => force && exists.contains(&id),
        };
        if !eligible {
            continue;
        }
        if let Some(old) = grp.pending.get(&id) {
            if let Some(old_cons) = grp.consumers.get_mut(&old.consumer) {
                old_cons.pending.retain(|x| *x != id);
            }
        }
        let delivery_time_ms = set_time.unwrap_or_else(|| now.saturating_sub(set_idle.unwrap_or(0)));
        let delivery_count = set_retry.unwrap_or_else(|| grp.pending.get(&id).map(|e| e.delivery_count + 1).unwrap_or(1));
        grp.pending.insert(
            id,
            crate::db::stream::PendingEntry { consumer: consumer.clone(), delivery_time_ms, delivery_count },
        );
        grp.consumer_mut(&consumer).pending.push(id);
        claimed.push(id);
    }
    let cons = grp.consumer_mut(&consumer);
    cons.seen_time_ms = now;
    cons.active_time_ms = now;

    if justid {
        Ok(Reply::Array(claimed.into_iter().map(|id| Reply::Bulk(Bytes::from(id.format()))).collect()))
    } else {
        let out = claimed
            .into_iter()
            .filter_map(|id| stream.entries.get(&id).map(|f| entry_reply(id, f)))
            .collect();
        Ok(Reply::Array(out))
    }
}

pub fn xautoclaim(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xautoclaim", args);
    let key = r.next_bytes()?;
    let group = r.next_bytes()?;
    let consumer = r.next_bytes()?;
    let min_idle_ms = r.next_u64()?;
    let start_token = r.next_bytes()?;
    let count = if r.eat_keyword("COUNT") { r.next_i64()?.max(1) as usize } else { 100 };
    let justid = r.eat_keyword("JUSTID");
    r.expect_end()?;

    let start = EntryId::parse(&start_token, 0)?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get_mut(&key).ok_or_else(|| no_group(&group, &key))?;
    let stream = v.as_stream_mut()?;
    let now = now_ms();
    let exists: std::collections::HashSet<EntryId> = stream.entries.keys().copied().collect();
    let grp = get_group(stream, &group)?;

    let candidates: Vec<EntryId> = grp
        .pending
        .range(start..)
        .filter(|(_, e)| now.saturating_sub(e.delivery_time_ms) >= min_idle_ms)
        .map(|(id, _)| *id)
        .take(count)
        .collect();

    let mut claimed = Vec::new();
    let mut deleted = Vec::new();
    let mut next_cursor = EntryId::MIN;
    for id in candidates {
        next_cursor = id.next();
        if !exists.contains(&id) {
            grp.pending.remove(&id);
            deleted.push(id);
            continue;
        }
        if let Some(old) = grp.pending.get(&id) {
            if let Some(old_cons) = grp.consumers.get_mut(&old.consumer) {
                old_cons.pending.retain(|x| *x != id);
            }
        }
        let delivery_count = grp.pending.get(&id).map(|e| e.delivery_count + 1).unwrap_or(1);
        grp.pending.insert(
            id,
            crate::db::stream::PendingEntry { consumer: consumer.clone(), delivery_time_ms: now, delivery_count },
        );
        grp.consumer_mut(&consumer).pending.push(id);
        claimed.push(id);
    }
    let cons = grp.consumer_mut(&consumer);
    cons.seen_time_ms = now;
    cons.active_time_ms = now;

    let cursor = if claimed.len() + deleted.len() < count { EntryId::MIN } else { next_cursor };
    let entries_reply = if justid {
        claimed.iter().map(|id| Reply::Bulk(Bytes::from(id.format()))).collect()
    } else {
        claimed.iter().filter_map(|id| stream.entries.get(id).map(|f| entry_reply(*id, f))).collect()
    };
    Ok(Reply::Array(vec![
        Reply::Bulk(Bytes::from(cursor.format())),
        Reply::Array(entries_reply),
        Reply::Array(deleted.into_iter().map(|id| Reply::Bulk(Bytes::from(id.format()))).collect()),
    ]))
}

pub fn xinfo(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("xinfo", args);
    let sub = r.next_string()?.to_ascii_uppercase();
    let key = r.next_bytes()?;
    let mut db = ctx.db(c.db_index).lock();
    let v = db.get(&key).ok_or_else(ServerError::no_such_key)?;
    let stream = v.as_stream()?;
    match sub.as_str() {
        "STREAM" => Ok(Reply::Map(vec![
            (Reply::bulk_str("length"), Reply::Integer(stream.len() as i64)),
            (Reply::bulk_str("last-generated-id"), Reply::Bulk(Bytes::from(stream.last_id.format()))),
            (Reply::bulk_str("max-deleted-entry-id"), Reply::Bulk(Bytes::from(stream.max_deleted_id.format()))),
            (Reply::bulk_str("entries-added"), Reply::Integer(stream.entries_added as i64)),
            (Reply::bulk_str("groups"), Reply::Integer(stream.groups.len() as i64)),
            (
                Reply::bulk_str("first-entry"),
                stream.entries.iter().next().map(|(id, f)| entry_reply(*id, f)).unwrap_or(Reply::Nil),
            ),
            (
                Reply::bulk_str("last-entry"),
                stream.entries.iter().next_back().map(|(id, f)| entry_reply(*id, f)).unwrap_or(Reply::Nil),
            ),
        ])),
        "GROUPS" => {
            let out = stream
                .groups
                .iter()
                .map(|(name, g)| {
                    Reply::Map(vec![
                        (Reply::bulk_str("name"), Reply::Bulk(name.clone())),
                        (Reply::bulk_str("consumers"), Reply::Integer(g.consumers.len() as i64)),
                        (Reply::bulk_str("pending"), Reply::Integer(g.pending.len() as i64)),
                        (Reply::bulk_str("last-delivered-id"), Reply::Bulk(Bytes::from(g.last_delivered.format()))),
                        (Reply::bulk_str("entries-read"), Reply::Integer(g.entries_read as i64)),
                        (Reply::bulk_str("lag"), Reply::Integer((stream.entries_added.saturating_sub(g.entries_read)) as i64)),
                    ])
                })
                .collect();
            Ok(Reply::Array(out))
        }
        "CONSUMERS" => {
            let group = r.next_bytes()?;
            let grp = stream.groups.get(&group).ok_or_else(|| no_group(&group, &key))?;
            let now = now_ms();
            let out = grp
                .consumers
                .iter()
                .map(|(name, cons)| {
                    Reply::Map(vec![
                        (Reply::bulk_str("name"), Reply::Bulk(name.clone())),
                        (Reply::bulk_str("pending"), Reply::Integer(cons.pending.len() as i64)),
                        (Reply::bulk_str("idle"), Reply::Integer(now.saturating_sub(cons.seen_time_ms) as i64)),
                        (Reply::bulk_str("inactive"), Reply::Integer(now.saturating_sub(cons.active_time_ms) as i64)),
                    ])
                })
                .collect();
            Ok(Reply::Array(out))
        }
        _ => Err(ServerError::syntax()),
    }
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
    fn xadd_auto_id_then_xlen() {
        let ctx = ctx();
        let mut c = client();
        xadd(&ctx, &mut c, &[b("s"), b("*"), b("f"), b("v")]).unwrap();
        xadd(&ctx, &mut c, &[b("s"), b("*"), b("f"), b("v2")]).unwrap();
        let len = xlen(&ctx, &mut c, &[b("s")]).unwrap();
        assert!(matches!(len, Reply::Integer(2)));
    }

    #[test]
    fn xadd_rejects_id_not_greater_than_last() {
        let ctx = ctx();
        let mut c = client();
        xadd(&ctx, &mut c, &[b("s"), b("5-0"), b("f"), b("v")]).unwrap();
        let err = xadd(&ctx, &mut c, &[b("s"), b("4-0"), b("f"), b("v")]);
        assert!(err.is_err());
    }

    #[test]
    fn xadd_rejects_explicit_zero_zero_on_empty_stream() {
        let ctx = ctx();
        let mut c = client();
        let err = xadd(&ctx, &mut c, &[b("s"), b("0-0"), b("f"), b("v")]).unwrap_err();
        assert!(err.message.contains("must be greater than 0-0"));
    }

    #[test]
    fn xtrim_limit_without_approx_is_an_error() {
        let ctx = ctx();
        let mut c = client();
        xadd(&ctx, &mut c, &[b("s"), b("*"), b("f"), b("v")]).unwrap();
        let err = xtrim(&ctx, &mut c, &[b("s"), b("MAXLEN"), b("0"), b("LIMIT"), b("5")]);
        assert!(err.is_err());
    }

    #[test]
    fn xtrim_negative_limit_is_an_error() {
        let ctx = ctx();
        let mut c = client();
        xadd(&ctx, &mut c, &[b("s"), b("*"), b("f"), b("v")]).unwrap();
        let err = xtrim(&ctx, &mut c, &[b("s"), b("MAXLEN"), b("~"), b("0"), b("LIMIT"), b("-1")]);
        assert!(err.is_err());
    }

    #[test]
    fn xgroup_create_then_xreadgroup_delivers_new_entries() {
        let ctx = ctx();
        let mut c = client();
        xadd(&ctx, &mut c, &[b("s"), b("1-1"), b("f"), b("v")]).unwrap();
        xgroup(&ctx, &mut c, &[b("CREATE"), b("s"), b("g"), b("0")]).unwrap();
        let reply = xack(&ctx, &mut c, &[b("s"), b("g"), b("1-1")]).unwrap();
        assert!(matches!(reply, Reply::Integer(0)));
    }
}
