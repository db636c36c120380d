//! The static command table: one [`CommandSpec`] per command name, fed to
//! [`crate::router::Router::new`] to build the dispatch trie.

use crate::router::CommandSpec;

use super::{
    acl, all_args_keys, all_but_last_arg_keys, connection, every_other_arg_key, first_arg_key,
    first_two_args_keys, generic, hashes, lists, no_keys, server, sets, sorted_sets, streams,
    strings, transactions,
};
use super::{cmd, cmd_async, group};

pub static COMMAND_TABLE: &[CommandSpec] = &[
    // connection
    cmd!("ping", "connection", -1, false, false, connection::ping, no_keys),
    cmd!("echo", "connection", 2, false, false, connection::echo, no_keys),
    cmd!("select", "connection", 2, false, false, connection::select, no_keys),
    cmd!("swapdb", "connection", 3, false, true, connection::swapdb, no_keys),
    cmd!("auth", "connection", -2, false, false, connection::auth, no_keys),
    cmd!("hello", "connection", -1, false, false, connection::hello, no_keys),
    cmd!("quit", "connection", 1, false, false, connection::quit, no_keys),
    cmd!("client", "connection", -2, false, true, connection::client, no_keys),
    // transactions
    cmd!("multi", "transaction", 1, false, true, transactions::multi, no_keys),
    cmd!("discard", "transaction", 1, false, true, transactions::discard, no_keys),
    cmd!("watch", "transaction", -2, false, true, transactions::watch, all_args_keys),
    cmd!("unwatch", "transaction", 1, false, true, transactions::unwatch, no_keys),
    cmd_async!("exec", "transaction", 1, false, transactions::exec, no_keys),
    // acl
    cmd!("acl", "admin", -2, false, true, acl::acl, no_keys),
    // server / admin
    cmd!("flushdb", "admin", -1, true, false, server::flushdb, no_keys),
    cmd!("flushall", "admin", -1, true, false, server::flushall, no_keys),
    cmd!("move", "keyspace", 3, true, false, server::move_key, first_arg_key),
    cmd!("dbsize", "keyspace", 1, false, false, generic::dbsize, no_keys),
    cmd!("config", "admin", -2, false, false, server::config, no_keys),
    cmd!("info", "admin", -1, false, false, server::info, no_keys),
    cmd!("debug", "admin", -2, false, false, server::debug, no_keys),
    cmd!("time", "admin", 1, false, false, server::time, no_keys),
    cmd!("lastsave", "admin", 1, false, false, server::lastsave, no_keys),
    // generic / keyspace
    cmd!("del", "keyspace", -2, true, false, generic::del, all_args_keys),
    cmd!("unlink", "keyspace", -2, true, false, generic::unlink, all_args_keys),
    cmd!("exists", "keyspace", -2, false, false, generic::exists, all_args_keys),
    cmd!("expire", "keyspace", -3, true, false, generic::expire),
    cmd!("pexpire", "keyspace", -3, true, false, generic::pexpire),
    cmd!("expireat", "keyspace", -3, true, false, generic::expireat),
    cmd!("pexpireat", "keyspace", -3, true, false, generic::pexpireat),
    cmd!("ttl", "keyspace", 2, false, false, generic::ttl),
    cmd!("pttl", "keyspace", 2, false, false, generic::pttl),
    cmd!("expiretime", "keyspace", 2, false, false, generic::expiretime),
    cmd!("pexpiretime", "keyspace", 2, false, false, generic::pexpiretime),
    cmd!("persist", "keyspace", 2, true, false, generic::persist),
    cmd!("type", "keyspace", 2, false, false, generic::r#type),
    cmd!("rename", "keyspace", 3, true, false, generic::rename, first_two_args_keys),
    cmd!("renamenx", "keyspace", 3, true, false, generic::renamenx, first_two_args_keys),
    cmd!("keys", "keyspace", 2, false, false, generic::keys, no_keys),
    cmd!("randomkey", "keyspace", 1, false, false, generic::randomkey, no_keys),
    cmd!("scan", "keyspace", -2, false, false, generic::scan, no_keys),
    cmd!("touch", "keyspace", -2, false, false, generic::touch, all_args_keys),
    cmd!("copy", "keyspace", -3, true, false, generic::copy, first_two_args_keys),
    cmd!("dump", "keyspace", 2, false, false, generic::dump),
    cmd!("restore", "keyspace", -4, true, false, generic::restore),
    cmd!("sort", "keyspace", -2, true, false, generic::sort),
    cmd!("sort_ro", "keyspace", -2, false, false, generic::sort_ro),
    // Arity here is counted against the full `OBJECT <sub> key` request,
    // matching `commands::lookup`'s arity-checking convention.
    group!(
        "object",
        "keyspace",
        &[
            cmd!("encoding", "keyspace", 3, false, false, generic::object_encoding),
            cmd!("idletime", "keyspace", 3, false, false, generic::object_idletime),
            cmd!("refcount", "keyspace", 3, false, false, generic::object_refcount),
            cmd!("freq", "keyspace", 3, false, false, generic::object_freq),
        ]
    ),
    // strings
    cmd!("get", "string", 2, false, false, strings::get),
    cmd!("set", "string", -3, true, false, strings::set),
    cmd!("setnx", "string", 3, true, false, strings::setnx),
    cmd!("setex", "string", 4, true, false, strings::setex),
    cmd!("psetex", "string", 4, true, false, strings::psetex),
    cmd!("getset", "string", 3, true, false, strings::getset),
    cmd!("getdel", "string", 2, true, false, strings::getdel),
    cmd!("getex", "string", -2, true, false, strings::getex),
    cmd!("append", "string", 3, true, false, strings::append),
    cmd!("strlen", "string", 2, false, false, strings::strlen),
    cmd!("getrange", "string", 4, false, false, strings::getrange),
    cmd!("setrange", "string", 4, true, false, strings::setrange),
    cmd!("mget", "string", -2, false, false, strings::mget, all_args_keys),
    cmd!("mset", "string", -3, true, false, strings::mset, every_other_arg_key),
    cmd!("msetnx", "string", -3, true, false, strings::msetnx, every_other_arg_key),
    cmd!("incr", "string", 2, true, false, strings::incr),
    cmd!("decr", "string", 2, true, false, strings::decr),
    cmd!("incrby", "string", 3, true, false, strings::incrby),
    cmd!("decrby", "string", 3, true, false, strings::decrby),
    cmd!("incrbyfloat", "string", 3, true, false, strings::incrbyfloat),
    cmd!("lcs", "string", -3, false, false, strings::lcs, first_two_args_keys),
    cmd!("setbit", "string", 4, true, false, strings::setbit),
    cmd!("getbit", "string", 3, false, false, strings::getbit),
    cmd!("bitcount", "string", -2, false, false, strings::bitcount),
    cmd!("bitop", "string", -4, true, false, strings::bitop, strings::bitop_keys),
    // lists
    cmd!("lpush", "list", -3, true, false, lists::lpush),
    cmd!("rpush", "list", -3, true, false, lists::rpush),
    cmd!("lpushx", "list", -3, true, false, lists::lpushx),
    cmd!("rpushx", "list", -3, true, false, lists::rpushx),
    cmd!("llen", "list", 2, false, false, lists::llen),
    cmd!("lindex", "list", 3, false, false, lists::lindex),
    cmd!("lset", "list", 4, true, false, lists::lset),
    cmd!("lrange", "list", 4, false, false, lists::lrange),
    cmd!("ltrim", "list", 4, true, false, lists::ltrim),
    cmd!("lrem", "list", 4, true, false, lists::lrem),
    cmd!("linsert", "list", 5, true, false, lists::linsert),
    cmd!("lpos", "list", -3, false, false, lists::lpos),
    cmd!("lpop", "list", -2, true, false, lists::lpop),
    cmd!("rpop", "list", -2, true, false, lists::rpop),
    cmd!("rpoplpush", "list", 3, true, false, lists::rpoplpush, first_two_args_keys),
    cmd!("lmove", "list", 5, true, false, lists::lmove, first_two_args_keys),
    cmd!("lmpop", "list", -4, true, false, lists::lmpop, lists::lmpop_keys),
    cmd_async!("blpop", "list", -3, true, lists::blpop, all_but_last_arg_keys),
    cmd_async!("brpop", "list", -3, true, lists::brpop, all_but_last_arg_keys),
    cmd_async!("blmpop", "list", -5, true, lists::blmpop, lists::blmpop_keys),
    cmd_async!("blmove", "list", 6, true, lists::blmove, first_two_args_keys),
    cmd_async!("brpoplpush", "list", 4, true, lists::brpoplpush, first_two_args_keys),
    // hashes
    cmd!("hset", "hash", -4, true, false, hashes::hset),
    cmd!("hsetnx", "hash", 4, true, false, hashes::hsetnx),
    cmd!("hget", "hash", 3, false, false, hashes::hget),
    cmd!("hmget", "hash", -3, false, false, hashes::hmget),
    cmd!("hmset", "hash", -4, true, false, hashes::hmset),
    cmd!("hdel", "hash", -3, true, false, hashes::hdel),
    cmd!("hexists", "hash", 3, false, false, hashes::hexists),
    cmd!("hlen", "hash", 2, false, false, hashes::hlen),
    cmd!("hstrlen", "hash", 3, false, false, hashes::hstrlen),
    cmd!("hkeys", "hash", 2, false, false, hashes::hkeys),
    cmd!("hvals", "hash", 2, false, false, hashes::hvals),
    cmd!("hgetall", "hash", 2, false, false, hashes::hgetall),
    cmd!("hincrby", "hash", 4, true, false, hashes::hincrby),
    cmd!("hincrbyfloat", "hash", 4, true, false, hashes::hincrbyfloat),
    cmd!("hrandfield", "hash", -2, false, false, hashes::hrandfield),
    cmd!("hscan", "hash", -3, false, false, hashes::hscan),
    // sets
    cmd!("sadd", "set", -3, true, false, sets::sadd),
    cmd!("srem", "set", -3, true, false, sets::srem),
    cmd!("sismember", "set", 3, false, false, sets::sismember),
    cmd!("smismember", "set", -3, false, false, sets::smismember),
    cmd!("scard", "set", 2, false, false, sets::scard),
    cmd!("smembers", "set", 2, false, false, sets::smembers),
    cmd!("smove", "set", 4, true, false, sets::smove, first_two_args_keys),
    cmd!("spop", "set", -2, true, false, sets::spop),
    cmd!("srandmember", "set", -2, false, false, sets::srandmember),
    cmd!("sinter", "set", -2, false, false, sets::sinter, all_args_keys),
    cmd!("sintercard", "set", -3, false, false, sets::sintercard),
    cmd!("sunion", "set", -2, false, false, sets::sunion, all_args_keys),
    cmd!("sdiff", "set", -2, false, false, sets::sdiff, all_args_keys),
    cmd!("sinterstore", "set", -3, true, false, sets::sinterstore, all_args_keys),
    cmd!("sunionstore", "set", -3, true, false, sets::sunionstore, all_args_keys),
    cmd!("sdiffstore", "set", -3, true, false, sets::sdiffstore, all_args_keys),
    // sorted sets
    cmd!("zadd", "sortedset", -4, true, false, sorted_sets::zadd),
    cmd!("zcard", "sortedset", 2, false, false, sorted_sets::zcard),
    cmd!("zscore", "sortedset", 3, false, false, sorted_sets::zscore),
    cmd!("zmscore", "sortedset", -3, false, false, sorted_sets::zmscore),
    cmd!("zincrby", "sortedset", 4, true, false, sorted_sets::zincrby),
    cmd!("zrank", "sortedset", -3, false, false, sorted_sets::zrank),
    cmd!("zrevrank", "sortedset", -3, false, false, sorted_sets::zrevrank),
    cmd!("zcount", "sortedset", 4, false, false, sorted_sets::zcount),
    cmd!("zrange", "sortedset", -4, false, false, sorted_sets::zrange),
    cmd!("zrevrange", "sortedset", -4, false, false, sorted_sets::zrevrange),
    cmd!("zrangebyscore", "sortedset", -4, false, false, sorted_sets::zrangebyscore),
    cmd!("zrevrangebyscore", "sortedset", -4, false, false, sorted_sets::zrevrangebyscore),
    cmd!("zrangebylex", "sortedset", -4, false, false, sorted_sets::zrangebylex),
    cmd!("zrevrangebylex", "sortedset", -4, false, false, sorted_sets::zrevrangebylex),
    cmd!("zrangestore", "sortedset", -5, true, false, sorted_sets::zrangestore, first_two_args_keys),
    cmd!("zpopmin", "sortedset", -2, true, false, sorted_sets::zpopmin),
    cmd!("zpopmax", "sortedset", -2, true, false, sorted_sets::zpopmax),
    cmd!("zunion", "sortedset", -3, false, false, sorted_sets::zunion),
    cmd!("zinter", "sortedset", -3, false, false, sorted_sets::zinter),
    cmd!("zdiff", "sortedset", -3, false, false, sorted_sets::zdiff),
    cmd!("zintercard", "sortedset", -3, false, false, sorted_sets::zintercard),
    cmd!("zunionstore", "sortedset", -4, true, false, sorted_sets::zunionstore),
    cmd!("zinterstore", "sortedset", -4, true, false, sorted_sets::zinterstore),
    cmd!("zdiffstore", "sortedset", -4, true, false, sorted_sets::zdiffstore),
    cmd!("zmpop", "sortedset", -4, true, false, sorted_sets::zmpop),
    cmd_async!("bzpopmin", "sortedset", -3, true, sorted_sets::bzpopmin, all_but_last_arg_keys),
    cmd_async!("bzpopmax", "sortedset", -3, true, sorted_sets::bzpopmax, all_but_last_arg_keys),
    // streams
    cmd!("xadd", "stream", -5, true, false, streams::xadd),
    cmd!("xlen", "stream", 2, false, false, streams::xlen),
    cmd!("xdel", "stream", -3, true, false, streams::xdel),
    cmd!("xtrim", "stream", -4, true, false, streams::xtrim),
    cmd!("xrange", "stream", -4, false, false, streams::xrange),
    cmd!("xrevrange", "stream", -4, false, false, streams::xrevrange),
    cmd_async!("xread", "stream", -4, false, streams::xread, no_keys),
    cmd_async!("xreadgroup", "stream", -7, false, streams::xreadgroup, no_keys),
    cmd!("xack", "stream", -4, true, false, streams::xack),
    cmd!("xsetid", "stream", -3, true, false, streams::xsetid),
    cmd!("xgroup", "stream", -2, true, true, streams::xgroup, no_keys),
    cmd!("xpending", "stream", -3, false, false, streams::xpending),
    cmd!("xclaim", "stream", -6, true, false, streams::xclaim),
    cmd!("xautoclaim", "stream", -7, true, false, streams::xautoclaim),
    cmd!("xinfo", "stream", -2, false, true, streams::xinfo, no_keys),
];
