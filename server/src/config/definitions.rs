//! Built-in default values for every recognized config key, matching
//! upstream Redis/Valkey's own stock `redis.conf` defaults where a default
//! is meaningful for this server's scope.

use super::Config;
use crate::db::select::DEFAULT_DB_COUNT;

pub fn defaults() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: libsky::DEFAULT_PORT,
        requirepass: None,
        tls_port: None,
        timeout_secs: 0,
        maxclients: 10_000,
        unixsocket: None,
        maxmemory: None,
        notify_keyspace_events: String::new(),
        list_max_listpack_size: 128,
        hash_max_listpack_entries: 128,
        hash_max_listpack_value: 64,
        set_max_intset_entries: 512,
        set_max_listpack_entries: 128,
        zset_max_listpack_entries: 128,
        zset_max_listpack_value: 64,
        stream_node_max_entries: 100,
        availability_zone: None,
        databases: DEFAULT_DB_COUNT,
    }
}

/// Every key name `CONFIG GET`/`CONFIG SET` recognizes, for glob-matching
/// against a `CONFIG GET <pattern>` request.
pub fn all_keys() -> &'static [&'static str] {
    &[
        "port",
        "requirepass",
        "tls-port",
        "timeout",
        "maxclients",
        "unixsocket",
        "maxmemory",
        "notify-keyspace-events",
        "list-max-listpack-size",
        "hash-max-listpack-entries",
        "hash-max-listpack-value",
        "set-max-intset-entries",
        "set-max-listpack-entries",
        "zset-max-listpack-entries",
        "zset-max-listpack-value",
        "stream-node-max-entries",
        "availability-zone",
    ]
}
