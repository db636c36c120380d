//! Layered configuration: built-in defaults, an optional YAML config file,
//! and CLI flags, in that order of increasing precedence — the same
//! layering the teacher's `Configset` builds, simplified down to the
//! surface this server actually recognizes.

pub mod definitions;

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::util::error::ServerError;

#[derive(Parser, Debug)]
#[command(name = "valkd", about = "An in-memory, single-node RESP key-value server")]
pub struct Cli {
    #[arg(long, default_value_t = libsky::DEFAULT_PORT)]
    pub port: u16,
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub requirepass: Option<String>,
    #[arg(long)]
    pub unixsocket: Option<PathBuf>,
    #[arg(long)]
    pub maxclients: Option<u32>,
}

/// The YAML-file-shaped subset of [`Config`]; every field is optional so a
/// config file only needs to mention what it overrides.
#[derive(Deserialize, Default, Debug)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub requirepass: Option<String>,
    pub tls_port: Option<u16>,
    pub timeout: Option<u64>,
    pub maxclients: Option<u32>,
    pub unixsocket: Option<String>,
    pub maxmemory: Option<String>,
    pub notify_keyspace_events: Option<String>,
    pub list_max_listpack_size: Option<i64>,
    pub hash_max_listpack_entries: Option<u64>,
    pub hash_max_listpack_value: Option<u64>,
    pub set_max_intset_entries: Option<u64>,
    pub set_max_listpack_entries: Option<u64>,
    pub zset_max_listpack_entries: Option<u64>,
    pub zset_max_listpack_value: Option<u64>,
    pub stream_node_max_entries: Option<u64>,
    pub availability_zone: Option<String>,
    pub databases: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub requirepass: Option<String>,
    pub tls_port: Option<u16>,
    pub timeout_secs: u64,
    pub maxclients: u32,
    pub unixsocket: Option<String>,
    pub maxmemory: Option<String>,
    pub notify_keyspace_events: String,
    pub list_max_listpack_size: i64,
    pub hash_max_listpack_entries: u64,
    pub hash_max_listpack_value: u64,
    pub set_max_intset_entries: u64,
    pub set_max_listpack_entries: u64,
    pub zset_max_listpack_entries: u64,
    pub zset_max_listpack_value: u64,
    pub stream_node_max_entries: u64,
    pub availability_zone: Option<String>,
    pub databases: usize,
}

impl Default for Config {
    fn default() -> Self {
        definitions::defaults()
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, ServerError> {
        let mut cfg = Config::default();
        if let Some(path) = &cli.config {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ServerError::generic(format!("cannot read config file: {e}")))?;
            let file: FileConfig = serde_yaml::from_str(&text)
                .map_err(|e| ServerError::generic(format!("invalid config file: {e}")))?;
            cfg.merge_file(file);
        }
        cfg.port = cli.port;
        cfg.host = cli.host.clone();
        if let Some(p) = &cli.requirepass {
            cfg.requirepass = Some(p.clone());
        }
        if let Some(u) = &cli.unixsocket {
            cfg.unixsocket = Some(u.to_string_lossy().into_owned());
        }
        if let Some(m) = cli.maxclients {
            cfg.maxclients = m;
        }
        Ok(cfg)
    }

    fn merge_file(&mut self, f: FileConfig) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = f.$field {
                    self.$field = v;
                }
            };
        }
        take!(port);
        take!(host);
        take!(maxclients);
        take!(maxmemory);
        take!(notify_keyspace_events);
        take!(list_max_listpack_size);
        take!(hash_max_listpack_entries);
        take!(hash_max_listpack_value);
        take!(set_max_intset_entries);
        take!(set_max_listpack_entries);
        take!(zset_max_listpack_entries);
        take!(zset_max_listpack_value);
        take!(stream_node_max_entries);
        take!(databases);
        if f.requirepass.is_some() {
            self.requirepass = f.requirepass;
        }
        if f.tls_port.is_some() {
            self.tls_port = f.tls_port;
        }
        if let Some(t) = f.timeout {
            self.timeout_secs = t;
        }
        if f.unixsocket.is_some() {
            self.unixsocket = f.unixsocket;
        }
        if f.availability_zone.is_some() {
            self.availability_zone = f.availability_zone;
        }
    }

    /// The surface `CONFIG GET`/`CONFIG SET` recognizes, by name. Used so
    /// an unknown key is reported distinctly from a recognized-but-not-set one.
    pub fn get(&self, key: &str) -> Option<String> {
        Some(match key.to_ascii_lowercase().as_str() {
            "port" => self.port.to_string(),
            "requirepass" => self.requirepass.clone().unwrap_or_default(),
            "tls-port" => self.tls_port.unwrap_or(0).to_string(),
            "timeout" => self.timeout_secs.to_string(),
            "maxclients" => self.maxclients.to_string(),
            "unixsocket" => self.unixsocket.clone().unwrap_or_default(),
            "maxmemory" => self.maxmemory.clone().unwrap_or_else(|| "0".into()),
            "notify-keyspace-events" => self.notify_keyspace_events.clone(),
            "list-max-listpack-size" => self.list_max_listpack_size.to_string(),
            "hash-max-listpack-entries" => self.hash_max_listpack_entries.to_string(),
            "hash-max-listpack-value" => self.hash_max_listpack_value.to_string(),
            "set-max-intset-entries" => self.set_max_intset_entries.to_string(),
            "set-max-listpack-entries" => self.set_max_listpack_entries.to_string(),
            "zset-max-listpack-entries" => self.zset_max_listpack_entries.to_string(),
            "zset-max-listpack-value" => self.zset_max_listpack_value.to_string(),
            "stream-node-max-entries" => self.stream_node_max_entries.to_string(),
            "availability-zone" => self.availability_zone.clone().unwrap_or_default(),
            _ => return None,
        })
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ServerError> {
        match key.to_ascii_lowercase().as_str() {
            "requirepass" => self.requirepass = if value.is_empty() { None } else { Some(value.to_string()) },
            "maxclients" => self.maxclients = value.parse().map_err(|_| ServerError::not_an_integer())?,
            "notify-keyspace-events" => self.notify_keyspace_events = value.to_string(),
            "list-max-listpack-size" => {
                self.list_max_listpack_size = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "hash-max-listpack-entries" => {
                self.hash_max_listpack_entries = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "hash-max-listpack-value" => {
                self.hash_max_listpack_value = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "set-max-intset-entries" => {
                self.set_max_intset_entries = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "set-max-listpack-entries" => {
                self.set_max_listpack_entries = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "zset-max-listpack-entries" => {
                self.zset_max_listpack_entries = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "zset-max-listpack-value" => {
                self.zset_max_listpack_value = value.parse().map_err(|_| ServerError::not_an_integer())?
            }
            "maxmemory" => self.maxmemory = Some(value.to_string()),
            _ if self.get(key).is_some() => {
                return Err(ServerError::generic(format!(
                    "CONFIG SET failed - not supported for '{key}'"
                )))
            }
            _ => return Err(ServerError::generic(format!("Unknown option '{key}'"))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_config_key_is_none() {
        let cfg = Config::default();
        assert!(cfg.get("not-a-real-key").is_none());
    }

    #[test]
    fn recognized_key_roundtrips_through_set() {
        let mut cfg = Config::default();
        cfg.set("maxclients", "42").unwrap();
        assert_eq!(cfg.get("maxclients").unwrap(), "42");
    }
}
