//! Dispatches a decoded command to its handler via a trie over
//! case-folded command tokens, with one extra level for commands that take
//! a subcommand (`CLIENT LIST`, `XGROUP CREATE`, ...).

use std::collections::HashMap;

use bytes::Bytes;

use crate::acl::KeyMode;
use crate::client::Client;
use crate::context::ServerContext;
use crate::protocol::Reply;
use crate::util::error::ServerError;

pub type Handler = fn(&ServerContext, &mut Client, &[Bytes]) -> Result<Reply, ServerError>;

/// A boxed, `Send` future, used for the handful of commands (`BLPOP` and
/// its siblings, `XREAD BLOCK`) that may need to suspend the connection
/// task while waiting on the [`crate::blocking::BlockingManager`].
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
pub type AsyncHandler =
    for<'a> fn(&'a ServerContext, &'a mut Client, &'a [Bytes]) -> BoxFuture<'a, Result<Reply, ServerError>>;

/// Static metadata about a command used for ACL checks and `COMMAND` output,
/// independent of how its body is implemented.
pub struct CommandSpec {
    pub name: &'static str,
    pub category: &'static str,
    pub arity: i32, // negative means "at least |arity|"
    pub is_write: bool,
    pub no_multi: bool,
    pub handler: Handler,
    /// Set instead of relying solely on `handler` for commands that can
    /// block (`BLPOP`, `BRPOP`, `BLMOVE`, `BZPOPMIN`, ...). When present,
    /// the connection loop awaits this instead of calling `handler`.
    pub async_handler: Option<AsyncHandler>,
    pub subcommands: &'static [CommandSpec],
    pub key_extractor: fn(&[Bytes]) -> Vec<Bytes>,
}

impl CommandSpec {
    pub fn arity_ok(&self, argc: usize) -> bool {
        if self.arity >= 0 {
            argc == self.arity as usize
        } else {
            argc >= (-self.arity) as usize
        }
    }
}

pub struct Router {
    commands: HashMap<&'static str, &'static CommandSpec>,
}

impl Router {
    pub fn new(table: &'static [CommandSpec]) -> Self {
        let mut commands = HashMap::new();
        for spec in table {
            commands.insert(spec.name, spec);
        }
        Self { commands }
    }

    pub fn find(&self, name: &str) -> Option<&'static CommandSpec> {
        self.commands.get(name.to_ascii_lowercase().as_str()).copied()
    }

    /// Resolves a command name plus its remaining args down through any
    /// subcommand level, returning the leaf spec and the args left for its
    /// handler (the subcommand token itself is stripped).
    pub fn resolve<'a>(&self, name: &str, args: &'a [Bytes]) -> Option<(&'static CommandSpec, &'a [Bytes])> {
        let top = self.find(name)?;
        if top.subcommands.is_empty() {
            return Some((top, args));
        }
        let sub_name = args.first()?;
        let sub_name = std::str::from_utf8(sub_name).ok()?.to_ascii_lowercase();
        let sub = top.subcommands.iter().find(|s| s.name == sub_name)?;
        Some((sub, &args[1..]))
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }
}

/// Which keys a command touches and in which mode, for ACL checks. Most
/// commands have a fixed key position; this is filled in per-command by the
/// dispatch layer in `commands::mod` rather than derived generically, since
/// key positions vary too much (first arg, every-other arg, `numkeys`
/// prefixed) to express declaratively without more machinery than it saves.
pub struct KeySpec {
    pub key: Bytes,
    pub mode: KeyMode,
}
