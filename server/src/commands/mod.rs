//! Command implementations, grouped by the container they operate on, and
//! the static table the [`crate::router::Router`] is built from.

pub mod acl;
pub mod connection;
pub mod generic;
pub mod hashes;
pub mod lists;
pub mod sets;
pub mod server;
pub mod sorted_sets;
pub mod strings;
pub mod streams;
pub mod table;
pub mod transactions;

use bytes::Bytes;

use crate::acl::KeyMode;
use crate::client::Client;
use crate::context::ServerContext;
use crate::protocol::Reply;
use crate::router::{AsyncHandler, CommandSpec};
use crate::util::error::ServerError;

/// The default key extractor: the first argument is the one key this
/// command reads or writes. Correct for the large majority of commands
/// (`GET key`, `LPUSH key ...`, `HSET key ...`).
pub fn first_arg_key(args: &[Bytes]) -> Vec<Bytes> {
    args.first().cloned().into_iter().collect()
}

/// No keys at all (`PING`, `HELLO`, `CLIENT ...`).
pub fn no_keys(_args: &[Bytes]) -> Vec<Bytes> {
    Vec::new()
}

/// Every argument is a key (`DEL k1 k2 k3`, `EXISTS k1 k2`, `UNLINK ...`).
pub fn all_args_keys(args: &[Bytes]) -> Vec<Bytes> {
    args.to_vec()
}

/// The first two arguments are both keys (`RENAME src dst`, `LMOVE src dst ...`).
pub fn first_two_args_keys(args: &[Bytes]) -> Vec<Bytes> {
    args.iter().take(2).cloned().collect()
}

/// Every other argument starting at the first is a key (`MSET k1 v1 k2 v2`).
pub fn every_other_arg_key(args: &[Bytes]) -> Vec<Bytes> {
    args.iter().step_by(2).cloned().collect()
}

/// Every argument but the last is a key, the last being a timeout or count
/// (`BLPOP k1 k2 timeout`).
pub fn all_but_last_arg_keys(args: &[Bytes]) -> Vec<Bytes> {
    if args.is_empty() {
        return Vec::new();
    }
    args[..args.len() - 1].to_vec()
}

pub enum Callable {
    Sync(crate::router::Handler),
    Async(AsyncHandler),
}

pub struct Dispatched {
    pub name: &'static str,
    pub category: &'static str,
    pub is_write: bool,
    pub no_multi: bool,
    pub keys: Vec<Bytes>,
    pub call: Callable,
}

/// Why [`lookup`] couldn't produce a runnable [`Dispatched`] — kept distinct
/// from a plain `None` so the connection loop can tell an unknown command
/// from a known one called with the wrong number of arguments.
pub enum LookupError {
    UnknownCommand,
    WrongArity,
}

/// Resolves a command name to everything the connection loop needs to run
/// it and check it against the ACL, without yet running it. `args` is the
/// full argument list including the command name itself, matching the
/// arity convention [`crate::router::CommandSpec::arity_ok`] expects.
pub fn lookup(router: &crate::router::Router, name: &str, args: &[Bytes]) -> Result<(Dispatched, usize), LookupError> {
    let rest_in = args.get(1..).unwrap_or(&[]);
    let (spec, rest) = router.resolve(name, rest_in).ok_or(LookupError::UnknownCommand)?;
    // Arity is always counted against the full request including the
    // top-level command name, even for a subcommand leaf (`OBJECT ENCODING
    // key` has arity 3, not 2), matching the conventional Redis command table.
    if !spec.arity_ok(args.len()) {
        return Err(LookupError::WrongArity);
    }
    let consumed = args.len() - rest.len();
    let call = match spec.async_handler {
        Some(h) => Callable::Async(h),
        None => Callable::Sync(spec.handler),
    };
    Ok((
        Dispatched {
            name: spec.name,
            category: spec.category,
            is_write: spec.is_write,
            no_multi: spec.no_multi,
            keys: (spec.key_extractor)(rest),
            call,
        },
        consumed,
    ))
}

pub fn key_mode(d: &Dispatched) -> KeyMode {
    if d.is_write {
        KeyMode::Write
    } else {
        KeyMode::Read
    }
}

macro_rules! cmd {
    ($name:literal, $category:literal, $arity:expr, $write:expr, $no_multi:expr, $handler:path) => {
        CommandSpec {
            name: $name,
            category: $category,
            arity: $arity,
            is_write: $write,
            no_multi: $no_multi,
            handler: $handler,
            async_handler: None,
            subcommands: &[],
            key_extractor: first_arg_key,
        }
    };
    ($name:literal, $category:literal, $arity:expr, $write:expr, $no_multi:expr, $handler:path, $keys:path) => {
        CommandSpec {
            name: $name,
            category: $category,
            arity: $arity,
            is_write: $write,
            no_multi: $no_multi,
            handler: $handler,
            async_handler: None,
            subcommands: &[],
            key_extractor: $keys,
        }
    };
}

macro_rules! cmd_async {
    ($name:literal, $category:literal, $arity:expr, $write:expr, $handler:path, $keys:path) => {
        CommandSpec {
            name: $name,
            category: $category,
            arity: $arity,
            is_write: $write,
            no_multi: true,
            handler: not_implemented,
            async_handler: Some($handler),
            subcommands: &[],
            key_extractor: $keys,
        }
    };
}

macro_rules! group {
    ($name:literal, $category:literal, $subcommands:expr) => {
        CommandSpec {
            name: $name,
            category: $category,
            arity: -2,
            is_write: false,
            no_multi: false,
            handler: not_implemented,
            async_handler: None,
            subcommands: $subcommands,
            key_extractor: no_keys,
        }
    };
}

pub(crate) use cmd;
pub(crate) use cmd_async;
pub(crate) use group;

pub type DispatchResult = Result<Reply, ServerError>;

pub fn dispatch_error(e: ServerError) -> Reply {
    Reply::from_error(e)
}

pub fn not_implemented(_ctx: &ServerContext, _c: &mut Client, _args: &[Bytes]) -> DispatchResult {
    Err(ServerError::generic("this command is recognized but not implemented"))
}
