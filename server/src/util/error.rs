//! The one error type that every fallible path in this crate converges to.
//!
//! A [`ServerError`] knows exactly how it should look on the wire (an error
//! kind prefix and a message), so handlers can bubble failures up with `?`
//! all the way to the connection loop, which is the only place that needs to
//! know how to serialize one.

use std::fmt;

/// Coarse error classification, mirrored from the RESP error-kind prefixes
/// a real client would recognize (`ERR`, `WRONGTYPE`, `NOPERM`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic error, prefixed `ERR`
    Generic,
    /// Operation against a key holding the wrong type
    WrongType,
    /// Value is not an integer or out of range
    NotAnInteger,
    /// Value is not a valid float
    NotAFloat,
    /// Syntax error in the wrong number/shape of arguments
    Syntax,
    /// No such key
    NoSuchKey,
    /// Authentication required or failed
    NoAuth,
    /// Wrong username/password pair, or a disabled user
    WrongPass,
    /// Insufficient permissions
    NoPerm,
    /// MULTI/EXEC protocol violation
    ExecAbort,
    /// WATCH/EXEC failed optimistic lock
    TxAborted,
    /// Client requested UNBLOCK
    Unblocked,
    /// Used where the server is out of a resource, e.g. max clients
    OutOfResources,
    /// Malformed RESP framing
    Protocol,
    /// Unsupported RESP protocol version requested via `HELLO`
    NoProto,
    /// Consumer group related errors (XGROUP/XREADGROUP family)
    NoGroup,
    /// Busy group creation (XGROUP CREATE on existing group without MKSTREAM semantics)
    BusyGroup,
}

impl ErrorKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ErrorKind::Generic => "ERR",
            ErrorKind::WrongType => "WRONGTYPE",
            ErrorKind::NotAnInteger => "ERR",
            ErrorKind::NotAFloat => "ERR",
            ErrorKind::Syntax => "ERR",
            ErrorKind::NoSuchKey => "ERR",
            ErrorKind::NoAuth => "NOAUTH",
            ErrorKind::WrongPass => "WRONGPASS",
            ErrorKind::NoPerm => "NOPERM",
            ErrorKind::ExecAbort => "EXECABORT",
            ErrorKind::TxAborted => "ERR",
            ErrorKind::Unblocked => "UNBLOCKED",
            ErrorKind::OutOfResources => "ERR",
            ErrorKind::Protocol => "ERR",
            ErrorKind::NoProto => "NOPROTO",
            ErrorKind::NoGroup => "NOGROUP",
            ErrorKind::BusyGroup => "BUSYGROUP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    pub fn wrong_type() -> Self {
        Self::new(
            ErrorKind::WrongType,
            "Operation against a key holding the wrong kind of value",
        )
    }

    pub fn not_an_integer() -> Self {
        Self::new(ErrorKind::NotAnInteger, "value is not an integer or out of range")
    }

    pub fn not_a_float() -> Self {
        Self::new(ErrorKind::NotAFloat, "value is not a valid float")
    }

    pub fn syntax() -> Self {
        Self::new(ErrorKind::Syntax, "syntax error")
    }

    pub fn wrong_args(cmd: &str) -> Self {
        Self::new(
            ErrorKind::Generic,
            format!("wrong number of arguments for '{}' command", cmd.to_ascii_lowercase()),
        )
    }

    pub fn unknown_command(cmd: &str, args: &[bytes::Bytes]) -> Self {
        let rendered: Vec<String> = args
            .iter()
            .map(|a| format!("'{}'", String::from_utf8_lossy(a)))
            .collect();
        Self::new(
            ErrorKind::Generic,
            format!(
                "unknown command '{}', with args beginning with: {}",
                cmd,
                rendered.join(", ")
            ),
        )
    }

    pub fn no_such_key() -> Self {
        Self::new(ErrorKind::NoSuchKey, "no such key")
    }

    pub fn no_auth() -> Self {
        Self::new(ErrorKind::NoAuth, "Authentication required.")
    }

    pub fn wrong_pass() -> Self {
        Self::new(
            ErrorKind::WrongPass,
            "invalid username-password pair or user is disabled.",
        )
    }

    pub fn no_perm(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoPerm, detail)
    }

    pub fn exec_abort() -> Self {
        Self::new(
            ErrorKind::ExecAbort,
            "Transaction discarded because of previous errors.",
        )
    }

    pub fn unblocked() -> Self {
        Self::new(
            ErrorKind::Unblocked,
            "client unblocked via CLIENT UNBLOCK",
        )
    }

    pub fn no_proto() -> Self {
        Self::new(ErrorKind::NoProto, "unsupported protocol version")
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, format!("Protocol error: {}", detail.into()))
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.prefix(), self.message)
    }
}

impl std::error::Error for ServerError {}

pub type CommandResult<T> = Result<T, ServerError>;
