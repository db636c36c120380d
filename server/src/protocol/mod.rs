//! RESP2/RESP3 wire protocol: decoding client requests and encoding replies.

pub mod codec;
pub mod resp;

pub use codec::{decode_request, DecodeOutcome};
pub use resp::Reply;

/// The two protocol versions a connection can be negotiated to via `HELLO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoVer {
    Resp2,
    Resp3,
}

impl Default for ProtoVer {
    fn default() -> Self {
        ProtoVer::Resp2
    }
}
