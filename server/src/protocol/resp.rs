//! Encodes server replies, adapting to the negotiated protocol version.
//!
//! RESP2 has no map, set, double, or boolean wire types — those collapse to
//! arrays, bulk strings, and integers respectively. RESP3 clients (after
//! `HELLO 3`) get the richer types directly.

use bytes::{BufMut, Bytes, BytesMut};

use super::ProtoVer;
use crate::util::error::ServerError;

#[derive(Debug, Clone)]
pub enum Reply {
    Simple(&'static str),
    Error(ServerError),
    Integer(i64),
    Bulk(Bytes),
    Nil,
    Array(Vec<Reply>),
    /// RESP3 map; RESP2 flattens to an array of alternating key/value.
    Map(Vec<(Reply, Reply)>),
    /// RESP3 double; RESP2 renders as a bulk string.
    Double(f64),
    /// RESP3 boolean; RESP2 renders as integer 0/1.
    Bool(bool),
    /// RESP3 big number; RESP2 renders as a bulk string.
    BigNumber(String),
    /// RESP3 push message (used for pub/sub hooks); RESP2 renders as an array.
    Push(Vec<Reply>),
    /// RESP3 verbatim string; RESP2 renders as a plain bulk string.
    Verbatim(&'static str, String),
    NoReply,
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK")
    }

    pub fn from_bytes(b: Bytes) -> Self {
        Reply::Bulk(b)
    }

    pub fn from_error(e: ServerError) -> Self {
        Reply::Error(e)
    }

    pub fn bulk_str(s: impl Into<String>) -> Self {
        Reply::Bulk(Bytes::from(s.into().into_bytes()))
    }

    pub fn write(&self, proto: ProtoVer, out: &mut BytesMut) {
        match self {
            Reply::Simple(s) => {
                out.put_u8(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Error(e) => {
                out.put_u8(b'-');
                out.extend_from_slice(e.kind.prefix().as_bytes());
                out.put_u8(b' ');
                out.extend_from_slice(e.message.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Integer(n) => {
                out.put_u8(b':');
                out.extend_from_slice(n.to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(b) => {
                out.put_u8(b'$');
                out.extend_from_slice(b.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(b);
                out.extend_from_slice(b"\r\n");
            }
            Reply::Nil => match proto {
                ProtoVer::Resp2 => out.extend_from_slice(b"$-1\r\n"),
                ProtoVer::Resp3 => out.extend_from_slice(b"_\r\n"),
            },
            Reply::Array(items) => {
                out.put_u8(b'*');
                out.extend_from_slice(items.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                for item in items {
                    item.write(proto, out);
                }
            }
            Reply::Map(pairs) => match proto {
                ProtoVer::Resp3 => {
                    out.put_u8(b'%');
                    out.extend_from_slice(pairs.len().to_string().as_bytes());
                    out.extend_from_slice(b"\r\n");
                    for (k, v) in pairs {
                        k.write(proto, out);
                        v.write(proto, out);
                    }
                }
                ProtoVer::Resp2 => {
                    out.put_u8(b'*');
                    out.extend_from_slice((pairs.len() * 2).to_string().as_bytes());
                    out.extend_from_slice(b"\r\n");
                    for (k, v) in pairs {
                        k.write(proto, out);
                        v.write(proto, out);
                    }
                }
            },
            Reply::Double(d) => match proto {
                ProtoVer::Resp3 => {
                    out.put_u8(b',');
                    out.extend_from_slice(format_double(*d).as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                ProtoVer::Resp2 => Reply::Bulk(Bytes::from(format_double(*d))).write(proto, out),
            },
            Reply::Bool(b) => match proto {
                ProtoVer::Resp3 => {
                    out.extend_from_slice(if *b { b"#t\r\n" } else { b"#f\r\n" });
                }
                ProtoVer::Resp2 => Reply::Integer(if *b { 1 } else { 0 }).write(proto, out),
            },
            Reply::BigNumber(s) => match proto {
                ProtoVer::Resp3 => {
                    out.put_u8(b'(');
                    out.extend_from_slice(s.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                ProtoVer::Resp2 => Reply::Bulk(Bytes::from(s.clone())).write(proto, out),
            },
            Reply::Push(items) => match proto {
                ProtoVer::Resp3 => {
                    out.put_u8(b'>');
                    out.extend_from_slice(items.len().to_string().as_bytes());
                    out.extend_from_slice(b"\r\n");
                    for item in items {
                        item.write(proto, out);
                    }
                }
                ProtoVer::Resp2 => Reply::Array(items.clone()).write(proto, out),
            },
            Reply::Verbatim(fmt, s) => match proto {
                ProtoVer::Resp3 => {
                    let payload = format!("{}:{}", fmt, s);
                    out.put_u8(b'=');
                    out.extend_from_slice(payload.len().to_string().as_bytes());
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(payload.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                ProtoVer::Resp2 => Reply::Bulk(Bytes::from(s.clone())).write(proto, out),
            },
            Reply::NoReply => {}
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_infinite() {
        if d > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else if d.is_nan() {
        "nan".to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e17 {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resp2_nil_is_dollar_minus_one() {
        let mut out = BytesMut::new();
        Reply::Nil.write(ProtoVer::Resp2, &mut out);
        assert_eq!(&out[..], b"$-1\r\n");
    }

    #[test]
    fn resp3_nil_is_underscore() {
        let mut out = BytesMut::new();
        Reply::Nil.write(ProtoVer::Resp3, &mut out);
        assert_eq!(&out[..], b"_\r\n");
    }

    #[test]
    fn resp2_map_flattens_to_array() {
        let mut out = BytesMut::new();
        let map = Reply::Map(vec![(Reply::bulk_str("a"), Reply::Integer(1))]);
        map.write(ProtoVer::Resp2, &mut out);
        assert_eq!(&out[..], b"*2\r\n$1\r\na\r\n:1\r\n");
    }

    #[test]
    fn resp3_map_uses_percent_type() {
        let mut out = BytesMut::new();
        let map = Reply::Map(vec![(Reply::bulk_str("a"), Reply::Integer(1))]);
        map.write(ProtoVer::Resp3, &mut out);
        assert_eq!(&out[..], b"%1\r\n$1\r\na\r\n:1\r\n");
    }

    #[test]
    fn error_renders_with_kind_prefix() {
        let mut out = BytesMut::new();
        Reply::Error(ServerError::wrong_type()).write(ProtoVer::Resp2, &mut out);
        assert!(out.starts_with(b"-WRONGTYPE"));
    }
}
