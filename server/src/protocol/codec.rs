//! Decodes a single client request (a RESP array of bulk strings) out of a
//! connection's read buffer.
//!
//! Real clients always speak the "multibulk" request form — `*<n>\r\n` then
//! `n` bulk strings — regardless of whether the connection has negotiated
//! RESP2 or RESP3 replies; RESP3 only changes what the *server* may send
//! back. Decoding therefore has a single code path independent of
//! [`super::ProtoVer`].

use bytes::{Buf, Bytes, BytesMut};

use crate::util::error::ServerError;

pub enum DecodeOutcome {
    /// Not enough bytes buffered yet; caller should read more and retry.
    Incomplete,
    /// A full command was decoded; the arguments are in order, command name first.
    Ready(Vec<Bytes>),
}

/// Finds a `\r\n` terminated line starting at `buf[0..]`, without consuming it.
fn find_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_len(line: &[u8], what: &str) -> Result<i64, ServerError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ServerError::protocol(format!("invalid {what} length")))
}

/// Attempts to decode one full request from `buf`. On success the consumed
/// bytes are advanced out of `buf`. On [`DecodeOutcome::Incomplete`] nothing
/// is consumed so the caller can append more bytes and retry from scratch.
pub fn decode_request(buf: &mut BytesMut) -> Result<DecodeOutcome, ServerError> {
    if buf.is_empty() {
        return Ok(DecodeOutcome::Incomplete);
    }

    // Inline commands: a line not starting with '*' is a plain space-separated
    // command, as real clients (e.g. telnet, redis-cli piping) may send.
    if buf[0] != b'*' {
        return decode_inline(buf);
    }

    let mut cursor = 0usize;
    let header_end = match find_line(&buf[cursor..]) {
        Some(pos) => pos,
        None => {
            // An unterminated header line that keeps growing without ever
            // finding `\r\n` is the desync case (e.g. a bare `*\x00` never
            // followed by a newline): bound it the same way `decode_inline`
            // bounds its line search, so the connection eventually errors
            // out instead of buffering forever.
            if buf.len() - cursor > 64 * 1024 {
                return Err(ServerError::protocol("invalid multibulk length"));
            }
            return Ok(DecodeOutcome::Incomplete);
        }
    };
    let argc = parse_len(&buf[cursor + 1..cursor + header_end], "multibulk")?;
    if argc < 0 {
        // A null array request is nonsensical from a client; treat as empty.
        buf.advance(cursor + header_end + 2);
        return Ok(DecodeOutcome::Ready(Vec::new()));
    }
    if argc > 1024 * 1024 {
        return Err(ServerError::protocol("invalid multibulk length"));
    }
    cursor += header_end + 2;

    let mut args = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        if cursor >= buf.len() {
            return Ok(DecodeOutcome::Incomplete);
        }
        if buf[cursor] != b'$' {
            return Err(ServerError::protocol(format!(
                "expected '$', got '{}'",
                buf[cursor] as char
            )));
        }
        let line_end = match find_line(&buf[cursor + 1..]) {
            Some(pos) => pos,
            None => {
                if buf.len() - (cursor + 1) > 64 * 1024 {
                    return Err(ServerError::protocol("invalid bulk length"));
                }
                return Ok(DecodeOutcome::Incomplete);
            }
        };
        let len = parse_len(&buf[cursor + 1..cursor + 1 + line_end], "bulk")?;
        if len < 0 || len > 512 * 1024 * 1024 {
            return Err(ServerError::protocol("invalid bulk length"));
        }
        let len = len as usize;
        let data_start = cursor + 1 + line_end + 2;
        let data_end = data_start + len;
        if data_end + 2 > buf.len() {
            return Ok(DecodeOutcome::Incomplete);
        }
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Err(ServerError::protocol("expected CRLF after bulk string"));
        }
        args.push(Bytes::copy_from_slice(&buf[data_start..data_end]));
        cursor = data_end + 2;
    }

    buf.advance(cursor);
    Ok(DecodeOutcome::Ready(args))
}

fn decode_inline(buf: &mut BytesMut) -> Result<DecodeOutcome, ServerError> {
    let line_end = match find_line(buf) {
        Some(pos) => pos,
        None => {
            if buf.len() > 64 * 1024 {
                return Err(ServerError::protocol("too big inline request"));
            }
            return Ok(DecodeOutcome::Incomplete);
        }
    };
    let line = buf[..line_end].to_vec();
    buf.advance(line_end + 2);
    let args = line
        .split(|b| *b == b' ')
        .filter(|w| !w.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();
    Ok(DecodeOutcome::Ready(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_simple_multibulk() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n"[..]);
        match decode_request(&mut buf).unwrap() {
            DecodeOutcome::Ready(args) => {
                assert_eq!(args, vec![Bytes::from_static(b"GET"), Bytes::from_static(b"foo")]);
            }
            DecodeOutcome::Incomplete => panic!("expected a full request"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn reports_incomplete_on_partial_input() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nfo"[..]);
        let before = buf.clone();
        match decode_request(&mut buf).unwrap() {
            DecodeOutcome::Incomplete => {}
            DecodeOutcome::Ready(_) => panic!("expected incomplete"),
        }
        assert_eq!(buf, before);
    }

    #[test]
    fn rejects_bad_type_byte() {
        let mut buf = BytesMut::from(&b"*1\r\n:3\r\n"[..]);
        assert!(decode_request(&mut buf).is_err());
    }

    #[test]
    fn multibulk_header_without_crlf_eventually_errors() {
        let mut buf = BytesMut::from(&b"*"[..]);
        buf.extend_from_slice(&vec![b'\x00'; 128 * 1024]);
        match decode_request(&mut buf) {
            Err(_) => {}
            Ok(_) => panic!("expected the oversized unterminated header to error"),
        }
    }

    #[test]
    fn bad_bulk_length_reports_invalid_bulk_length() {
        let mut buf = BytesMut::from(&b"*1\r\n$x\r\nab\r\n"[..]);
        match decode_request(&mut buf) {
            Err(e) => assert!(e.message.contains("invalid bulk length")),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn decodes_inline_command() {
        let mut buf = BytesMut::from(&b"PING\r\n"[..]);
        match decode_request(&mut buf).unwrap() {
            DecodeOutcome::Ready(args) => assert_eq!(args, vec![Bytes::from_static(b"PING")]),
            DecodeOutcome::Incomplete => panic!("expected a full request"),
        }
    }
}
