//! A small declarative interpreter for command argument shapes.
//!
//! Most RESP commands are a fixed positional prefix (`SET key value`)
//! followed by an open set of case-insensitive keyword options, some of
//! which take a value (`EX seconds`), some of which are bare flags (`NX`),
//! and some of which are small tuples (`LIMIT offset count`). Rather than
//! hand-writing that loop in every command body, a [`Schema`] declares the
//! shape once and [`Schema::parse`] walks the raw argument vector against
//! it, leaving command bodies to just read typed values out of the result.
//!
//! Commands whose argument shape is simple positional-only (most of them)
//! skip the schema and use [`ArgReader`] directly — the same cursor
//! [`Schema::parse`] is built on.

use std::collections::HashMap;

use bytes::Bytes;

use crate::util::error::ServerError;

/// A cursor over a command's argument vector (the name itself already
/// stripped by the router). Every scalar extraction method advances the
/// cursor and produces a `ServerError` shaped like a real client would see.
pub struct ArgReader<'a> {
    cmd: &'a str,
    args: &'a [Bytes],
    pos: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(cmd: &'a str, args: &'a [Bytes]) -> Self {
        Self { cmd, args, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.args.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn rest(&self) -> &'a [Bytes] {
        &self.args[self.pos..]
    }

    fn wrong_args(&self) -> ServerError {
        ServerError::wrong_args(self.cmd)
    }

    pub fn next(&mut self) -> Result<&'a Bytes, ServerError> {
        let item = self.args.get(self.pos).ok_or_else(|| self.wrong_args())?;
        self.pos += 1;
        Ok(item)
    }

    pub fn peek(&self) -> Option<&'a Bytes> {
        self.args.get(self.pos)
    }

    /// Case-insensitively checks whether the next token equals `word`,
    /// consuming it if so.
    pub fn eat_keyword(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(b) if b.eq_ignore_ascii_case(word.as_bytes()) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    pub fn next_bytes(&mut self) -> Result<Bytes, ServerError> {
        self.next().cloned()
    }

    pub fn next_string(&mut self) -> Result<String, ServerError> {
        let b = self.next()?;
        String::from_utf8(b.to_vec()).map_err(|_| ServerError::syntax())
    }

    pub fn next_i64(&mut self) -> Result<i64, ServerError> {
        let b = self.next()?;
        parse_i64(b)
    }

    pub fn next_u64(&mut self) -> Result<u64, ServerError> {
        let n = self.next_i64()?;
        if n < 0 {
            return Err(ServerError::generic("value is out of range, must be positive"));
        }
        Ok(n as u64)
    }

    pub fn next_f64(&mut self) -> Result<f64, ServerError> {
        let b = self.next()?;
        parse_f64(b)
    }

    pub fn expect_end(&self) -> Result<(), ServerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServerError::syntax())
        }
    }
}

pub fn parse_i64(b: &[u8]) -> Result<i64, ServerError> {
    std::str::from_utf8(b)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(ServerError::not_an_integer)
}

pub fn parse_f64(b: &[u8]) -> Result<f64, ServerError> {
    let s = std::str::from_utf8(b).map_err(|_| ServerError::not_a_float())?;
    match s.trim().to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => return Ok(f64::INFINITY),
        "-inf" | "-infinity" => return Ok(f64::NEG_INFINITY),
        _ => {}
    }
    let v: f64 = s.trim().parse().map_err(|_| ServerError::not_a_float())?;
    if v.is_nan() {
        return Err(ServerError::not_a_float());
    }
    Ok(v)
}

/// The typed shape a keyword option's value should take.
#[derive(Clone, Copy)]
pub enum ParamKind {
    Bytes,
    Int,
    Float,
}

/// A declared keyword option (`EX seconds`, `NX`, `LIMIT offset count`, ...).
pub struct KeywordParam {
    pub name: &'static str,
    /// Wire tokens, uppercase, any of which triggers this option (e.g. `&["EX"]`).
    pub tokens: &'static [&'static str],
    /// `None` for a bare flag; `Some(kinds)` for a value/tuple taking that many typed args.
    pub value: Option<&'static [ParamKind]>,
    /// At most one option from the same group may be present (e.g. NX vs XX vs GT vs LT).
    pub exclusive_group: Option<&'static str>,
}

pub struct Schema {
    /// Fixed positional parameters consumed before any keyword scanning starts.
    pub positional: &'static [&'static str],
    pub keywords: &'static [KeywordParam],
}

#[derive(Debug, Clone)]
pub enum ParamValue {
    Bytes(Bytes),
    Int(i64),
    Float(f64),
    Flag,
    Tuple(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ParamValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

pub struct ParsedArgs {
    pub positional: HashMap<&'static str, Bytes>,
    pub keywords: HashMap<&'static str, ParamValue>,
}

impl ParsedArgs {
    pub fn positional(&self, name: &str) -> &Bytes {
        self.positional
            .get(name)
            .expect("schema positional field missing at parse time")
    }

    pub fn has(&self, name: &str) -> bool {
        self.keywords.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.keywords.get(name)
    }
}

impl Schema {
    pub fn parse(&self, cmd: &str, args: &[Bytes]) -> Result<ParsedArgs, ServerError> {
        let mut reader = ArgReader::new(cmd, args);
        let mut positional = HashMap::new();
        for name in self.positional {
            positional.insert(*name, reader.next_bytes()?);
        }

        let mut keywords: HashMap<&'static str, ParamValue> = HashMap::new();
        let mut seen_groups: HashMap<&'static str, &'static str> = HashMap::new();

        'outer: while !reader.is_empty() {
            for kw in self.keywords {
                if kw.tokens.iter().any(|t| reader.eat_keyword(t)) {
                    if let Some(group) = kw.exclusive_group {
                        if let Some(prev) = seen_groups.insert(group, kw.name) {
                            if prev != kw.name {
                                return Err(ServerError::syntax());
                            }
                        }
                    }
                    let value = match kw.value {
                        None => ParamValue::Flag,
                        Some(kinds) if kinds.len() == 1 => read_one(&mut reader, kinds[0])?,
                        Some(kinds) => {
                            let mut tuple = Vec::with_capacity(kinds.len());
                            for k in kinds {
                                tuple.push(read_one(&mut reader, *k)?);
                            }
                            ParamValue::Tuple(tuple)
                        }
                    };
                    keywords.insert(kw.name, value);
                    continue 'outer;
                }
            }
            return Err(ServerError::syntax());
        }

        Ok(ParsedArgs { positional, keywords })
    }
}

fn read_one(reader: &mut ArgReader, kind: ParamKind) -> Result<ParamValue, ServerError> {
    Ok(match kind {
        ParamKind::Bytes => ParamValue::Bytes(reader.next_bytes()?),
        ParamKind::Int => ParamValue::Int(reader.next_i64()?),
        ParamKind::Float => ParamValue::Float(reader.next_f64()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET_SCHEMA: Schema = Schema {
        positional: &["key", "value"],
        keywords: &[
            KeywordParam {
                name: "ex",
                tokens: &["EX"],
                value: Some(&[ParamKind::Int]),
                exclusive_group: Some("expire"),
            },
            KeywordParam {
                name: "nx",
                tokens: &["NX"],
                value: None,
                exclusive_group: Some("presence"),
            },
            KeywordParam {
                name: "xx",
                tokens: &["XX"],
                value: None,
                exclusive_group: Some("presence"),
            },
        ],
    };

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn parses_positional_and_keyword() {
        let args = vec![b("k"), b("v"), b("EX"), b("10"), b("NX")];
        let parsed = SET_SCHEMA.parse("SET", &args).unwrap();
        assert_eq!(parsed.positional("key"), &b("k"));
        assert_eq!(parsed.positional("value"), &b("v"));
        assert_eq!(parsed.get("ex").unwrap().as_int(), Some(10));
        assert!(parsed.has("nx"));
        assert!(!parsed.has("xx"));
    }

    #[test]
    fn rejects_conflicting_exclusive_group() {
        let args = vec![b("k"), b("v"), b("NX"), b("XX")];
        assert!(SET_SCHEMA.parse("SET", &args).is_err());
    }

    #[test]
    fn rejects_unknown_trailing_token() {
        let args = vec![b("k"), b("v"), b("BOGUS")];
        assert!(SET_SCHEMA.parse("SET", &args).is_err());
    }
}
