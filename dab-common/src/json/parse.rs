//! Recursive-descent parser for the relaxed DAB JSON grammar.
//!
//! The grammar is a pragmatic superset of strict JSON kept for wire
//! compatibility: object keys may be bare identifiers, the escape set is
//! `\" \\ \r \n \t` plus "any other escaped character stands for itself",
//! and numbers are a run of `[0-9+-.e]` classified as double when a `.`
//! or `e` is present. There is no `\uXXXX` form.

use std::collections::BTreeMap;

use super::Value;
use crate::error::JsonError;

type Result<T> = std::result::Result<T, JsonError>;

/// Parse a complete JSON document. Trailing whitespace is tolerated; any
/// other trailing input is an error.
pub fn parse(input: &str) -> Result<Value> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(JsonError::Parse("invalid json"));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_literal(&mut self, literal: &str) -> bool {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => Ok(Value::String(self.parse_string()?)),
            Some(b'0'..=b'9' | b'+' | b'-') => self.parse_number(),
            _ => {
                if self.eat_literal("true") {
                    Ok(Value::Bool(true))
                } else if self.eat_literal("false") {
                    Ok(Value::Bool(false))
                } else if self.eat_literal("null") {
                    Ok(Value::Null)
                } else {
                    Err(JsonError::Parse("unexpected character"))
                }
            }
        }
    }

    fn parse_object(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut map = BTreeMap::new();
        self.skip_whitespace();
        if self.eat(b'}') {
            return Ok(Value::Object(map));
        }
        loop {
            self.skip_whitespace();
            let key = self.parse_key()?;
            self.skip_whitespace();
            if !self.eat(b':') {
                return Err(JsonError::Parse("missing name/value separator"));
            }
            let value = self.parse_value()?;
            // duplicate keys overwrite
            map.insert(key, value);
            self.skip_whitespace();
            if self.eat(b'}') {
                return Ok(Value::Object(map));
            }
            if !self.eat(b',') {
                return Err(JsonError::Parse("missing comma"));
            }
        }
    }

    /// Object keys are either quoted strings (taken verbatim, no escape
    /// processing) or bare identifiers `[A-Za-z_][A-Za-z0-9_]*`.
    fn parse_key(&mut self) -> Result<String> {
        if self.eat(b'"') {
            let start = self.pos;
            while let Some(byte) = self.peek() {
                if byte == b'"' {
                    let key = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                    self.pos += 1;
                    return Ok(key);
                }
                self.pos += 1;
            }
            return Err(JsonError::Parse("missing closing quote"));
        }
        let start = self.pos;
        match self.peek() {
            Some(b'A'..=b'Z' | b'a'..=b'z' | b'_') => self.pos += 1,
            _ => return Err(JsonError::Parse("invalid symbol in key")),
        }
        while matches!(
            self.peek(),
            Some(b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')
        ) {
            self.pos += 1;
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn parse_array(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.eat(b']') {
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            if self.eat(b']') {
                return Ok(Value::Array(items));
            }
            if !self.eat(b',') {
                return Err(JsonError::Parse("missing comma"));
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None => return Err(JsonError::Parse("missing closing quote")),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    None => return Err(JsonError::Parse("missing closing quote")),
                    Some(b'r') => bytes.push(b'\r'),
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    // any other escaped byte stands for itself, `\"` included
                    Some(other) => bytes.push(other),
                },
                Some(byte) => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|_| JsonError::Parse("invalid utf-8 in string"))
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        let mut is_double = false;
        while let Some(byte) = self.peek() {
            match byte {
                b'0'..=b'9' | b'+' | b'-' => {}
                b'.' | b'e' => is_double = true,
                _ => break,
            }
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]);
        if is_double {
            text.parse::<f64>()
                .map(Value::Double)
                .map_err(|_| JsonError::Parse("invalid number"))
        } else {
            text.parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| JsonError::Parse("invalid number"))
        }
    }
}
