//! Permissive literal decoder.
//!
//! Some Space outputs arrive as a source-literal rendering of a structure rather than
//! strict JSON: single-quoted strings, `True`/`False`/`None`, tuples, trailing commas.
//! This module decodes that notation into a [`serde_json::Value`]:
//!
//! | literal | value |
//! |---------|-------|
//! | `'a'`, `"a"`, `'''a'''`, `r'a'` | string (adjacent strings concatenate) |
//! | `1`, `-2`, `0x1f`, `1_000`, `1.5e3` | number |
//! | `True` / `False` / `None` | bool / null |
//! | `[..]`, `(..)`, `{a, b}`, `set()` | array |
//! | `{k: v}` | object (non-string keys are stringified) |
//!
//! Anything else (names, calls, operators, bytes, complex numbers) is rejected.

use serde_json::{Map, Number, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 128;

#[derive(Debug, Error, PartialEq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character {0:?} at offset {1}")]
    Unexpected(char, usize),
    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),
    #[error("unsupported literal at offset {0}")]
    Unsupported(usize),
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Decode a permissive literal. Leading and trailing whitespace is ignored; a bare
/// top-level comma list (`1, 2`) decodes as an array.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut p = Parser::new(input);
    p.skip_ws();
    let first = p.value(0)?;
    p.skip_ws();
    let value = if p.peek() == Some(',') {
        let mut items = vec![first];
        while p.eat(',') {
            p.skip_ws();
            if p.peek().is_none() {
                break;
            }
            items.push(p.value(0)?);
            p.skip_ws();
        }
        Value::Array(items)
    } else {
        first
    };
    p.skip_ws();
    match p.peek() {
        None => Ok(value),
        Some(c) => Err(LiteralError::Unexpected(c, p.pos)),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), LiteralError> {
        match self.peek() {
            Some(got) if got == c => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(got) => Err(LiteralError::Unexpected(got, self.pos)),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else if c == '\\' && matches!(self.peek_nth(1), Some('\n')) {
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        self.skip_ws();
        let c = self.peek().ok_or(LiteralError::UnexpectedEnd)?;
        match c {
            '[' => {
                self.bump();
                let items = self.sequence(']', depth)?;
                Ok(Value::Array(items))
            }
            '(' => self.paren(depth),
            '{' => self.brace(depth),
            '\'' | '"' => self.strings(),
            '+' | '-' | '.' | '0'..='9' => self.number(),
            c if c.is_alphabetic() || c == '_' => self.word(),
            other => Err(LiteralError::Unexpected(other, self.pos)),
        }
    }

    /// Comma separated values up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: char, depth: usize) -> Result<Vec<Value>, LiteralError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }

    fn paren(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('(')?;
        self.skip_ws();
        if self.eat(')') {
            return Ok(Value::Array(Vec::new()));
        }
        let first = self.value(depth + 1)?;
        self.skip_ws();
        if self.eat(')') {
            // `(x)` is grouping, not a tuple
            return Ok(first);
        }
        self.expect(',')?;
        let mut items = vec![first];
        items.extend(self.sequence(')', depth)?);
        Ok(Value::Array(items))
    }

    fn brace(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('{')?;
        self.skip_ws();
        if self.eat('}') {
            return Ok(Value::Object(Map::new()));
        }
        let first = self.value(depth + 1)?;
        self.skip_ws();
        if !self.eat(':') {
            // set display
            let mut items = vec![first];
            if self.eat(',') {
                items.extend(self.sequence('}', depth)?);
            } else {
                self.expect('}')?;
            }
            return Ok(Value::Array(items));
        }
        let mut map = Map::new();
        let v = self.value(depth + 1)?;
        map.insert(key_string(first), v);
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            self.expect(',')?;
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let k = self.value(depth + 1)?;
            self.skip_ws();
            self.expect(':')?;
            let v = self.value(depth + 1)?;
            map.insert(key_string(k), v);
        }
    }

    fn word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let word = &self.src[start..start + len];
        match word {
            "True" => {
                self.pos += len;
                Ok(Value::Bool(true))
            }
            "False" => {
                self.pos += len;
                Ok(Value::Bool(false))
            }
            "None" => {
                self.pos += len;
                Ok(Value::Null)
            }
            "set" => {
                self.pos += len;
                self.skip_ws();
                self.expect('(')?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Value::Array(Vec::new()))
            }
            _ => {
                let lower = word.to_ascii_lowercase();
                let is_prefix = matches!(lower.as_str(), "r" | "u");
                if is_prefix && matches!(self.peek_nth(len), Some('\'' | '"')) {
                    self.strings()
                } else {
                    Err(LiteralError::Unsupported(start))
                }
            }
        }
    }

    /// One or more adjacent string literals, concatenated.
    fn strings(&mut self) -> Result<Value, LiteralError> {
        let mut out = String::new();
        loop {
            self.string_into(&mut out)?;
            let save = self.pos;
            self.skip_ws();
            if self.at_string_start() {
                continue;
            }
            self.pos = save;
            return Ok(Value::String(out));
        }
    }

    fn at_string_start(&self) -> bool {
        match self.peek() {
            Some('\'' | '"') => true,
            Some('r' | 'R' | 'u' | 'U') => matches!(self.peek_nth(1), Some('\'' | '"')),
            _ => false,
        }
    }

    fn string_into(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let mut raw = false;
        match self.peek() {
            Some('r' | 'R') => {
                raw = true;
                self.bump();
            }
            Some('u' | 'U') => {
                self.bump();
            }
            _ => {}
        }
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            Some(other) => return Err(LiteralError::Unexpected(other, self.pos)),
            None => return Err(LiteralError::UnexpectedEnd),
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.pos += 2 * quote.len_utf8();
        }
        loop {
            let c = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
            if c == quote {
                if !triple {
                    return Ok(());
                }
                if self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) {
                    self.pos += 2 * quote.len_utf8();
                    return Ok(());
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(LiteralError::Unexpected('\n', self.pos - 1));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            if raw {
                // raw strings keep the backslash, but it still protects the next quote
                out.push('\\');
                if let Some(next) = self.bump() {
                    out.push(next);
                }
                continue;
            }
            self.escape_into(out)?;
        }
    }

    fn escape_into(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let at = self.pos;
        let c = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'x' => out.push(self.hex_escape(2, at)?),
            'u' => out.push(self.hex_escape(4, at)?),
            'U' => out.push(self.hex_escape(8, at)?),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or(LiteralError::InvalidEscape(at))?);
            }
            'N' => return Err(LiteralError::Unsupported(at)),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize, at: usize) -> Result<char, LiteralError> {
        let rest = self.rest();
        if rest.len() < digits || !rest.is_char_boundary(digits) {
            return Err(LiteralError::InvalidEscape(at));
        }
        let code = u32::from_str_radix(&rest[..digits], 16)
            .map_err(|_| LiteralError::InvalidEscape(at))?;
        self.pos += digits;
        char::from_u32(code).ok_or(LiteralError::InvalidEscape(at))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut negative = false;
        while let Some(sign @ ('+' | '-')) = self.peek() {
            if sign == '-' {
                negative = !negative;
            }
            self.bump();
            self.skip_ws();
        }
        let token = self.number_token();
        let cleaned: String = token.chars().filter(|c| *c != '_').collect();
        let lower = cleaned.to_ascii_lowercase();
        if lower.is_empty() {
            return Err(LiteralError::InvalidNumber(start));
        }
        if lower.ends_with('j') {
            return Err(LiteralError::Unsupported(start));
        }
        let radix = match lower.get(..2) {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let magnitude = u64::from_str_radix(&lower[2..], radix)
                .map_err(|_| LiteralError::InvalidNumber(start))?;
            return int_value(magnitude, negative, start);
        }
        if lower.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(magnitude) = lower.parse::<u64>() {
                return int_value(magnitude, negative, start);
            }
        }
        let f: f64 = lower
            .parse()
            .map_err(|_| LiteralError::InvalidNumber(start))?;
        if !f.is_finite() {
            return Err(LiteralError::InvalidNumber(start));
        }
        let f = if negative { -f } else { f };
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or(LiteralError::InvalidNumber(start))
    }

    /// Consumes a numeric token, including an exponent sign (`1e-3`) for decimal forms.
    fn number_token(&mut self) -> &'a str {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let hex = bytes[start..].get(..2).is_some_and(|p| p.eq_ignore_ascii_case(b"0x"));
        let mut end = start;
        while end < bytes.len() {
            let b = bytes[end];
            let exponent_sign = !hex
                && (b == b'+' || b == b'-')
                && end > start
                && matches!(bytes[end - 1], b'e' | b'E');
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
                end += 1;
            } else {
                break;
            }
        }
        self.pos = end;
        &self.src[start..end]
    }
}

fn int_value(magnitude: u64, negative: bool, at: usize) -> Result<Value, LiteralError> {
    if !negative {
        return Ok(Value::Number(Number::from(magnitude)));
    }
    if let Ok(n) = i64::try_from(-(magnitude as i128)) {
        return Ok(Value::Number(Number::from(n)));
    }
    Number::from_f64(-(magnitude as f64))
        .map(Value::Number)
        .ok_or(LiteralError::InvalidNumber(at))
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_quoted_mapping() {
        let v = parse_literal("{'emotion': 'joy', 'score': 0.93}").unwrap();
        assert_eq!(v, json!({"emotion": "joy", "score": 0.93}));
    }

    #[test]
    fn keywords_and_nesting() {
        let v = parse_literal("{'ok': True, 'err': None, 'tags': ['a', \"b\",], 'x': False}").unwrap();
        assert_eq!(v, json!({"ok": true, "err": null, "tags": ["a", "b"], "x": false}));
    }

    #[test]
    fn tuples_and_sets() {
        assert_eq!(parse_literal("(1, 2)").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("(1,)").unwrap(), json!([1]));
        assert_eq!(parse_literal("(1)").unwrap(), json!(1));
        assert_eq!(parse_literal("()").unwrap(), json!([]));
        assert_eq!(parse_literal("{1, 2}").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("set()").unwrap(), json!([]));
        assert_eq!(parse_literal("1, 'two'").unwrap(), json!([1, "two"]));
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_literal("-3").unwrap(), json!(-3));
        assert_eq!(parse_literal("1_000").unwrap(), json!(1000));
        assert_eq!(parse_literal("0x1f").unwrap(), json!(31));
        assert_eq!(parse_literal("1.5e-3").unwrap(), json!(0.0015));
        assert_eq!(parse_literal(".5").unwrap(), json!(0.5));
        assert!(parse_literal("1+2j").is_err());
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let v = parse_literal("{1: 'a', True: 'b'}").unwrap();
        assert_eq!(v, json!({"1": "a", "true": "b"}));
    }

    #[test]
    fn string_escapes_and_concatenation() {
        assert_eq!(parse_literal(r"'it\'s\n'").unwrap(), json!("it's\n"));
        assert_eq!(parse_literal(r"'감정'").unwrap(), json!("감정"));
        assert_eq!(parse_literal("'a' 'b'").unwrap(), json!("ab"));
        assert_eq!(parse_literal("'''x'y'''").unwrap(), json!("x'y"));
        assert_eq!(parse_literal(r"r'\d'").unwrap(), json!("\\d"));
        assert_eq!(parse_literal("'기쁨'").unwrap(), json!("기쁨"));
    }

    #[test]
    fn rejects_non_literals() {
        assert!(parse_literal("plain string").is_err());
        assert!(parse_literal("Error: API down").is_err());
        assert!(parse_literal("foo(1)").is_err());
        assert!(parse_literal("b'bytes'").is_err());
        assert!(parse_literal("{'a': 1").is_err());
        assert!(parse_literal("").is_err());
    }

    #[test]
    fn digit_before_multibyte_char_is_rejected() {
        assert_eq!(parse_literal("1점"), Err(LiteralError::Unexpected('점', 1)));
        assert!(parse_literal("-가").is_err());
        assert!(parse_literal("0기").is_err());
        assert!(parse_literal(".위").is_err());
    }

    #[test]
    fn depth_is_bounded() {
        let deep = "[".repeat(MAX_DEPTH + 10);
        assert_eq!(parse_literal(&deep), Err(LiteralError::TooDeep));
    }
}
