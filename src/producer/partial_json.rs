//! Tolerant parsing of incomplete JSON documents.
//!
//! Structured model output arrives as text deltas. After every delta the
//! accumulated prefix is parsed into the most complete value it describes:
//! open strings are returned truncated, open containers are closed, and
//! dangling keys, separators, partial literals and unterminated numbers that
//! cannot be read yet are dropped. Input that can never become valid JSON is
//! rejected.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartialJsonError {
    #[error("invalid JSON at offset {offset}: {reason}")]
    Invalid { offset: usize, reason: &'static str },
}

/// Parse a (possibly truncated) JSON document.
///
/// Returns `Ok(None)` when the prefix does not yet describe any value.
pub fn parse_partial(input: &str) -> Result<Option<Value>, PartialJsonError> {
    let mut parser = Parser {
        src: input.as_bytes(),
        pos: 0,
        eof: false,
    };
    let value = parser.value()?;

    if !parser.eof {
        parser.skip_ws();
        if parser.pos < parser.src.len() {
            return Err(parser.invalid("trailing characters"));
        }
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    /// Set once the input ran out mid-value.
    eof: bool,
}

impl<'a> Parser<'a> {
    fn invalid(&self, reason: &'static str) -> PartialJsonError {
        PartialJsonError::Invalid {
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Option<Value>, PartialJsonError> {
        self.skip_ws();
        match self.peek() {
            None => {
                self.eof = true;
                Ok(None)
            }
            Some(b'{') => self.object().map(Some),
            Some(b'[') => self.array().map(Some),
            Some(b'"') => Ok(Some(Value::String(self.string()?))),
            Some(b't') => self.literal("true", Value::Bool(true)),
            Some(b'f') => self.literal("false", Value::Bool(false)),
            Some(b'n') => self.literal("null", Value::Null),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(_) => Err(self.invalid("unexpected character")),
        }
    }

    fn object(&mut self) -> Result<Value, PartialJsonError> {
        self.pos += 1;
        let mut map = Map::new();

        loop {
            self.skip_ws();
            match self.peek() {
                None => {
                    self.eof = true;
                    break;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(b'"') => {}
                Some(_) => return Err(self.invalid("expected object key")),
            }

            let key = self.string()?;
            if self.eof {
                break;
            }

            self.skip_ws();
            match self.peek() {
                None => {
                    self.eof = true;
                    break;
                }
                Some(b':') => self.pos += 1,
                Some(_) => return Err(self.invalid("expected ':'")),
            }

            match self.value()? {
                Some(value) => {
                    map.insert(key, value);
                }
                None => break,
            }
            if self.eof {
                break;
            }

            self.skip_ws();
            match self.peek() {
                None => {
                    self.eof = true;
                    break;
                }
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => return Err(self.invalid("expected ',' or '}'")),
            }
        }

        Ok(Value::Object(map))
    }

    fn array(&mut self) -> Result<Value, PartialJsonError> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.pos += 1;
                break;
            }

            match self.value()? {
                Some(value) => items.push(value),
                None => break,
            }
            if self.eof {
                break;
            }

            self.skip_ws();
            match self.peek() {
                None => {
                    self.eof = true;
                    break;
                }
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => return Err(self.invalid("expected ',' or ']'")),
            }
        }

        Ok(Value::Array(items))
    }

    /// Read a string starting at the opening quote. Sets `eof` if the
    /// closing quote is missing and returns what was read so far.
    fn string(&mut self) -> Result<String, PartialJsonError> {
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();

        loop {
            let Some(byte) = self.peek() else {
                self.eof = true;
                break;
            };
            match byte {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    let Some(escaped) = self.src.get(self.pos + 1).copied() else {
                        self.pos = self.src.len();
                        self.eof = true;
                        break;
                    };
                    match escaped {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'/' => out.push(b'/'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            self.pos += 2;
                            match self.unicode_escape()? {
                                Some(c) => {
                                    let mut buf = [0u8; 4];
                                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                                    continue;
                                }
                                None => break,
                            }
                        }
                        _ => return Err(self.invalid("invalid escape")),
                    }
                    self.pos += 2;
                }
                b if b < 0x20 => return Err(self.invalid("control character in string")),
                b => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }

        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Decode the hex digits after `\u`, including a trailing low surrogate.
    /// Returns `None` (and sets `eof`) when the escape is cut off.
    fn unicode_escape(&mut self) -> Result<Option<char>, PartialJsonError> {
        let Some(high) = self.hex4()? else {
            return Ok(None);
        };

        if !(0xD800..0xDC00).contains(&high) {
            return Ok(Some(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER)));
        }

        // High surrogate: a `\uXXXX` low surrogate must follow.
        match (self.src.get(self.pos), self.src.get(self.pos + 1)) {
            (Some(b'\\'), Some(b'u')) => {
                self.pos += 2;
                let Some(low) = self.hex4()? else {
                    return Ok(None);
                };
                if !(0xDC00..0xE000).contains(&low) {
                    return Err(self.invalid("high surrogate not followed by a low surrogate"));
                }
                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                Ok(Some(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER)))
            }
            (None, _) | (Some(b'\\'), None) => {
                self.pos = self.src.len();
                self.eof = true;
                Ok(None)
            }
            _ => Ok(Some(char::REPLACEMENT_CHARACTER)),
        }
    }

    fn hex4(&mut self) -> Result<Option<u32>, PartialJsonError> {
        let end = self.pos + 4;
        let available = &self.src[self.pos..end.min(self.src.len())];
        if !available.iter().all(u8::is_ascii_hexdigit) {
            return Err(self.invalid("invalid unicode escape"));
        }
        if available.len() < 4 {
            self.pos = self.src.len();
            self.eof = true;
            return Ok(None);
        }

        let mut code = 0u32;
        for &digit in available {
            let nibble = (digit as char).to_digit(16).unwrap_or(0);
            code = code * 16 + nibble;
        }
        self.pos = end;
        Ok(Some(code))
    }

    fn literal(&mut self, word: &'static str, value: Value) -> Result<Option<Value>, PartialJsonError> {
        let rest = &self.src[self.pos..];
        let word = word.as_bytes();

        if rest.len() < word.len() && word.starts_with(rest) {
            self.pos = self.src.len();
            self.eof = true;
            return Ok(None);
        }
        if rest.starts_with(word) {
            self.pos += word.len();
            return Ok(Some(value));
        }
        Err(self.invalid("invalid literal"))
    }

    fn number(&mut self) -> Result<Option<Value>, PartialJsonError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')) {
            self.pos += 1;
        }
        let at_end = self.pos == self.src.len();
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");

        match serde_json::from_str::<Number>(text) {
            Ok(n) => {
                if at_end {
                    // More digits may still arrive.
                    self.eof = true;
                }
                Ok(Some(Value::Number(n)))
            }
            Err(_) if at_end => {
                self.eof = true;
                Ok(None)
            }
            Err(_) => Err(PartialJsonError::Invalid {
                offset: start,
                reason: "invalid number",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(s: &str) -> Option<Value> {
        parse_partial(s).unwrap()
    }

    #[test]
    fn test_complete_documents() {
        assert_eq!(
            parse(r#"{"plan":"a","queries":["x","y"]}"#),
            Some(json!({ "plan": "a", "queries": ["x", "y"] }))
        );
        assert_eq!(parse("[1, 2.5, -3e2, true, null]"), Some(json!([1, 2.5, -3e2, true, null])));
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   \n"), None);
    }

    #[test]
    fn test_open_string_is_truncated() {
        assert_eq!(parse(r#"{"plan":"Find the"#), Some(json!({ "plan": "Find the" })));
        assert_eq!(parse(r#"["alpha", "be"#), Some(json!(["alpha", "be"])));
    }

    #[test]
    fn test_dangling_key_is_dropped() {
        assert_eq!(parse(r#"{"plan":"x","que"#), Some(json!({ "plan": "x" })));
        assert_eq!(parse(r#"{"plan":"x","queries""#), Some(json!({ "plan": "x" })));
        assert_eq!(parse(r#"{"plan":"x","queries":"#), Some(json!({ "plan": "x" })));
        assert_eq!(parse(r#"{"plan":"x","queries":["#), Some(json!({ "plan": "x", "queries": [] })));
    }

    #[test]
    fn test_trailing_separator() {
        assert_eq!(parse(r#"["a","#), Some(json!(["a"])));
        assert_eq!(parse(r#"{"a":1,"#), Some(json!({ "a": 1 })));
    }

    #[test]
    fn test_partial_literals_and_numbers() {
        assert_eq!(parse("[tr"), Some(json!([])));
        assert_eq!(parse(r#"{"n":nu"#), Some(json!({})));
        assert_eq!(parse("[12"), Some(json!([12])));
        assert_eq!(parse("[1."), Some(json!([])));
        assert_eq!(parse("-"), None);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(parse(r#"["a\"b\n"]"#), Some(json!(["a\"b\n"])));
        assert_eq!(parse(r#"["café"]"#), Some(json!(["café"])));
        assert_eq!(parse(r#"["😀"]"#), Some(json!(["😀"])));
        // Cut-off escapes are dropped rather than misread.
        assert_eq!(parse(r#"["ab\"#), Some(json!(["ab"])));
        assert_eq!(parse(r#"["ab\u00"#), Some(json!(["ab"])));
    }

    #[test]
    fn test_surrogate_pairs() {
        assert_eq!(parse(r#"["\ud83d\ude00"]"#), Some(json!(["😀"])));
        assert_eq!(parse(r#"["x\ud83d\ude"#), Some(json!(["x"])));
        assert!(parse_partial(r#"["\ud83d\u0041"]"#).is_err());
        assert!(parse_partial(r#"["\ud83d\ud83d"]"#).is_err());
    }

    #[test]
    fn test_every_prefix_parses() {
        let doc = r#"{"plan": "Look up \"rust\" async", "queries": ["tokio runtime", "futures crate"], "n": 12}"#;
        for end in 0..=doc.len() {
            assert!(parse_partial(&doc[..end]).is_ok(), "prefix {end} failed: {}", &doc[..end]);
        }
        assert_eq!(parse(doc), serde_json::from_str(doc).ok());
    }

    #[test]
    fn test_invalid_input() {
        assert!(parse_partial("{plan: 1}").is_err());
        assert!(parse_partial(r#"["a" "b"]"#).is_err());
        assert!(parse_partial("[1] x").is_err());
        assert!(parse_partial("[1x").is_err());
        assert!(parse_partial("[fals3]").is_err());
    }
}
