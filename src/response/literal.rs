//! Permissive parser for Python-style literals
//!
//! Some models answer with a Python dict instead of JSON: single-quoted
//! strings, `True`/`False`/`None`, tuples, trailing commas. This parser
//! accepts that dialect (and plain JSON) and produces a [`serde_json::Value`].

use serde_json::{Map, Number, Value};

/// Nesting limit for containers
const MAX_DEPTH: usize = 128;

/// Literal parse errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("nesting too deep")]
    TooDeep,

    #[error("trailing input at offset {0}")]
    TrailingInput(usize),
}

/// Parse one literal spanning the whole input (surrounding whitespace allowed)
pub fn parse(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(LiteralError::TrailingInput(parser.pos));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Result<char, LiteralError> {
        let ch = self.peek().ok_or(LiteralError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(ch)
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(ch) => LiteralError::UnexpectedChar {
                ch,
                offset: self.pos,
            },
            None => LiteralError::UnexpectedEnd,
        }
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += 1;
            } else if ch == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), LiteralError> {
        self.skip_ws();
        if self.peek() == Some(wanted) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek().ok_or(LiteralError::UnexpectedEnd)? {
            '{' => self.nested(Self::dict),
            '[' => self.nested(|p| p.sequence(']')),
            '(' => self.nested(|p| p.sequence(')')),
            '\'' | '"' => self.strings(),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.name_or_prefixed_string(),
            _ => Err(self.unexpected()),
        }
    }

    fn nested<F>(&mut self, body: F) -> Result<Value, LiteralError>
    where
        F: FnOnce(&mut Self) -> Result<Value, LiteralError>,
    {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = match self.value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                '}' => return Ok(Value::Object(map)),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            }
        }
    }

    fn sequence(&mut self, close: char) -> Result<Value, LiteralError> {
        self.bump()?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                c if c == close => return Ok(Value::Array(items)),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            }
        }
    }

    /// Adjacent string literals concatenate, as in Python
    fn strings(&mut self) -> Result<Value, LiteralError> {
        let mut out = self.string(false)?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('\'') | Some('"') => out.push_str(&self.string(false)?),
                _ => return Ok(Value::String(out)),
            }
        }
    }

    fn string(&mut self, raw: bool) -> Result<String, LiteralError> {
        let quote = self.bump()?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let ch = self.bump()?;
            if ch == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    return Ok(out);
                }
                out.push(ch);
            } else if ch == '\\' && !raw {
                self.escape(&mut out)?;
            } else if ch == '\n' && !triple {
                self.pos -= 1;
                return Err(self.unexpected());
            } else {
                out.push(ch);
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let ch = self.bump()?;
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            '\\' | '\'' | '"' | '/' => out.push(ch),
            '\n' => {}
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.hex_char(4)?),
            'U' => out.push(self.hex_char(8)?),
            other => {
                // Unknown escapes are kept verbatim
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let start = self.pos;
        let mut code = 0u32;
        for _ in 0..digits {
            let ch = self.bump()?;
            let digit = ch.to_digit(16).ok_or(LiteralError::UnexpectedChar {
                ch,
                offset: self.pos - 1,
            })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LiteralError::UnexpectedChar {
            ch: self.chars[start],
            offset: start,
        })
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            let previous = self.chars.get(self.pos.wrapping_sub(1)).copied();
            let sign_after_exponent =
                (ch == '-' || ch == '+') && matches!(previous, Some('e') | Some('E'));
            if ch.is_ascii_digit()
                || ch == '.'
                || ch == '_'
                || ch == 'e'
                || ch == 'E'
                || (self.pos == start && (ch == '-' || ch == '+'))
                || sign_after_exponent
            {
                self.pos += 1;
            } else {
                break;
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let invalid = || LiteralError::InvalidNumber(text.clone());
        let unsigned = text.trim_start_matches('+');

        if unsigned.contains(['.', 'e', 'E']) {
            let float: f64 = unsigned.parse().map_err(|_| invalid())?;
            Number::from_f64(float).map(Value::Number).ok_or_else(invalid)
        } else {
            let int: i64 = unsigned.parse().map_err(|_| invalid())?;
            Ok(Value::Number(int.into()))
        }
    }

    fn name_or_prefixed_string(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        // String prefixes such as u'..' or r"..", immediately followed by a quote
        if matches!(self.peek(), Some('\'') | Some('"'))
            && matches!(name.to_lowercase().as_str(), "u" | "r" | "b" | "br" | "rb")
        {
            let raw = name.to_lowercase().contains('r');
            let mut out = self.string(raw)?;
            self.skip_ws();
            if matches!(self.peek(), Some('\'') | Some('"')) {
                if let Value::String(rest) = self.strings()? {
                    out.push_str(&rest);
                }
            }
            return Ok(Value::String(out));
        }

        match name.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => Err(LiteralError::UnknownName(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_python_dict() {
        let value = parse(
            "{'summary': 'Page is \\'mostly\\' fine', 'score': 72, 'ok': True, 'grade': None, \
             'quick_wins': ['a', \"b\",], 'pair': (1, 2.5)}",
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "summary": "Page is 'mostly' fine",
                "score": 72,
                "ok": true,
                "grade": null,
                "quick_wins": ["a", "b"],
                "pair": [1, 2.5]
            })
        );
    }

    #[test]
    fn test_plain_json_is_accepted() {
        let text = r#"{"a": [1, -2, 3.5e2], "b": {"c": null, "d": false}, "e": "\u00e9\n"}"#;
        assert_eq!(parse(text).unwrap(), serde_json::from_str::<Value>(text).unwrap());
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(parse("'abc' \"def\"").unwrap(), json!("abcdef"));
        assert_eq!(parse("'''multi\nline'''").unwrap(), json!("multi\nline"));
        assert_eq!(parse(r"r'C:\path'").unwrap(), json!("C:\\path"));
        assert_eq!(parse("u'caf\\xe9'").unwrap(), json!("café"));
    }

    #[test]
    fn test_comments_and_whitespace() {
        assert_eq!(parse("  {'a': 1,  # one\n 'b': 2}\n").unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(""), Err(LiteralError::UnexpectedEnd));
        assert_eq!(parse("{'a': 1"), Err(LiteralError::UnexpectedEnd));
        assert!(matches!(parse("{'a' 1}"), Err(LiteralError::UnexpectedChar { .. })));
        assert_eq!(parse("{'a': foo}"), Err(LiteralError::UnknownName("foo".to_string())));
        assert_eq!(parse("[1] x"), Err(LiteralError::TrailingInput(4)));
        assert!(matches!(parse("1.2.3"), Err(LiteralError::InvalidNumber(_))));
        assert!(matches!(parse("'unterminated\n'"), Err(LiteralError::UnexpectedChar { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1);
        assert_eq!(parse(&deep), Err(LiteralError::TooDeep));
    }
}
