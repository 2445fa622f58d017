//! Restricted literal language.
//!
//! Autochecks files, discovered check parameters and rule values are written
//! in the literal subset of Python syntax: `None`, `True`/`False`, integers
//! (with an optional legacy `L` suffix), floats, quoted strings (with optional
//! `u`/`b`/`r` prefixes), lists, tuples and dicts. This module parses and
//! prints exactly that subset and nothing else. No expression is ever
//! evaluated.

use std::fmt::{self, Write as _};

use thiserror::Error;

/// Maximum nesting depth accepted by the parser.
const MAX_DEPTH: usize = 64;

/// Errors raised while decoding a literal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid escape sequence at offset {pos}")]
    InvalidEscape { pos: usize },

    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    #[error("unknown name {0:?}")]
    UnknownName(String),

    #[error("trailing input at offset {pos}")]
    TrailingInput { pos: usize },

    #[error("literal nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// A decoded literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Key/value pairs in source order.
    Dict(Vec<(Value, Value)>),
}

impl Value {
    /// Parse a complete literal. Surrounding whitespace is allowed.
    pub fn parse(input: &str) -> Result<Self, LiteralError> {
        let mut parser = Parser::new(input);
        let value = parser.value()?;
        parser.skip_ws();
        if parser.pos < input.len() {
            return Err(LiteralError::TrailingInput { pos: parser.pos });
        }
        Ok(value)
    }

    /// Render the value in literal syntax. `Value::parse(&v.repr())` yields `v`.
    pub fn repr(&self) -> String {
        self.to_string()
    }

    /// Create a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Create a tuple value.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Create a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Create a dict value with string keys.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v))
                .collect(),
        )
    }

    /// Name of the value's type, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Elements of a list or tuple.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a string key in a dict value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Truth value in the literal language's sense.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) | Self::Tuple(items) => !items.is_empty(),
            Self::Dict(entries) => !entries.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write_float(f, *x),
            Self::Str(s) => write_str_repr(f, s),
            Self::List(items) => {
                f.write_char('[')?;
                write_joined(f, items)?;
                f.write_char(']')
            }
            Self::Tuple(items) => {
                f.write_char('(')?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Dict(entries) => {
                f.write_char('{')?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_char('}')
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("nan");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "inf" } else { "-inf" });
    }
    let s = format!("{x:?}");
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => write!(f, "{mantissa}e+{exp}"),
        _ => f.write_str(&s),
    }
}

/// Quote a string the way the literal grammar expects: single quotes unless
/// the text contains a single quote and no double quote.
fn write_str_repr(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(ch) => LiteralError::UnexpectedChar { ch, pos: self.pos },
            None => LiteralError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        if self.peek() == Some(want) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('[') => self.nested(|p| {
                p.bump();
                p.items_until(']', Vec::new()).map(Value::List)
            }),
            Some('(') => self.nested(Self::paren),
            Some('{') => self.nested(Self::dict),
            Some('\'' | '"') => self.string(false, false),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.name(),
            Some(_) => Err(self.unexpected()),
        }
    }

    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parse comma-separated values up to `close`. The opener (or a comma
    /// following an already parsed element) has been consumed.
    fn items_until(&mut self, close: char, mut items: Vec<Value>) -> Result<Vec<Value>, LiteralError> {
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    return Ok(items);
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    /// `()` is the empty tuple, `(x)` is just `x`, `(x,)` and `(x, y)` are tuples.
    fn paren(&mut self) -> Result<Value, LiteralError> {
        self.bump();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Value::Tuple(Vec::new()));
        }
        let first = self.value()?;
        self.skip_ws();
        match self.peek() {
            Some(')') => {
                self.bump();
                Ok(first)
            }
            Some(',') => {
                self.bump();
                self.items_until(')', vec![first]).map(Value::Tuple)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.bump();
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Dict(entries));
            }
            let key = self.value()?;
            self.skip_ws();
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(Value::Dict(entries));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn name(&mut self) -> Result<Value, LiteralError> {
        let src = self.src;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let ident = &src[start..self.pos];

        if matches!(self.peek(), Some('\'' | '"')) {
            let prefix = ident.to_ascii_lowercase();
            if matches!(prefix.as_str(), "u" | "b" | "r" | "ur" | "br" | "rb") {
                return self.string(prefix.contains('r'), prefix.contains('b'));
            }
        }

        match ident {
            "None" => Ok(Value::None),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            other => Err(LiteralError::UnknownName(other.to_string())),
        }
    }

    fn string(&mut self, raw: bool, bytes: bool) -> Result<Value, LiteralError> {
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            let c_pos = self.pos;
            let c = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
            if c == quote {
                return Ok(Value::Str(out));
            }
            match c {
                '\n' => return Err(LiteralError::UnexpectedChar { ch: c, pos: c_pos }),
                '\\' => {
                    let e = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
                    if raw {
                        out.push('\\');
                        out.push(e);
                        continue;
                    }
                    match e {
                        '\n' => {}
                        '\\' | '\'' | '"' => out.push(e),
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'a' => out.push('\x07'),
                        'b' => out.push('\x08'),
                        'f' => out.push('\x0c'),
                        'v' => out.push('\x0b'),
                        '0'..='7' => out.push(self.octal_escape(e, c_pos)?),
                        'x' => out.push(self.hex_escape(2, c_pos)?),
                        'u' if !bytes => out.push(self.hex_escape(4, c_pos)?),
                        'U' if !bytes => out.push(self.hex_escape(8, c_pos)?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn octal_escape(&mut self, first: char, esc_pos: usize) -> Result<char, LiteralError> {
        let mut code = first.to_digit(8).ok_or(LiteralError::InvalidEscape { pos: esc_pos })?;
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    self.bump();
                    code = code * 8 + d;
                }
                None => break,
            }
        }
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { pos: esc_pos })
    }

    fn hex_escape(&mut self, len: usize, esc_pos: usize) -> Result<char, LiteralError> {
        let mut code: u32 = 0;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or(LiteralError::InvalidEscape { pos: esc_pos })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { pos: esc_pos })
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let src = self.src;
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            }
            Some('+') => {
                self.bump();
                false
            }
            _ => false,
        };

        let rest = &src[self.pos..];
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &src[digits_start..self.pos];
            let magnitude = i64::from_str_radix(digits, 16)
                .map_err(|_| LiteralError::InvalidNumber(src[start..self.pos].to_string()))?;
            self.skip_long_suffix();
            return Ok(Value::Int(if negative { -magnitude } else { magnitude }));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    self.bump();
                }
                '.' => {
                    is_float = true;
                    self.bump();
                }
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('+' | '-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let text = &src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| LiteralError::InvalidNumber(text.to_string()))
        } else {
            let value = text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| LiteralError::InvalidNumber(text.to_string()))?;
            self.skip_long_suffix();
            Ok(value)
        }
    }

    fn skip_long_suffix(&mut self) {
        if matches!(self.peek(), Some('L' | 'l')) {
            self.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("None", Value::None)]
    #[case("True", Value::Bool(true))]
    #[case("False", Value::Bool(false))]
    #[case("42", Value::Int(42))]
    #[case("-7", Value::Int(-7))]
    #[case("10L", Value::Int(10))]
    #[case("0x1F", Value::Int(31))]
    #[case("1.5", Value::Float(1.5))]
    #[case("-2e3", Value::Float(-2000.0))]
    #[case("'abc'", Value::str("abc"))]
    #[case("u'abc'", Value::str("abc"))]
    #[case("\"it's\"", Value::str("it's"))]
    #[case("r'C:\\temp'", Value::str("C:\\temp"))]
    fn test_parse_scalars(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(Value::parse(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_escapes() {
        let v = Value::parse(r"'a\tb\nc\\d\'e\x41\u00e9'").unwrap();
        assert_eq!(v, Value::str("a\tb\nc\\d'eAé"));
    }

    #[test]
    fn test_parse_containers() {
        let v = Value::parse("{'levels': (80.0, 90), 'trend': [1, 2,], 'magic': None}").unwrap();
        assert_eq!(v.get("levels"), Some(&Value::tuple([Value::Float(80.0), Value::Int(90)])));
        assert_eq!(v.get("trend"), Some(&Value::list([Value::Int(1), Value::Int(2)])));
        assert_eq!(v.get("magic"), Some(&Value::None));
        assert_eq!(v.get("missing"), None);
    }

    #[test]
    fn test_parse_parenthesized_vs_tuple() {
        assert_eq!(Value::parse("(1)").unwrap(), Value::Int(1));
        assert_eq!(Value::parse("(1,)").unwrap(), Value::tuple([Value::Int(1)]));
        assert_eq!(Value::parse("()").unwrap(), Value::Tuple(vec![]));
    }

    #[rstest]
    #[case("")]
    #[case("'unterminated")]
    #[case("[1 2]")]
    #[case("{'a' 1}")]
    #[case("os.system('rm')")]
    #[case("__import__")]
    #[case("1 2")]
    #[case("-")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(Value::parse(input).is_err(), "accepted {input:?}");
    }

    #[test]
    fn test_parse_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert_eq!(Value::parse(&deep), Err(LiteralError::TooDeep));
    }

    #[test]
    fn test_repr() {
        assert_eq!(Value::None.repr(), "None");
        assert_eq!(Value::str("/boot").repr(), "'/boot'");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("both ' and \"").repr(), "'both \\' and \"'");
        assert_eq!(Value::str("a\\b\n").repr(), "'a\\\\b\\n'");
        assert_eq!(Value::tuple([Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::Float(80.0).repr(), "80.0");
        assert_eq!(Value::Float(1e20).repr(), "1e+20");
        assert_eq!(
            Value::dict([("levels", Value::tuple([Value::Float(80.0), Value::Float(90.0)]))]).repr(),
            "{'levels': (80.0, 90.0)}"
        );
    }

    #[test]
    fn test_repr_parses_back() {
        let v = Value::dict([
            ("name", Value::str("C:\\ \"quoted\" 'x'")),
            ("list", Value::list([Value::None, Value::Bool(false), Value::Int(-3)])),
            ("nested", Value::tuple([Value::Tuple(vec![])])),
        ]);
        assert_eq!(Value::parse(&v.repr()).unwrap(), v);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::list([Value::None]).is_truthy());
    }
}
