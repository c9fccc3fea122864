//! Serialized parameter sets
//!
//! Parameters travel as a flat literal mapping such as
//! `{'criterion': 'gini', 'max_depth': None, 'n_estimators': 100}`.
//! The grammar is deliberately small: quoted keys, and values that are
//! integers, floats, quoted strings or the bare literals `True`, `False`
//! and `None`. Anything else is rejected with a parse error.

use crate::errors::{RecommenderError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Suffix stripped from stringified values so `3.0` and `3` share a category
const INTEGRAL_SUFFIX: &str = ".0";

/// A scalar parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

impl ParamValue {
    /// Category label used by the encoder
    ///
    /// This is lossy: a trailing `.0` is removed from every label, so
    /// `Float(3.0)` and `Int(3)` encode to the same category `"3"`.
    pub fn to_category(&self) -> String {
        let raw = match self {
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Float(v) => format!("{v:?}"),
            ParamValue::Str(s) => s.clone(),
            ParamValue::Bool(true) => "True".to_string(),
            ParamValue::Bool(false) => "False".to_string(),
            ParamValue::None => "None".to_string(),
        };
        match raw.strip_suffix(INTEGRAL_SUFFIX) {
            Some(stripped) => stripped.to_string(),
            None => raw,
        }
    }

    /// Recover a typed value from a category label
    ///
    /// Coercion order is integer, float, bare literal, string. Trying the
    /// integer first is what turns a stripped `"100"` back into `Int(100)`.
    pub fn from_category(label: &str) -> ParamValue {
        if let Ok(v) = label.parse::<i64>() {
            return ParamValue::Int(v);
        }
        if let Ok(v) = label.parse::<f64>() {
            if v.is_finite() {
                return ParamValue::Float(v);
            }
        }
        match label {
            "True" => ParamValue::Bool(true),
            "False" => ParamValue::Bool(false),
            "None" => ParamValue::None,
            other => ParamValue::Str(other.to_string()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v:?}"),
            ParamValue::Str(s) => write_quoted(f, s),
            ParamValue::Bool(true) => f.write_str("True"),
            ParamValue::Bool(false) => f.write_str("False"),
            ParamValue::None => f.write_str("None"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

/// Parameter name to value, kept in key order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the serialized form
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).parse_mapping()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The set as it will look after an encode/decode cycle
    pub fn canonical(&self) -> ParamSet {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), ParamValue::from_category(&v.to_category())))
            .collect()
    }
}

impl FromIterator<(String, ParamValue)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_quoted(f, key)?;
            write!(f, ": {value}")?;
        }
        f.write_str("}")
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> RecommenderError {
        RecommenderError::Parse {
            input: self.input.to_string(),
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
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

    fn expect(&mut self, want: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected {want:?}, found {c:?}"))),
            None => Err(self.error(format!("expected {want:?}, found end of input"))),
        }
    }

    fn parse_mapping(&mut self) -> Result<ParamSet> {
        let mut entries = BTreeMap::new();

        self.skip_ws();
        self.expect('{')?;
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                break;
            }

            let key_pos = self.pos;
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            if entries.insert(key.clone(), value).is_some() {
                self.pos = key_pos;
                return Err(self.error(format!("duplicate key {key:?}")));
            }

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected ',' or '}}', found {c:?}")));
                }
                None => return Err(self.error("unterminated mapping")),
            }
        }

        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(self.error("trailing characters after mapping"));
        }
        Ok(ParamSet(entries))
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            Some(c) => return Err(self.error(format!("expected quoted string, found {c:?}"))),
            None => return Err(self.error("expected quoted string, found end of input")),
        };
        self.bump();

        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => return Err(self.error(format!("unsupported escape \\{c}"))),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_value(&mut self) -> Result<ParamValue> {
        match self.peek() {
            Some('\'' | '"') => Ok(ParamValue::Str(self.parse_string()?)),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => {
                let input = self.input;
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                    self.bump();
                }
                match &input[start..self.pos] {
                    "True" => Ok(ParamValue::Bool(true)),
                    "False" => Ok(ParamValue::Bool(false)),
                    "None" => Ok(ParamValue::None),
                    word => {
                        let reason = format!("unknown literal {word:?}");
                        self.pos = start;
                        Err(self.error(reason))
                    }
                }
            }
            Some(c) => Err(self.error(format!("unexpected {c:?} where a value was expected"))),
            None => Err(self.error("expected value, found end of input")),
        }
    }

    fn parse_number(&mut self) -> Result<ParamValue> {
        let input = self.input;
        let start = self.pos;
        let mut is_float = false;

        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let int_digits = self.eat_digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            let frac_digits = self.eat_digits();
            if int_digits == 0 && frac_digits == 0 {
                self.pos = start;
                return Err(self.error("malformed number"));
            }
        } else if int_digits == 0 {
            self.pos = start;
            return Err(self.error("malformed number"));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('-' | '+')) {
                self.bump();
            }
            if self.eat_digits() == 0 {
                self.pos = start;
                return Err(self.error("malformed exponent"));
            }
        }

        let text = &input[start..self.pos];
        let parsed = if is_float {
            text.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(ParamValue::Float)
        } else {
            text.parse::<i64>().ok().map(ParamValue::Int)
        };
        match parsed {
            Some(value) => Ok(value),
            None => {
                self.pos = start;
                Err(self.error(format!("number {text} out of range")))
            }
        }
    }

    fn eat_digits(&mut self) -> usize {
        let mut n = 0;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            n += 1;
        }
        n
    }
}
