//! Encoding of commands and decoding of responses and notifications.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::QueryError;

/// Prefix of the status line closing every response.
const STATUS_PREFIX: &str = "error ";

/// Prefix shared by all notification lines.
const NOTIFY_PREFIX: &str = "notify";

/// Escape a value for transmission.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            ' ' => out.push_str("\\s"),
            '|' => out.push_str("\\p"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0b}' => out.push_str("\\v"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]. Unknown escape sequences keep the escaped character.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('p') => out.push('|'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0b}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A command ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    parts: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    /// Add a `key=value` argument. The value is escaped.
    pub fn arg(mut self, key: &str, value: impl Display) -> Self {
        self.parts
            .push(format!("{}={}", key, escape(&value.to_string())));
        self
    }

    /// Add a `-flag` option.
    pub fn flag(mut self, flag: &str) -> Self {
        self.parts.push(format!("-{}", flag.trim_start_matches('-')));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode to a single line, without the trailing newline.
    pub fn encode(&self) -> String {
        if self.parts.is_empty() {
            return self.name.clone();
        }
        format!("{} {}", self.name, self.parts.join(" "))
    }
}

/// One record of a response or notification.
///
/// Bare keys (no `=`) are stored with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Raw (unescaped) value of a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Parse a field if present.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, QueryError> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| QueryError::InvalidField {
                    key: key.to_string(),
                    value: value.clone(),
                }),
        }
    }

    /// Parse a field that must be present.
    pub fn require<T: FromStr>(&self, key: &str) -> Result<T, QueryError> {
        self.get_parsed(key)?
            .ok_or_else(|| QueryError::MissingField(key.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse a single record (`key=value key2=value2 bare`).
pub fn parse_record(input: &str) -> Record {
    input
        .split(' ')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape(value)),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

/// Parse a data line into its `|`-separated records.
pub fn parse_records(line: &str) -> Vec<Record> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    line.split('|').map(parse_record).collect()
}

/// The status line closing a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: u32,
    pub message: String,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.id == 0
    }
}

/// Parse a status line. Returns `None` if `line` is not a status line, and
/// `Some(Err)` if it is one but carries no usable id.
pub fn parse_status(line: &str) -> Option<Result<Status, QueryError>> {
    let rest = line.strip_prefix(STATUS_PREFIX)?;
    let record = parse_record(rest);
    let status = record.require::<u32>("id").map(|id| Status {
        id,
        message: record.get("msg").unwrap_or_default().to_string(),
    });
    Some(status.map_err(|_| QueryError::Malformed(line.to_string())))
}

/// An unsolicited event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Event name, e.g. `notifyclientleftview`.
    pub event: String,
    pub records: Vec<Record>,
}

impl Notification {
    /// Parse a notification line. Returns `None` for any other line.
    pub fn parse(line: &str) -> Option<Self> {
        if !line.starts_with(NOTIFY_PREFIX) {
            return None;
        }
        let (event, rest) = line.split_once(' ').unwrap_or((line, ""));
        Some(Self {
            event: event.to_string(),
            records: parse_records(rest),
        })
    }

    pub fn is(&self, event: &str) -> bool {
        self.event == event
    }
}
