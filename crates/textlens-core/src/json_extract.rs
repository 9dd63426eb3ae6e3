//! Recovers a JSON object from free-form model output.
//!
//! Classifier answers are supposed to be a single JSON object but arrive
//! wrapped in prose, code fences or broken across lines. Three strategies are
//! tried in order and the first that yields a JSON object wins:
//!
//! 1. [`Strategy::OuterBraces`]: slice from the first `{` to the last `}`.
//! 2. [`Strategy::Regex`]: greedy multi-line `\{.*\}` match.
//! 3. [`Strategy::LineAssembly`]: capture trimmed lines from the first one
//!    containing `{` up to the next line containing `}`, then concatenate.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static BRACED_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("valid braced-span regex"));

/// Which extraction strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    OuterBraces,
    Regex,
    LineAssembly,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::OuterBraces => write!(f, "outer-braces"),
            Strategy::Regex => write!(f, "regex"),
            Strategy::LineAssembly => write!(f, "line-assembly"),
        }
    }
}

/// A JSON object recovered from raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub record: Map<String, Value>,
    pub strategy: Strategy,
}

impl ExtractedRecord {
    pub fn into_value(self) -> Value {
        Value::Object(self.record)
    }
}

/// Tries every strategy in order; `None` if none yields a JSON object.
pub fn extract_record(raw: &str) -> Option<ExtractedRecord> {
    let strategies: [(Strategy, fn(&str) -> Option<Map<String, Value>>); 3] = [
        (Strategy::OuterBraces, outer_braces),
        (Strategy::Regex, regex_span),
        (Strategy::LineAssembly, line_assembly),
    ];

    for (strategy, attempt) in strategies {
        if let Some(record) = attempt(raw) {
            tracing::trace!(%strategy, "Recovered JSON record");
            return Some(ExtractedRecord { record, strategy });
        }
    }
    None
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    serde_json::from_str::<Map<String, Value>>(candidate).ok()
}

fn outer_braces(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&raw[start..=end])
}

fn regex_span(raw: &str) -> Option<Map<String, Value>> {
    let captures = BRACED_SPAN.captures(raw)?;
    parse_object(captures.get(1)?.as_str())
}

fn line_assembly(raw: &str) -> Option<Map<String, Value>> {
    let mut pieces: Vec<&str> = Vec::new();
    let mut capturing = false;

    for line in raw.lines().map(str::trim) {
        if !capturing {
            if let Some(start) = line.find('{') {
                capturing = true;
                pieces.push(&line[start..]);
            }
        } else if let Some(end) = line.rfind('}') {
            pieces.push(&line[..=end]);
            break;
        } else {
            pieces.push(line);
        }
    }

    if pieces.is_empty() {
        return None;
    }
    parse_object(&pieces.concat())
}
