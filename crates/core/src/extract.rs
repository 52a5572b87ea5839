//! Best-effort recovery of JSON values from free-form model output.
//!
//! The extractor never fails: malformed output degrades to an empty mapping or
//! an empty sequence, chosen by whether the raw response contained a `[`.
//! Callers that expect list-shaped data must check for a non-empty result
//! rather than relying on the variant alone.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

const DIAGNOSTIC_PREFIX_CHARS: usize = 200;

/// Result of best-effort parsing: an object or an array.
#[derive(Clone, Debug, PartialEq)]
pub enum GenericValue {
    Mapping(Map<String, Value>),
    Sequence(Vec<Value>),
}

impl GenericValue {
    pub fn empty_mapping() -> Self {
        Self::Mapping(Map::new())
    }

    pub fn empty_sequence() -> Self {
        Self::Sequence(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Mapping(map) => map.is_empty(),
            Self::Sequence(items) => items.is_empty(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "object",
            Self::Sequence(_) => "array",
        }
    }

    pub fn as_mapping(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Mapping(map) => Some(map),
            Self::Sequence(_) => None,
        }
    }

    pub fn into_mapping(self) -> Option<Map<String, Value>> {
        match self {
            Self::Mapping(map) => Some(map),
            Self::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Mapping(_) => None,
            Self::Sequence(items) => Some(items),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Mapping(map) => Value::Object(map),
            Self::Sequence(items) => Value::Array(items),
        }
    }
}

impl From<Map<String, Value>> for GenericValue {
    fn from(map: Map<String, Value>) -> Self {
        Self::Mapping(map)
    }
}

#[derive(Debug, Error)]
enum ExtractionFailure {
    #[error("json decode error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("decoded json is a {0}, expected an object or an array")]
    NotStructured(&'static str),
}

fn opening_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)```json\s*").expect("opening fence pattern is valid"))
}

fn bracketed_span() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)(\[.*\]|\{.*\})").expect("bracketed span pattern is valid")
    })
}

/// Removes markdown code fences and surrounding whitespace.
///
/// Opening fences are matched case-insensitively together with a `json` tag and
/// the whitespace that follows; every remaining bare fence is dropped.
pub fn sanitize(text: &str) -> String {
    let without_opening = opening_fence().replace_all(text, "");
    without_opening.replace("```", "").trim().to_string()
}

/// Locates the candidate JSON span inside already sanitized text.
///
/// The span runs from the first `[` or `{` that has a matching closing bracket
/// kind somewhere after it, up to the *last* such closing bracket. This is not
/// balanced matching: sibling values or brackets inside string literals produce
/// a span that fails to parse, which the extractor then degrades.
pub fn locate_json(cleaned: &str) -> &str {
    bracketed_span().find(cleaned).map(|found| found.as_str()).unwrap_or(cleaned)
}

/// Converts a raw model response into a [`GenericValue`]. Never fails.
pub fn extract(raw: &str) -> GenericValue {
    let cleaned = sanitize(raw);
    let candidate = locate_json(&cleaned);

    let span_error = match parse_structured(candidate) {
        Ok(value) => return value,
        Err(error) => error,
    };

    let failure = if candidate.len() == cleaned.len() {
        span_error
    } else {
        debug!(
            event_name = "extract.span_parse_failed",
            reason = %span_error,
            "bracketed span did not parse, retrying with the full cleaned text"
        );
        match parse_structured(&cleaned) {
            Ok(value) => return value,
            Err(error) => error,
        }
    };

    let degraded =
        if raw.contains('[') { GenericValue::empty_sequence() } else { GenericValue::empty_mapping() };
    warn!(
        event_name = "extract.parse_failed",
        reason = %failure,
        degraded_to = degraded.kind(),
        raw_prefix = %diagnostic_prefix(raw),
        "could not extract json from model response"
    );
    degraded
}

fn parse_structured(text: &str) -> Result<GenericValue, ExtractionFailure> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(GenericValue::Mapping(map)),
        Value::Array(items) => Ok(GenericValue::Sequence(items)),
        Value::Null => Err(ExtractionFailure::NotStructured("null")),
        Value::Bool(_) => Err(ExtractionFailure::NotStructured("boolean")),
        Value::Number(_) => Err(ExtractionFailure::NotStructured("number")),
        Value::String(_) => Err(ExtractionFailure::NotStructured("string")),
    }
}

fn diagnostic_prefix(raw: &str) -> String {
    raw.chars().take(DIAGNOSTIC_PREFIX_CHARS).collect()
}
