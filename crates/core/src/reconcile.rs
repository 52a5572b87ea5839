//! Resolves a stage result of uncertain shape into one persistable mapping.

use serde_json::{Map, Value};
use tracing::debug;

use crate::extract::{extract, GenericValue};
use crate::schema::pages::{PageRecord, PageType, NOTE_KEY};

pub const RAW_CONTENT_KEY: &str = "raw_content";
pub const RAW_CONTENT_NOTE: &str =
    "AI generated content but strict parsing failed. Raw text preserved.";

/// What an authoring stage produced, tagged once when the output is taken.
#[derive(Clone, Debug, PartialEq)]
pub enum StageOutput {
    Record(PageRecord),
    Mapping(Map<String, Value>),
    RawString(String),
    Absent,
}

impl StageOutput {
    /// Tags a model response: a page that validates becomes `Record`, a non-empty
    /// extracted mapping that does not becomes `Mapping`, other non-blank text is
    /// kept as `RawString`, and a missing or blank response is `Absent`.
    pub fn from_response(page_type: PageType, response: Option<&str>) -> Self {
        let Some(text) = response.filter(|text| !text.trim().is_empty()) else {
            return Self::Absent;
        };

        let extracted = extract(text);
        match PageRecord::validate(page_type, &extracted) {
            Ok(record) => Self::Record(record),
            Err(error) => {
                debug!(
                    event_name = "reconcile.page_validation_failed",
                    page_type = page_type.as_str(),
                    error = %error,
                    "model page did not satisfy its schema"
                );
                match extracted {
                    GenericValue::Mapping(mapping) if !mapping.is_empty() => Self::Mapping(mapping),
                    _ => Self::RawString(text.to_string()),
                }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Mapping(_) => "mapping",
            Self::RawString(_) => "raw_string",
            Self::Absent => "absent",
        }
    }
}

impl From<PageRecord> for StageOutput {
    fn from(record: PageRecord) -> Self {
        Self::Record(record)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reconciled {
    Content {
        content: Map<String, Value>,
        /// True only when the content came from a validated record.
        strict: bool,
    },
    NoData,
}

impl Reconciled {
    pub fn content(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Content { content, .. } => Some(content),
            Self::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Resolves `output` with fixed precedence: record, mapping, raw string, absent.
/// Never fails; absence is reported as [`Reconciled::NoData`] for the caller to judge.
pub fn reconcile(output: StageOutput) -> Reconciled {
    match output {
        StageOutput::Record(record) => {
            Reconciled::Content { content: record.to_mapping(), strict: true }
        }
        StageOutput::Mapping(content) => Reconciled::Content { content, strict: false },
        StageOutput::RawString(raw) => match extract(&raw) {
            GenericValue::Mapping(content) if !content.is_empty() => {
                Reconciled::Content { content, strict: false }
            }
            _ => Reconciled::Content { content: wrap_raw(raw), strict: false },
        },
        StageOutput::Absent => Reconciled::NoData,
    }
}

fn wrap_raw(raw: String) -> Map<String, Value> {
    let mut content = Map::new();
    content.insert(RAW_CONTENT_KEY.to_string(), Value::String(raw));
    content.insert(NOTE_KEY.to_string(), Value::String(RAW_CONTENT_NOTE.to_string()));
    content
}
