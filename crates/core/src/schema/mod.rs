//! Declarative record schemas and the strict validator that maps extracted
//! [`GenericValue`]s onto typed records.
//!
//! Validation collects every missing required field and every type mismatch
//! before failing. There is no coercion between JSON types.

pub mod pages;
pub mod records;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::extract::GenericValue;

#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    Text,
    TextList,
    Object,
    RecordList(&'static RecordSchema),
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::TextList => "array of strings",
            Self::Object => "object",
            Self::RecordList(_) => "array of objects",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Presence {
    Required,
    Optional,
    /// Optional text field that takes the given value when absent.
    Defaulted(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, presence: Presence::Required }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, presence: Presence::Optional }
    }

    pub const fn defaulted(name: &'static str, default: &'static str) -> Self {
        Self { name, kind: FieldKind::Text, presence: Presence::Defaulted(default) }
    }

    fn default_value(&self) -> Option<Value> {
        match (self.presence, self.kind) {
            (Presence::Required, _) => None,
            (Presence::Defaulted(default), _) => Some(Value::String(default.to_string())),
            (Presence::Optional, FieldKind::Text) => Some(Value::Null),
            (Presence::Optional, FieldKind::TextList | FieldKind::RecordList(_)) => {
                Some(Value::Array(Vec::new()))
            }
            (Presence::Optional, FieldKind::Object) => Some(Value::Object(Map::new())),
        }
    }
}

#[derive(Debug)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl RecordSchema {
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| matches!(field.presence, Presence::Required))
            .map(|field| field.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: String },
    TypeMismatch { field: String, expected: &'static str, found: &'static str },
    Malformed { field: String, message: String },
}

impl ValidationIssue {
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::TypeMismatch { field, .. }
            | Self::Malformed { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing required field `{field}`"),
            Self::TypeMismatch { field, expected, found } => {
                write!(f, "`{field}` expected {expected}, found {found}")
            }
            Self::Malformed { field, message } => write!(f, "`{field}` is malformed: {message}"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub struct ValidationError {
    pub record: &'static str,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(record: &'static str, issues: Vec<ValidationIssue>) -> Self {
        Self { record, issues }
    }

    pub fn missing_fields(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                ValidationIssue::MissingField { field } => Some(field.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field() == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed validation: ", self.record)?;
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Checks `value` against `schema` and returns the normalized mapping: declared
/// fields only, with defaults filled in for absent optional fields.
pub fn validate(
    schema: &'static RecordSchema,
    value: &GenericValue,
) -> Result<Map<String, Value>, ValidationError> {
    let Some(mapping) = value.as_mapping() else {
        return Err(ValidationError::new(
            schema.name,
            vec![ValidationIssue::TypeMismatch {
                field: "$".to_string(),
                expected: "object",
                found: value.kind(),
            }],
        ));
    };

    let mut issues = Vec::new();
    let normalized = validate_mapping(schema, mapping, "", &mut issues);
    if issues.is_empty() {
        Ok(normalized)
    } else {
        Err(ValidationError::new(schema.name, issues))
    }
}

fn validate_mapping(
    schema: &'static RecordSchema,
    mapping: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Map<String, Value> {
    let mut normalized = Map::new();

    for field in schema.fields {
        let path = format!("{prefix}{}", field.name);
        let present = mapping.get(field.name).filter(|value| !value.is_null());

        let Some(value) = present else {
            match field.default_value() {
                Some(default) => {
                    normalized.insert(field.name.to_string(), default);
                }
                None => issues.push(ValidationIssue::MissingField { field: path }),
            }
            continue;
        };

        if let Some(checked) = check_field(field.kind, value, &path, issues) {
            normalized.insert(field.name.to_string(), checked);
        }
    }

    normalized
}

fn check_field(
    kind: FieldKind,
    value: &Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    let mismatch = |issues: &mut Vec<ValidationIssue>| -> Option<Value> {
        issues.push(ValidationIssue::TypeMismatch {
            field: path.to_string(),
            expected: kind.expected(),
            found: json_kind(value),
        });
        None
    };

    match (kind, value) {
        (FieldKind::Text, Value::String(_)) | (FieldKind::Object, Value::Object(_)) => {
            Some(value.clone())
        }
        (FieldKind::TextList, Value::Array(items)) => {
            let before = issues.len();
            for (index, item) in items.iter().enumerate() {
                if !item.is_string() {
                    issues.push(ValidationIssue::TypeMismatch {
                        field: format!("{path}[{index}]"),
                        expected: "string",
                        found: json_kind(item),
                    });
                }
            }
            (issues.len() == before).then(|| value.clone())
        }
        (FieldKind::RecordList(schema), Value::Array(items)) => {
            let before = issues.len();
            let mut records = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let element_path = format!("{path}[{index}]");
                match item {
                    Value::Object(element) => {
                        let prefix = format!("{element_path}.");
                        records.push(Value::Object(validate_mapping(
                            schema, element, &prefix, issues,
                        )));
                    }
                    other => issues.push(ValidationIssue::TypeMismatch {
                        field: element_path,
                        expected: "object",
                        found: json_kind(other),
                    }),
                }
            }
            (issues.len() == before).then_some(Value::Array(records))
        }
        _ => mismatch(issues),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A typed record with a declared schema.
pub trait Record: Serialize + DeserializeOwned {
    const SCHEMA: &'static RecordSchema;

    fn from_generic(value: &GenericValue) -> Result<Self, ValidationError> {
        let normalized = validate(Self::SCHEMA, value)?;
        serde_json::from_value(Value::Object(normalized)).map_err(|error| {
            ValidationError::new(
                Self::SCHEMA.name,
                vec![ValidationIssue::Malformed { field: "$".to_string(), message: error.to_string() }],
            )
        })
    }

    fn from_mapping(mapping: &Map<String, Value>) -> Result<Self, ValidationError> {
        Self::from_generic(&GenericValue::Mapping(mapping.clone()))
    }

    /// Field-by-field mapping of the record.
    fn to_mapping(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
