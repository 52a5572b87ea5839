use std::fmt;
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::schema::ValidationError;

/// Why a single pipeline stage could not produce its output.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("text generation timed out after {0:?}")]
    UpstreamTimeout(Duration),
    #[error("text generation failed: {0}")]
    UpstreamError(String),
    #[error("stage produced no data")]
    NoData,
    #[error("run was cancelled before the stage started")]
    Cancelled,
    #[error("stage output rejected by policy: {0}")]
    Policy(String),
    #[error("could not persist stage output: {0}")]
    Persistence(String),
}

impl StageError {
    /// Stable machine-readable class used in run reports and CLI output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::UpstreamError(_) => "upstream_error",
            Self::NoData => "no_data",
            Self::Cancelled => "cancelled",
            Self::Policy(_) => "policy",
            Self::Persistence(_) => "persistence",
        }
    }

    /// Timeouts and upstream failures are the only errors worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout(_) | Self::UpstreamError(_))
    }
}

/// Names the stage a failure originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Parse,
    Strategize,
    Author(crate::schema::pages::PageType),
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => f.write_str("parse"),
            Self::Strategize => f.write_str("strategize"),
            Self::Author(page_type) => write!(f, "author:{}", page_type.as_str()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("pipeline failed at stage `{stage}`: {error}")]
pub struct PipelineFailure {
    pub stage: StageName,
    pub error: StageError,
}

impl PipelineFailure {
    pub fn new(stage: StageName, error: StageError) -> Self {
        Self { stage, error }
    }
}

impl Serialize for PipelineFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineFailure", 3)?;
        state.serialize_field("stage", &self.stage.to_string())?;
        state.serialize_field("error_class", self.error.error_class())?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::errors::{PipelineFailure, StageError, StageName};
    use crate::schema::pages::PageType;
    use crate::schema::{ValidationError, ValidationIssue};

    #[test]
    fn failure_message_names_the_stage() {
        let failure = PipelineFailure::new(
            StageName::Author(PageType::FaqPage),
            StageError::UpstreamTimeout(Duration::from_secs(30)),
        );

        let message = failure.to_string();
        assert!(message.contains("author:faq_page"));
        assert!(message.contains("timed out"));
    }

    #[test]
    fn only_upstream_errors_are_retryable() {
        assert!(StageError::UpstreamTimeout(Duration::from_secs(1)).is_retryable());
        assert!(StageError::UpstreamError("503".to_string()).is_retryable());
        assert!(!StageError::NoData.is_retryable());
        assert!(!StageError::Validation(ValidationError::new(
            "product_record",
            vec![ValidationIssue::MissingField { field: "name".to_string() }],
        ))
        .is_retryable());
    }

    #[test]
    fn failure_serializes_stage_and_class() {
        let failure = PipelineFailure::new(StageName::Parse, StageError::NoData);

        let value = serde_json::to_value(&failure).expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({
                "stage": "parse",
                "error_class": "no_data",
                "message": "stage produced no data"
            })
        );
    }

    #[test]
    fn error_classes_are_stable() {
        assert_eq!(StageError::NoData.error_class(), "no_data");
        assert_eq!(StageError::Cancelled.error_class(), "cancelled");
        assert_eq!(StageError::Policy("too few".to_string()).error_class(), "policy");
    }
}
