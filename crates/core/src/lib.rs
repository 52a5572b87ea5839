pub mod config;
pub mod errors;
pub mod extract;
pub mod pipeline;
pub mod reconcile;
pub mod rules;
pub mod schema;
pub mod storage;

pub use config::{AppConfig, AuthoringMode, ConfigError, LlmConfig, LlmProvider, LoadOptions};
pub use errors::{PipelineFailure, StageError, StageName};
pub use extract::{extract, GenericValue};
pub use pipeline::{
    CancelHandle, FaqPolicy, FaqPolicyMode, PipelineSequencer, PipelineStages, RunReport,
    RunState, SequencerOptions,
};
pub use reconcile::{reconcile, Reconciled, StageOutput};
pub use schema::pages::{PageArtifact, PageRecord, PageType};
pub use schema::records::{CompetitorProfile, FaqItem, ProductRecord, StrategyBundle};
pub use schema::{Record, ValidationError, ValidationIssue};
pub use storage::{ArtifactSink, ArtifactStore, StorageError};
