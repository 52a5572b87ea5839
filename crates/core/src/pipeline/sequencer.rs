use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::{PipelineFailure, StageError, StageName};
use crate::pipeline::states::{RunEvent, RunState, RunTracker, StateTransition};
use crate::reconcile::{reconcile, Reconciled, StageOutput};
use crate::schema::pages::{PageArtifact, PageType};
use crate::schema::records::{ProductRecord, StrategyBundle};
use crate::storage::ArtifactSink;

/// One function per stage. Implementations own the text-generation calls,
/// including their timeouts.
#[async_trait]
pub trait PipelineStages: Send + Sync {
    async fn parse(&self, raw_text: &str) -> Result<ProductRecord, StageError>;

    async fn strategize(&self, product: &ProductRecord) -> Result<StrategyBundle, StageError>;

    async fn author(
        &self,
        page_type: PageType,
        product: &ProductRecord,
        strategy: &StrategyBundle,
    ) -> Result<StageOutput, StageError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaqPolicyMode {
    /// Short FAQ lists are logged and the run continues.
    Tolerate,
    /// Short FAQ lists fail the run at the strategy stage.
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaqPolicy {
    pub min_candidates: usize,
    pub mode: FaqPolicyMode,
}

impl Default for FaqPolicy {
    fn default() -> Self {
        Self { min_candidates: 5, mode: FaqPolicyMode::Tolerate }
    }
}

impl FaqPolicy {
    pub fn check(&self, strategy: &StrategyBundle) -> Result<(), StageError> {
        let found = strategy.faq_candidates.len();
        if found >= self.min_candidates {
            return Ok(());
        }

        match self.mode {
            FaqPolicyMode::Tolerate => {
                warn!(
                    event_name = "pipeline.faq_below_minimum",
                    found,
                    minimum = self.min_candidates,
                    "continuing with a partial faq list"
                );
                Ok(())
            }
            FaqPolicyMode::Reject => Err(StageError::Policy(format!(
                "expected at least {} faq candidates, found {found}",
                self.min_candidates
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequencerOptions {
    pub faq_policy: FaqPolicy,
    /// Run the three authoring stages concurrently. Results are still applied
    /// and persisted in the fixed page order.
    pub concurrent_authoring: bool,
}

/// Aborts a run at the next stage boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub state: RunState,
    pub transitions: Vec<StateTransition>,
    /// Stages in the order they were entered, including the one that failed.
    pub stages_started: Vec<StageName>,
    pub product: Option<ProductRecord>,
    pub strategy: Option<StrategyBundle>,
    pub artifacts: Vec<PageArtifact>,
    pub failure: Option<PipelineFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }

    pub fn artifact(&self, page_type: PageType) -> Option<&PageArtifact> {
        self.artifacts.iter().find(|artifact| artifact.page_type == page_type)
    }

    pub fn degraded_pages(&self) -> Vec<PageType> {
        self.artifacts
            .iter()
            .filter(|artifact| artifact.degraded)
            .map(|artifact| artifact.page_type)
            .collect()
    }

    pub fn into_result(self) -> Result<Vec<PageArtifact>, PipelineFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.artifacts),
        }
    }
}

struct ActiveRun {
    run_id: String,
    tracker: RunTracker,
    stages_started: Vec<StageName>,
    product: Option<ProductRecord>,
    strategy: Option<StrategyBundle>,
    artifacts: Vec<PageArtifact>,
}

impl ActiveRun {
    fn advance(&mut self, event: RunEvent) {
        match self.tracker.apply(event) {
            Ok(state) => info!(
                event_name = "pipeline.state_changed",
                run_id = %self.run_id,
                state = %state,
                "pipeline state advanced"
            ),
            Err(error) => error!(
                event_name = "pipeline.invalid_transition",
                run_id = %self.run_id,
                error = %error,
                "pipeline attempted an invalid state transition"
            ),
        }
    }
}

pub struct PipelineSequencer<S> {
    stages: S,
    options: SequencerOptions,
}

impl<S> PipelineSequencer<S>
where
    S: PipelineStages,
{
    pub fn new(stages: S, options: SequencerOptions) -> Self {
        Self { stages, options }
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    pub fn options(&self) -> SequencerOptions {
        self.options
    }

    /// Runs parse, strategize and the three authoring stages, persisting each
    /// page through `sink` as soon as it is reconciled.
    pub async fn run(
        &self,
        raw_text: &str,
        sink: &dyn ArtifactSink,
        cancel: &CancelHandle,
    ) -> RunReport {
        let started_at = Utc::now();
        let mut run = ActiveRun {
            run_id: Uuid::new_v4().to_string(),
            tracker: RunTracker::new(),
            stages_started: Vec::new(),
            product: None,
            strategy: None,
            artifacts: Vec::new(),
        };

        let failure = match self.drive(raw_text, sink, cancel, &mut run).await {
            Ok(()) => {
                info!(
                    event_name = "pipeline.run_completed",
                    run_id = %run.run_id,
                    artifacts = run.artifacts.len(),
                    degraded = run.artifacts.iter().filter(|artifact| artifact.degraded).count(),
                    "pipeline run completed"
                );
                None
            }
            Err(failure) => {
                error!(
                    event_name = "pipeline.run_failed",
                    run_id = %run.run_id,
                    stage = %failure.stage,
                    error_class = failure.error.error_class(),
                    error = %failure.error,
                    "pipeline run failed"
                );
                run.advance(RunEvent::StageFailed);
                Some(failure)
            }
        };

        RunReport {
            run_id: run.run_id,
            state: run.tracker.state(),
            transitions: run.tracker.into_transitions(),
            stages_started: run.stages_started,
            product: run.product,
            strategy: run.strategy,
            artifacts: run.artifacts,
            failure,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn drive(
        &self,
        raw_text: &str,
        sink: &dyn ArtifactSink,
        cancel: &CancelHandle,
        run: &mut ActiveRun,
    ) -> Result<(), PipelineFailure> {
        enter_stage(cancel, run, StageName::Parse)?;
        run.advance(RunEvent::Started);
        if raw_text.trim().is_empty() {
            return Err(PipelineFailure::new(StageName::Parse, StageError::NoData));
        }
        let product = self
            .stages
            .parse(raw_text)
            .await
            .map_err(|error| PipelineFailure::new(StageName::Parse, error))?;
        run.product = Some(product.clone());
        run.advance(RunEvent::ProductValidated);

        enter_stage(cancel, run, StageName::Strategize)?;
        let strategy = self
            .stages
            .strategize(&product)
            .await
            .map_err(|error| PipelineFailure::new(StageName::Strategize, error))?;
        self.options
            .faq_policy
            .check(&strategy)
            .map_err(|error| PipelineFailure::new(StageName::Strategize, error))?;
        if !strategy.has_competitor() {
            warn!(
                event_name = "pipeline.competitor_profile_empty",
                run_id = %run.run_id,
                "continuing without a competitor profile"
            );
        }
        run.strategy = Some(strategy.clone());
        run.advance(RunEvent::StrategyReady);

        if self.options.concurrent_authoring {
            for page_type in PageType::ALL {
                enter_stage(cancel, run, StageName::Author(page_type))?;
            }
            let (product_page, faq_page, comparison_page) = tokio::join!(
                self.stages.author(PageType::ProductPage, &product, &strategy),
                self.stages.author(PageType::FaqPage, &product, &strategy),
                self.stages.author(PageType::ComparisonPage, &product, &strategy),
            );
            let outputs = [product_page, faq_page, comparison_page];
            for (page_type, output) in PageType::ALL.into_iter().zip(outputs) {
                finish_authoring(page_type, output, sink, run)?;
            }
        } else {
            for page_type in PageType::ALL {
                enter_stage(cancel, run, StageName::Author(page_type))?;
                let output = self.stages.author(page_type, &product, &strategy).await;
                finish_authoring(page_type, output, sink, run)?;
            }
        }

        Ok(())
    }
}

fn enter_stage(
    cancel: &CancelHandle,
    run: &mut ActiveRun,
    stage: StageName,
) -> Result<(), PipelineFailure> {
    if cancel.is_cancelled() {
        return Err(PipelineFailure::new(stage, StageError::Cancelled));
    }
    run.stages_started.push(stage);
    info!(
        event_name = "pipeline.stage_started",
        run_id = %run.run_id,
        stage = %stage,
        "pipeline stage started"
    );
    Ok(())
}

fn finish_authoring(
    page_type: PageType,
    output: Result<StageOutput, StageError>,
    sink: &dyn ArtifactSink,
    run: &mut ActiveRun,
) -> Result<(), PipelineFailure> {
    let stage = StageName::Author(page_type);
    let output = output.map_err(|error| PipelineFailure::new(stage, error))?;
    let output_kind = output.kind();

    let artifact = match reconcile(output) {
        Reconciled::Content { content, strict: true } => PageArtifact::strict(page_type, content),
        Reconciled::Content { content, strict: false } => {
            warn!(
                event_name = "pipeline.page_degraded",
                run_id = %run.run_id,
                page_type = page_type.as_str(),
                output_kind,
                "page persisted without strict validation"
            );
            PageArtifact::degraded(page_type, content)
        }
        Reconciled::NoData => return Err(PipelineFailure::new(stage, StageError::NoData)),
    };

    sink.persist(&artifact)
        .map_err(|error| PipelineFailure::new(stage, StageError::Persistence(error.to_string())))?;
    run.artifacts.push(artifact);
    run.advance(RunEvent::PageAuthored(page_type));
    Ok(())
}
