use std::sync::Arc;

use anyhow::Result;
use pagecraft_core::config::AppConfig;
use pagecraft_core::pipeline::{CancelHandle, PipelineSequencer, RunReport};
use pagecraft_core::storage::ArtifactStore;
use tracing::info;

use crate::gateway::{GenerationGateway, RetryPolicy};
use crate::llm::{build_client, LlmClient};
use crate::stages::LlmStages;

/// Owns one configured pipeline and the store its pages are written to.
pub struct AgentRuntime {
    sequencer: PipelineSequencer<LlmStages>,
    store: ArtifactStore,
}

impl AgentRuntime {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = build_client(&config.llm)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &AppConfig, client: Arc<dyn LlmClient>) -> Self {
        let gateway = GenerationGateway::new(client, RetryPolicy::from_config(&config.llm));
        let stages = LlmStages::new(
            gateway,
            config.pipeline.authoring,
            config.pipeline.faq_min_candidates,
        );
        Self {
            sequencer: PipelineSequencer::new(stages, config.pipeline.sequencer_options()),
            store: ArtifactStore::new(config.output.dir.clone()),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn run(&self, raw_text: &str, cancel: &CancelHandle) -> RunReport {
        info!(
            event_name = "runtime.run_requested",
            output_dir = %self.store.dir().display(),
            authoring = ?self.sequencer.stages().authoring(),
            input_chars = raw_text.chars().count(),
            "starting content pipeline"
        );
        self.sequencer.run(raw_text, &self.store, cancel).await
    }
}
