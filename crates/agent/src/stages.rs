//! Model-backed implementation of the pipeline stages.

use async_trait::async_trait;
use pagecraft_core::config::AuthoringMode;
use pagecraft_core::errors::{StageError, StageName};
use pagecraft_core::extract::{extract, GenericValue};
use pagecraft_core::pipeline::PipelineStages;
use pagecraft_core::reconcile::StageOutput;
use pagecraft_core::rules;
use pagecraft_core::schema::pages::PageType;
use pagecraft_core::schema::records::{
    CompetitorProfile, FaqCandidates, FaqItem, ProductRecord, StrategyBundle,
};
use pagecraft_core::schema::Record;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::gateway::GenerationGateway;
use crate::prompts;
use crate::tools::{CompetitorLookupTool, ToolRegistry, COMPETITOR_LOOKUP, NO_COMPETITOR_DATA};

/// Wrapper keys a model may put around an FAQ list instead of returning a bare array.
const FAQ_LIST_KEYS: [&str; 3] = ["q_and_a", "faqs", "faq"];

pub struct LlmStages {
    gateway: GenerationGateway,
    tools: ToolRegistry,
    authoring: AuthoringMode,
    faq_target: usize,
}

impl LlmStages {
    pub fn new(gateway: GenerationGateway, authoring: AuthoringMode, faq_target: usize) -> Self {
        Self { gateway, tools: ToolRegistry::with_defaults(), authoring, faq_target }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn authoring(&self) -> AuthoringMode {
        self.authoring
    }

    async fn faq_candidates(&self, product: &ProductRecord) -> Result<Vec<FaqItem>, StageError> {
        let response = self
            .gateway
            .generate(StageName::Strategize, &prompts::faq_prompt(product, self.faq_target))
            .await?;
        Ok(collect_faq_items(extract(&response)))
    }

    async fn competitor_profile(
        &self,
        product: &ProductRecord,
    ) -> Result<Option<CompetitorProfile>, StageError> {
        let market_data = self.market_data(product).await;
        let response = self
            .gateway
            .generate(StageName::Strategize, &prompts::competitor_prompt(product, &market_data))
            .await?;

        let extracted = extract(&response);
        if extracted.is_empty() {
            return Ok(None);
        }
        match CompetitorProfile::from_generic(&extracted) {
            Ok(profile) => Ok(Some(profile)),
            Err(error) => {
                warn!(
                    event_name = "strategy.competitor_profile_invalid",
                    error = %error,
                    "competitor profile did not validate, continuing without one"
                );
                Ok(None)
            }
        }
    }

    async fn market_data(&self, product: &ProductRecord) -> String {
        let category = match &product.concentration {
            Some(concentration) => format!("{} {concentration}", product.name),
            None => product.name.clone(),
        };

        match self.tools.execute(COMPETITOR_LOOKUP, json!({ "category": category })).await {
            Ok(result) => result
                .get("summary")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| CompetitorLookupTool::summarize(&[])),
            Err(error) => {
                warn!(
                    event_name = "strategy.competitor_lookup_failed",
                    error = %error,
                    "competitor lookup failed"
                );
                NO_COMPETITOR_DATA.to_string()
            }
        }
    }
}

#[async_trait]
impl PipelineStages for LlmStages {
    async fn parse(&self, raw_text: &str) -> Result<ProductRecord, StageError> {
        let response =
            self.gateway.generate(StageName::Parse, &prompts::parse_prompt(raw_text)).await?;
        let product = ProductRecord::from_generic(&extract(&response))?;
        info!(event_name = "stage.product_parsed", product = %product.name, "product record validated");
        Ok(product)
    }

    async fn strategize(&self, product: &ProductRecord) -> Result<StrategyBundle, StageError> {
        let faq_candidates = self.faq_candidates(product).await?;
        let competitor_profile = self.competitor_profile(product).await?;
        info!(
            event_name = "stage.strategy_ready",
            faq_candidates = faq_candidates.len(),
            has_competitor = competitor_profile.is_some(),
            "strategy bundle assembled"
        );
        Ok(StrategyBundle { faq_candidates, competitor_profile })
    }

    async fn author(
        &self,
        page_type: PageType,
        product: &ProductRecord,
        strategy: &StrategyBundle,
    ) -> Result<StageOutput, StageError> {
        match self.authoring {
            AuthoringMode::Template => {
                Ok(StageOutput::Record(rules::author_page(page_type, product, strategy)))
            }
            AuthoringMode::Llm => {
                let prompt = prompts::page_prompt(page_type, product, strategy);
                let response = self.gateway.generate(StageName::Author(page_type), &prompt).await?;
                Ok(StageOutput::from_response(page_type, Some(&response)))
            }
        }
    }
}

/// Validates the FAQ list as a whole. One invalid element rejects every
/// candidate, leaving a partial bundle for the FAQ policy to judge.
pub fn collect_faq_items(extracted: GenericValue) -> Vec<FaqItem> {
    let items = match extracted {
        GenericValue::Sequence(items) => items,
        GenericValue::Mapping(mut mapping) => FAQ_LIST_KEYS
            .iter()
            .find_map(|key| match mapping.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
    };
    let offered = items.len();

    let mut wrapper = Map::new();
    wrapper.insert("faq_candidates".to_string(), Value::Array(items));
    match FaqCandidates::from_generic(&GenericValue::Mapping(wrapper)) {
        Ok(candidates) => candidates.faq_candidates,
        Err(error) => {
            warn!(
                event_name = "strategy.faq_list_rejected",
                offered,
                error = %error,
                "rejecting faq list with invalid candidates"
            );
            Vec::new()
        }
    }
}
