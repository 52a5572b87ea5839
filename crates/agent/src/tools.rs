use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with every built-in tool.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(CompetitorLookupTool);
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self.tools.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub const COMPETITOR_LOOKUP: &str = "competitor_lookup";
pub const NO_COMPETITOR_DATA: &str =
    "No specific competitor data found. Use general market averages.";

const CATEGORY_KEYWORDS: [&str; 2] = ["vitamin c", "serum"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarketCompetitor {
    pub brand: &'static str,
    pub price: &'static str,
    pub size: &'static str,
    pub key_features: &'static [&'static str],
}

const VITAMIN_C_SERUMS: [MarketCompetitor; 2] = [
    MarketCompetitor {
        brand: "LuminousSkin C-Power",
        price: "INR 1250",
        size: "30ml",
        key_features: &["15% Vitamin C", "Ferulic Acid"],
    },
    MarketCompetitor {
        brand: "DermaPure Brightener",
        price: "INR 899",
        size: "30ml",
        key_features: &["10% Vitamin C", "Vitamin E"],
    },
];

/// Static market data keyed on product category. Input: `{"category": "..."}`.
pub struct CompetitorLookupTool;

impl CompetitorLookupTool {
    pub fn lookup(category: &str) -> &'static [MarketCompetitor] {
        let category = category.to_lowercase();
        if CATEGORY_KEYWORDS.iter().any(|keyword| category.contains(keyword)) {
            &VITAMIN_C_SERUMS
        } else {
            &[]
        }
    }

    /// Plain-text rendering used inside prompts.
    pub fn summarize(competitors: &[MarketCompetitor]) -> String {
        if competitors.is_empty() {
            return NO_COMPETITOR_DATA.to_string();
        }

        let mut summary = String::from("Found Competitor Data:");
        for (index, competitor) in competitors.iter().enumerate() {
            summary.push_str(&format!(
                "\n{}. Brand: '{}'\n   - Price: {}\n   - Size: {}\n   - Key Features: {}.",
                index + 1,
                competitor.brand,
                competitor.price,
                competitor.size,
                competitor.key_features.join(", ")
            ));
        }
        summary
    }
}

#[async_trait]
impl Tool for CompetitorLookupTool {
    fn name(&self) -> &'static str {
        COMPETITOR_LOOKUP
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let category = input
            .get("category")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("competitor_lookup expects a string `category`"))?;
        let competitors = Self::lookup(category);

        Ok(json!({
            "category": category,
            "found": !competitors.is_empty(),
            "competitors": competitors,
            "summary": Self::summarize(competitors),
        }))
    }
}
