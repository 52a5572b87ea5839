use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{FieldKind, FieldSpec, Record, RecordSchema};

pub const PRODUCT_RECORD_SCHEMA: RecordSchema = RecordSchema {
    name: "product_record",
    fields: &[
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::required("price", FieldKind::Text),
        FieldSpec::optional("concentration", FieldKind::Text),
        FieldSpec::optional("skin_type", FieldKind::TextList),
        FieldSpec::optional("key_ingredients", FieldKind::TextList),
        FieldSpec::optional("benefits", FieldKind::TextList),
        FieldSpec::required("how_to_use", FieldKind::Text),
        FieldSpec::optional("side_effects", FieldKind::Text),
    ],
};

pub const FAQ_ITEM_SCHEMA: RecordSchema = RecordSchema {
    name: "faq_item",
    fields: &[
        FieldSpec::required("question", FieldKind::Text),
        FieldSpec::required("answer", FieldKind::Text),
        FieldSpec::required("category", FieldKind::Text),
    ],
};

pub const FAQ_CANDIDATES_SCHEMA: RecordSchema = RecordSchema {
    name: "faq_candidates",
    fields: &[FieldSpec::required("faq_candidates", FieldKind::RecordList(&FAQ_ITEM_SCHEMA))],
};

pub const COMPETITOR_PROFILE_SCHEMA: RecordSchema = RecordSchema {
    name: "competitor_profile",
    fields: &[
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::required("price", FieldKind::Text),
        FieldSpec::optional("key_ingredients", FieldKind::TextList),
        FieldSpec::optional("benefits", FieldKind::TextList),
    ],
};

/// Product facts extracted from the raw input text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: String,
    pub concentration: Option<String>,
    #[serde(default)]
    pub skin_type: Vec<String>,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub how_to_use: String,
    pub side_effects: Option<String>,
}

impl Record for ProductRecord {
    const SCHEMA: &'static RecordSchema = &PRODUCT_RECORD_SCHEMA;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
    pub category: String,
}

impl Record for FaqItem {
    const SCHEMA: &'static RecordSchema = &FAQ_ITEM_SCHEMA;
}

/// FAQ list validated as one field: a single invalid element fails the list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqCandidates {
    pub faq_candidates: Vec<FaqItem>,
}

impl Record for FaqCandidates {
    const SCHEMA: &'static RecordSchema = &FAQ_CANDIDATES_SCHEMA;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl Record for CompetitorProfile {
    const SCHEMA: &'static RecordSchema = &COMPETITOR_PROFILE_SCHEMA;
}

/// Output of the strategy stage. Both parts may be partial: the FAQ list can be
/// shorter than the configured minimum and the competitor profile can be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyBundle {
    pub faq_candidates: Vec<FaqItem>,
    #[serde(default)]
    pub competitor_profile: Option<CompetitorProfile>,
}

impl StrategyBundle {
    pub fn has_competitor(&self) -> bool {
        self.competitor_profile.is_some()
    }

    /// Competitor profile as a mapping; empty when no profile could be built.
    pub fn competitor_mapping(&self) -> Map<String, Value> {
        self.competitor_profile.as_ref().map(Record::to_mapping).unwrap_or_default()
    }
}
