use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::records::{FaqItem, FAQ_ITEM_SCHEMA};
use super::{FieldKind, FieldSpec, Record, RecordSchema, ValidationError};
use crate::extract::GenericValue;

pub const PAGE_TYPE_KEY: &str = "page_type";
pub const NOTE_KEY: &str = "note";
/// Always `true` on pages persisted without strict validation.
pub const DEGRADED_KEY: &str = "degraded";
pub const DEGRADED_MAPPING_NOTE: &str =
    "Content did not satisfy the page schema. Persisted best-effort without strict validation.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    ProductPage,
    FaqPage,
    ComparisonPage,
}

impl PageType {
    /// Authoring order used by the pipeline.
    pub const ALL: [PageType; 3] = [Self::ProductPage, Self::FaqPage, Self::ComparisonPage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductPage => "product_page",
            Self::FaqPage => "faq_page",
            Self::ComparisonPage => "comparison_page",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    pub fn next(&self) -> Option<PageType> {
        match self {
            Self::ProductPage => Some(Self::FaqPage),
            Self::FaqPage => Some(Self::ComparisonPage),
            Self::ComparisonPage => None,
        }
    }

    pub fn schema(&self) -> &'static RecordSchema {
        match self {
            Self::ProductPage => ProductPage::SCHEMA,
            Self::FaqPage => FaqPage::SCHEMA,
            Self::ComparisonPage => ComparisonPage::SCHEMA,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().trim_end_matches(".json") {
            "product_page" | "product" => Ok(Self::ProductPage),
            "faq_page" | "faq" => Ok(Self::FaqPage),
            "comparison_page" | "comparison" => Ok(Self::ComparisonPage),
            other => Err(format!(
                "unknown page type `{other}` (expected product_page|faq_page|comparison_page)"
            )),
        }
    }
}

pub const PRODUCT_PAGE_SCHEMA: RecordSchema = RecordSchema {
    name: "product_page",
    fields: &[
        FieldSpec::defaulted(PAGE_TYPE_KEY, "product_page"),
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::required("price", FieldKind::Text),
        FieldSpec::required("description", FieldKind::Text),
        FieldSpec::required("key_ingredients", FieldKind::TextList),
        FieldSpec::required("benefits", FieldKind::TextList),
        FieldSpec::required("specs", FieldKind::Object),
    ],
};

pub const FAQ_PAGE_SCHEMA: RecordSchema = RecordSchema {
    name: "faq_page",
    fields: &[
        FieldSpec::defaulted(PAGE_TYPE_KEY, "faq_page"),
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::required("q_and_a", FieldKind::RecordList(&FAQ_ITEM_SCHEMA)),
    ],
};

pub const COMPARISON_ROW_SCHEMA: RecordSchema = RecordSchema {
    name: "comparison_row",
    fields: &[
        FieldSpec::required("feature", FieldKind::Text),
        FieldSpec::required("us", FieldKind::Text),
        FieldSpec::required("them", FieldKind::Text),
    ],
};

pub const COMPARISON_PAGE_SCHEMA: RecordSchema = RecordSchema {
    name: "comparison_page",
    fields: &[
        FieldSpec::defaulted(PAGE_TYPE_KEY, "comparison_page"),
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::required("competitor_name", FieldKind::Text),
        FieldSpec::required("comparison_table", FieldKind::RecordList(&COMPARISON_ROW_SCHEMA)),
    ],
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    pub page_type: String,
    pub name: String,
    pub price: String,
    pub description: String,
    pub key_ingredients: Vec<String>,
    pub benefits: Vec<String>,
    pub specs: Map<String, Value>,
}

impl Record for ProductPage {
    const SCHEMA: &'static RecordSchema = &PRODUCT_PAGE_SCHEMA;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqPage {
    pub page_type: String,
    pub title: String,
    pub q_and_a: Vec<FaqItem>,
}

impl Record for FaqPage {
    const SCHEMA: &'static RecordSchema = &FAQ_PAGE_SCHEMA;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub feature: String,
    pub us: String,
    pub them: String,
}

impl Record for ComparisonRow {
    const SCHEMA: &'static RecordSchema = &COMPARISON_ROW_SCHEMA;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPage {
    pub page_type: String,
    pub title: String,
    pub competitor_name: String,
    pub comparison_table: Vec<ComparisonRow>,
}

impl Record for ComparisonPage {
    const SCHEMA: &'static RecordSchema = &COMPARISON_PAGE_SCHEMA;
}

/// A validated page of any type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageRecord {
    Product(ProductPage),
    Faq(FaqPage),
    Comparison(ComparisonPage),
}

impl PageRecord {
    /// Validates `value` against the schema selected by `page_type`.
    pub fn validate(page_type: PageType, value: &GenericValue) -> Result<Self, ValidationError> {
        match page_type {
            PageType::ProductPage => ProductPage::from_generic(value).map(Self::Product),
            PageType::FaqPage => FaqPage::from_generic(value).map(Self::Faq),
            PageType::ComparisonPage => ComparisonPage::from_generic(value).map(Self::Comparison),
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            Self::Product(_) => PageType::ProductPage,
            Self::Faq(_) => PageType::FaqPage,
            Self::Comparison(_) => PageType::ComparisonPage,
        }
    }

    /// Field-by-field mapping with `page_type` pinned to the record's tag.
    pub fn to_mapping(&self) -> Map<String, Value> {
        let mut mapping = match self {
            Self::Product(page) => page.to_mapping(),
            Self::Faq(page) => page.to_mapping(),
            Self::Comparison(page) => page.to_mapping(),
        };
        mapping.insert(PAGE_TYPE_KEY.to_string(), Value::String(self.page_type().to_string()));
        mapping
    }
}

/// A page ready for persistence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageArtifact {
    pub page_type: PageType,
    pub content: Map<String, Value>,
    /// True when the content bypassed strict validation.
    pub degraded: bool,
}

impl PageArtifact {
    pub fn strict(page_type: PageType, content: Map<String, Value>) -> Self {
        Self { page_type, content, degraded: false }
    }

    /// Wraps best-effort content. `page_type` is pinned to the artifact's tag and
    /// `degraded: true` is set regardless of what the content carried; a missing
    /// `note` gets the generic explanation.
    pub fn degraded(page_type: PageType, mut content: Map<String, Value>) -> Self {
        content.insert(PAGE_TYPE_KEY.to_string(), Value::String(page_type.as_str().to_string()));
        content.insert(DEGRADED_KEY.to_string(), Value::Bool(true));
        content
            .entry(NOTE_KEY)
            .or_insert_with(|| Value::String(DEGRADED_MAPPING_NOTE.to_string()));
        Self { page_type, content, degraded: true }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{PageArtifact, PageRecord, PageType, DEGRADED_KEY, NOTE_KEY};
    use crate::extract::extract;

    #[test]
    fn product_page_requires_description() {
        let value = extract(
            r#"{"page_type": "product_page", "name": "Test Serum", "price": "$20",
                "key_ingredients": ["Vit C", "Water"], "benefits": ["Glow", "Smooth"],
                "specs": {"volume": "30ml"}}"#,
        );

        let error = PageRecord::validate(PageType::ProductPage, &value).expect_err("no description");
        assert_eq!(error.missing_fields(), vec!["description"]);
    }

    #[test]
    fn faq_page_validates_each_item() {
        let value = extract(
            r#"{"title": "FAQ Section", "q_and_a": [
                {"question": "Q1", "answer": "A1", "category": "Usage"},
                {"question": "Q2", "answer": "A2", "category": "Safety"}]}"#,
        );

        let record = PageRecord::validate(PageType::FaqPage, &value).expect("valid faq page");
        let PageRecord::Faq(page) = &record else {
            panic!("expected faq page");
        };
        assert_eq!(page.page_type, "faq_page");
        assert_eq!(page.q_and_a.len(), 2);
        assert_eq!(page.q_and_a[0].category, "Usage");

        let broken = extract(
            r#"{"title": "FAQ", "q_and_a": [
                {"question": "Q1", "answer": "A1", "category": "Usage"},
                {"question": "Q2", "answer": "A2"}]}"#,
        );
        let error = PageRecord::validate(PageType::FaqPage, &broken).expect_err("missing category");
        assert_eq!(error.missing_fields(), vec!["q_and_a[1].category"]);
    }

    #[test]
    fn comparison_page_mapping_pins_page_type() {
        let value = extract(
            r#"{"page_type": "something_else", "title": "Us vs Them", "competitor_name": "Brand X",
                "comparison_table": [{"feature": "Price", "us": "$10", "them": "$15"}]}"#,
        );

        let record =
            PageRecord::validate(PageType::ComparisonPage, &value).expect("valid comparison");
        let mapping = record.to_mapping();
        assert_eq!(mapping["page_type"], json!("comparison_page"));
        assert_eq!(mapping["comparison_table"][0]["us"], json!("$10"));
    }

    #[test]
    fn degraded_artifact_keeps_existing_note() {
        let content = json!({"raw_content": "text", "note": "kept"});
        let artifact = PageArtifact::degraded(
            PageType::FaqPage,
            content.as_object().cloned().unwrap_or_default(),
        );

        assert!(artifact.degraded);
        assert_eq!(artifact.content[NOTE_KEY], json!("kept"));
        assert_eq!(artifact.content["page_type"], json!("faq_page"));
        assert_eq!(artifact.content[DEGRADED_KEY], json!(true));
    }

    #[test]
    fn degraded_artifact_overrides_model_supplied_markers() {
        let content = json!({"title": "Serum", "page_type": "faq_page", "degraded": false});
        let artifact = PageArtifact::degraded(
            PageType::ProductPage,
            content.as_object().cloned().unwrap_or_default(),
        );

        assert_eq!(artifact.content["page_type"], json!("product_page"));
        assert_eq!(artifact.content[DEGRADED_KEY], json!(true));
        assert!(artifact.content.contains_key(NOTE_KEY));
    }

    #[test]
    fn page_type_parses_short_and_file_names() {
        assert_eq!("faq".parse::<PageType>(), Ok(PageType::FaqPage));
        assert_eq!("comparison_page.json".parse::<PageType>(), Ok(PageType::ComparisonPage));
        assert!("landing".parse::<PageType>().is_err());
    }
}
