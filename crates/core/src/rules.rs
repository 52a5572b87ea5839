//! Deterministic page assembly used by template authoring.

use serde_json::{Map, Value};

use crate::schema::pages::{
    ComparisonPage, ComparisonRow, FaqPage, PageRecord, PageType, ProductPage,
};
use crate::schema::records::{ProductRecord, StrategyBundle};
use crate::schema::Record;

pub const COMPARISON_FEATURES: [&str; 3] = ["price", "key_ingredients", "benefits"];
pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN_COMPETITOR: &str = "Unknown competitor";

/// Builds a page without a model call.
pub fn author_page(
    page_type: PageType,
    product: &ProductRecord,
    strategy: &StrategyBundle,
) -> PageRecord {
    match page_type {
        PageType::ProductPage => PageRecord::Product(product_page(product)),
        PageType::FaqPage => PageRecord::Faq(faq_page(product, strategy)),
        PageType::ComparisonPage => PageRecord::Comparison(comparison_page(product, strategy)),
    }
}

pub fn product_page(product: &ProductRecord) -> ProductPage {
    ProductPage {
        page_type: PageType::ProductPage.to_string(),
        name: product.name.clone(),
        price: product.price.clone(),
        description: describe(product),
        key_ingredients: product.key_ingredients.clone(),
        benefits: product.benefits.clone(),
        specs: product.to_mapping(),
    }
}

pub fn faq_page(product: &ProductRecord, strategy: &StrategyBundle) -> FaqPage {
    FaqPage {
        page_type: PageType::FaqPage.to_string(),
        title: format!("FAQ - {}", product.name),
        q_and_a: strategy.faq_candidates.clone(),
    }
}

pub fn comparison_page(product: &ProductRecord, strategy: &StrategyBundle) -> ComparisonPage {
    let competitor_name = strategy
        .competitor_profile
        .as_ref()
        .map(|profile| profile.name.clone())
        .unwrap_or_else(|| UNKNOWN_COMPETITOR.to_string());

    ComparisonPage {
        page_type: PageType::ComparisonPage.to_string(),
        title: format!("{} vs {}", product.name, competitor_name),
        competitor_name,
        comparison_table: comparison_matrix(&product.to_mapping(), &strategy.competitor_mapping()),
    }
}

/// One row per shared feature so both sides always line up.
pub fn comparison_matrix(
    ours: &Map<String, Value>,
    theirs: &Map<String, Value>,
) -> Vec<ComparisonRow> {
    COMPARISON_FEATURES
        .iter()
        .map(|key| ComparisonRow {
            feature: feature_title(key),
            us: render_cell(ours.get(*key)),
            them: render_cell(theirs.get(*key)),
        })
        .collect()
}

fn describe(product: &ProductRecord) -> String {
    let subject = product.concentration.as_deref().unwrap_or(product.name.as_str());
    match product.benefits.first() {
        Some(benefit) => format!("Experience the power of {subject}. {benefit}."),
        None => format!("Experience the power of {subject}."),
    }
}

fn feature_title(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_cell(value: Option<&Value>) -> String {
    let rendered = match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    if rendered.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{author_page, comparison_matrix, NOT_AVAILABLE, UNKNOWN_COMPETITOR};
    use crate::schema::pages::{PageRecord, PageType};
    use crate::schema::records::{CompetitorProfile, FaqItem, ProductRecord, StrategyBundle};

    fn product() -> ProductRecord {
        ProductRecord {
            name: "GlowBoost Vitamin C Serum".to_string(),
            price: "INR 699".to_string(),
            concentration: Some("10% Vitamin C".to_string()),
            skin_type: vec!["Oily".to_string(), "Combination".to_string()],
            key_ingredients: vec!["Vitamin C".to_string(), "Hyaluronic Acid".to_string()],
            benefits: vec!["Brightening".to_string(), "Fades dark spots".to_string()],
            how_to_use: "Apply 2-3 drops in the morning before sunscreen".to_string(),
            side_effects: Some("Mild tingling for sensitive skin".to_string()),
        }
    }

    #[test]
    fn product_page_carries_specs_and_description() {
        let PageRecord::Product(page) = author_page(PageType::ProductPage, &product(), &StrategyBundle::default())
        else {
            panic!("expected product page");
        };

        assert_eq!(page.description, "Experience the power of 10% Vitamin C. Brightening.");
        assert_eq!(page.specs["how_to_use"], json!("Apply 2-3 drops in the morning before sunscreen"));
        assert_eq!(page.page_type, "product_page");
    }

    #[test]
    fn faq_page_uses_all_candidates() {
        let strategy = StrategyBundle {
            faq_candidates: (1..=3)
                .map(|index| FaqItem {
                    question: format!("Q{index}"),
                    answer: format!("A{index}"),
                    category: "Usage".to_string(),
                })
                .collect(),
            competitor_profile: None,
        };

        let PageRecord::Faq(page) = author_page(PageType::FaqPage, &product(), &strategy) else {
            panic!("expected faq page");
        };
        assert_eq!(page.title, "FAQ - GlowBoost Vitamin C Serum");
        assert_eq!(page.q_and_a.len(), 3);
    }

    #[test]
    fn comparison_without_competitor_renders_placeholders() {
        let PageRecord::Comparison(page) =
            author_page(PageType::ComparisonPage, &product(), &StrategyBundle::default())
        else {
            panic!("expected comparison page");
        };

        assert_eq!(page.competitor_name, UNKNOWN_COMPETITOR);
        assert!(page.comparison_table.iter().all(|row| row.them == NOT_AVAILABLE));
        assert_eq!(page.comparison_table[1].us, "Vitamin C, Hyaluronic Acid");
    }

    #[test]
    fn comparison_matrix_titles_features() {
        let strategy = StrategyBundle {
            faq_candidates: vec![],
            competitor_profile: Some(CompetitorProfile {
                name: "LuminousSkin C-Power".to_string(),
                price: "INR 1250".to_string(),
                key_ingredients: vec!["Vitamin C".to_string(), "Ferulic Acid".to_string()],
                benefits: vec![],
            }),
        };

        let rows = comparison_matrix(
            &crate::schema::Record::to_mapping(&product()),
            &strategy.competitor_mapping(),
        );
        let features: Vec<_> = rows.iter().map(|row| row.feature.as_str()).collect();
        assert_eq!(features, vec!["Price", "Key Ingredients", "Benefits"]);
        assert_eq!(rows[0].them, "INR 1250");
        assert_eq!(rows[2].them, NOT_AVAILABLE);
    }
}
