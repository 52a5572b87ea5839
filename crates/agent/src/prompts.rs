use pagecraft_core::schema::pages::PageType;
use pagecraft_core::schema::records::{ProductRecord, StrategyBundle};
use pagecraft_core::schema::Record;
use pagecraft_core::storage::to_pretty_json;
use serde_json::Value;

const JSON_ONLY: &str = "Respond with JSON only. Do not add commentary or markdown.";

pub fn parse_prompt(raw_text: &str) -> String {
    format!(
        "You are a rigid data analyst. You never guess.\n\
         Extract the product facts from the text below into one JSON object with the keys \
         name, price, concentration, skin_type (list), key_ingredients (list), benefits (list), \
         how_to_use, side_effects. Every value is a string or a list of strings. Use null for \
         facts the text does not state.\n\
         {JSON_ONLY}\n\n\
         Text:\n{raw_text}"
    )
}

pub fn faq_prompt(product: &ProductRecord, min_candidates: usize) -> String {
    format!(
        "You are a content strategist focused on user intent.\n\
         Write at least {min_candidates} frequently asked questions a shopper would ask about \
         this product, covering the categories Safety, Usage and Results. Answer only from \
         the product facts.\n\
         Return a JSON array of objects with the keys question, answer, category.\n\
         {JSON_ONLY}\n\n\
         Product:\n{}",
        render(&Value::Object(product.to_mapping()))
    )
}

pub fn competitor_prompt(product: &ProductRecord, market_data: &str) -> String {
    format!(
        "You compare products honestly.\n\
         Using the market data below, pick the single closest competitor to this product and \
         return one JSON object with the keys name, price, key_ingredients (list), \
         benefits (list). Do not invent brands that are not in the market data.\n\
         {JSON_ONLY}\n\n\
         Product:\n{}\n\n\
         Market data:\n{market_data}",
        render(&Value::Object(product.to_mapping()))
    )
}

pub fn page_prompt(page_type: PageType, product: &ProductRecord, strategy: &StrategyBundle) -> String {
    let product_json = render(&Value::Object(product.to_mapping()));
    match page_type {
        PageType::ProductPage => format!(
            "You write engaging, accurate product pages.\n\
             Return one JSON object with the keys page_type (\"product_page\"), name, price, \
             description, key_ingredients (list), benefits (list), specs (object with the \
             product facts).\n\
             {JSON_ONLY}\n\n\
             Product:\n{product_json}"
        ),
        PageType::FaqPage => {
            let candidates = serde_json::to_value(&strategy.faq_candidates)
                .map(|value| render(&value))
                .unwrap_or_else(|_| "[]".to_string());
            format!(
                "You edit FAQ pages.\n\
                 Return one JSON object with the keys page_type (\"faq_page\"), title and \
                 q_and_a, a list of objects with the keys question, answer, category. Keep \
                 every candidate below.\n\
                 {JSON_ONLY}\n\n\
                 Product:\n{product_json}\n\n\
                 FAQ candidates:\n{candidates}"
            )
        }
        PageType::ComparisonPage => format!(
            "You write honest comparison tables.\n\
             Return one JSON object with the keys page_type (\"comparison_page\"), title, \
             competitor_name and comparison_table, a list of objects with the keys feature, \
             us, them. Compare price, key ingredients and benefits.\n\
             {JSON_ONLY}\n\n\
             Product:\n{product_json}\n\n\
             Competitor:\n{}",
            render(&Value::Object(strategy.competitor_mapping()))
        ),
    }
}

fn render(value: &Value) -> String {
    to_pretty_json(value).unwrap_or_else(|_| value.to_string())
}
