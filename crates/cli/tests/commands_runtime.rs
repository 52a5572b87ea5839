use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use pagecraft_agent::ScriptedLlmClient;
use pagecraft_cli::commands::run::{run_with_client, RunArgs};
use pagecraft_cli::commands::{config, run, show};
use serde_json::Value;
use tempfile::TempDir;

const PRODUCT_REPLY: &str = r#"```json
{"name": "GlowBoost Vitamin C Serum", "price": "INR 699", "concentration": "10% Vitamin C",
 "key_ingredients": ["Vitamin C", "Hyaluronic Acid"], "benefits": ["Brightening"],
 "how_to_use": "Apply 2-3 drops in the morning"}
```"#;

const FAQ_REPLY: &str = r#"[
    {"question": "Can I use it daily?", "answer": "Yes, every morning.", "category": "Usage"},
    {"question": "Will it sting?", "answer": "Mild tingling is possible.", "category": "Safety"}
]"#;

const COMPETITOR_REPLY: &str = r#"{"name": "DermaPure Brightener", "price": "INR 899"}"#;

#[test]
fn run_rejects_empty_input_before_any_model_call() {
    with_env(&[("PAGECRAFT_LLM_PROVIDER", "ollama")], || {
        let workspace = TempDir::new().expect("temp dir");
        let input = write_input(&workspace, "   \n");
        let client = ScriptedLlmClient::default();

        let result = run_with_client(&run_args(&workspace, input), Arc::new(client.clone()));

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "run");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "empty_input");
        assert!(client.prompts().is_empty());
    });
}

#[test]
fn run_reports_unreadable_input() {
    with_env(&[("PAGECRAFT_LLM_PROVIDER", "ollama")], || {
        let workspace = TempDir::new().expect("temp dir");
        let missing = workspace.path().join("missing.txt");

        let result = run::run(&run_args(&workspace, missing));

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "input");
    });
}

#[test]
fn run_requires_an_api_key_for_gemini() {
    with_env(&[], || {
        let workspace = TempDir::new().expect("temp dir");
        let input = write_input(&workspace, "Product Name: GlowBoost");

        let result = run::run(&run_args(&workspace, input));

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn template_run_writes_pages_that_show_can_read() {
    with_env(&[("PAGECRAFT_LLM_PROVIDER", "ollama")], || {
        let workspace = TempDir::new().expect("temp dir");
        let input = write_input(&workspace, "Product Name: GlowBoost Vitamin C Serum");
        let client = ScriptedLlmClient::new([PRODUCT_REPLY, FAQ_REPLY, COMPETITOR_REPLY]);

        let result = run_with_client(&run_args(&workspace, input), Arc::new(client));

        assert_eq!(result.exit_code, 0, "run output: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["state"], "complete");
        assert_eq!(payload["artifacts"].as_array().map(Vec::len), Some(3));
        assert_eq!(payload["degraded_pages"], serde_json::json!([]));

        let shown = show::run("faq", Some(output_dir(&workspace)), None);
        assert_eq!(shown.exit_code, 0);
        let payload = parse_payload(&shown.output);
        assert_eq!(payload["page_type"], "faq_page");
        assert_eq!(payload["content"]["title"], "FAQ - GlowBoost Vitamin C Serum");
        assert_eq!(payload["content"]["q_and_a"].as_array().map(Vec::len), Some(2));

        let written = fs::read_to_string(output_dir(&workspace).join("comparison_page.json"))
            .expect("comparison page on disk");
        assert!(written.contains("\n    \"competitor_name\": \"DermaPure Brightener\""));
    });
}

#[test]
fn run_surfaces_parse_failure_with_stage() {
    with_env(&[("PAGECRAFT_LLM_PROVIDER", "ollama")], || {
        let workspace = TempDir::new().expect("temp dir");
        let input = write_input(&workspace, "Some text about a serum.");
        let client = ScriptedLlmClient::new(["I am not sure what this product is."]);

        let result = run_with_client(&run_args(&workspace, input), Arc::new(client));

        assert_eq!(result.exit_code, 4);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation");
        assert_eq!(payload["stage"], "parse");
        assert_eq!(payload["state"], "failed");
        assert!(payload["message"].as_str().unwrap_or_default().contains("how_to_use"));
    });
}

#[test]
fn show_returns_sentinel_with_exit_code_three() {
    with_env(&[], || {
        let workspace = TempDir::new().expect("temp dir");

        let result = show::run("comparison_page", Some(output_dir(&workspace)), None);

        assert_eq!(result.exit_code, 3);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "artifact_missing");
        assert_eq!(payload["content"]["error"], "File not found. Did the agents run?");
    });
}

#[test]
fn show_without_output_dir_needs_no_api_key() {
    let workspace = TempDir::new().expect("temp dir");
    let missing_dir = workspace.path().join("never-written");
    let missing_dir = missing_dir.to_str().expect("utf-8 temp path");

    with_env(&[("PAGECRAFT_OUTPUT_DIR", missing_dir)], || {
        let result = show::run("faq_page", None, None);

        assert_eq!(result.exit_code, 3, "show output: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "artifact_missing");
        assert_eq!(payload["content"]["error"], "File not found. Did the agents run?");
    });
}

#[test]
fn show_rejects_unknown_page_type() {
    with_env(&[], || {
        let result = show::run("landing_page", None, None);

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_argument");
    });
}

#[test]
fn config_redacts_key_and_attributes_env_source() {
    with_env(&[("GEMINI_API_KEY", "gm-super-secret")], || {
        let result = config::run(None);

        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains("gm-super-secret"));
        let payload = parse_payload(&result.output);
        let fields = payload["fields"].as_array().cloned().unwrap_or_default();
        let api_key = fields
            .iter()
            .find(|field| field["key"] == "llm.api_key")
            .cloned()
            .unwrap_or(Value::Null);
        assert_eq!(api_key["value"], "<redacted>");
        assert_eq!(api_key["source"], "env (GEMINI_API_KEY)");
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("PAGECRAFT_LLM_TIMEOUT_SECS", "0"), ("PAGECRAFT_LLM_PROVIDER", "ollama")], || {
        let result = config::run(None);

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn run_args(workspace: &TempDir, input: PathBuf) -> RunArgs {
    RunArgs {
        input,
        output_dir: Some(output_dir(workspace)),
        template: true,
        ..RunArgs::default()
    }
}

fn output_dir(workspace: &TempDir) -> PathBuf {
    workspace.path().join("output")
}

fn write_input(workspace: &TempDir, text: &str) -> PathBuf {
    let path = workspace.path().join("product.txt");
    fs::write(&path, text).expect("write input");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "GEMINI_API_KEY",
        "PAGECRAFT_LLM_PROVIDER",
        "PAGECRAFT_LLM_API_KEY",
        "PAGECRAFT_LLM_BASE_URL",
        "PAGECRAFT_LLM_MODEL",
        "PAGECRAFT_LLM_TEMPERATURE",
        "PAGECRAFT_LLM_TIMEOUT_SECS",
        "PAGECRAFT_LLM_MAX_RETRIES",
        "PAGECRAFT_LLM_RETRY_BASE_DELAY_MS",
        "PAGECRAFT_PIPELINE_FAQ_MIN_CANDIDATES",
        "PAGECRAFT_PIPELINE_FAQ_POLICY",
        "PAGECRAFT_PIPELINE_AUTHORING",
        "PAGECRAFT_PIPELINE_CONCURRENT_AUTHORING",
        "PAGECRAFT_OUTPUT_DIR",
        "PAGECRAFT_LOGGING_LEVEL",
        "PAGECRAFT_LOGGING_FORMAT",
        "PAGECRAFT_LOG_LEVEL",
        "PAGECRAFT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
