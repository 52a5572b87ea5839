use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pagecraft_core::config::{resolve_config_path, AppConfig, LoadOptions};
use serde_json::{json, Map, Value};
use toml::Value as TomlValue;

use crate::commands::{CommandResult, EXIT_USAGE};

const COMMAND: &str = "config";

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.clone(),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_USAGE,
            );
        }
    };

    let file_path = resolve_config_path(config_path.as_deref());
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = SourceLookup { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let fields = vec![
        sources.field(
            "llm.provider",
            &format!("{:?}", config.llm.provider).to_lowercase(),
            &["PAGECRAFT_LLM_PROVIDER"],
        ),
        sources.field("llm.model", &config.llm.model, &["PAGECRAFT_LLM_MODEL"]),
        sources.field(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            &["PAGECRAFT_LLM_BASE_URL"],
        ),
        sources.field("llm.api_key", llm_api_key, &["PAGECRAFT_LLM_API_KEY", "GEMINI_API_KEY"]),
        sources.field(
            "llm.temperature",
            &config.llm.temperature.to_string(),
            &["PAGECRAFT_LLM_TEMPERATURE"],
        ),
        sources.field(
            "llm.timeout_secs",
            &config.llm.timeout_secs.to_string(),
            &["PAGECRAFT_LLM_TIMEOUT_SECS"],
        ),
        sources.field(
            "llm.max_retries",
            &config.llm.max_retries.to_string(),
            &["PAGECRAFT_LLM_MAX_RETRIES"],
        ),
        sources.field(
            "llm.retry_base_delay_ms",
            &config.llm.retry_base_delay_ms.to_string(),
            &["PAGECRAFT_LLM_RETRY_BASE_DELAY_MS"],
        ),
        sources.field(
            "pipeline.faq_min_candidates",
            &config.pipeline.faq_min_candidates.to_string(),
            &["PAGECRAFT_PIPELINE_FAQ_MIN_CANDIDATES"],
        ),
        sources.field(
            "pipeline.faq_policy",
            &format!("{:?}", config.pipeline.faq_policy).to_lowercase(),
            &["PAGECRAFT_PIPELINE_FAQ_POLICY"],
        ),
        sources.field(
            "pipeline.authoring",
            &format!("{:?}", config.pipeline.authoring).to_lowercase(),
            &["PAGECRAFT_PIPELINE_AUTHORING"],
        ),
        sources.field(
            "pipeline.concurrent_authoring",
            &config.pipeline.concurrent_authoring.to_string(),
            &["PAGECRAFT_PIPELINE_CONCURRENT_AUTHORING"],
        ),
        sources.field(
            "output.dir",
            &config.output.dir.display().to_string(),
            &["PAGECRAFT_OUTPUT_DIR"],
        ),
        sources.field(
            "logging.level",
            &config.logging.level,
            &["PAGECRAFT_LOGGING_LEVEL", "PAGECRAFT_LOG_LEVEL"],
        ),
        sources.field(
            "logging.format",
            &format!("{:?}", config.logging.format).to_lowercase(),
            &["PAGECRAFT_LOGGING_FORMAT", "PAGECRAFT_LOG_FORMAT"],
        ),
    ];

    let mut details = Map::new();
    details.insert(
        "config_file".to_string(),
        file_path.map(|path| json!(path.display().to_string())).unwrap_or(Value::Null),
    );
    details.insert("fields".to_string(), Value::Array(fields));

    CommandResult::success_with(
        COMMAND,
        "effective config (source precedence: overrides > env > file > default)",
        details,
    )
}

struct SourceLookup<'a> {
    file_doc: Option<&'a TomlValue>,
    file_path: Option<&'a Path>,
}

impl SourceLookup<'_> {
    fn field(&self, key_path: &str, value: &str, env_keys: &[&str]) -> Value {
        json!({ "key": key_path, "value": value, "source": self.source(key_path, env_keys) })
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<TomlValue> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<TomlValue>().ok()
}

fn contains_path(root: &TomlValue, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
