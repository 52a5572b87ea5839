use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{FaqPolicy, FaqPolicyMode, SequencerOptions};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub faq_min_candidates: usize,
    pub faq_policy: FaqPolicyMode,
    pub authoring: AuthoringMode,
    pub concurrent_authoring: bool,
}

#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthoringMode {
    /// Pages are written by the model and validated against the page schemas.
    Llm,
    /// Pages are assembled deterministically from the product record and strategy.
    Template,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub authoring: Option<AuthoringMode>,
    pub concurrent_authoring: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
    /// Skip the provider credential check, for callers that never reach the model.
    pub skip_credentials: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-2.5-flash".to_string(),
                temperature: 0.0,
                timeout_secs: 60,
                max_retries: 2,
                retry_base_delay_ms: 500,
            },
            pipeline: PipelineConfig {
                faq_min_candidates: 5,
                faq_policy: FaqPolicyMode::Tolerate,
                authoring: AuthoringMode::Llm,
                concurrent_authoring: false,
            },
            output: OutputConfig { dir: PathBuf::from("output") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Base URL for the configured provider, falling back to the provider's public default.
    pub fn effective_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmProvider::Gemini) => "https://generativelanguage.googleapis.com",
            (None, LlmProvider::Ollama) => "http://localhost:11434",
        }
    }
}

impl PipelineConfig {
    pub fn sequencer_options(&self) -> SequencerOptions {
        SequencerOptions {
            faq_policy: FaqPolicy { min_candidates: self.faq_min_candidates, mode: self.faq_policy },
            concurrent_authoring: self.concurrent_authoring,
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for AuthoringMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "template" => Ok(Self::Template),
            other => Err(ConfigError::Validation(format!(
                "unsupported authoring mode `{other}` (expected llm|template)"
            ))),
        }
    }
}

impl std::str::FromStr for FaqPolicyMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tolerate" => Ok(Self::Tolerate),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::Validation(format!(
                "unsupported faq policy `{other}` (expected tolerate|reject)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pagecraft.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate_sections(!options.skip_credentials)?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(retry_base_delay_ms) = llm.retry_base_delay_ms {
                self.llm.retry_base_delay_ms = retry_base_delay_ms;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(faq_min_candidates) = pipeline.faq_min_candidates {
                self.pipeline.faq_min_candidates = faq_min_candidates;
            }
            if let Some(faq_policy) = pipeline.faq_policy {
                self.pipeline.faq_policy = faq_policy;
            }
            if let Some(authoring) = pipeline.authoring {
                self.pipeline.authoring = authoring;
            }
            if let Some(concurrent_authoring) = pipeline.concurrent_authoring {
                self.pipeline.concurrent_authoring = concurrent_authoring;
            }
        }

        if let Some(output) = patch.output {
            if let Some(dir) = output.dir {
                self.output.dir = dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PAGECRAFT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("PAGECRAFT_LLM_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAGECRAFT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PAGECRAFT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PAGECRAFT_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("PAGECRAFT_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("PAGECRAFT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PAGECRAFT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PAGECRAFT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("PAGECRAFT_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("PAGECRAFT_LLM_RETRY_BASE_DELAY_MS") {
            self.llm.retry_base_delay_ms =
                parse_u64("PAGECRAFT_LLM_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("PAGECRAFT_PIPELINE_FAQ_MIN_CANDIDATES") {
            self.pipeline.faq_min_candidates =
                parse_usize("PAGECRAFT_PIPELINE_FAQ_MIN_CANDIDATES", &value)?;
        }
        if let Some(value) = read_env("PAGECRAFT_PIPELINE_FAQ_POLICY") {
            self.pipeline.faq_policy = value.parse()?;
        }
        if let Some(value) = read_env("PAGECRAFT_PIPELINE_AUTHORING") {
            self.pipeline.authoring = value.parse()?;
        }
        if let Some(value) = read_env("PAGECRAFT_PIPELINE_CONCURRENT_AUTHORING") {
            self.pipeline.concurrent_authoring =
                parse_bool("PAGECRAFT_PIPELINE_CONCURRENT_AUTHORING", &value)?;
        }

        if let Some(value) = read_env("PAGECRAFT_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(value);
        }

        let log_level =
            read_env("PAGECRAFT_LOGGING_LEVEL").or_else(|| read_env("PAGECRAFT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAGECRAFT_LOGGING_FORMAT").or_else(|| read_env("PAGECRAFT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output.dir = output_dir;
        }
        if let Some(authoring) = overrides.authoring {
            self.pipeline.authoring = authoring;
        }
        if let Some(concurrent_authoring) = overrides.concurrent_authoring {
            self.pipeline.concurrent_authoring = concurrent_authoring;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_sections(true)
    }

    fn validate_sections(&self, credentials: bool) -> Result<(), ConfigError> {
        validate_llm(&self.llm, credentials)?;
        validate_pipeline(&self.pipeline)?;
        validate_output(&self.output)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read: the explicit path when it exists, else
/// `pagecraft.toml` or `config/pagecraft.toml` in the working directory.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pagecraft.toml"), PathBuf::from("config/pagecraft.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig, credentials: bool) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 10".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if credentials && llm.provider == LlmProvider::Gemini {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the gemini provider \
                 (set PAGECRAFT_LLM_API_KEY or GEMINI_API_KEY)"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.faq_min_candidates == 0 {
        return Err(ConfigError::Validation(
            "pipeline.faq_min_candidates must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_output(output: &OutputConfig) -> Result<(), ConfigError> {
    if output.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("output.dir must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    pipeline: Option<PipelinePatch>,
    output: Option<OutputPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    faq_min_candidates: Option<usize>,
    faq_policy: Option<FaqPolicyMode>,
    authoring: Option<AuthoringMode>,
    concurrent_authoring: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputPatch {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, AuthoringMode, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::pipeline::FaqPolicyMode;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "GEMINI_API_KEY",
        "PAGECRAFT_LLM_API_KEY",
        "PAGECRAFT_LLM_PROVIDER",
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
        "TEST_PAGECRAFT_API_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("TEST_PAGECRAFT_API_KEY", "gm-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pagecraft.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_PAGECRAFT_API_KEY}"
model = "gemini-test"

[pipeline]
faq_min_candidates = 3
faq_policy = "reject"
authoring = "template"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gm-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(config.llm.model == "gemini-test", "model should come from file")?;
            ensure(config.pipeline.faq_min_candidates == 3, "faq minimum should come from file")?;
            ensure(
                config.pipeline.faq_policy == FaqPolicyMode::Reject,
                "faq policy should come from file",
            )?;
            ensure(
                config.pipeline.authoring == AuthoringMode::Template,
                "authoring mode should come from file",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn gemini_api_key_alias_is_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("GEMINI_API_KEY", "gm-alias");
        env::set_var("PAGECRAFT_LOG_LEVEL", "warn");
        env::set_var("PAGECRAFT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gm-alias")
                    == Some(true),
                "GEMINI_API_KEY should populate llm.api_key",
            )?;
            ensure(config.logging.level == "warn", "log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PAGECRAFT_LLM_API_KEY", "gm-from-env");
        env::set_var("GEMINI_API_KEY", "gm-from-alias");
        env::set_var("PAGECRAFT_OUTPUT_DIR", "from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pagecraft.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "gm-from-file"
model = "from-file-model"

[output]
dir = "from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    llm_model: Some("from-override-model".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "from-override-model", "override model should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.output.dir == PathBuf::from("from-env"), "env output dir should win")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gm-from-env")
                    == Some(true),
                "prefixed env key should win over alias and file",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_without_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn skipping_credentials_still_validates_other_sections() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let result = (|| -> Result<(), String> {
            let options = LoadOptions { skip_credentials: true, ..LoadOptions::default() };
            let config = AppConfig::load(options)
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.api_key.is_none(), "no api key should be configured")?;
            ensure(config.validate().is_err(), "full validation still requires the api key")?;

            env::set_var("PAGECRAFT_LLM_TIMEOUT_SECS", "0");
            let options = LoadOptions { skip_credentials: true, ..LoadOptions::default() };
            ensure(
                matches!(AppConfig::load(options), Err(ConfigError::Validation(_))),
                "timeout bounds are checked without credentials",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn ollama_provider_needs_no_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PAGECRAFT_LLM_PROVIDER", "ollama");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.llm.effective_base_url() == "http://localhost:11434",
                "ollama should default to the local endpoint",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PAGECRAFT_LLM_API_KEY", "gm-test");
        env::set_var("PAGECRAFT_LLM_TIMEOUT_SECS", "soon");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected invalid override to fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "PAGECRAFT_LLM_TIMEOUT_SECS"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PAGECRAFT_LLM_API_KEY", "gm-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gm-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }
}
