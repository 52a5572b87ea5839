use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pagecraft_agent::{build_client, AgentRuntime, LlmClient};
use pagecraft_core::config::{AppConfig, AuthoringMode, ConfigOverrides, LoadOptions};
use pagecraft_core::pipeline::{CancelHandle, RunReport};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::commands::{CommandResult, EXIT_PIPELINE_FAILED, EXIT_RUNTIME, EXIT_USAGE};

const COMMAND: &str = "run";

#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Product description file, or `-` for stdin.
    pub input: PathBuf,
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub template: bool,
    pub concurrent: bool,
}

impl RunArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides {
                output_dir: self.output_dir.clone(),
                authoring: self.template.then_some(AuthoringMode::Template),
                concurrent_authoring: self.concurrent.then_some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}

pub fn run(args: &RunArgs) -> CommandResult {
    execute(args, |config| build_client(&config.llm))
}

/// Same as [`run`] with a caller-provided model client.
pub fn run_with_client(args: &RunArgs, client: Arc<dyn LlmClient>) -> CommandResult {
    execute(args, move |_| Ok(client))
}

fn execute<F>(args: &RunArgs, make_client: F) -> CommandResult
where
    F: FnOnce(&AppConfig) -> anyhow::Result<Arc<dyn LlmClient>>,
{
    let raw_text = match read_input(&args.input) {
        Ok(text) => text,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "input",
                format!("could not read input `{}`: {error}", args.input.display()),
                EXIT_USAGE,
            );
        }
    };
    if raw_text.trim().is_empty() {
        return CommandResult::failure(COMMAND, "empty_input", "input text is empty", EXIT_USAGE);
    }

    let config = match AppConfig::load(args.load_options()) {
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
    crate::init_logging(&config);

    let client = match make_client(&config) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "llm_client",
                format!("could not build model client: {error:#}"),
                EXIT_USAGE,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let agent = AgentRuntime::with_client(&config, client);
    let report = runtime.block_on(async {
        let cancel = CancelHandle::new();
        let watcher = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(event_name = "cli.interrupted", "cancelling after the current stage");
                watcher.cancel();
            }
        });
        let report = agent.run(&raw_text, &cancel).await;
        interrupt.abort();
        report
    });

    render_report(&agent, report)
}

fn render_report(agent: &AgentRuntime, report: RunReport) -> CommandResult {
    let mut details = Map::new();
    details.insert("run_id".to_string(), json!(report.run_id));
    details.insert("state".to_string(), json!(report.state.to_string()));
    details.insert(
        "artifacts".to_string(),
        Value::Array(
            report
                .artifacts
                .iter()
                .map(|artifact| {
                    json!({
                        "page_type": artifact.page_type,
                        "path": agent.store().path_for(artifact.page_type).display().to_string(),
                        "degraded": artifact.degraded,
                    })
                })
                .collect(),
        ),
    );
    details.insert("degraded_pages".to_string(), json!(report.degraded_pages()));
    details.insert(
        "elapsed_ms".to_string(),
        json!((report.finished_at - report.started_at).num_milliseconds()),
    );

    match &report.failure {
        None => CommandResult::success_with(
            COMMAND,
            format!("generated {} pages", report.artifacts.len()),
            details,
        ),
        Some(failure) => {
            details.insert("stage".to_string(), json!(failure.stage.to_string()));
            CommandResult::failure_with(
                COMMAND,
                failure.error.error_class(),
                failure.to_string(),
                EXIT_PIPELINE_FAILED,
                details,
            )
        }
    }
}

fn read_input(path: &Path) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    fs::read_to_string(path)
}
