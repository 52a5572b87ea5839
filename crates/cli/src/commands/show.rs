use std::path::PathBuf;

use pagecraft_core::config::{AppConfig, LoadOptions};
use pagecraft_core::schema::pages::PageType;
use pagecraft_core::storage::{is_missing_sentinel, ArtifactStore, MISSING_ARTIFACT_ERROR};
use serde_json::{json, Map, Value};

use crate::commands::{CommandResult, EXIT_ARTIFACT_MISSING, EXIT_RUNTIME, EXIT_USAGE};

const COMMAND: &str = "show";

/// Loads one persisted page. An explicit `output_dir` skips config loading;
/// otherwise only `output.dir` matters, so no API key is required.
pub fn run(
    page_type: &str,
    output_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> CommandResult {
    let page_type = match page_type.parse::<PageType>() {
        Ok(page_type) => page_type,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_argument", message, EXIT_USAGE);
        }
    };

    let dir = match output_dir {
        Some(dir) => dir,
        None => {
            let options = LoadOptions {
                require_file: config_path.is_some(),
                config_path,
                skip_credentials: true,
                ..LoadOptions::default()
            };
            match AppConfig::load(options) {
                Ok(config) => config.output.dir,
                Err(error) => {
                    return CommandResult::failure(
                        COMMAND,
                        "config_validation",
                        format!("configuration issue: {error}"),
                        EXIT_USAGE,
                    );
                }
            }
        }
    };

    let store = ArtifactStore::new(dir);
    let path = store.path_for(page_type).display().to_string();
    let mut details = Map::new();
    details.insert("page_type".to_string(), json!(page_type));
    details.insert("path".to_string(), json!(path));

    match store.load(page_type) {
        Ok(content) if is_missing_sentinel(&content) => {
            details.insert("content".to_string(), Value::Object(content));
            CommandResult::failure_with(
                COMMAND,
                "artifact_missing",
                MISSING_ARTIFACT_ERROR,
                EXIT_ARTIFACT_MISSING,
                details,
            )
        }
        Ok(content) => {
            details.insert("content".to_string(), Value::Object(content));
            CommandResult::success_with(COMMAND, format!("loaded {page_type}"), details)
        }
        Err(error) => CommandResult::failure_with(
            COMMAND,
            "storage",
            error.to_string(),
            EXIT_RUNTIME,
            details,
        ),
    }
}
