use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::schema::pages::{PageArtifact, PageType};

pub const MISSING_ARTIFACT_ERROR: &str = "File not found. Did the agents run?";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not create output directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("could not write artifact `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not read artifact `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("artifact `{path}` is not a json object: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("could not serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for page artifacts at the end of each authoring stage.
pub trait ArtifactSink: Send + Sync {
    fn persist(&self, artifact: &PageArtifact) -> Result<(), StorageError>;
}

/// Writes artifacts as `{dir}/{page_type}.json`.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, page_type: PageType) -> PathBuf {
        self.dir.join(page_type.file_name())
    }

    pub fn write(&self, artifact: &PageArtifact) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)
            .map_err(|source| StorageError::CreateDir { path: self.dir.clone(), source })?;

        let path = self.path_for(artifact.page_type);
        let rendered = to_pretty_json(&artifact.content)?;
        fs::write(&path, rendered)
            .map_err(|source| StorageError::Write { path: path.clone(), source })?;

        info!(
            event_name = "storage.artifact_written",
            page_type = artifact.page_type.as_str(),
            degraded = artifact.degraded,
            path = %path.display(),
            "page artifact persisted"
        );
        Ok(path)
    }

    /// Loads a persisted page. A missing file yields the sentinel mapping
    /// `{"error": "File not found. Did the agents run?"}`; check it with
    /// [`is_missing_sentinel`] before treating the result as page data.
    pub fn load(&self, page_type: PageType) -> Result<Map<String, Value>, StorageError> {
        let path = self.path_for(page_type);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(missing_sentinel()),
            Err(source) => return Err(StorageError::Read { path, source }),
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                let found = if other.is_array() { "an array" } else { "a scalar" };
                Err(StorageError::Decode { path, message: format!("top-level value is {found}") })
            }
            Err(error) => Err(StorageError::Decode { path, message: error.to_string() }),
        }
    }
}

impl ArtifactSink for ArtifactStore {
    fn persist(&self, artifact: &PageArtifact) -> Result<(), StorageError> {
        self.write(artifact).map(|_| ())
    }
}

/// Keeps artifacts in memory; used where nothing should touch the filesystem.
#[derive(Clone, Default)]
pub struct InMemoryArtifactSink {
    artifacts: Arc<Mutex<Vec<PageArtifact>>>,
}

impl InMemoryArtifactSink {
    pub fn artifacts(&self) -> Vec<PageArtifact> {
        match self.artifacts.lock() {
            Ok(artifacts) => artifacts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ArtifactSink for InMemoryArtifactSink {
    fn persist(&self, artifact: &PageArtifact) -> Result<(), StorageError> {
        match self.artifacts.lock() {
            Ok(mut artifacts) => artifacts.push(artifact.clone()),
            Err(poisoned) => poisoned.into_inner().push(artifact.clone()),
        }
        Ok(())
    }
}

pub fn missing_sentinel() -> Map<String, Value> {
    let mut sentinel = Map::new();
    sentinel.insert("error".to_string(), Value::String(MISSING_ARTIFACT_ERROR.to_string()));
    sentinel
}

pub fn is_missing_sentinel(content: &Map<String, Value>) -> bool {
    content.len() == 1
        && content.get("error").and_then(Value::as_str) == Some(MISSING_ARTIFACT_ERROR)
}

/// UTF-8 JSON with 4-space indentation.
pub fn to_pretty_json<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
