//! Agent runtime: the model-backed side of the content pipeline.
//!
//! - `llm` holds the `LlmClient` seam with Gemini and Ollama HTTP clients.
//! - `gateway` applies the timeout and bounded retry to every model call.
//! - `stages` implements the parse, strategize and author stages on top of it.
//! - `runtime` wires configuration, client, sequencer and artifact store.
//!
//! The model only ever produces text. Extraction, validation and page
//! reconciliation are deterministic and live in `pagecraft-core`.

pub mod gateway;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod stages;
pub mod tools;

pub use gateway::{GenerationGateway, RetryPolicy};
pub use llm::{build_client, GeminiClient, LlmClient, OllamaClient, ScriptedLlmClient};
pub use runtime::AgentRuntime;
pub use stages::LlmStages;
