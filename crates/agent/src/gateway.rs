//! Timeout and bounded retry around the text-generation call.

use std::sync::Arc;
use std::time::Duration;

use pagecraft_core::config::LlmConfig;
use pagecraft_core::errors::{StageError, StageName};
use tracing::warn;

use crate::llm::LlmClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
        }
    }

    /// `base * 2^attempt`, saturating.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
pub struct GenerationGateway {
    client: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl GenerationGateway {
    pub fn new(client: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Calls the model, retrying timeouts and upstream failures. The returned
    /// error keeps the class of the last attempt.
    pub async fn generate(&self, stage: StageName, prompt: &str) -> Result<String, StageError> {
        let mut attempt = 0;
        loop {
            let error =
                match tokio::time::timeout(self.policy.timeout, self.client.complete(prompt)).await {
                    Ok(Ok(text)) => return Ok(text),
                    Ok(Err(error)) => StageError::UpstreamError(format!("{error:#}")),
                    Err(_) => StageError::UpstreamTimeout(self.policy.timeout),
                };

            if attempt >= self.policy.max_retries {
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                event_name = "llm.retry_scheduled",
                stage = %stage,
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error_class = error.error_class(),
                error = %error,
                "text generation failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
