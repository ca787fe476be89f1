//! Seam to the external prompt execution engine.
//!
//! Provider invocation is out of scope for this crate; the trait fixes the
//! contract the routing layer depends on, and the echo implementation
//! keeps the pipeline exercisable end to end.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub prompt_id: i64,
    pub input: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub vendor: String,
    pub model: String,
    pub output: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_microcents: i64,
}

#[derive(Debug, Error)]
#[error("{vendor}/{model}: {message}")]
pub struct ExecutionError {
    pub vendor: String,
    pub model: String,
    pub message: String,
}

#[async_trait]
pub trait PromptExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutput, ExecutionError>;
}

/// Echoes the input back. One whitespace-separated word counts as one
/// token; each token costs ten microcents.
pub struct EchoExecutor;

const ECHO_VENDOR: &str = "echo";
const ECHO_MODEL: &str = "echo-1";
const MICROCENTS_PER_TOKEN: i64 = 10;

#[async_trait]
impl PromptExecutor for EchoExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutput, ExecutionError> {
        let tokens = request.input.split_whitespace().count() as i64;
        Ok(ExecutionOutput {
            vendor: ECHO_VENDOR.to_string(),
            model: ECHO_MODEL.to_string(),
            output: request.input.clone(),
            tokens_in: tokens,
            tokens_out: tokens,
            cost_microcents: 2 * tokens * MICROCENTS_PER_TOKEN,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_reflects_input_and_prices_tokens() {
        let request = ExecutionRequest {
            prompt_id: 1,
            input: "three word input".to_string(),
        };
        let output = EchoExecutor.execute(&request).await.unwrap();
        assert_eq!(output.output, "three word input");
        assert_eq!(output.tokens_in, 3);
        assert_eq!(output.cost_microcents, 60);
    }
}
