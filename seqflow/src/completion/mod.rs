//! The boundary to the external language-model API.
//!
//! A [`CompletionClient`] takes a role label, a system prompt and a JSON
//! payload and returns the model's answer as JSON. Clients never retry and
//! never cache; a failed call is reported once as a [`CompletionError`] and
//! the calling stage decides how to degrade.

mod config;
#[cfg(feature = "http")]
mod http;
mod json;

pub use config::{
    CompletionConfig, ENV_API_KEY, ENV_BASE_URL, ENV_MODEL, ENV_OPENAI_API_KEY, ENV_TIMEOUT_SECS,
};
#[cfg(feature = "http")]
pub use http::HttpCompletionClient;
pub use json::extract_json;

use crate::errors::CompletionError;
use async_trait::async_trait;

/// Trait for clients that call a language model and return JSON.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Requests a JSON completion.
    ///
    /// # Arguments
    ///
    /// * `role` - The agent role making the call (e.g., "planner")
    /// * `system_prompt` - Stage-specific instructions
    /// * `payload` - Already JSON-serializable stage input
    async fn complete(
        &self,
        role: &str,
        system_prompt: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_contract() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|role, _prompt, payload| role == "planner" && payload["input"] == "ship it")
            .times(1)
            .returning(|_, _, _| Ok(serde_json::json!({"steps": ["build"]})));

        let answer = client
            .complete("planner", "plan it", &serde_json::json!({"input": "ship it"}))
            .await
            .unwrap();
        assert_eq!(answer["steps"][0], "build");
    }

    #[tokio::test]
    async fn test_mock_client_failure_is_not_retried() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|role, prompt, payload| {
                role == "tester" && prompt == "test it" && payload == &serde_json::json!({})
            })
            .times(1)
            .returning(|_, _, _| Err(CompletionError::Timeout));

        let err = client
            .complete("tester", "test it", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Timeout));
    }
}
