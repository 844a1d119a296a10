//! Reference summary client implementation using the Anthropic Messages
//! API.
//!
//! Uses `ureq` for HTTP. Reads the API key from the `ANTHROPIC_API_KEY`
//! environment variable.

use async_trait::async_trait;

use super::{SummaryClient, SummaryError};

const DEFAULT_MODEL: &str = "claude-opus-5";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    api_key: String,
    /// Base URL (default: https://api.anthropic.com).
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Create a client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, SummaryError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            SummaryError::NetworkError(
                "ANTHROPIC_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        AnthropicClient {
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the model id (e.g. from the serve config).
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl SummaryClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, SummaryError> {
        let api_key = self.api_key.clone();
        let base_url = self.base_url.clone();
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        // ureq is synchronous; keep it off the async runtime threads.
        let result: Result<String, SummaryError> = tokio::task::spawn_blocking(move || {
            let url = format!("{}/v1/messages", base_url);
            let agent = ureq::Agent::new_with_defaults();
            let response = agent
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .send_json(body);

            match response {
                Ok(resp) => {
                    let json: serde_json::Value = resp.into_body().read_json().map_err(|e| {
                        SummaryError::ParseError(format!("failed to parse response: {}", e))
                    })?;
                    // Extract content[0].text
                    json["content"]
                        .as_array()
                        .and_then(|arr| arr.first())
                        .and_then(|c| c["text"].as_str())
                        .map(|s| s.to_string())
                        .ok_or_else(|| {
                            SummaryError::ParseError("no text content in response".to_string())
                        })
                }
                Err(e) => {
                    // ureq v3: status errors surface through the Error type too
                    Err(SummaryError::NetworkError(e.to_string()))
                }
            }
        })
        .await
        .map_err(|e| SummaryError::NetworkError(format!("summary task failed: {}", e)))?;

        result
    }
}
