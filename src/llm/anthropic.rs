//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};
use crate::config::LlmConfig;

/// Anthropic API client
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a client from configuration.
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| LlmError::InvalidResponse(format!("Environment variable {} not set", config.api_key_env)))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "temperature": request.temperature,
            "system": request.system_prompt,
            "messages": [{
                "role": "user",
                "content": request.user_message,
            }],
        })
    }

    /// Concatenate text content blocks into the response text
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        let mut text = String::new();
        for block in api_response.content {
            if let AnthropicContentBlock::Text { text: t } = block {
                text.push_str(&t);
            }
        }

        CompletionResponse {
            text,
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

/// Fallback wait when a rate-limit response carries no usable hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Server-suggested wait from a `retry-after` header, when parseable
fn retry_after_hint(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get("retry-after")?.to_str().ok()?.parse().ok()?;
    Some(Duration::from_secs(secs))
}

/// Map a non-success response to the error taxonomy: 429 becomes a rate
/// limit with the server's hint, everything else an API error carrying
/// the body
async fn error_for(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = retry_after_hint(response.headers()).unwrap_or(DEFAULT_RETRY_AFTER);
        return LlmError::RateLimited { retry_after };
    }

    LlmError::ApiError {
        status,
        message: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", "2023-06-01")
            .header("x-api-key", self.api_key.as_str())
            .json(&self.build_request_body(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for(response).await);
        }

        let api_response: AnthropicResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AnthropicClient {
        AnthropicClient {
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            max_tokens: 8192,
        }
    }

    #[test]
    fn test_build_request_body() {
        let client = test_client();
        let request = CompletionRequest::new("claude-sonnet-4-20250514", "Assess this issue")
            .with_system_prompt("You are a supervisor")
            .with_max_tokens(1000)
            .with_temperature(0.3);

        let body = client.build_request_body(&request);

        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["system"], "You are a supervisor");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Assess this issue");
    }

    #[test]
    fn test_max_tokens_capped_by_client() {
        let client = AnthropicClient {
            max_tokens: 1000,
            ..test_client()
        };
        let request = CompletionRequest::new("claude-sonnet-4-20250514", "hi").with_max_tokens(5000);

        let body = client.build_request_body(&request);
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_retry_after_hint() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_hint(&headers), None);

        headers.insert("retry-after", "17".parse().unwrap());
        assert_eq!(retry_after_hint(&headers), Some(Duration::from_secs(17)));

        // Date-format hints are not understood and fall through
        headers.insert("retry-after", "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after_hint(&headers), None);
    }

    #[test]
    fn test_parse_response_concatenates_text_blocks() {
        let client = test_client();
        let api_response = AnthropicResponse {
            content: vec![
                AnthropicContentBlock::Text {
                    text: "part one ".to_string(),
                },
                AnthropicContentBlock::Other,
                AnthropicContentBlock::Text {
                    text: "part two".to_string(),
                },
            ],
            usage: AnthropicUsage {
                input_tokens: 12,
                output_tokens: 7,
            },
        };

        let response = client.parse_response(api_response);
        assert_eq!(response.text, "part one part two");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 7);
    }
}
