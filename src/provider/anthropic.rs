use super::{Completion, ProviderError};
use crate::prompt::PromptPayload;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    output_tokens: u32,
}

/// Secondary backend: Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn build_request<'a>(&'a self, prompt: &'a PromptPayload, max_tokens: u32) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens,
            system: &prompt.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &prompt.user,
            }],
            temperature: 0.7,
        }
    }

    pub(super) async fn send(
        &self,
        client: &reqwest::Client,
        prompt: &PromptPayload,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let request = self.build_request(prompt, max_tokens);

        let response = client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Anthropic body: {}", e)))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Anthropic response contained no text".to_string(),
            ));
        }

        Ok(Completion {
            text,
            completion_tokens: parsed.usage.map(|u| u.output_tokens),
        })
    }
}
