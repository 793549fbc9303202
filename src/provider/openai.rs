use super::{Completion, ProviderError};
use crate::prompt::PromptPayload;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Usage {
    completion_tokens: u32,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Primary backend: OpenAI Chat Completions.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn build_request(&self, prompt: &PromptPayload, max_tokens: u32) -> ChatRequest {
        // Reasoning models spend tokens thinking and reject temperature
        let is_reasoning = is_reasoning_model(&self.model);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            max_completion_tokens: if is_reasoning {
                max_tokens.max(16000)
            } else {
                max_tokens
            },
            temperature: if is_reasoning { None } else { Some(0.7) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
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
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("OpenAI body: {}", e)))?;

        let text = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("OpenAI response contained no text".to_string())
            })?;

        Ok(Completion {
            text,
            completion_tokens: chat_response.usage.map(|u| u.completion_tokens),
        })
    }
}
