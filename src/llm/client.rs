//! OpenAI-compatible LLM client.
//!
//! This client works with any endpoint that implements the chat-completions
//! API with `response_format: json_schema`.

use super::generator::{Generation, GenerationRequest, StructuredGenerator};
use crate::config::LlmConfig;
use crate::error::{JudgeError, Result};
use crate::model::TokenUsage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Message role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from an LLM call including metadata.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage (zero when the provider omits it).
    pub usage: TokenUsage,
    /// Response id, model and finish reason as reported by the provider.
    pub meta: Value,
}

/// OpenAI-compatible LLM client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    /// Send a chat completion request.
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<Message>,
        response_format: Option<Value>,
    ) -> Result<LlmResponse> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            response_format,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(JudgeError::LlmApi(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(JudgeError::LlmApi(format!(
                "Request failed ({}): {}",
                status, body
            )));
        }

        Self::parse_completion(&body)
    }

    fn parse_completion(body: &str) -> Result<LlmResponse> {
        let completion: ChatCompletionResponse = serde_json::from_str(body)?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| JudgeError::LlmApi("No choices in response".to_string()))?;

        let content = match (choice.message.content, choice.message.refusal) {
            (Some(content), _) => content,
            (None, Some(refusal)) => {
                return Err(JudgeError::LlmApi(format!("Model refused: {}", refusal)));
            }
            (None, None) => {
                return Err(JudgeError::LlmApi("Empty message content".to_string()));
            }
        };

        let meta = json!({
            "id": completion.id,
            "model": completion.model,
            "created": completion.created,
            "finish_reason": choice.finish_reason,
        });

        Ok(LlmResponse {
            content,
            finish_reason: choice.finish_reason,
            usage: completion
                .usage
                .map(|u| TokenUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                })
                .unwrap_or_default(),
            meta,
        })
    }

    /// Test connectivity to the API using the configured default model.
    pub async fn test_connection(&self) -> Result<()> {
        let messages = vec![Message::user("Say 'hello' and nothing else.")];

        let response = self
            .chat(&self.config.default_model, messages, None)
            .await?;

        if response.content.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(JudgeError::LlmApi(format!(
                "Unexpected response: {}",
                response.content
            )))
        }
    }
}

#[async_trait]
impl StructuredGenerator for LlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.trim().is_empty() {
            messages.push(Message::system(request.system_prompt));
        }
        messages.push(Message::user(request.user_prompt));

        let response_format = json!({
            "type": "json_schema",
            "json_schema": {
                "name": request.schema_name,
                "strict": true,
                "schema": request.schema,
            }
        });

        let response = self
            .chat(&request.model, messages, Some(response_format))
            .await?;

        Ok(Generation {
            content: response.content,
            usage: response.usage,
            raw: response.meta,
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}
