//! The structured-generation boundary the orchestrator consumes.

use crate::error::Result;
use crate::model::TokenUsage;
use async_trait::async_trait;
use serde_json::Value;

/// One schema-constrained generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Identifier sent alongside the schema (providers require a name).
    pub schema_name: String,
    pub schema: Value,
}

/// Raw result of a generation call, before schema validation.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The generated text, expected to be JSON matching the request schema.
    pub content: String,
    pub usage: TokenUsage,
    /// Provider response metadata (id, model, finish reason, ...).
    pub raw: Value,
}

/// Anything that can answer a [`GenerationRequest`].
///
/// Implemented by [`crate::llm::LlmClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation>;

    fn provider_name(&self) -> &'static str;
}
