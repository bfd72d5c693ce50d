//! LLM-as-judge verdicts for a single (question, judge) pair.

use crate::error::{JudgeError, Result};
use crate::llm::{GenerationRequest, Prompts, StructuredGenerator};
use crate::model::{Judge, Question, TokenUsage, Verdict};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Result from judging a single answer.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub verdict: Verdict,
    pub reasoning: String,
    pub usage: TokenUsage,
    /// Provider metadata plus the raw generated text.
    pub raw: Value,
    pub latency_ms: u64,
}

static VERDICT_VALIDATOR: OnceLock<std::result::Result<jsonschema::Validator, String>> =
    OnceLock::new();

fn verdict_validator() -> Result<&'static jsonschema::Validator> {
    VERDICT_VALIDATOR
        .get_or_init(|| {
            jsonschema::options()
                .with_draft(jsonschema::Draft::Draft202012)
                .build(&Prompts::verdict_schema())
                .map_err(|e| format!("failed to compile verdict schema: {e}"))
        })
        .as_ref()
        .map_err(|e| JudgeError::SchemaValidation(e.clone()))
}

/// Asks a judge's model for a verdict and validates the structured output.
#[derive(Clone)]
pub struct VerdictJudge {
    generator: Arc<dyn StructuredGenerator>,
}

impl VerdictJudge {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    /// Judge one submitted answer with one judge configuration.
    pub async fn evaluate(&self, judge: &Judge, question: &Question) -> Result<JudgeOutcome> {
        let request = GenerationRequest {
            model: judge.model.clone(),
            system_prompt: Prompts::system_prompt(&judge.system_prompt),
            user_prompt: Prompts::user_prompt(question),
            schema_name: Prompts::verdict_schema_name().to_string(),
            schema: Prompts::verdict_schema(),
        };

        let start = Instant::now();
        let generation = self.generator.generate(request).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (verdict, reasoning) = Self::parse_verdict_response(&generation.content)?;

        let mut raw = generation.raw;
        if !raw.is_object() {
            raw = json!({ "meta": raw });
        }
        raw["provider"] = json!(self.generator.provider_name());
        raw["content"] = json!(generation.content);

        Ok(JudgeOutcome {
            verdict,
            reasoning,
            usage: generation.usage,
            raw,
            latency_ms,
        })
    }

    /// Parse and schema-check the generated JSON.
    fn parse_verdict_response(response: &str) -> Result<(Verdict, String)> {
        let json_str = Self::extract_json(response);

        let value: Value = serde_json::from_str(&json_str).map_err(|e| {
            JudgeError::LlmParse(format!(
                "Failed to parse verdict response: {}. Response: {}",
                e, response
            ))
        })?;

        let validator = verdict_validator()?;
        if !validator.is_valid(&value) {
            const MAX_ERRORS: usize = 5;
            let errors: Vec<String> = validator
                .iter_errors(&value)
                .take(MAX_ERRORS)
                .map(|e| e.to_string())
                .collect();
            return Err(JudgeError::SchemaValidation(errors.join("; ")));
        }

        #[derive(Deserialize)]
        struct RawVerdict {
            verdict: String,
            reasoning: String,
        }

        let raw: RawVerdict = serde_json::from_value(value)?;
        let verdict = raw.verdict.parse().map_err(JudgeError::SchemaValidation)?;
        Ok((verdict, raw.reasoning))
    }

    /// Extract JSON from response.
    fn extract_json(response: &str) -> String {
        let response = response.trim();

        if response.starts_with("```json") {
            if let Some(end) = response.rfind("```") {
                let start = "```json".len();
                if end > start {
                    return response[start..end].trim().to_string();
                }
            }
        }

        if response.starts_with("```") {
            if let Some(end) = response.rfind("```") {
                let start = response.find('\n').map(|n| n + 1).unwrap_or(3);
                if end > start {
                    return response[start..end].trim().to_string();
                }
            }
        }

        if let Some(start) = response.find('{') {
            if let Some(end) = response.rfind('}') {
                if end > start {
                    return response[start..=end].to_string();
                }
            }
        }

        response.to_string()
    }
}
