//! Prompts and output schema used to ask a judge for a verdict.

use crate::model::Question;
use serde_json::{json, Value};

/// Upper bound on the reasoning string the judge may return.
pub const MAX_REASONING_CHARS: usize = 2000;

/// Collection of prompts used for verdict generation.
pub struct Prompts;

impl Prompts {
    /// Name sent with the response schema.
    pub fn verdict_schema_name() -> &'static str {
        "judge_verdict"
    }

    /// JSON Schema the judge output must satisfy.
    pub fn verdict_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "verdict": {
                    "type": "string",
                    "enum": ["pass", "fail", "inconclusive"]
                },
                "reasoning": {
                    "type": "string",
                    "maxLength": MAX_REASONING_CHARS
                }
            },
            "required": ["verdict", "reasoning"],
            "additionalProperties": false
        })
    }

    /// Instructions appended after the judge's own rubric.
    pub fn verdict_instructions() -> &'static str {
        r#"Evaluate the answer against the rubric above.

Return a JSON object with exactly these fields:
{
    "verdict": "<pass, fail, or inconclusive>",
    "reasoning": "<short explanation of the verdict>"
}

Use "inconclusive" only when the answer cannot be judged from the information given.
Directly return the JSON. Do not output anything else."#
    }

    /// Full system prompt: the judge's rubric followed by output instructions.
    pub fn system_prompt(rubric: &str) -> String {
        let rubric = rubric.trim();
        if rubric.is_empty() {
            Self::verdict_instructions().to_string()
        } else {
            format!("{}\n\n{}", rubric, Self::verdict_instructions())
        }
    }

    /// User prompt describing one question and the submitted answer.
    pub fn user_prompt(question: &Question) -> String {
        let mut prompt = format!(
            "Question type: {}\nQuestion: {}\n\nSubmitted answer:\n",
            question.question_type, question.question_text
        );

        match &question.answer {
            Value::Object(fields) if !fields.is_empty() => {
                for (key, value) in fields {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    prompt.push_str(&format!("- {}: {}\n", key, rendered));
                }
            }
            Value::Object(_) | Value::Null => prompt.push_str("(no answer provided)\n"),
            other => prompt.push_str(&format!("{}\n", other)),
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(answer: Value) -> Question {
        Question {
            id: "q1:s1".to_string(),
            template_id: "q1".to_string(),
            submission_id: "s1".to_string(),
            queue_id: "queue".to_string(),
            question_type: "single_choice_with_reasoning".to_string(),
            question_text: "Is the sky blue?".to_string(),
            answer,
        }
    }

    #[test]
    fn test_user_prompt_lists_answer_fields() {
        let prompt = Prompts::user_prompt(&question(
            json!({"choice": "yes", "reasoning": "Rayleigh scattering"}),
        ));
        assert!(prompt.contains("Question: Is the sky blue?"));
        assert!(prompt.contains("single_choice_with_reasoning"));
        assert!(prompt.contains("- choice: yes"));
        assert!(prompt.contains("- reasoning: Rayleigh scattering"));
    }

    #[test]
    fn test_user_prompt_without_answer() {
        let prompt = Prompts::user_prompt(&question(json!({})));
        assert!(prompt.contains("(no answer provided)"));
    }

    #[test]
    fn test_system_prompt_keeps_rubric_first() {
        let prompt = Prompts::system_prompt("Only accept 'yes'.");
        assert!(prompt.starts_with("Only accept 'yes'."));
        assert!(prompt.contains("\"verdict\""));
        assert_eq!(Prompts::system_prompt("  "), Prompts::verdict_instructions());
    }

    #[test]
    fn test_schema_enumerates_verdicts() {
        let schema = Prompts::verdict_schema();
        assert_eq!(
            schema["properties"]["verdict"]["enum"],
            json!(["pass", "fail", "inconclusive"])
        );
        assert_eq!(schema["additionalProperties"], json!(false));
    }
}
