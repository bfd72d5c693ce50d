//! Domain rows shared by the store, the orchestrator and the query layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of one judge evaluating one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Pass, Verdict::Fail, Verdict::Inconclusive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    /// Case-insensitive; anything outside the three verdicts is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass" => Ok(Verdict::Pass),
            "fail" => Ok(Verdict::Fail),
            "inconclusive" => Ok(Verdict::Inconclusive),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

/// An uploaded submission; owns its questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub queue_id: String,
    pub owner: String,
    pub labeling_task_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One answered question inside a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// `"{template_id}:{submission_id}"`, see [`Question::compose_id`].
    pub id: String,
    /// Shared by every submission answering "the same" question.
    pub template_id: String,
    pub submission_id: String,
    pub queue_id: String,
    pub question_type: String,
    pub question_text: String,
    /// Answer fields as uploaded (e.g. `choice`, `reasoning`).
    pub answer: serde_json::Value,
}

impl Question {
    /// `%` and `:` inside either part are percent-escaped, so distinct
    /// (template, submission) pairs never share an id.
    pub fn compose_id(template_id: &str, submission_id: &str) -> String {
        format!(
            "{}:{}",
            escape_id_part(template_id),
            escape_id_part(submission_id)
        )
    }
}

fn escape_id_part(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

/// A named (system prompt, model) configuration that produces verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judge {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a judge.
#[derive(Debug, Clone)]
pub struct NewJudge {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub active: bool,
}

/// Partial update of a judge; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct JudgeUpdate {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub active: Option<bool>,
}

impl JudgeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.system_prompt.is_none()
            && self.model.is_none()
            && self.active.is_none()
    }
}

/// Link from a judge to a question template within a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub queue_id: String,
    pub template_id: String,
    pub judge_id: String,
    pub created_at: String,
}

/// An assignment joined to its judge row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedJudge {
    pub assignment: Assignment,
    pub judge: Judge,
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One persisted verdict. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub question_id: String,
    pub submission_id: String,
    pub template_id: String,
    pub queue_id: String,
    pub judge_id: String,
    pub judge_name: String,
    pub verdict: Verdict,
    pub reasoning: String,
    /// Opaque provider response metadata.
    pub raw_response: serde_json::Value,
    pub usage: TokenUsage,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub created_at: String,
}

/// Per-queue counts for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub queue_id: String,
    pub submissions: usize,
    pub questions: usize,
}
