//! Submission ingestion.
//!
//! Decodes uploaded JSON documents and writes normalized submission and
//! question rows. A document is either an array of submissions or a single
//! submission object:
//!
//! ```json
//! [{
//!   "id": "sub_1",
//!   "queueId": "queue_1",
//!   "createdAt": 1690000000000,
//!   "questions": [
//!     { "rev": 1, "data": { "id": "q_template_1", "questionType": "single_choice_with_reasoning",
//!                           "questionText": "Is the sky blue?" } }
//!   ],
//!   "answers": { "q_template_1": { "choice": "yes", "reasoning": "Observed it." } }
//! }]
//! ```

use crate::error::{JudgeError, Result};
use crate::model::{Question, Submission};
use crate::store::{Store, now_rfc3339};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// One submission as uploaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionUpload {
    pub id: String,
    pub queue_id: String,
    #[serde(default)]
    pub labeling_task_id: Option<String>,
    /// Epoch milliseconds or an RFC 3339 string.
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub questions: Vec<QuestionUpload>,
    /// Answer fields keyed by question template id.
    #[serde(default)]
    pub answers: Map<String, Value>,
}

/// A question entry; fields other than `data` (such as `rev`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionUpload {
    pub data: QuestionData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub id: String,
    #[serde(default)]
    pub question_type: String,
    pub question_text: String,
}

/// What an ingest call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub submissions: usize,
    pub questions: usize,
    pub queues: BTreeSet<String>,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.submissions += other.submissions;
        self.questions += other.questions;
        self.queues.extend(other.queues);
    }
}

/// Decode an upload document.
pub fn parse_upload(json: &str) -> Result<Vec<SubmissionUpload>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| JudgeError::InvalidUpload(format!("not valid JSON: {}", e)))?;

    let uploads: Vec<SubmissionUpload> = match value {
        Value::Array(_) => serde_json::from_value(value),
        Value::Object(_) => serde_json::from_value::<SubmissionUpload>(value).map(|one| vec![one]),
        _ => {
            return Err(JudgeError::InvalidUpload(
                "expected an array of submissions or a submission object".to_string(),
            ));
        }
    }
    .map_err(|e| JudgeError::InvalidUpload(e.to_string()))?;

    for upload in &uploads {
        check_upload(upload)?;
    }
    Ok(uploads)
}

fn check_upload(upload: &SubmissionUpload) -> Result<()> {
    if upload.id.trim().is_empty() {
        return Err(JudgeError::InvalidUpload(
            "submission id must not be empty".to_string(),
        ));
    }
    if upload.queue_id.trim().is_empty() {
        return Err(JudgeError::InvalidUpload(format!(
            "submission '{}' has an empty queueId",
            upload.id
        )));
    }
    let mut seen = HashSet::new();
    for q in &upload.questions {
        if q.data.id.trim().is_empty() {
            return Err(JudgeError::InvalidUpload(format!(
                "submission '{}' has a question with an empty id",
                upload.id
            )));
        }
        if !seen.insert(q.data.id.as_str()) {
            return Err(JudgeError::InvalidUpload(format!(
                "submission '{}' lists question '{}' twice",
                upload.id, q.data.id
            )));
        }
    }
    Ok(())
}

fn created_at_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_else(now_rfc3339),
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => now_rfc3339(),
    }
}

/// Normalize one upload into rows.
pub fn normalize(owner: &str, upload: &SubmissionUpload) -> (Submission, Vec<Question>) {
    let submission = Submission {
        id: upload.id.clone(),
        queue_id: upload.queue_id.clone(),
        owner: owner.to_string(),
        labeling_task_id: upload.labeling_task_id.clone(),
        created_at: created_at_string(upload.created_at.as_ref()),
        updated_at: now_rfc3339(),
    };

    let questions = upload
        .questions
        .iter()
        .map(|q| Question {
            id: Question::compose_id(&q.data.id, &upload.id),
            template_id: q.data.id.clone(),
            submission_id: upload.id.clone(),
            queue_id: upload.queue_id.clone(),
            question_type: q.data.question_type.clone(),
            question_text: q.data.question_text.clone(),
            answer: upload
                .answers
                .get(&q.data.id)
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
        .collect();

    (submission, questions)
}

/// Persist decoded uploads.
pub fn ingest(store: &Store, owner: &str, uploads: &[SubmissionUpload]) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for upload in uploads {
        let (submission, questions) = normalize(owner, upload);
        store.replace_submission(&submission, &questions)?;
        debug!(
            submission = %submission.id,
            queue = %submission.queue_id,
            questions = questions.len(),
            "stored submission"
        );
        report.submissions += 1;
        report.questions += questions.len();
        report.queues.insert(submission.queue_id);
    }
    Ok(report)
}

/// Ingest a JSON file, or every `*.json` file below a directory.
pub fn ingest_path(store: &Store, owner: &str, path: &Path) -> Result<IngestReport> {
    if !path.exists() {
        return Err(JudgeError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "upload path does not exist"),
        ));
    }

    let files: Vec<_> = if path.is_dir() {
        WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect()
    } else {
        vec![path.to_path_buf()]
    };

    let mut report = IngestReport::default();
    for file in files {
        let content = fs::read_to_string(&file).map_err(|e| JudgeError::io(&file, e))?;
        let uploads = parse_upload(&content).map_err(|e| match e {
            JudgeError::InvalidUpload(msg) => {
                JudgeError::InvalidUpload(format!("{}: {}", file.display(), msg))
            }
            other => other,
        })?;
        report.merge(ingest(store, owner, &uploads)?);
    }

    info!(
        submissions = report.submissions,
        questions = report.questions,
        "ingested uploads"
    );
    Ok(report)
}
