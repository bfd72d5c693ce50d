//! SQLite persistence for submissions, judges, assignments and evaluations.
//!
//! Every query is scoped by owner. The connection sits behind a mutex so a
//! `Store` can be cloned into concurrent evaluation workers.

pub mod schema;

use crate::error::{JudgeError, Result};
use crate::model::{
    AssignedJudge, Assignment, Evaluation, Judge, JudgeUpdate, NewJudge, Question, QueueSummary,
    Submission, TokenUsage, Verdict,
};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| JudgeError::io(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(schema::DDL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| JudgeError::Storage("connection mutex poisoned".to_string()))
    }

    // submissions

    /// Write a submission and its questions in one transaction.
    ///
    /// An existing submission with the same id is updated in place; questions
    /// no longer present in the upload are removed along with their evaluations.
    /// A question id already held by a different submission is rejected.
    pub fn replace_submission(
        &self,
        submission: &Submission,
        questions: &[Question],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing_owner: Option<String> = tx
            .query_row(
                "SELECT owner FROM submissions WHERE id = ?1",
                params![submission.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(owner) = existing_owner {
            if owner != submission.owner {
                return Err(JudgeError::InvalidUpload(format!(
                    "submission '{}' belongs to another owner",
                    submission.id
                )));
            }
        }

        tx.execute(
            "INSERT INTO submissions(id, queue_id, owner, labeling_task_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
               queue_id=excluded.queue_id,
               labeling_task_id=excluded.labeling_task_id,
               updated_at=excluded.updated_at",
            params![
                submission.id,
                submission.queue_id,
                submission.owner,
                submission.labeling_task_id,
                submission.created_at,
                submission.updated_at
            ],
        )?;

        {
            let mut stale = tx.prepare("SELECT id FROM questions WHERE submission_id = ?1")?;
            let existing: Vec<String> = stale
                .query_map(params![submission.id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            for id in existing {
                if !questions.iter().any(|q| q.id == id) {
                    tx.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
                }
            }
        }

        {
            let mut insert = tx.prepare(
                "INSERT INTO questions(id, submission_id, template_id, queue_id,
                   question_type, question_text, answer_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   queue_id=excluded.queue_id,
                   question_type=excluded.question_type,
                   question_text=excluded.question_text,
                   answer_json=excluded.answer_json
                 WHERE questions.submission_id = excluded.submission_id",
            )?;
            for q in questions {
                let written = insert.execute(params![
                    q.id,
                    q.submission_id,
                    q.template_id,
                    q.queue_id,
                    q.question_type,
                    q.question_text,
                    serde_json::to_string(&q.answer)
                        .map_err(|e| JudgeError::Serialization(e.to_string()))?,
                ])?;
                if written == 0 {
                    return Err(JudgeError::InvalidUpload(format!(
                        "question id '{}' already belongs to another submission",
                        q.id
                    )));
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_submission(&self, owner: &str, id: &str) -> Result<Option<Submission>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, queue_id, owner, labeling_task_id, created_at, updated_at
                 FROM submissions WHERE owner = ?1 AND id = ?2",
                params![owner, id],
                |row| {
                    Ok(Submission {
                        id: row.get(0)?,
                        queue_id: row.get(1)?,
                        owner: row.get(2)?,
                        labeling_task_id: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// All question rows of a queue, ordered by template then submission.
    pub fn list_questions(&self, owner: &str, queue_id: &str) -> Result<Vec<Question>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT q.id, q.template_id, q.submission_id, q.queue_id,
                    q.question_type, q.question_text, q.answer_json
             FROM questions q JOIN submissions s ON s.id = q.submission_id
             WHERE s.owner = ?1 AND q.queue_id = ?2
             ORDER BY q.template_id, q.submission_id",
        )?;
        let rows = stmt
            .query_map(params![owner, queue_id], question_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Distinct question template ids present in a queue.
    pub fn list_template_ids(&self, owner: &str, queue_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT q.template_id
             FROM questions q JOIN submissions s ON s.id = q.submission_id
             WHERE s.owner = ?1 AND q.queue_id = ?2
             ORDER BY q.template_id",
        )?;
        let rows = stmt
            .query_map(params![owner, queue_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }

    pub fn list_queues(&self, owner: &str) -> Result<Vec<QueueSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.queue_id, COUNT(DISTINCT s.id), COUNT(q.id)
             FROM submissions s LEFT JOIN questions q ON q.submission_id = s.id
             WHERE s.owner = ?1
             GROUP BY s.queue_id
             ORDER BY s.queue_id",
        )?;
        let rows = stmt
            .query_map(params![owner], |row| {
                Ok(QueueSummary {
                    queue_id: row.get(0)?,
                    submissions: row.get::<_, i64>(1)? as usize,
                    questions: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // judges

    pub fn create_judge(&self, judge: &Judge) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO judges(id, owner, name, system_prompt, model, active,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                judge.id,
                judge.owner,
                judge.name,
                judge.system_prompt,
                judge.model,
                judge.active,
                judge.created_at,
                judge.updated_at
            ],
        )?;
        Ok(())
    }

    pub fn list_judges(&self, owner: &str) -> Result<Vec<Judge>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner, name, system_prompt, model, active, created_at, updated_at
             FROM judges WHERE owner = ?1 ORDER BY created_at, name",
        )?;
        let rows = stmt
            .query_map(params![owner], judge_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_judge(&self, owner: &str, id: &str) -> Result<Option<Judge>> {
        let conn = self.lock()?;
        let judge = conn
            .query_row(
                "SELECT id, owner, name, system_prompt, model, active, created_at, updated_at
                 FROM judges WHERE owner = ?1 AND id = ?2",
                params![owner, id],
                judge_from_row,
            )
            .optional()?;
        Ok(judge)
    }

    /// Apply a partial update; returns false when no such judge exists.
    pub fn update_judge(
        &self,
        owner: &str,
        id: &str,
        update: &JudgeUpdate,
        updated_at: &str,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE judges SET
               name = COALESCE(?3, name),
               system_prompt = COALESCE(?4, system_prompt),
               model = COALESCE(?5, model),
               active = COALESCE(?6, active),
               updated_at = ?7
             WHERE owner = ?1 AND id = ?2",
            params![
                owner,
                id,
                update.name,
                update.system_prompt,
                update.model,
                update.active,
                updated_at
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a judge and (by cascade) its assignments. Evaluations are kept.
    pub fn delete_judge(&self, owner: &str, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM judges WHERE owner = ?1 AND id = ?2",
            params![owner, id],
        )?;
        Ok(changed > 0)
    }

    // assignments

    /// Insert the link once; returns true when it did not exist before.
    pub fn insert_assignment(&self, owner: &str, assignment: &Assignment) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO assignments(owner, queue_id, template_id, judge_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                owner,
                assignment.queue_id,
                assignment.template_id,
                assignment.judge_id,
                assignment.created_at
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_assignment(
        &self,
        owner: &str,
        queue_id: &str,
        template_id: &str,
        judge_id: &str,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM assignments
             WHERE owner = ?1 AND queue_id = ?2 AND template_id = ?3 AND judge_id = ?4",
            params![owner, queue_id, template_id, judge_id],
        )?;
        Ok(changed > 0)
    }

    /// Assignments of a queue joined to their judge rows.
    pub fn list_assignments(
        &self,
        owner: &str,
        queue_id: &str,
    ) -> Result<Vec<AssignedJudge>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT a.queue_id, a.template_id, a.judge_id, a.created_at,
                    j.id, j.owner, j.name, j.system_prompt, j.model, j.active,
                    j.created_at, j.updated_at
             FROM assignments a JOIN judges j ON j.id = a.judge_id AND j.owner = a.owner
             WHERE a.owner = ?1 AND a.queue_id = ?2
             ORDER BY a.template_id, j.name",
        )?;
        let rows = stmt
            .query_map(params![owner, queue_id], |row| {
                Ok(AssignedJudge {
                    assignment: Assignment {
                        queue_id: row.get(0)?,
                        template_id: row.get(1)?,
                        judge_id: row.get(2)?,
                        created_at: row.get(3)?,
                    },
                    judge: Judge {
                        id: row.get(4)?,
                        owner: row.get(5)?,
                        name: row.get(6)?,
                        system_prompt: row.get(7)?,
                        model: row.get(8)?,
                        active: row.get(9)?,
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // evaluations

    pub fn insert_evaluation(&self, owner: &str, eval: &Evaluation) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evaluations(id, owner, question_id, submission_id, template_id, queue_id,
                judge_id, judge_name, verdict, reasoning, raw_json,
                prompt_tokens, completion_tokens, total_tokens, latency_ms, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                eval.id,
                owner,
                eval.question_id,
                eval.submission_id,
                eval.template_id,
                eval.queue_id,
                eval.judge_id,
                eval.judge_name,
                eval.verdict,
                eval.reasoning,
                serde_json::to_string(&eval.raw_response)
                    .map_err(|e| JudgeError::Serialization(e.to_string()))?,
                eval.usage.prompt_tokens,
                eval.usage.completion_tokens,
                eval.usage.total_tokens,
                eval.latency_ms as i64,
                eval.error,
                eval.created_at
            ],
        )?;
        Ok(())
    }

    /// Evaluation rows for an owner, newest first, optionally restricted to a queue.
    pub fn list_evaluations(&self, owner: &str, queue_id: Option<&str>) -> Result<Vec<Evaluation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, question_id, submission_id, template_id, queue_id, judge_id, judge_name,
                    verdict, reasoning, raw_json, prompt_tokens, completion_tokens, total_tokens,
                    latency_ms, error, created_at
             FROM evaluations
             WHERE owner = ?1 AND (?2 IS NULL OR queue_id = ?2)
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![owner, queue_id], evaluation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_evaluations(&self, owner: &str) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM evaluations WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl ToSql for Verdict {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Verdict {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let answer_json: String = row.get(6)?;
    Ok(Question {
        id: row.get(0)?,
        template_id: row.get(1)?,
        submission_id: row.get(2)?,
        queue_id: row.get(3)?,
        question_type: row.get(4)?,
        question_text: row.get(5)?,
        answer: parse_json_column(answer_json),
    })
}

fn judge_from_row(row: &Row<'_>) -> rusqlite::Result<Judge> {
    Ok(Judge {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        system_prompt: row.get(3)?,
        model: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn evaluation_from_row(row: &Row<'_>) -> rusqlite::Result<Evaluation> {
    let raw_json: String = row.get(9)?;
    Ok(Evaluation {
        id: row.get(0)?,
        question_id: row.get(1)?,
        submission_id: row.get(2)?,
        template_id: row.get(3)?,
        queue_id: row.get(4)?,
        judge_id: row.get(5)?,
        judge_name: row.get(6)?,
        verdict: row.get(7)?,
        reasoning: row.get(8)?,
        raw_response: parse_json_column(raw_json),
        usage: TokenUsage {
            prompt_tokens: row.get(10)?,
            completion_tokens: row.get(11)?,
            total_tokens: row.get(12)?,
        },
        latency_ms: row.get::<_, i64>(13)?.max(0) as u64,
        error: row.get(14)?,
        created_at: row.get(15)?,
    })
}

/// Columns holding JSON written by us; fall back to the raw text if it was edited by hand.
fn parse_json_column(text: String) -> serde_json::Value {
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => serde_json::Value::String(text),
    }
}

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Build a judge row from creation input.
pub fn judge_from_new(owner: &str, new: NewJudge) -> Judge {
    let now = now_rfc3339();
    Judge {
        id: uuid::Uuid::new_v4().to_string(),
        owner: owner.to_string(),
        name: new.name,
        system_prompt: new.system_prompt,
        model: new.model,
        active: new.active,
        created_at: now.clone(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn submission(id: &str, queue: &str, owner: &str) -> Submission {
        Submission {
            id: id.to_string(),
            queue_id: queue.to_string(),
            owner: owner.to_string(),
            labeling_task_id: None,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    fn question(template: &str, sub: &str, queue: &str) -> Question {
        Question {
            id: Question::compose_id(template, sub),
            template_id: template.to_string(),
            submission_id: sub.to_string(),
            queue_id: queue.to_string(),
            question_type: "single_choice".to_string(),
            question_text: format!("Question {}?", template),
            answer: json!({"choice": "A"}),
        }
    }

    fn judge(owner: &str, name: &str) -> Judge {
        judge_from_new(
            owner,
            NewJudge {
                name: name.to_string(),
                system_prompt: "Be strict.".to_string(),
                model: "gpt-4o-mini".to_string(),
                active: true,
            },
        )
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("judge.sqlite3");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.list_judges("local").unwrap().is_empty());
    }

    #[test]
    fn test_replace_submission_drops_stale_questions() {
        let store = Store::open_in_memory().unwrap();
        let sub = submission("s1", "q-main", "local");
        store
            .replace_submission(
                &sub,
                &[question("t1", "s1", "q-main"), question("t2", "s1", "q-main")],
            )
            .unwrap();
        assert_eq!(store.list_questions("local", "q-main").unwrap().len(), 2);

        store
            .replace_submission(&sub, &[question("t2", "s1", "q-main")])
            .unwrap();
        let questions = store.list_questions("local", "q-main").unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].template_id, "t2");
        assert_eq!(questions[0].answer, json!({"choice": "A"}));
    }

    #[test]
    fn test_submission_owned_by_other_owner_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_submission(&submission("s1", "q", "alice"), &[])
            .unwrap();
        let err = store
            .replace_submission(&submission("s1", "q", "bob"), &[])
            .unwrap_err();
        assert!(matches!(err, JudgeError::InvalidUpload(_)));
    }

    #[test]
    fn test_questions_are_owner_scoped() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_submission(&submission("s1", "q", "alice"), &[question("t1", "s1", "q")])
            .unwrap();
        assert_eq!(store.list_questions("alice", "q").unwrap().len(), 1);
        assert!(store.list_questions("bob", "q").unwrap().is_empty());
        assert!(store.get_submission("bob", "s1").unwrap().is_none());
    }

    #[test]
    fn test_question_id_held_by_other_submission_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_submission(&submission("s1", "qa", "alice"), &[question("t1", "s1", "qa")])
            .unwrap();

        let mut stolen = question("t1", "s2", "qb");
        stolen.id = Question::compose_id("t1", "s1");
        let err = store
            .replace_submission(&submission("s2", "qb", "bob"), &[stolen])
            .unwrap_err();
        assert!(matches!(err, JudgeError::InvalidUpload(_)));

        let kept = store.list_questions("alice", "qa").unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].submission_id, "s1");
        assert_eq!(kept[0].question_text, "Question t1?");
        assert!(store.get_submission("bob", "s2").unwrap().is_none());
    }

    #[test]
    fn test_labeling_task_id_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let mut sub = submission("s1", "q", "local");
        sub.labeling_task_id = Some("task_7".to_string());
        store.replace_submission(&sub, &[]).unwrap();
        let stored = store.get_submission("local", "s1").unwrap().unwrap();
        assert_eq!(stored.labeling_task_id.as_deref(), Some("task_7"));
    }

    #[test]
    fn test_judge_update_and_delete_cascades_assignments() {
        let store = Store::open_in_memory().unwrap();
        let j = judge("local", "Strict");
        store.create_judge(&j).unwrap();
        store
            .replace_submission(&submission("s1", "q", "local"), &[question("t1", "s1", "q")])
            .unwrap();

        let update = JudgeUpdate {
            active: Some(false),
            name: Some("Lenient".to_string()),
            ..Default::default()
        };
        assert!(store.update_judge("local", &j.id, &update, &now_rfc3339()).unwrap());
        let fetched = store.get_judge("local", &j.id).unwrap().unwrap();
        assert!(!fetched.active);
        assert_eq!(fetched.name, "Lenient");
        assert_eq!(fetched.system_prompt, "Be strict.");

        let link = Assignment {
            queue_id: "q".to_string(),
            template_id: "t1".to_string(),
            judge_id: j.id.clone(),
            created_at: now_rfc3339(),
        };
        assert!(store.insert_assignment("local", &link).unwrap());
        assert!(!store.insert_assignment("local", &link).unwrap());
        assert_eq!(store.list_assignments("local", "q").unwrap().len(), 1);

        assert!(store.delete_judge("local", &j.id).unwrap());
        assert!(store.list_assignments("local", "q").unwrap().is_empty());
        assert!(!store.delete_judge("local", &j.id).unwrap());
    }

    #[test]
    fn test_evaluation_round_trip_and_queue_filter() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_submission(&submission("s1", "q", "local"), &[question("t1", "s1", "q")])
            .unwrap();
        let eval = Evaluation {
            id: "e1".to_string(),
            question_id: "t1:s1".to_string(),
            submission_id: "s1".to_string(),
            template_id: "t1".to_string(),
            queue_id: "q".to_string(),
            judge_id: "j1".to_string(),
            judge_name: "Strict".to_string(),
            verdict: Verdict::Fail,
            reasoning: "Wrong choice".to_string(),
            raw_response: json!({"id": "chatcmpl-1"}),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            latency_ms: 321,
            error: None,
            created_at: now_rfc3339(),
        };
        store.insert_evaluation("local", &eval).unwrap();

        let rows = store.list_evaluations("local", Some("q")).unwrap();
        assert_eq!(rows, vec![eval]);
        assert!(store.list_evaluations("local", Some("other")).unwrap().is_empty());
        assert_eq!(store.list_evaluations("local", None).unwrap().len(), 1);
        assert_eq!(store.count_evaluations("bob").unwrap(), 0);
    }

    #[test]
    fn test_evaluation_requires_existing_question() {
        let store = Store::open_in_memory().unwrap();
        let eval = Evaluation {
            id: "e1".to_string(),
            question_id: "missing:s1".to_string(),
            submission_id: "s1".to_string(),
            template_id: "missing".to_string(),
            queue_id: "q".to_string(),
            judge_id: "j1".to_string(),
            judge_name: "Strict".to_string(),
            verdict: Verdict::Pass,
            reasoning: String::new(),
            raw_response: serde_json::Value::Null,
            usage: TokenUsage::default(),
            latency_ms: 0,
            error: None,
            created_at: now_rfc3339(),
        };
        assert!(matches!(
            store.insert_evaluation("local", &eval),
            Err(JudgeError::Storage(_))
        ));
    }

    #[test]
    fn test_list_queues_counts() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_submission(
                &submission("s1", "alpha", "local"),
                &[question("t1", "s1", "alpha"), question("t2", "s1", "alpha")],
            )
            .unwrap();
        store
            .replace_submission(
                &submission("s2", "alpha", "local"),
                &[question("t1", "s2", "alpha")],
            )
            .unwrap();
        store
            .replace_submission(&submission("s3", "beta", "local"), &[])
            .unwrap();

        let queues = store.list_queues("local").unwrap();
        assert_eq!(
            queues,
            vec![
                QueueSummary {
                    queue_id: "alpha".to_string(),
                    submissions: 2,
                    questions: 3
                },
                QueueSummary {
                    queue_id: "beta".to_string(),
                    submissions: 1,
                    questions: 0
                },
            ]
        );
        assert_eq!(
            store.list_template_ids("local", "alpha").unwrap(),
            vec!["t1".to_string(), "t2".to_string()]
        );
    }
}
