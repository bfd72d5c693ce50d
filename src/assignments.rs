//! Assignment registry: which judges evaluate which question templates of a queue.

use crate::error::{JudgeError, Result};
use crate::judges::get_judge;
use crate::model::{AssignedJudge, Assignment, QueueSummary};
use crate::store::{Store, now_rfc3339};
use tracing::info;

/// Link a judge to a question template; returns false if the link already existed.
pub fn assign(
    store: &Store,
    owner: &str,
    queue_id: &str,
    template_id: &str,
    judge_id: &str,
) -> Result<bool> {
    if queue_id.trim().is_empty() || template_id.trim().is_empty() {
        return Err(JudgeError::InvalidInput(
            "queue id and question template id must not be empty".to_string(),
        ));
    }
    get_judge(store, owner, judge_id)?;

    let assignment = Assignment {
        queue_id: queue_id.to_string(),
        template_id: template_id.to_string(),
        judge_id: judge_id.to_string(),
        created_at: now_rfc3339(),
    };
    store.insert_assignment(owner, &assignment)
}

/// Remove a link; returns false if it did not exist.
pub fn unassign(
    store: &Store,
    owner: &str,
    queue_id: &str,
    template_id: &str,
    judge_id: &str,
) -> Result<bool> {
    store.delete_assignment(owner, queue_id, template_id, judge_id)
}

pub fn list_assignments(store: &Store, owner: &str, queue_id: &str) -> Result<Vec<AssignedJudge>> {
    store.list_assignments(owner, queue_id)
}

/// Assign a judge to every question template present in the queue.
///
/// Returns the number of links that were newly created.
pub fn assign_to_all_questions(
    store: &Store,
    owner: &str,
    queue_id: &str,
    judge_id: &str,
) -> Result<usize> {
    get_judge(store, owner, judge_id)?;

    let templates = store.list_template_ids(owner, queue_id)?;
    if templates.is_empty() {
        return Err(JudgeError::NoQuestions(queue_id.to_string()));
    }

    let mut created = 0;
    for template_id in &templates {
        if assign(store, owner, queue_id, template_id, judge_id)? {
            created += 1;
        }
    }
    info!(
        queue = %queue_id,
        judge = %judge_id,
        templates = templates.len(),
        created,
        "assigned judge to all questions"
    );
    Ok(created)
}

pub fn list_queues(store: &Store, owner: &str) -> Result<Vec<QueueSummary>> {
    store.list_queues(owner)
}
