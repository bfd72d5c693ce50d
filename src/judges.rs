//! Judge registry: named (rubric, model) configurations scoped to an owner.

use crate::error::{JudgeError, Result};
use crate::model::{Judge, JudgeUpdate, NewJudge};
use crate::store::{Store, judge_from_new, now_rfc3339};
use tracing::info;

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(JudgeError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn create_judge(store: &Store, owner: &str, new: NewJudge) -> Result<Judge> {
    require_non_empty("judge name", &new.name)?;
    require_non_empty("model", &new.model)?;

    let judge = judge_from_new(owner, new);
    store.create_judge(&judge)?;
    info!(judge = %judge.id, name = %judge.name, model = %judge.model, "created judge");
    Ok(judge)
}

pub fn list_judges(store: &Store, owner: &str) -> Result<Vec<Judge>> {
    store.list_judges(owner)
}

pub fn get_judge(store: &Store, owner: &str, id: &str) -> Result<Judge> {
    store
        .get_judge(owner, id)?
        .ok_or_else(|| JudgeError::JudgeNotFound(id.to_string()))
}

/// Apply a partial update and return the updated row.
pub fn update_judge(store: &Store, owner: &str, id: &str, update: JudgeUpdate) -> Result<Judge> {
    if let Some(name) = &update.name {
        require_non_empty("judge name", name)?;
    }
    if let Some(model) = &update.model {
        require_non_empty("model", model)?;
    }
    if update.is_empty() {
        return get_judge(store, owner, id);
    }

    if !store.update_judge(owner, id, &update, &now_rfc3339())? {
        return Err(JudgeError::JudgeNotFound(id.to_string()));
    }
    get_judge(store, owner, id)
}

/// Delete a judge and its assignments; its past evaluations stay.
pub fn delete_judge(store: &Store, owner: &str, id: &str) -> Result<()> {
    if !store.delete_judge(owner, id)? {
        return Err(JudgeError::JudgeNotFound(id.to_string()));
    }
    info!(judge = %id, "deleted judge");
    Ok(())
}
