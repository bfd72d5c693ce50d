//! Read-only statistics over evaluation rows.
//!
//! Rows are loaded for an owner and filtered and aggregated in memory.

use crate::error::Result;
use crate::model::{Evaluation, Verdict};
use crate::store::Store;
use serde::Serialize;
use std::collections::BTreeMap;

/// Criteria for listing evaluations. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct EvaluationFilter {
    pub queue_id: Option<String>,
    pub judge_ids: Vec<String>,
    pub template_ids: Vec<String>,
    pub verdict: Option<Verdict>,
    pub errors_only: bool,
    pub limit: Option<usize>,
}

impl EvaluationFilter {
    pub fn for_queue(queue_id: impl Into<String>) -> Self {
        Self {
            queue_id: Some(queue_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, row: &Evaluation) -> bool {
        if let Some(queue) = &self.queue_id {
            if &row.queue_id != queue {
                return false;
            }
        }
        if !self.judge_ids.is_empty() && !self.judge_ids.contains(&row.judge_id) {
            return false;
        }
        if !self.template_ids.is_empty() && !self.template_ids.contains(&row.template_id) {
            return false;
        }
        if let Some(verdict) = self.verdict {
            if row.verdict != verdict {
                return false;
            }
        }
        if self.errors_only && row.error.is_none() {
            return false;
        }
        true
    }
}

/// Aggregate counts for a set of evaluations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationStats {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub inconclusive: usize,
    /// Rows carrying an error (a subset of `inconclusive`).
    pub errored: usize,
    /// `pass / total`, 0 when there are no rows.
    pub pass_rate: f64,
}

impl EvaluationStats {
    fn add(&mut self, row: &Evaluation) {
        self.total += 1;
        match row.verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::Inconclusive => self.inconclusive += 1,
        }
        if row.error.is_some() {
            self.errored += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.pass_rate = if self.total > 0 {
            self.pass as f64 / self.total as f64
        } else {
            0.0
        };
        self
    }
}

/// Evaluation rows matching the filter, newest first.
pub fn list_evaluations(
    store: &Store,
    owner: &str,
    filter: &EvaluationFilter,
) -> Result<Vec<Evaluation>> {
    let rows = store.list_evaluations(owner, filter.queue_id.as_deref())?;
    let matched = rows.into_iter().filter(|row| filter.matches(row));
    Ok(match filter.limit {
        Some(limit) => matched.take(limit).collect(),
        None => matched.collect(),
    })
}

pub fn summarize<'a>(rows: impl IntoIterator<Item = &'a Evaluation>) -> EvaluationStats {
    let mut stats = EvaluationStats::default();
    for row in rows {
        stats.add(row);
    }
    stats.finish()
}

fn group_by<'a, F>(rows: &'a [Evaluation], key: F) -> BTreeMap<String, EvaluationStats>
where
    F: Fn(&'a Evaluation) -> String,
{
    let mut groups: BTreeMap<String, EvaluationStats> = BTreeMap::new();
    for row in rows {
        groups.entry(key(row)).or_default().add(row);
    }
    groups
        .into_iter()
        .map(|(k, stats)| (k, stats.finish()))
        .collect()
}

/// Stats per judge, keyed by `"{judge name} ({judge id})"`.
pub fn by_judge(rows: &[Evaluation]) -> BTreeMap<String, EvaluationStats> {
    group_by(rows, |row| format!("{} ({})", row.judge_name, row.judge_id))
}

/// Stats per question template.
pub fn by_template(rows: &[Evaluation]) -> BTreeMap<String, EvaluationStats> {
    group_by(rows, |row| row.template_id.clone())
}
