//! Batch evaluation of a queue.
//!
//! A run expands the queue's assignments into one task per
//! (question, active judge) pair and drains the task list with a fixed pool of
//! workers. Each worker takes the next index from a shared cursor and awaits
//! one provider call at a time, so at most [`WORKER_COUNT`] calls are in
//! flight. A failing pair is recorded as an `inconclusive` row carrying the
//! error and never stops the run.

use crate::error::{JudgeError, Result};
use crate::llm::StructuredGenerator;
use crate::model::{Evaluation, Judge, Question, TokenUsage, Verdict};
use crate::store::{Store, now_rfc3339};
use crate::verdict::VerdictJudge;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Number of concurrent workers per run.
pub const WORKER_COUNT: usize = 10;

/// Aggregate result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub queue_id: String,
    pub planned: usize,
    pub completed: usize,
    pub failed: usize,
    /// Rows written by this run, both verdicts and degraded failure rows.
    pub evaluations: Vec<Evaluation>,
}

/// One (question, judge) pair to evaluate.
#[derive(Debug, Clone)]
pub struct EvalTask {
    pub question: Question,
    pub judge: Judge,
}

#[derive(Default)]
struct Tally {
    completed: AtomicUsize,
    failed: AtomicUsize,
    evaluations: Mutex<Vec<Evaluation>>,
}

impl Tally {
    fn record(&self, evaluation: Evaluation) {
        match self.evaluations.lock() {
            Ok(mut rows) => rows.push(evaluation),
            Err(poisoned) => poisoned.into_inner().push(evaluation),
        }
    }
}

/// Runs every assigned judge over every matching question of a queue.
#[derive(Clone)]
pub struct EvaluationRunner {
    store: Store,
    judge: VerdictJudge,
    owner: String,
}

impl EvaluationRunner {
    pub fn new(
        store: Store,
        generator: Arc<dyn StructuredGenerator>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            store,
            judge: VerdictJudge::new(generator),
            owner: owner.into(),
        }
    }

    /// Expand the queue's assignments into tasks, failing fast if there is nothing to do.
    pub fn plan(&self, queue_id: &str) -> Result<Vec<EvalTask>> {
        let assignments = self.store.list_assignments(&self.owner, queue_id)?;
        if assignments.is_empty() {
            return Err(JudgeError::NoAssignments(queue_id.to_string()));
        }

        let questions = self.store.list_questions(&self.owner, queue_id)?;
        if questions.is_empty() {
            return Err(JudgeError::NoQuestions(queue_id.to_string()));
        }

        let tasks: Vec<EvalTask> = assignments
            .iter()
            .filter(|a| a.judge.active)
            .flat_map(|a| {
                questions
                    .iter()
                    .filter(move |q| q.template_id == a.assignment.template_id)
                    .map(move |q| EvalTask {
                        question: q.clone(),
                        judge: a.judge.clone(),
                    })
            })
            .collect();

        if tasks.is_empty() {
            return Err(JudgeError::NothingToEvaluate(queue_id.to_string()));
        }
        Ok(tasks)
    }

    /// Evaluate the queue once. Re-running appends a fresh set of rows.
    pub async fn run(&self, queue_id: &str) -> Result<RunSummary> {
        let tasks = Arc::new(self.plan(queue_id)?);
        let planned = tasks.len();
        info!(queue = %queue_id, planned, workers = WORKER_COUNT, "starting evaluation run");

        let cursor = Arc::new(AtomicUsize::new(0));
        let tally = Arc::new(Tally::default());

        let mut workers = JoinSet::new();
        for worker_id in 0..WORKER_COUNT.min(planned) {
            let runner = self.clone();
            let tasks = Arc::clone(&tasks);
            let cursor = Arc::clone(&cursor);
            let tally = Arc::clone(&tally);
            workers.spawn(async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(task) = tasks.get(index) else {
                        break;
                    };
                    runner.run_task(worker_id, task, &tally).await;
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(queue = %queue_id, error = %e, "evaluation worker aborted");
            }
        }

        let completed = tally.completed.load(Ordering::SeqCst);
        let mut failed = tally.failed.load(Ordering::SeqCst);
        if completed + failed < planned {
            // A worker died mid-task; whatever it held never finished.
            failed = planned - completed;
        }

        let evaluations = match Arc::try_unwrap(tally) {
            Ok(tally) => tally
                .evaluations
                .into_inner()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(shared) => match shared.evaluations.lock() {
                Ok(rows) => rows.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            },
        };

        info!(queue = %queue_id, planned, completed, failed, "evaluation run finished");
        Ok(RunSummary {
            queue_id: queue_id.to_string(),
            planned,
            completed,
            failed,
            evaluations,
        })
    }

    async fn run_task(&self, worker_id: usize, task: &EvalTask, tally: &Tally) {
        debug!(
            worker = worker_id,
            question = %task.question.id,
            judge = %task.judge.id,
            "evaluating pair"
        );

        match self.evaluate_pair(task).await {
            Ok(evaluation) => {
                tally.completed.fetch_add(1, Ordering::SeqCst);
                tally.record(evaluation);
            }
            Err(e) => {
                tally.failed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    question = %task.question.id,
                    judge = %task.judge.id,
                    error = %e,
                    "evaluation failed; recording inconclusive"
                );
                let fallback = failure_row(task, &e);
                match self.store.insert_evaluation(&self.owner, &fallback) {
                    Ok(()) => tally.record(fallback),
                    Err(insert_err) => warn!(
                        question = %task.question.id,
                        judge = %task.judge.id,
                        error = %insert_err,
                        "could not record failed evaluation"
                    ),
                }
            }
        }
    }

    async fn evaluate_pair(&self, task: &EvalTask) -> Result<Evaluation> {
        let outcome = self.judge.evaluate(&task.judge, &task.question).await?;
        let evaluation = Evaluation {
            verdict: outcome.verdict,
            reasoning: outcome.reasoning,
            raw_response: outcome.raw,
            usage: outcome.usage,
            latency_ms: outcome.latency_ms,
            error: None,
            ..base_row(task)
        };
        self.store.insert_evaluation(&self.owner, &evaluation)?;
        Ok(evaluation)
    }
}

fn base_row(task: &EvalTask) -> Evaluation {
    Evaluation {
        id: uuid::Uuid::new_v4().to_string(),
        question_id: task.question.id.clone(),
        submission_id: task.question.submission_id.clone(),
        template_id: task.question.template_id.clone(),
        queue_id: task.question.queue_id.clone(),
        judge_id: task.judge.id.clone(),
        judge_name: task.judge.name.clone(),
        verdict: Verdict::Inconclusive,
        reasoning: String::new(),
        raw_response: serde_json::Value::Null,
        usage: TokenUsage::default(),
        latency_ms: 0,
        error: None,
        created_at: now_rfc3339(),
    }
}

fn failure_row(task: &EvalTask, err: &JudgeError) -> Evaluation {
    let message = err.to_string();
    Evaluation {
        verdict: Verdict::Inconclusive,
        reasoning: message.clone(),
        raw_response: json!({ "error": message }),
        error: Some(message),
        ..base_row(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignments::assign;
    use crate::judges::{create_judge, update_judge};
    use crate::llm::{Generation, GenerationRequest};
    use crate::model::{JudgeUpdate, NewJudge, Submission};
    use async_trait::async_trait;
    use std::time::Duration;

    const OWNER: &str = "local";

    /// Passes answers containing "yes", fails the rest, and records peak concurrency.
    #[derive(Default)]
    struct CountingGenerator {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StructuredGenerator for CountingGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let verdict = if request.user_prompt.contains("choice: yes") {
                "pass"
            } else {
                "fail"
            };
            Ok(Generation {
                content: json!({"verdict": verdict, "reasoning": "checked"}).to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 4,
                    total_tokens: 14,
                },
                raw: json!({"id": "fake"}),
            })
        }

        fn provider_name(&self) -> &'static str {
            "counting"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl StructuredGenerator for FailingGenerator {
        async fn generate(&self, _request: GenerationRequest) -> Result<Generation> {
            Err(JudgeError::LlmApi("upstream unavailable".to_string()))
        }

        fn provider_name(&self) -> &'static str {
            "failing"
        }
    }

    /// Returns output that violates the verdict schema on every other call.
    #[derive(Default)]
    struct FlakyGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StructuredGenerator for FlakyGenerator {
        async fn generate(&self, _request: GenerationRequest) -> Result<Generation> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let content = if n % 2 == 0 {
                r#"{"verdict": "pass", "reasoning": "fine"}"#
            } else {
                r#"{"verdict": "excellent", "reasoning": "off-schema"}"#
            };
            Ok(Generation {
                content: content.to_string(),
                usage: TokenUsage::default(),
                raw: json!({}),
            })
        }

        fn provider_name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Deletes the queue's questions before answering, so every insert fails.
    struct VanishingGenerator {
        store: Store,
        submission: Submission,
    }

    #[async_trait]
    impl StructuredGenerator for VanishingGenerator {
        async fn generate(&self, _request: GenerationRequest) -> Result<Generation> {
            self.store.replace_submission(&self.submission, &[])?;
            Ok(Generation {
                content: r#"{"verdict": "pass", "reasoning": "fine"}"#.to_string(),
                usage: TokenUsage::default(),
                raw: json!({}),
            })
        }

        fn provider_name(&self) -> &'static str {
            "vanishing"
        }
    }

    fn submission(id: &str, queue: &str) -> Submission {
        Submission {
            id: id.to_string(),
            queue_id: queue.to_string(),
            owner: OWNER.to_string(),
            labeling_task_id: None,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    fn question(template: &str, sub: &str, queue: &str, choice: &str) -> Question {
        Question {
            id: Question::compose_id(template, sub),
            template_id: template.to_string(),
            submission_id: sub.to_string(),
            queue_id: queue.to_string(),
            question_type: "single_choice".to_string(),
            question_text: format!("{}?", template),
            answer: json!({"choice": choice}),
        }
    }

    fn add_judge(store: &Store, name: &str) -> Judge {
        create_judge(
            store,
            OWNER,
            NewJudge {
                name: name.to_string(),
                system_prompt: "Pass if the answer is yes.".to_string(),
                model: "fake-model".to_string(),
                active: true,
            },
        )
        .unwrap()
    }

    /// Queue "q": template t1 answered by 3 submissions, t2 by 2.
    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        for (i, choice) in ["yes", "no", "yes"].iter().enumerate() {
            let sub = format!("s{}", i);
            let mut questions = vec![question("t1", &sub, "q", choice)];
            if i < 2 {
                questions.push(question("t2", &sub, "q", "no"));
            }
            store.replace_submission(&submission(&sub, "q"), &questions).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_planned_matches_assignment_join() {
        let store = seeded_store();
        let a = add_judge(&store, "A");
        let b = add_judge(&store, "B");
        let c = add_judge(&store, "C");
        assign(&store, OWNER, "q", "t1", &a.id).unwrap();
        assign(&store, OWNER, "q", "t2", &a.id).unwrap();
        assign(&store, OWNER, "q", "t1", &b.id).unwrap();
        assign(&store, OWNER, "q", "t2", &c.id).unwrap();
        assign(&store, OWNER, "q", "t_unknown", &c.id).unwrap();
        update_judge(
            &store,
            OWNER,
            &c.id,
            JudgeUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        let generator = Arc::new(CountingGenerator::default());
        let runner = EvaluationRunner::new(store.clone(), generator.clone(), OWNER);
        let summary = runner.run("q").await.unwrap();

        // A: 3 (t1) + 2 (t2); B: 3 (t1); C inactive.
        assert_eq!(summary.planned, 8);
        assert_eq!(summary.completed, 8);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.completed + summary.failed, summary.planned);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 8);
        assert_eq!(summary.evaluations.len(), 8);

        let rows = store.list_evaluations(OWNER, Some("q")).unwrap();
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|r| r.error.is_none() && r.judge_id != c.id));
        let passes = rows.iter().filter(|r| r.verdict == Verdict::Pass).count();
        // t1 answered "yes" by s0 and s2, judged by A and B.
        assert_eq!(passes, 4);
        assert!(rows.iter().all(|r| r.usage.total_tokens == 14));
    }

    #[tokio::test]
    async fn test_no_assignments_fails_without_writing() {
        let store = seeded_store();
        let runner =
            EvaluationRunner::new(store.clone(), Arc::new(CountingGenerator::default()), OWNER);
        let err = runner.run("q").await.unwrap_err();
        assert!(matches!(err, JudgeError::NoAssignments(_)));
        assert_eq!(store.count_evaluations(OWNER).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_no_questions_fails_without_writing() {
        let store = Store::open_in_memory().unwrap();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "empty", "t1", &judge.id).unwrap();
        let runner =
            EvaluationRunner::new(store.clone(), Arc::new(CountingGenerator::default()), OWNER);
        assert!(matches!(
            runner.run("empty").await,
            Err(JudgeError::NoQuestions(_))
        ));
        assert_eq!(store.count_evaluations(OWNER).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_only_inactive_judges_is_nothing_to_evaluate() {
        let store = seeded_store();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "q", "t1", &judge.id).unwrap();
        update_judge(
            &store,
            OWNER,
            &judge.id,
            JudgeUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        let runner =
            EvaluationRunner::new(store.clone(), Arc::new(CountingGenerator::default()), OWNER);
        assert!(matches!(
            runner.run("q").await,
            Err(JudgeError::NothingToEvaluate(_))
        ));
        assert_eq!(store.count_evaluations(OWNER).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_provider_records_every_pair_as_error() {
        let store = seeded_store();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "q", "t1", &judge.id).unwrap();
        assign(&store, OWNER, "q", "t2", &judge.id).unwrap();

        let runner = EvaluationRunner::new(store.clone(), Arc::new(FailingGenerator), OWNER);
        let summary = runner.run("q").await.unwrap();

        assert_eq!(summary.planned, 5);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 5);

        let rows = store.list_evaluations(OWNER, Some("q")).unwrap();
        assert_eq!(rows.len(), 5);
        for row in rows {
            assert_eq!(row.verdict, Verdict::Inconclusive);
            let error = row.error.expect("error recorded");
            assert!(error.contains("upstream unavailable"));
            assert_eq!(row.reasoning, error);
            assert_eq!(row.usage, TokenUsage::default());
            assert_eq!(row.latency_ms, 0);
        }
    }

    #[tokio::test]
    async fn test_schema_violations_are_counted_as_failures() {
        let store = seeded_store();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "q", "t1", &judge.id).unwrap();
        assign(&store, OWNER, "q", "t2", &judge.id).unwrap();

        let runner =
            EvaluationRunner::new(store.clone(), Arc::new(FlakyGenerator::default()), OWNER);
        let summary = runner.run("q").await.unwrap();

        assert_eq!(summary.planned, 5);
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.failed, 2);
        let errored: Vec<_> = summary
            .evaluations
            .iter()
            .filter(|e| e.error.is_some())
            .collect();
        assert_eq!(errored.len(), 2);
        assert!(errored
            .iter()
            .all(|e| e.error.as_deref().unwrap().contains("schema validation")));
    }

    #[tokio::test]
    async fn test_fallback_insert_failure_is_swallowed() {
        let store = Store::open_in_memory().unwrap();
        let sub = submission("s0", "q");
        store
            .replace_submission(&sub, &[question("t1", "s0", "q", "yes")])
            .unwrap();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "q", "t1", &judge.id).unwrap();

        let generator = Arc::new(VanishingGenerator {
            store: store.clone(),
            submission: sub,
        });
        let runner = EvaluationRunner::new(store.clone(), generator, OWNER);
        let summary = runner.run("q").await.unwrap();

        assert_eq!(summary.planned, 1);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 1);
        assert!(summary.evaluations.is_empty());
        assert_eq!(store.count_evaluations(OWNER).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded_by_worker_count() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..40 {
            let sub = format!("s{}", i);
            store
                .replace_submission(&submission(&sub, "big"), &[question("t1", &sub, "big", "yes")])
                .unwrap();
        }
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "big", "t1", &judge.id).unwrap();

        let generator = Arc::new(CountingGenerator::default());
        let runner = EvaluationRunner::new(store, generator.clone(), OWNER);
        let summary = runner.run("big").await.unwrap();

        assert_eq!(summary.planned, 40);
        assert_eq!(summary.completed, 40);
        let peak = generator.peak.load(Ordering::SeqCst);
        assert!(peak <= WORKER_COUNT, "peak concurrency {} exceeded bound", peak);
        assert!(peak > 1, "workers never overlapped");
    }

    #[tokio::test]
    async fn test_rerun_appends_rows() {
        let store = seeded_store();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "q", "t2", &judge.id).unwrap();
        let runner =
            EvaluationRunner::new(store.clone(), Arc::new(CountingGenerator::default()), OWNER);

        runner.run("q").await.unwrap();
        runner.run("q").await.unwrap();
        assert_eq!(store.count_evaluations(OWNER).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_run_queue() {
        let store = seeded_store();
        let judge = add_judge(&store, "A");
        assign(&store, OWNER, "q", "t1", &judge.id).unwrap();
        let runner =
            EvaluationRunner::new(store, Arc::new(CountingGenerator::default()), "mallory");
        assert!(matches!(
            runner.run("q").await,
            Err(JudgeError::NoAssignments(_))
        ));
    }
}
