//! Submission Judge - LLM-judged evaluation of question/answer submissions.
//!
//! Users upload batches of submissions into named queues, define judges
//! (a rubric paired with a model), assign judges to question templates, and
//! run a queue: every assigned judge returns a `pass`, `fail` or
//! `inconclusive` verdict with reasoning for every matching answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use submission_judge::{
//!     assignments::assign_to_all_questions,
//!     config::Config,
//!     ingest::ingest_path,
//!     judges::create_judge,
//!     llm::LlmClient,
//!     model::NewJudge,
//!     orchestrator::EvaluationRunner,
//!     store::Store,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!     let owner = config.store.owner.clone();
//!
//!     let store = Store::open(&config.store.database)?;
//!     ingest_path(&store, &owner, Path::new("uploads/batch.json"))?;
//!
//!     let judge = create_judge(&store, &owner, NewJudge {
//!         name: "Accuracy".into(),
//!         system_prompt: "Pass only factually correct answers.".into(),
//!         model: config.llm.default_model.clone(),
//!         active: true,
//!     })?;
//!     assign_to_all_questions(&store, &owner, "queue_1", &judge.id)?;
//!
//!     let client = Arc::new(LlmClient::new(config.llm.clone())?);
//!     let runner = EvaluationRunner::new(store, client, owner);
//!     let summary = runner.run("queue_1").await?;
//!     println!("{} planned, {} completed, {} failed",
//!         summary.planned, summary.completed, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Store**: SQLite persistence for submissions, judges, assignments, evaluations
//! - **ingest**: decodes uploaded JSON into submission and question rows
//! - **judges / assignments**: owner-scoped registries
//! - **EvaluationRunner**: bounded-concurrency batch run over a queue
//! - **VerdictJudge**: prompt building and schema-checked verdict parsing
//! - **LlmClient**: OpenAI-compatible structured-generation client
//! - **stats**: pass rates and filtered listings

pub mod assignments;
pub mod config;
pub mod error;
pub mod ingest;
pub mod judges;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod stats;
pub mod store;
pub mod verdict;

// Re-export commonly used types
pub use config::Config;
pub use error::{JudgeError, Result};
pub use llm::{LlmClient, StructuredGenerator};
pub use model::{Evaluation, Judge, Question, Verdict};
pub use orchestrator::{EvaluationRunner, RunSummary, WORKER_COUNT};
pub use stats::{EvaluationFilter, EvaluationStats};
pub use store::Store;
pub use verdict::VerdictJudge;
