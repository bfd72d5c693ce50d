//! Submission Judge CLI
//!
//! Upload submissions, manage judges and assignments, and run LLM judges over a queue.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use submission_judge::{
    assignments,
    config::Config,
    ingest::ingest_path,
    judges,
    llm::LlmClient,
    model::{JudgeUpdate, NewJudge, Verdict},
    orchestrator::{EvaluationRunner, WORKER_COUNT},
    stats::{self, EvaluationFilter},
    store::Store,
};
use tracing_subscriber::EnvFilter;

/// Submission Judge - LLM-judged evaluation of uploaded answers
#[derive(Parser)]
#[command(name = "submission-judge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Owner to scope all data to (overrides config)
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if it does not exist
    Init,

    /// Upload a submissions JSON file, or a directory of them
    Upload {
        /// Path to a .json file or a directory
        path: PathBuf,
    },

    /// List queues with submission and question counts
    Queues,

    /// Show one uploaded submission
    Submission { id: String },

    /// Manage judges
    #[command(subcommand)]
    Judge(JudgeCommand),

    /// Assign a judge to a question template in a queue
    Assign {
        queue: String,
        template: String,
        judge: String,
    },

    /// Assign a judge to every question template in a queue
    AssignAll { queue: String, judge: String },

    /// Remove a judge assignment
    Unassign {
        queue: String,
        template: String,
        judge: String,
    },

    /// Show the judge assignments of a queue
    Assignments { queue: String },

    /// Run every assigned judge over a queue
    Run {
        queue: String,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show pass-rate statistics
    Stats {
        /// Restrict to one queue
        #[arg(short, long)]
        queue: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List evaluation rows
    Results(ResultsArgs),

    /// Test LLM connection
    Test,
}

#[derive(Subcommand)]
enum JudgeCommand {
    /// Create a judge
    Create {
        #[arg(long)]
        name: String,

        /// Rubric / system prompt text
        #[arg(long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the rubric from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Model identifier (defaults to the configured default model)
        #[arg(long)]
        model: Option<String>,

        /// Create the judge inactive
        #[arg(long)]
        inactive: bool,
    },

    /// List judges
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one judge
    Show { id: String },

    /// Update fields of a judge
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a judge and its assignments
    Delete { id: String },
}

#[derive(Args)]
struct ResultsArgs {
    #[arg(short, long)]
    queue: Option<String>,

    /// Only rows from these judge ids
    #[arg(long = "judge")]
    judges: Vec<String>,

    /// Only rows for these question template ids
    #[arg(long = "template")]
    templates: Vec<String>,

    /// Only rows with this verdict (pass, fail, inconclusive)
    #[arg(long)]
    verdict: Option<Verdict>,

    /// Only rows that recorded an error
    #[arg(long)]
    errors: bool,

    #[arg(short = 'n', long)]
    limit: Option<usize>,

    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(database) = cli.database {
        config.store.database = database;
    }
    if let Some(owner) = cli.owner {
        config.store.owner = owner;
    }

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Upload { path } => cmd_upload(&config, path),
        Commands::Queues => cmd_queues(&config),
        Commands::Submission { id } => cmd_submission(&config, &id),
        Commands::Judge(command) => cmd_judge(&config, command),
        Commands::Assign {
            queue,
            template,
            judge,
        } => cmd_assign(&config, &queue, &template, &judge),
        Commands::AssignAll { queue, judge } => cmd_assign_all(&config, &queue, &judge),
        Commands::Unassign {
            queue,
            template,
            judge,
        } => cmd_unassign(&config, &queue, &template, &judge),
        Commands::Assignments { queue } => cmd_assignments(&config, &queue),
        Commands::Run { queue, json } => cmd_run(&config, &queue, json).await,
        Commands::Stats { queue, json } => cmd_stats(&config, queue, json),
        Commands::Results(args) => cmd_results(&config, args),
        Commands::Test => cmd_test(&config).await,
    }
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.store.database).with_context(|| {
        format!(
            "Failed to open database at '{}'",
            config.store.database.display()
        )
    })
}

fn cmd_init(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let evaluations = store.count_evaluations(&config.store.owner)?;
    println!("Database ready at {}", config.store.database.display());
    println!(
        "  Owner '{}' has {} stored evaluations",
        config.store.owner, evaluations
    );
    Ok(())
}

fn cmd_upload(config: &Config, path: PathBuf) -> Result<()> {
    let store = open_store(config)?;
    let report = ingest_path(&store, &config.store.owner, &path)
        .with_context(|| format!("Failed to upload '{}'", path.display()))?;

    println!("Uploaded {} submissions", report.submissions);
    println!("  Questions: {}", report.questions);
    println!(
        "  Queues:    {}",
        report.queues.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn cmd_queues(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let queues = assignments::list_queues(&store, &config.store.owner)?;

    if queues.is_empty() {
        println!("No queues. Upload submissions first.");
        return Ok(());
    }

    println!("{:<30} {:>12} {:>10}", "QUEUE", "SUBMISSIONS", "QUESTIONS");
    for q in queues {
        println!("{:<30} {:>12} {:>10}", q.queue_id, q.submissions, q.questions);
    }
    Ok(())
}

fn cmd_submission(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config)?;
    match store.get_submission(&config.store.owner, id)? {
        Some(submission) => println!("{}", serde_json::to_string_pretty(&submission)?),
        None => println!("No submission '{}'.", id),
    }
    Ok(())
}

fn cmd_judge(config: &Config, command: JudgeCommand) -> Result<()> {
    let store = open_store(config)?;
    let owner = &config.store.owner;

    match command {
        JudgeCommand::Create {
            name,
            prompt,
            prompt_file,
            model,
            inactive,
        } => {
            let system_prompt = match (prompt, prompt_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read '{}'", path.display()))?,
                (None, None) => String::new(),
            };
            let judge = judges::create_judge(
                &store,
                owner,
                NewJudge {
                    name,
                    system_prompt,
                    model: model.unwrap_or_else(|| config.llm.default_model.clone()),
                    active: !inactive,
                },
            )?;
            println!("Created judge {} ({})", judge.name, judge.id);
        }
        JudgeCommand::List { json } => {
            let list = judges::list_judges(&store, owner)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.is_empty() {
                println!("No judges defined.");
            } else {
                for j in list {
                    println!(
                        "{}  {:<24} {:<20} {}",
                        j.id,
                        j.name,
                        j.model,
                        if j.active { "active" } else { "inactive" }
                    );
                }
            }
        }
        JudgeCommand::Show { id } => {
            let judge = judges::get_judge(&store, owner, &id)?;
            println!("{}", serde_json::to_string_pretty(&judge)?);
        }
        JudgeCommand::Update {
            id,
            name,
            prompt,
            model,
            active,
        } => {
            let judge = judges::update_judge(
                &store,
                owner,
                &id,
                JudgeUpdate {
                    name,
                    system_prompt: prompt,
                    model,
                    active,
                },
            )?;
            println!("Updated judge {} ({})", judge.name, judge.id);
        }
        JudgeCommand::Delete { id } => {
            judges::delete_judge(&store, owner, &id)?;
            println!("Deleted judge {}", id);
        }
    }
    Ok(())
}

fn cmd_assign(config: &Config, queue: &str, template: &str, judge: &str) -> Result<()> {
    let store = open_store(config)?;
    if assignments::assign(&store, &config.store.owner, queue, template, judge)? {
        println!("Assigned judge {} to {} in {}", judge, template, queue);
    } else {
        println!("Already assigned.");
    }
    Ok(())
}

fn cmd_assign_all(config: &Config, queue: &str, judge: &str) -> Result<()> {
    let store = open_store(config)?;
    let created = assignments::assign_to_all_questions(&store, &config.store.owner, queue, judge)?;
    println!("Created {} new assignments in {}", created, queue);
    Ok(())
}

fn cmd_unassign(config: &Config, queue: &str, template: &str, judge: &str) -> Result<()> {
    let store = open_store(config)?;
    if assignments::unassign(&store, &config.store.owner, queue, template, judge)? {
        println!("Removed assignment.");
    } else {
        println!("No such assignment.");
    }
    Ok(())
}

fn cmd_assignments(config: &Config, queue: &str) -> Result<()> {
    let store = open_store(config)?;
    let links = assignments::list_assignments(&store, &config.store.owner, queue)?;

    if links.is_empty() {
        println!("No assignments in {}.", queue);
        return Ok(());
    }

    for link in links {
        println!(
            "{:<24} {:<24} {}{}",
            link.assignment.template_id,
            link.judge.name,
            link.judge.id,
            if link.judge.active { "" } else { "  (inactive)" }
        );
    }
    Ok(())
}

async fn cmd_run(config: &Config, queue: &str, json: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let store = open_store(config)?;

    let client = LlmClient::new(config.llm.clone()).context("Failed to build LLM client")?;
    let runner = EvaluationRunner::new(store, Arc::new(client), config.store.owner.clone());

    let start = Instant::now();
    let summary = runner
        .run(queue)
        .await
        .with_context(|| format!("Run failed for queue '{}'", queue))?;
    let duration = start.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let run_stats = stats::summarize(&summary.evaluations);
    println!("Evaluation run: {}", queue);
    println!("{}", "─".repeat(40));
    println!("  Planned:    {}", summary.planned);
    println!("  Completed:  {}", summary.completed);
    println!("  Failed:     {}", summary.failed);
    println!("  Pass rate:  {:.1}%", run_stats.pass_rate * 100.0);
    println!("  Workers:    {}", WORKER_COUNT);
    println!("  Duration:   {:.2?}", duration);
    Ok(())
}

fn cmd_stats(config: &Config, queue: Option<String>, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let filter = EvaluationFilter {
        queue_id: queue.clone(),
        ..Default::default()
    };
    let rows = stats::list_evaluations(&store, &config.store.owner, &filter)?;

    let overall = stats::summarize(&rows);
    let judges = stats::by_judge(&rows);
    let templates = stats::by_template(&rows);

    if json {
        let doc = serde_json::json!({
            "queue": queue,
            "overall": overall,
            "by_judge": judges,
            "by_template": templates,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "Evaluation statistics{}",
        queue.map(|q| format!(" for {}", q)).unwrap_or_default()
    );
    println!("{}", "─".repeat(60));
    println!(
        "  Total: {}  pass: {}  fail: {}  inconclusive: {}  errors: {}",
        overall.total, overall.pass, overall.fail, overall.inconclusive, overall.errored
    );
    println!("  Pass rate: {:.1}%", overall.pass_rate * 100.0);

    if !judges.is_empty() {
        println!("\nBy judge:");
        for (judge, s) in &judges {
            println!("  {:<40} {:>5} rows  {:>5.1}% pass", judge, s.total, s.pass_rate * 100.0);
        }
    }
    if !templates.is_empty() {
        println!("\nBy question:");
        for (template, s) in &templates {
            println!("  {:<40} {:>5} rows  {:>5.1}% pass", template, s.total, s.pass_rate * 100.0);
        }
    }
    Ok(())
}

fn cmd_results(config: &Config, args: ResultsArgs) -> Result<()> {
    let store = open_store(config)?;
    let filter = EvaluationFilter {
        queue_id: args.queue,
        judge_ids: args.judges,
        template_ids: args.templates,
        verdict: args.verdict,
        errors_only: args.errors,
        limit: args.limit,
    };
    let rows = stats::list_evaluations(&store, &config.store.owner, &filter)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No evaluations match.");
        return Ok(());
    }

    for row in &rows {
        println!(
            "{:<13} {:<30} {:<20} {}",
            row.verdict.as_str(),
            row.question_id,
            row.judge_name,
            row.created_at
        );
        let preview: String = row.reasoning.chars().take(160).collect();
        println!("    {}", preview);
    }
    println!("{}", "─".repeat(60));
    println!("{} rows", rows.len());
    Ok(())
}

async fn cmd_test(config: &Config) -> Result<()> {
    println!("Testing LLM connection...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.default_model);
    println!(
        "  API Key:   {}...",
        config.llm.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm.clone()).context("Failed to build LLM client")?;

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
