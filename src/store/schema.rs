pub const DDL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS submissions (
  id TEXT PRIMARY KEY,
  queue_id TEXT NOT NULL,
  owner TEXT NOT NULL,
  labeling_task_id TEXT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_owner_queue ON submissions(owner, queue_id);

CREATE TABLE IF NOT EXISTS questions (
  id TEXT PRIMARY KEY,
  submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
  template_id TEXT NOT NULL,
  queue_id TEXT NOT NULL,
  question_type TEXT NOT NULL,
  question_text TEXT NOT NULL,
  answer_json TEXT NOT NULL,
  UNIQUE (submission_id, template_id)
);

CREATE INDEX IF NOT EXISTS idx_questions_queue ON questions(queue_id, template_id);

CREATE TABLE IF NOT EXISTS judges (
  id TEXT PRIMARY KEY,
  owner TEXT NOT NULL,
  name TEXT NOT NULL,
  system_prompt TEXT NOT NULL,
  model TEXT NOT NULL,
  active INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignments (
  owner TEXT NOT NULL,
  queue_id TEXT NOT NULL,
  template_id TEXT NOT NULL,
  judge_id TEXT NOT NULL REFERENCES judges(id) ON DELETE CASCADE,
  created_at TEXT NOT NULL,
  PRIMARY KEY (owner, queue_id, template_id, judge_id)
);

CREATE TABLE IF NOT EXISTS evaluations (
  id TEXT PRIMARY KEY,
  owner TEXT NOT NULL,
  question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
  submission_id TEXT NOT NULL,
  template_id TEXT NOT NULL,
  queue_id TEXT NOT NULL,
  judge_id TEXT NOT NULL,
  judge_name TEXT NOT NULL,
  verdict TEXT NOT NULL CHECK (verdict IN ('pass', 'fail', 'inconclusive')),
  reasoning TEXT NOT NULL,
  raw_json TEXT NOT NULL,
  prompt_tokens INTEGER NOT NULL DEFAULT 0,
  completion_tokens INTEGER NOT NULL DEFAULT 0,
  total_tokens INTEGER NOT NULL DEFAULT 0,
  latency_ms INTEGER NOT NULL DEFAULT 0,
  error TEXT,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluations_owner_queue ON evaluations(owner, queue_id);
"#;
