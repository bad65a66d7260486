use crate::domain::model::BatchResult;
use crate::utils::error::{BatchError, ErrorKind, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::Instrument;

/// Step 執行時可見的資訊
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: u64,
    pub job_name: String,
    pub step_name: String,
}

/// Step 的執行本體，每個 run 只被呼叫一次
#[async_trait]
pub trait Tasklet: Send + Sync {
    async fn execute(&self, context: &StepContext) -> Result<BatchResult>;
}

#[derive(Clone)]
pub struct Step {
    name: String,
    tasklet: Arc<dyn Tasklet>,
}

impl Step {
    pub fn new(name: impl Into<String>, tasklet: impl Tasklet + 'static) -> Self {
        Self {
            name: name.into(),
            tasklet: Arc::new(tasklet),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    name: String,
    steps: Vec<Step>,
}

impl Job {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

pub struct JobBuilder {
    name: String,
    steps: Vec<Step>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn start(mut self, step: Step) -> Self {
        self.steps.clear();
        self.steps.push(step);
        self
    }

    pub fn next(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Result<Job> {
        if self.steps.is_empty() {
            return Err(BatchError::Config {
                message: format!("job '{}' has no steps", self.name),
            });
        }
        Ok(Job {
            name: self.name,
            steps: self.steps,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Registered,
    Started,
    Completed,
    Failed,
}

/// 呼叫端最後看到的結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    Success,
    NoData,
    Failed,
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Success => f.write_str("SUCCESS"),
            ExitStatus::NoData => f.write_str("NO_DATA"),
            ExitStatus::Failed => f.write_str("FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    Completed { result: BatchResult },
    Failed { kind: ErrorKind, message: String },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepExecution {
    pub step_name: String,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

/// 一次 job 執行的紀錄，只會追加 step 結果
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub run_id: u64,
    pub job_name: String,
    status: RunStatus,
    steps: Vec<StepExecution>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl JobRun {
    fn new(run_id: u64, job_name: &str) -> Self {
        Self {
            run_id,
            job_name: job_name.to_string(),
            status: RunStatus::Registered,
            steps: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    fn start(&mut self) {
        self.status = RunStatus::Started;
        self.started_at = Some(Utc::now());
    }

    fn record(&mut self, execution: StepExecution) {
        if matches!(execution.outcome, StepOutcome::Failed { .. }) {
            self.status = RunStatus::Failed;
        }
        self.steps.push(execution);
    }

    fn finish(&mut self) {
        if self.status == RunStatus::Started {
            self.status = RunStatus::Completed;
        }
        self.ended_at = Some(Utc::now());
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn steps(&self) -> &[StepExecution] {
        &self.steps
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// `NoData` only when every step reported `NoData`.
    pub fn exit_status(&self) -> ExitStatus {
        if self.status == RunStatus::Failed {
            return ExitStatus::Failed;
        }
        let all_no_data = self.steps.iter().all(|step| {
            matches!(
                step.outcome,
                StepOutcome::Completed {
                    result: BatchResult::NoData
                }
            )
        });
        if !self.steps.is_empty() && all_no_data {
            ExitStatus::NoData
        } else {
            ExitStatus::Success
        }
    }

    pub fn failure(&self) -> Option<(ErrorKind, &str)> {
        self.steps.iter().find_map(|step| match &step.outcome {
            StepOutcome::Failed { kind, message } => Some((*kind, message.as_str())),
            _ => None,
        })
    }

    pub fn summary(&self) -> serde_json::Value {
        let duration_ms = match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds(),
            _ => 0,
        };
        let mut summary = serde_json::json!({
            "run_id": self.run_id,
            "job_name": self.job_name,
            "status": self.status,
            "exit_status": self.exit_status(),
            "steps": self.steps,
            "duration_ms": duration_ms,
        });
        if let Some((kind, message)) = self.failure() {
            summary["error_kind"] = serde_json::json!(kind);
            summary["error_message"] = serde_json::json!(message);
        }
        summary
    }
}

/// Run id 產生器：單調遞增，不重複使用
#[derive(Debug)]
pub struct RunIdIncrementer {
    next: AtomicU64,
}

impl RunIdIncrementer {
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Continues numbering after a run id already used elsewhere.
    pub fn starting_after(last_run_id: u64) -> Self {
        Self {
            next: AtomicU64::new(last_run_id.saturating_add(1)),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for RunIdIncrementer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Job) -> Result<()> {
        if self.jobs.contains_key(job.name()) {
            return Err(BatchError::Config {
                message: format!("job '{}' is already registered", job.name()),
            });
        }
        tracing::debug!("Registered job {} ({} steps)", job.name(), job.steps().len());
        self.jobs.insert(job.name().to_string(), job);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Job> {
        self.jobs.get(name).ok_or_else(|| BatchError::UnknownJob {
            name: name.to_string(),
        })
    }

    pub fn job_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.jobs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// 依名稱啟動 job，記錄每個 run 的結果
pub struct JobLauncher {
    registry: JobRegistry,
    incrementer: RunIdIncrementer,
    // 同一個 job 同時只允許一個 run
    job_locks: HashMap<String, tokio::sync::Mutex<()>>,
    history: Mutex<Vec<JobRun>>,
}

impl JobLauncher {
    pub fn new(registry: JobRegistry) -> Self {
        Self::with_incrementer(registry, RunIdIncrementer::new())
    }

    pub fn with_incrementer(registry: JobRegistry, incrementer: RunIdIncrementer) -> Self {
        let job_locks = registry
            .jobs
            .keys()
            .map(|name| (name.clone(), tokio::sync::Mutex::new(())))
            .collect();
        Self {
            registry,
            incrementer,
            job_locks,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Runs the named job to completion.
    ///
    /// Only an unknown job name is returned as `Err`; every failure inside a
    /// step is recorded on the returned `JobRun` instead.
    pub async fn run(&self, job_name: &str) -> Result<JobRun> {
        let job = self.registry.get(job_name)?;
        let _guard = match self.job_locks.get(job_name) {
            Some(lock) => lock.lock().await,
            None => {
                return Err(BatchError::UnknownJob {
                    name: job_name.to_string(),
                })
            }
        };

        let mut run = JobRun::new(self.incrementer.next_id(), job.name());
        let span = tracing::info_span!("job", job = %run.job_name, run_id = run.run_id);

        async {
            run.start();
            tracing::info!("🚀 Job started: {} (run id {})", run.job_name, run.run_id);

            for step in job.steps() {
                if run.status() == RunStatus::Failed {
                    tracing::info!("⏭️ Skipping step {} after earlier failure", step.name());
                    run.record(StepExecution {
                        step_name: step.name().to_string(),
                        outcome: StepOutcome::Skipped,
                        duration_ms: 0,
                    });
                    continue;
                }

                let execution = Self::execute_step(&run, step).await;
                run.record(execution);
            }

            run.finish();
            match run.failure() {
                Some((kind, message)) => tracing::error!(
                    "❌ Job failed: {} (run id {}, kind {}): {}",
                    run.job_name,
                    run.run_id,
                    kind,
                    message
                ),
                None => tracing::info!(
                    "✅ Job completed: {} (run id {}, exit status {})",
                    run.job_name,
                    run.run_id,
                    run.exit_status()
                ),
            }
        }
        .instrument(span)
        .await;

        self.history
            .lock()
            .map_err(|_| BatchError::Config {
                message: "run history lock poisoned".to_string(),
            })?
            .push(run.clone());

        Ok(run)
    }

    async fn execute_step(run: &JobRun, step: &Step) -> StepExecution {
        let context = StepContext {
            run_id: run.run_id,
            job_name: run.job_name.clone(),
            step_name: step.name().to_string(),
        };
        let start_time = Instant::now();
        tracing::debug!("▶️ Step started: {}", step.name());

        let outcome = match step.tasklet.execute(&context).await {
            Ok(result) => {
                tracing::info!("Step {} finished with {}", step.name(), result);
                StepOutcome::Completed { result }
            }
            Err(e) => {
                tracing::error!("Step {} failed: {} ({})", step.name(), e, e.recovery_suggestion());
                StepOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };

        StepExecution {
            step_name: step.name().to_string(),
            outcome,
            duration_ms: u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// 已結束的 run，依執行順序
    pub fn history(&self) -> Vec<JobRun> {
        match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
