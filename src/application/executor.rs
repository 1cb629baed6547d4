//! Executor (C11) — the bounded worker pool that actually runs tasks against
//! an `AgentRuntime`, plus the background control loop that keeps the queue
//! fed from the store.
//!
//! Grounded in the teacher's `SwarmOrchestrator`: a `Semaphore`-free variant
//! of the same shape, since capacity here is expressed directly as the
//! number of spawned worker loops reading off one shared `mpsc::Receiver`
//! rather than permits guarding ad hoc spawns.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex as TokioMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use crate::application::deliverable_engine::DeliverableEngine;
use crate::application::recovery_analyser::{RecoveryAnalyser, RecoveryContext};
use crate::application::thinking_recorder::ThinkingRecorder;
use crate::domain::error::{AgentRuntimeError, StoreError};
use crate::domain::models::{
    Agent, AgentStatus, BudgetLedger, ModelCostTable, Task, TaskResult, TaskStatus, TokensUsed,
    Workspace, WorkspaceStatus,
};
use crate::domain::ports::{AgentRuntime, AlertSeverity, AlertType, Clock, Store, Telemetry};

/// Lifecycle state of the worker pool and its control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorStats {
    pub state: ExecutorState,
    pub active_workers: usize,
    pub queued_tasks: usize,
    pub completed_total: u64,
    pub failed_total: u64,
}

struct ActivityEntry {
    timestamp: DateTime<Utc>,
    event: String,
    task_id: Uuid,
    agent_id: Option<Uuid>,
    workspace_id: Uuid,
    summary: String,
}

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub task_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub workspace_id: Uuid,
    pub summary: String,
}

/// Builds the deterministic bootstrap task created for a workspace that has
/// no tasks of its own yet.
fn create_initial_workspace_task(workspace: &Workspace) -> Task {
    Task::new(workspace.id, "Bootstrap workspace", format!("Kick off work toward: {}", workspace.goal_text))
        .with_priority(crate::domain::models::TaskPriority::High)
        .with_idempotency_key(format!("bootstrap:{}", workspace.id))
}

/// `min 2 minutes, max 30 minutes`, per the deadline derivation rule;
/// defaults to 10 minutes when a task carries no duration estimate.
fn estimate_deadline_seconds(task: &Task) -> i64 {
    let estimated =
        task.context_data.get("estimated_duration_seconds").and_then(serde_json::Value::as_i64).unwrap_or(600);
    estimated.clamp(120, 1800)
}

struct Shared {
    store: Arc<dyn Store>,
    agent_runtime: Arc<dyn AgentRuntime>,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
    deliverable_engine: Arc<DeliverableEngine>,
    recovery_analyser: Arc<RecoveryAnalyser>,
    thinking_recorder: Arc<ThinkingRecorder>,
    max_concurrent_tasks: usize,
    max_recovery_attempts: u32,
    task_tx: mpsc::Sender<Task>,
    task_rx: TokioMutex<mpsc::Receiver<Task>>,
    state: RwLock<ExecutorState>,
    active_count: AtomicUsize,
    completed_total: AtomicU64,
    failed_total: AtomicU64,
    budgets: TokioMutex<HashMap<Uuid, BudgetLedger>>,
    cost_table: ModelCostTable,
    recent_activity: TokioMutex<VecDeque<ActivityEntry>>,
    activity_capacity: usize,
    /// Logical CPU count, sampled once at startup to normalize the 1-minute
    /// load average fed into the Recovery Analyser's `system_load`.
    cpu_count: usize,
}

/// Owns the worker pool and the background reconciliation loop. Construct
/// once per process and call `start()` to begin dispatching.
pub struct Executor {
    shared: Arc<Shared>,
    worker_handles: TokioMutex<Vec<JoinHandle<()>>>,
    control_handle: TokioMutex<Option<JoinHandle<()>>>,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        agent_runtime: Arc<dyn AgentRuntime>,
        telemetry: Arc<dyn Telemetry>,
        clock: Arc<dyn Clock>,
        deliverable_engine: Arc<DeliverableEngine>,
        recovery_analyser: Arc<RecoveryAnalyser>,
        thinking_recorder: Arc<ThinkingRecorder>,
        max_concurrent_tasks: u32,
    ) -> Self {
        let max_concurrent_tasks = max_concurrent_tasks.max(1) as usize;
        let queue_capacity = max_concurrent_tasks.saturating_mul(10).max(10);
        let (task_tx, task_rx) = mpsc::channel(queue_capacity);
        let cpu_count = sysinfo::System::new_all().cpus().len().max(1);

        Self {
            shared: Arc::new(Shared {
                store,
                agent_runtime,
                telemetry,
                clock,
                deliverable_engine,
                recovery_analyser,
                thinking_recorder,
                max_concurrent_tasks,
                max_recovery_attempts: 3,
                task_tx,
                task_rx: TokioMutex::new(task_rx),
                state: RwLock::new(ExecutorState::Stopped),
                active_count: AtomicUsize::new(0),
                completed_total: AtomicU64::new(0),
                failed_total: AtomicU64::new(0),
                budgets: TokioMutex::new(HashMap::new()),
                cost_table: ModelCostTable::default(),
                recent_activity: TokioMutex::new(VecDeque::new()),
                activity_capacity: 200,
                cpu_count,
            }),
            worker_handles: TokioMutex::new(Vec::new()),
            control_handle: TokioMutex::new(None),
        }
    }

    pub fn with_max_recovery_attempts(mut self, max: u32) -> Self {
        Arc::get_mut(&mut self.shared)
            .expect("configured before start()")
            .max_recovery_attempts = max;
        self
    }

    /// Spawns the worker pool and the control loop. A no-op if already running.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.state.write().await;
            if *state != ExecutorState::Stopped {
                return Ok(());
            }
            *state = ExecutorState::Running;
        }

        let mut handles = self.worker_handles.lock().await;
        for worker_id in 0..self.shared.max_concurrent_tasks {
            handles.push(tokio::spawn(Self::worker_loop(Arc::clone(&self.shared), worker_id)));
        }
        drop(handles);

        *self.control_handle.lock().await = Some(tokio::spawn(Self::control_loop(Arc::clone(&self.shared))));
        Ok(())
    }

    /// Signals every worker and the control loop to stop after their current
    /// unit of work, then waits for them to actually exit.
    pub async fn stop(&self) -> Result<()> {
        *self.shared.state.write().await = ExecutorState::Stopped;

        if let Some(handle) = self.control_handle.lock().await.take() {
            handle.await.context("joining control loop")?;
        }
        let mut handles = self.worker_handles.lock().await;
        for handle in handles.drain(..) {
            handle.await.context("joining worker loop")?;
        }
        Ok(())
    }

    /// Stops workers from pulling new work; tasks already in flight finish.
    pub async fn pause(&self) {
        let mut state = self.shared.state.write().await;
        if *state == ExecutorState::Running {
            *state = ExecutorState::Paused;
        }
    }

    pub async fn resume(&self) {
        let mut state = self.shared.state.write().await;
        if *state == ExecutorState::Paused {
            *state = ExecutorState::Running;
        }
    }

    pub async fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            state: *self.shared.state.read().await,
            active_workers: self.shared.active_count.load(Ordering::SeqCst),
            queued_tasks: self.shared.task_tx.max_capacity() - self.shared.task_tx.capacity(),
            completed_total: self.shared.completed_total.load(Ordering::SeqCst),
            failed_total: self.shared.failed_total.load(Ordering::SeqCst),
        }
    }

    pub async fn recent_activity(&self, workspace_id: Option<Uuid>, limit: usize) -> Vec<ActivityRecord> {
        let log = self.shared.recent_activity.lock().await;
        log.iter()
            .rev()
            .filter(|e| workspace_id.is_none_or(|w| e.workspace_id == w))
            .take(limit)
            .map(|e| ActivityRecord {
                timestamp: e.timestamp,
                event: e.event.clone(),
                task_id: e.task_id,
                agent_id: e.agent_id,
                workspace_id: e.workspace_id,
                summary: e.summary.clone(),
            })
            .collect()
    }

    /// Moves a `pending` task straight into the queue, bypassing the control
    /// loop's 10s poll — used by the Goal Monitor so a freshly planned task
    /// doesn't sit idle for up to one poll cycle.
    pub async fn enqueue(&self, task: Task) -> Result<()> {
        Self::enqueue_task(&self.shared, task).await
    }

    /// Ensures a workspace with no tasks at all gets its bootstrap task
    /// immediately rather than waiting for the next control-loop tick.
    pub async fn trigger_initial(&self, workspace: &Workspace) -> Result<()> {
        let existing = self.shared.store.list_tasks(workspace.id, None).await.context("checking for existing tasks")?;
        if !existing.is_empty() {
            return Ok(());
        }
        let task = create_initial_workspace_task(workspace);
        let key = task.idempotency_key.clone();
        let task = self.shared.store.create_task(task, key).await.context("creating bootstrap task")?;
        Self::enqueue_task(&self.shared, task).await
    }

    async fn enqueue_task(shared: &Shared, task: Task) -> Result<()> {
        let queued = shared.store.update_task_status(task.id, TaskStatus::Queued, None, TaskStatus::Pending).await;
        let task = match queued {
            Ok(t) => t,
            Err(StoreError::Conflict { .. }) => return Ok(()),
            Err(e) => return Err(e).context("marking task queued"),
        };
        shared
            .task_tx
            .try_send(task)
            .map_err(|e| anyhow::anyhow!("queue is at capacity: {e}"))
    }

    /// Every 10s: bootstrap workspaces with zero tasks, and push any
    /// `pending` tasks for workspaces that already have a live queue into
    /// the worker pool while capacity allows.
    async fn control_loop(shared: Arc<Shared>) {
        loop {
            if *shared.state.read().await == ExecutorState::Stopped {
                return;
            }
            if let Err(e) = Self::reconcile(&shared).await {
                tracing::warn!(error = %e, "executor reconciliation cycle failed");
            }
            sleep(Duration::from_secs(10)).await;
        }
    }

    async fn reconcile(shared: &Shared) -> Result<()> {
        let active = shared.store.list_active_workspaces().await.context("listing active workspaces")?;
        for workspace in &active {
            let tasks = shared.store.list_tasks(workspace.id, None).await.context("listing tasks")?;
            if tasks.is_empty() {
                let task = create_initial_workspace_task(workspace);
                let key = task.idempotency_key.clone();
                let task = shared.store.create_task(task, key).await.context("creating bootstrap task")?;
                Self::enqueue_task(shared, task).await.ok();
            }
        }

        let pending_workspaces =
            shared.store.list_workspaces_with_pending_tasks().await.context("listing workspaces with pending tasks")?;
        for workspace in pending_workspaces {
            let filter = crate::domain::ports::TaskFilter { status: Some(TaskStatus::Pending), ..Default::default() };
            let pending = shared.store.list_tasks(workspace.id, Some(filter)).await.context("listing pending tasks")?;
            for task in pending {
                if Self::enqueue_task(shared, task).await.is_err() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// One worker: polls the shared receiver with a short timeout so it
    /// periodically re-checks the pause/stop gate even while idle.
    async fn worker_loop(shared: Arc<Shared>, worker_id: usize) {
        loop {
            match *shared.state.read().await {
                ExecutorState::Stopped => return,
                ExecutorState::Paused => {
                    sleep(Duration::from_millis(200)).await;
                    continue;
                }
                ExecutorState::Running => {}
            }

            let next = {
                let mut rx = shared.task_rx.lock().await;
                timeout(Duration::from_millis(500), rx.recv()).await
            };
            let task = match next {
                Ok(Some(task)) => task,
                Ok(None) => return,
                Err(_) => continue,
            };

            shared.active_count.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(worker_id, task_id = %task.id, "worker picked up task");
            if let Err(e) = Self::run_task(&shared, task, worker_id).await {
                tracing::warn!(error = %e, worker_id, "worker failed to process task");
            }
            shared.active_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn run_task(shared: &Shared, task: Task, worker_id: usize) -> Result<()> {
        let _ = worker_id;
        let workspace_id = task.workspace_id;

        let agents = shared.store.list_agents(workspace_id).await.context("listing agents for assignment")?;
        let Some(agent) = agents.into_iter().find(Agent::is_assignable) else {
            shared
                .telemetry
                .alert(
                    Some(workspace_id),
                    AlertType::CorrectiveTaskNoAgent,
                    AlertSeverity::Warning,
                    &format!("no assignable agent for task {}", task.id),
                    "executor",
                )
                .await;
            shared.store.update_task_status(task.id, TaskStatus::Pending, None, TaskStatus::Queued).await.ok();
            return Ok(());
        };

        let claimed = shared.store.update_task_status(task.id, TaskStatus::InProgress, None, TaskStatus::Queued).await;
        let mut claimed_task = match claimed {
            Ok(t) => t,
            Err(StoreError::Conflict { .. }) => return Ok(()),
            Err(e) => return Err(e).context("claiming task for execution"),
        };
        claimed_task.assign_agent(agent.id, agent.role.clone());
        shared.store.update_agent_status(agent.id, AgentStatus::Active).await.ok();

        let process = shared
            .thinking_recorder
            .start(workspace_id, format!("executing task '{}'", claimed_task.name))
            .await
            .context("starting thinking process")?;
        shared
            .thinking_recorder
            .append(
                process.process_id,
                crate::domain::models::ThinkingStepType::Analysis,
                format!("assigned to {} ({})", agent.role, agent.seniority.as_str()),
                0.7,
                None,
            )
            .await
            .ok();

        let deadline = shared.clock.now() + chrono::Duration::seconds(estimate_deadline_seconds(&claimed_task));
        let start = shared.clock.now();
        let outcome = shared.agent_runtime.execute(&claimed_task, &agent, deadline).await;
        let elapsed = (shared.clock.now() - start).num_milliseconds().max(0) as f64 / 1000.0;

        match outcome {
            Ok(output) => Self::handle_success(shared, claimed_task, agent, process.process_id, output, elapsed).await,
            Err(error) => Self::handle_failure(shared, claimed_task, agent, process.process_id, error, elapsed).await,
        }
    }

    async fn handle_success(
        shared: &Shared,
        task: Task,
        agent: Agent,
        process_id: Uuid,
        output: crate::domain::ports::agent_runtime::AgentRuntimeOutput,
        elapsed: f64,
    ) -> Result<()> {
        let cost = shared.cost_table.estimate_cost(&output.usage.model, output.usage.input_tokens, output.usage.output_tokens);
        {
            let mut budgets = shared.budgets.lock().await;
            budgets.entry(agent.id).or_insert_with(BudgetLedger::new).record(
                task.id,
                output.usage.model.clone(),
                output.usage.input_tokens,
                output.usage.output_tokens,
                cost,
            );
        }

        let result = TaskResult {
            output: output.output.clone(),
            structured_payload: output.structured_payload.clone(),
            status_detail: "completed".to_string(),
            execution_time_seconds: elapsed,
            model_used: Some(output.usage.model.clone()),
            tokens_used: TokensUsed {
                input: output.usage.input_tokens,
                output: output.usage.output_tokens,
                estimated: output.usage.estimated,
            },
            cost_estimated: cost,
            agent_metadata: output.agent_metadata.clone(),
            error: None,
        };

        let completed = shared
            .store
            .update_task_status(task.id, TaskStatus::Completed, Some(result), TaskStatus::InProgress)
            .await
            .context("marking task completed")?;
        shared.store.update_agent_status(agent.id, AgentStatus::Available).await.ok();

        shared
            .thinking_recorder
            .append(
                process_id,
                crate::domain::models::ThinkingStepType::Evaluation,
                format!("agent {} returned output after {elapsed:.1}s", agent.id),
                0.8,
                None,
            )
            .await
            .ok();
        shared
            .thinking_recorder
            .complete(process_id, format!("task '{}' completed", completed.name), 0.85)
            .await
            .ok();

        if let (Some(goal_id), Some(requirement_id)) = (completed.goal_id, completed.asset_requirement_id) {
            if let Ok(requirements) = shared.store.get_asset_requirements(goal_id).await {
                if let Some(requirement) = requirements.into_iter().find(|r| r.id == requirement_id) {
                    shared.deliverable_engine.structure_output(&completed, &requirement).await.ok();
                }
            }
            if let Ok(goal) = shared.store.get_goal(goal_id).await {
                shared.deliverable_engine.aggregate(&goal).await.ok();
            }
        }

        if let Some(generated) = output.agent_metadata.get("generated_tasks").and_then(serde_json::Value::as_array) {
            for draft in generated {
                let name = draft.get("name").and_then(serde_json::Value::as_str).unwrap_or("Follow-up task");
                let description = draft.get("description").and_then(serde_json::Value::as_str).unwrap_or_default();
                let mut follow_up = Task::new(completed.workspace_id, name, description)
                    .with_ai_generated(serde_json::json!({ "parent_task": completed.id }));
                if let Some(goal_id) = completed.goal_id {
                    follow_up = follow_up.with_goal(goal_id);
                }
                if let Ok(created) = shared.store.create_task(follow_up, None).await {
                    shared
                        .telemetry
                        .broadcast(
                            "auto_task_generated",
                            serde_json::json!({ "task_id": created.id, "parent_task_id": completed.id }),
                        )
                        .await;
                }
            }
        }

        shared.completed_total.fetch_add(1, Ordering::SeqCst);
        Self::record_activity(
            shared,
            "task_completed",
            completed.id,
            Some(agent.id),
            completed.workspace_id,
            format!("completed in {elapsed:.1}s"),
        )
        .await;
        Ok(())
    }

    /// Blends the host's 1-minute load average (normalized by logical CPU
    /// count) with worker-pool saturation, giving the Recovery Analyser a
    /// `system_load` that reflects both the wider machine and this
    /// process's own backlog. Either signal alone can read near-zero —
    /// a quiet host with a full queue, or a busy host with idle workers.
    fn system_load(shared: &Shared) -> f64 {
        let host_load = sysinfo::System::load_average().one / shared.cpu_count as f64;
        let pool_load = shared.active_count.load(Ordering::SeqCst) as f64 / shared.max_concurrent_tasks as f64;
        host_load.max(pool_load).min(4.0)
    }

    async fn handle_failure(
        shared: &Shared,
        task: Task,
        agent: Agent,
        process_id: Uuid,
        error: AgentRuntimeError,
        elapsed: f64,
    ) -> Result<()> {
        shared.store.update_agent_status(agent.id, AgentStatus::Available).await.ok();

        let workspace_health_score = match shared.store.get_workspace(task.workspace_id).await {
            Ok(w) if w.status == WorkspaceStatus::NeedsIntervention => 50.0,
            Ok(_) => 90.0,
            Err(_) => 70.0,
        };

        let ctx = RecoveryContext {
            task_id: task.id,
            workspace_id: task.workspace_id,
            agent_id: Some(agent.id),
            error_message: error.to_string(),
            error_type: error.error_type().to_string(),
            previous_attempts: task.recovery_count,
            workspace_health_score,
            system_load: Self::system_load(shared),
            last_success_time: None,
        };
        let decision = shared.recovery_analyser.analyse(&ctx).await.context("analysing task failure")?;

        let result = TaskResult {
            output: None,
            structured_payload: None,
            status_detail: decision.decision.clone(),
            execution_time_seconds: elapsed,
            model_used: None,
            tokens_used: TokensUsed::default(),
            cost_estimated: 0.0,
            agent_metadata: serde_json::Value::Null,
            error: Some(error.to_string()),
        };

        match decision.decision.as_str() {
            "retry" if task.can_recover(shared.max_recovery_attempts) => {
                shared.store.increment_task_recovery_count(task.id).await.ok();
                shared
                    .store
                    .update_task_status(task.id, TaskStatus::Failed, Some(result), TaskStatus::InProgress)
                    .await
                    .context("recording failed attempt before retry")?;
                if decision.delay_seconds > 0 {
                    sleep(Duration::from_secs(decision.delay_seconds)).await;
                }
                shared
                    .store
                    .update_task_status(task.id, TaskStatus::Pending, None, TaskStatus::Failed)
                    .await
                    .context("returning task to pending for retry")?;
                shared
                    .thinking_recorder
                    .complete(process_id, format!("retrying: {}", decision.reasoning), decision.confidence)
                    .await
                    .ok();
            }
            "circuit_break" => {
                shared
                    .store
                    .update_task_status(task.id, TaskStatus::Failed, Some(result), TaskStatus::InProgress)
                    .await
                    .context("marking task failed (circuit breaker)")?;
                shared
                    .telemetry
                    .alert(
                        Some(task.workspace_id),
                        AlertType::HealthCheckError,
                        AlertSeverity::Critical,
                        &format!("circuit breaker tripped for task {}: {}", task.id, decision.reasoning),
                        "executor",
                    )
                    .await;
                shared.thinking_recorder.complete(process_id, "circuit breaker tripped".to_string(), decision.confidence).await.ok();
            }
            "escalate" => {
                shared
                    .store
                    .update_task_status(task.id, TaskStatus::Failed, Some(result), TaskStatus::InProgress)
                    .await
                    .context("marking task failed (escalated)")?;
                shared
                    .telemetry
                    .alert(
                        Some(task.workspace_id),
                        AlertType::HealthCheckError,
                        AlertSeverity::Warning,
                        &format!("task {} escalated: {}", task.id, decision.reasoning),
                        "executor",
                    )
                    .await;
                shared
                    .thinking_recorder
                    .complete(process_id, "escalated for human review".to_string(), decision.confidence)
                    .await
                    .ok();
            }
            _ => {
                shared
                    .store
                    .update_task_status(task.id, TaskStatus::Failed, Some(result), TaskStatus::InProgress)
                    .await
                    .context("marking task failed (no further recovery)")?;
                shared
                    .thinking_recorder
                    .complete(process_id, "abandoned after exhausting recovery".to_string(), decision.confidence)
                    .await
                    .ok();
            }
        }

        shared.failed_total.fetch_add(1, Ordering::SeqCst);
        Self::record_activity(
            shared,
            "task_failed",
            task.id,
            Some(agent.id),
            task.workspace_id,
            decision.decision.clone(),
        )
        .await;
        Ok(())
    }

    async fn record_activity(
        shared: &Shared,
        event: &str,
        task_id: Uuid,
        agent_id: Option<Uuid>,
        workspace_id: Uuid,
        summary: String,
    ) {
        let mut log = shared.recent_activity.lock().await;
        if log.len() >= shared.activity_capacity {
            log.pop_front();
        }
        log.push_back(ActivityEntry {
            timestamp: shared.clock.now(),
            event: event.to_string(),
            task_id,
            agent_id,
            workspace_id,
            summary,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{InMemoryStore, RecordingTelemetry};
    use crate::adapters::substrates::mock::{MockAgentRuntime, MockResponse};
    use crate::domain::models::{Agent, Seniority, Workspace, WorkspaceStatus};
    use crate::domain::ports::SystemClock;

    struct Harness {
        executor: Executor,
        store: Arc<InMemoryStore>,
    }

    async fn harness(response: MockResponse) -> Harness {
        harness_with_backoff(response, 0).await
    }

    /// Like `harness`, but lets a test control the Recovery Analyser's base
    /// backoff so retry-gating tests don't have to wait on real-world delays.
    async fn harness_with_backoff(response: MockResponse, base_backoff_seconds: u64) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let clock = Arc::new(SystemClock);
        let runtime = Arc::new(MockAgentRuntime::with_default_response(response));
        let deliverable_engine = Arc::new(DeliverableEngine::new(store.clone()));
        let recovery_analyser =
            Arc::new(RecoveryAnalyser::new(store.clone()).with_base_backoff_seconds(base_backoff_seconds));
        let thinking_recorder = Arc::new(ThinkingRecorder::new(store.clone(), telemetry.clone(), clock.clone()));
        let executor = Executor::new(store.clone(), runtime, telemetry, clock, deliverable_engine, recovery_analyser, thinking_recorder, 2);
        Harness { executor, store }
    }

    async fn seeded_workspace_and_agent(store: &InMemoryStore) -> (Workspace, Agent) {
        let mut workspace = Workspace::new("w", "ship the launch deck");
        workspace.transition_to(WorkspaceStatus::Active).unwrap();
        let workspace = store.create_workspace(workspace).await.unwrap();
        let agent = store.create_agent(Agent::new(workspace.id, "writer", Seniority::Senior, "gpt-4o-mini")).await.unwrap();
        (workspace, agent)
    }

    #[tokio::test]
    async fn enqueued_task_is_executed_and_completes() {
        let harness = harness(MockResponse::success("done")).await;
        let (workspace, _agent) = seeded_workspace_and_agent(&harness.store).await;
        let task = Task::new(workspace.id, "write copy", "draft the launch copy");
        let task = harness.store.create_task(task, None).await.unwrap();

        harness.executor.start().await.unwrap();
        harness.executor.enqueue(task.clone()).await.unwrap();

        let mut completed = false;
        for _ in 0..50 {
            sleep(Duration::from_millis(50)).await;
            if harness.store.get_task(task.id).await.unwrap().status == TaskStatus::Completed {
                completed = true;
                break;
            }
        }
        harness.executor.stop().await.unwrap();
        assert!(completed, "task should have completed within the poll window");
        assert_eq!(harness.executor.stats().await.completed_total, 1);
    }

    #[tokio::test]
    async fn paused_executor_does_not_dispatch_queued_work() {
        let harness = harness(MockResponse::success("done")).await;
        let (workspace, _agent) = seeded_workspace_and_agent(&harness.store).await;
        let task = Task::new(workspace.id, "write copy", "draft the launch copy");
        let task = harness.store.create_task(task, None).await.unwrap();

        harness.executor.start().await.unwrap();
        harness.executor.pause().await;
        harness.executor.enqueue(task.clone()).await.unwrap();
        sleep(Duration::from_millis(300)).await;
        assert_eq!(harness.store.get_task(task.id).await.unwrap().status, TaskStatus::Queued);

        harness.executor.resume().await;
        let mut completed = false;
        for _ in 0..50 {
            sleep(Duration::from_millis(50)).await;
            if harness.store.get_task(task.id).await.unwrap().status == TaskStatus::Completed {
                completed = true;
                break;
            }
        }
        harness.executor.stop().await.unwrap();
        assert!(completed, "resumed executor should eventually dispatch the queued task");
    }

    #[tokio::test]
    async fn transient_failure_returns_task_to_pending_for_retry() {
        let harness = harness(MockResponse::failure(AgentRuntimeError::Timeout(30))).await;
        let (workspace, _agent) = seeded_workspace_and_agent(&harness.store).await;
        let task = Task::new(workspace.id, "write copy", "draft the launch copy");
        let task = harness.store.create_task(task, None).await.unwrap();

        harness.executor.start().await.unwrap();
        harness.executor.enqueue(task.clone()).await.unwrap();

        let mut retried = false;
        for _ in 0..50 {
            sleep(Duration::from_millis(50)).await;
            let current = harness.store.get_task(task.id).await.unwrap();
            if current.status == TaskStatus::Pending && current.recovery_count == 1 {
                retried = true;
                break;
            }
        }
        harness.executor.stop().await.unwrap();
        assert!(retried, "a timeout should be retried, returning the task to pending");
    }

    #[tokio::test]
    async fn retry_is_gated_by_the_computed_backoff_delay() {
        let harness = harness_with_backoff(MockResponse::failure(AgentRuntimeError::Timeout(30)), 1).await;
        let (workspace, _agent) = seeded_workspace_and_agent(&harness.store).await;
        let task = Task::new(workspace.id, "write copy", "draft the launch copy");
        let task = harness.store.create_task(task, None).await.unwrap();

        harness.executor.start().await.unwrap();
        harness.executor.enqueue(task.clone()).await.unwrap();

        sleep(Duration::from_millis(300)).await;
        let during_delay = harness.store.get_task(task.id).await.unwrap().status;

        let mut retried = false;
        for _ in 0..50 {
            sleep(Duration::from_millis(100)).await;
            let current = harness.store.get_task(task.id).await.unwrap();
            if current.status == TaskStatus::Pending && current.recovery_count == 1 {
                retried = true;
                break;
            }
        }
        harness.executor.stop().await.unwrap();
        assert_eq!(during_delay, TaskStatus::Failed, "task should still be held failed while the backoff elapses");
        assert!(retried, "task should return to pending once the backoff delay elapses");
    }
}
