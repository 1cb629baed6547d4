//! Goal Monitor (C10) — the fixed-interval reconciliation loop that keeps
//! every workspace's goals validated, correcting and re-planning as it goes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as TokioMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::application::deliverable_engine::DeliverableEngine;
use crate::application::executor::Executor;
use crate::application::goal_validator::{GoalValidator, Severity, ValidationResult};
use crate::application::health_manager::HealthManager;
use crate::application::task_planner::TaskPlanner;
use crate::domain::models::{GoalStatus, RequirementStatus, Task, TaskStatus};
use crate::domain::ports::{AlertSeverity, AlertType, Clock, Store, Telemetry, TaskFilter};

/// Outcome of one reconciliation cycle, surfaced for logging/metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalMonitorCycleReport {
    pub goals_validated: usize,
    pub corrective_tasks: usize,
    pub tasks_enqueued: usize,
}

struct CacheEntry {
    task_count: usize,
    completed_count: usize,
    latest_update: DateTime<Utc>,
    checked_at: DateTime<Utc>,
}

fn fingerprint(tasks: &[Task]) -> (usize, usize, DateTime<Utc>) {
    let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
    let latest = tasks.iter().map(|t| t.updated_at).max().unwrap_or_else(Utc::now);
    (tasks.len(), completed, latest)
}

pub struct GoalMonitor {
    store: Arc<dyn Store>,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
    health_manager: Arc<HealthManager>,
    goal_validator: Arc<GoalValidator>,
    task_planner: Arc<TaskPlanner>,
    deliverable_engine: Arc<DeliverableEngine>,
    executor: Arc<Executor>,
    interval_minutes: i64,
    cache: TokioMutex<HashMap<Uuid, CacheEntry>>,
    cache_max_entries: usize,
    cache_ttl_seconds: i64,
    running: AtomicBool,
    priority_recheck: AtomicBool,
    cycles_run: AtomicUsize,
    stop_notify: Notify,
}

impl GoalMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        telemetry: Arc<dyn Telemetry>,
        clock: Arc<dyn Clock>,
        health_manager: Arc<HealthManager>,
        goal_validator: Arc<GoalValidator>,
        task_planner: Arc<TaskPlanner>,
        deliverable_engine: Arc<DeliverableEngine>,
        executor: Arc<Executor>,
        interval_minutes: i64,
    ) -> Self {
        Self {
            store,
            telemetry,
            clock,
            health_manager,
            goal_validator,
            task_planner,
            deliverable_engine,
            executor,
            interval_minutes,
            cache: TokioMutex::new(HashMap::new()),
            cache_max_entries: 100,
            cache_ttl_seconds: 1800,
            running: AtomicBool::new(false),
            priority_recheck: AtomicBool::new(false),
            cycles_run: AtomicUsize::new(0),
            stop_notify: Notify::new(),
        }
    }

    pub fn with_cache_limits(mut self, max_entries: usize, ttl_seconds: i64) -> Self {
        self.cache_max_entries = max_entries;
        self.cache_ttl_seconds = ttl_seconds;
        self
    }

    pub fn cycles_run(&self) -> usize {
        self.cycles_run.load(Ordering::SeqCst)
    }

    /// Spawns the reconciliation loop. The returned handle belongs to the
    /// caller; `stop()` signals it to exit promptly rather than waiting out
    /// its current sleep.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while this.running.load(Ordering::SeqCst) {
                if let Err(e) = this.run_cycle().await {
                    tracing::warn!(error = %e, "goal monitor cycle failed");
                }
                this.cycles_run.fetch_add(1, Ordering::SeqCst);

                // A cycle that enqueued corrective or bootstrap work gets a
                // short priority recheck instead of waiting out the full
                // interval, per the monitor's re-validation contract.
                let sleep_for = if this.priority_recheck.swap(false, Ordering::SeqCst) {
                    Duration::from_secs(180)
                } else {
                    Duration::from_secs((this.interval_minutes.max(1) as u64) * 60)
                };
                tokio::select! {
                    () = sleep(sleep_for) => {}
                    () = this.stop_notify.notified() => break,
                }
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    /// Validates every active goal of one workspace immediately, bypassing
    /// the interval and the Validation Optimizer cache. Used for an explicit
    /// "validate now" request rather than the background loop.
    pub async fn validate_now(&self, workspace_id: Uuid) -> Result<Vec<ValidationResult>> {
        let workspace = self.store.get_workspace(workspace_id).await.context("loading workspace")?;
        self.goal_validator.seed_goals(&workspace).await.context("seeding goals from workspace text")?;

        let goals = self
            .store
            .list_workspace_goals(workspace_id, Some(GoalStatus::Active))
            .await
            .context("listing workspace goals")?;

        let mut results = Vec::with_capacity(goals.len());
        for goal in goals {
            let filter = TaskFilter { goal_id: Some(goal.id), ..Default::default() };
            let tasks = self.store.list_tasks(workspace_id, Some(filter)).await.context("listing goal tasks")?;
            let result = self.goal_validator.validate_goal(&goal, &tasks);
            if result.severity >= Severity::High {
                self.goal_validator.apply_corrective_action(&goal, &result).await.context("applying corrective action")?;
            }
            self.store.record_goal_validation(goal.id).await.context("recording goal validation")?;
            results.push(result);
        }
        Ok(results)
    }

    /// The 9-step per-cycle reconciliation: health scan, staleness batch,
    /// availability gate, validation-optimizer cache, validate + zero-progress
    /// replan, corrective routing, bulk validation-timestamp write, unmet
    /// requirement follow-up, and immediate enqueue of whatever got planned.
    pub async fn run_cycle(&self) -> Result<GoalMonitorCycleReport> {
        let health_reports = self.health_manager.scan().await.context("running health scan")?;
        let unhealthy: std::collections::HashSet<Uuid> =
            health_reports.iter().filter(|r| r.excluded).map(|r| r.workspace_id).collect();

        let active_goals = self.store.list_active_goals().await.context("listing active goals")?;
        let due: Vec<_> = active_goals.into_iter().filter(|g| g.needs_validation(self.interval_minutes)).collect();

        let mut report = GoalMonitorCycleReport::default();

        for goal in due {
            if unhealthy.contains(&goal.workspace_id) {
                continue;
            }

            let agents = self.store.list_agents(goal.workspace_id).await.context("listing agents")?;
            if !agents.iter().any(crate::domain::models::Agent::is_assignable) {
                self.telemetry
                    .alert(
                        Some(goal.workspace_id),
                        AlertType::NoAvailableAgents,
                        AlertSeverity::Warning,
                        &format!("goal {} has no available agent this cycle", goal.id),
                        "goal_monitor",
                    )
                    .await;
                continue;
            }

            let filter = TaskFilter { goal_id: Some(goal.id), ..Default::default() };
            let tasks = self.store.list_tasks(goal.workspace_id, Some(filter)).await.context("listing goal tasks")?;

            if !self.should_validate(goal.id, &tasks).await {
                continue;
            }

            let result = self.goal_validator.validate_goal(&goal, &tasks);
            report.goals_validated += 1;

            if result.actual <= 0.0 {
                let planned = self.task_planner.plan_initial(&goal).await.context("planning initial tasks")?;
                report.tasks_enqueued += self.enqueue_all(planned).await;
            }

            if result.severity >= Severity::High {
                self.goal_validator.apply_corrective_action(&goal, &result).await.context("applying corrective action")?;
                report.corrective_tasks += 1;
            }

            self.store.record_goal_validation(goal.id).await.context("recording goal validation")?;

            let requirements = self.deliverable_engine.ensure_requirements(&goal).await.context("ensuring asset requirements")?;
            let all_unfulfilled = requirements.iter().all(|r| r.status != RequirementStatus::Fulfilled);
            if all_unfulfilled && tasks.is_empty() {
                let planned = self.task_planner.plan_initial(&goal).await.context("planning for unmet requirements")?;
                report.tasks_enqueued += self.enqueue_all(planned).await;
            }
        }

        if report.tasks_enqueued > 0 {
            self.priority_recheck.store(true, Ordering::SeqCst);
        }
        Ok(report)
    }

    async fn enqueue_all(&self, tasks: Vec<Task>) -> usize {
        let mut enqueued = 0;
        for task in tasks {
            if self.executor.enqueue(task).await.is_ok() {
                enqueued += 1;
            }
        }
        enqueued
    }

    /// The Validation Optimizer gate: skips a goal whose task set hasn't
    /// moved since the last check and is still within the cache TTL,
    /// avoiding redundant validation work on an idle goal every cycle.
    async fn should_validate(&self, goal_id: Uuid, tasks: &[Task]) -> bool {
        let (count, completed, latest_update) = fingerprint(tasks);
        let now = self.clock.now();
        let mut cache = self.cache.lock().await;

        if let Some(entry) = cache.get(&goal_id) {
            let fresh = (now - entry.checked_at).num_seconds() < self.cache_ttl_seconds;
            let unchanged =
                entry.task_count == count && entry.completed_count == completed && entry.latest_update == latest_update;
            if fresh && unchanged {
                return false;
            }
        }

        if cache.len() >= self.cache_max_entries && !cache.contains_key(&goal_id) {
            if let Some(oldest) = cache.iter().min_by_key(|(_, e)| e.checked_at).map(|(id, _)| *id) {
                cache.remove(&oldest);
            }
        }
        cache.insert(
            goal_id,
            CacheEntry { task_count: count, completed_count: completed, latest_update, checked_at: now },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{InMemoryStore, RecordingTelemetry};
    use crate::adapters::substrates::mock::{MockAgentRuntime, MockResponse};
    use crate::application::recovery_analyser::RecoveryAnalyser;
    use crate::application::thinking_recorder::ThinkingRecorder;
    use crate::domain::models::{Agent, Seniority, Workspace, WorkspaceStatus};
    use crate::domain::ports::SystemClock;

    async fn monitor() -> (Arc<GoalMonitor>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let clock = Arc::new(SystemClock);
        let health_manager = Arc::new(HealthManager::new(store.clone(), telemetry.clone()));
        let deliverable_engine = Arc::new(DeliverableEngine::new(store.clone()));
        let task_planner = Arc::new(TaskPlanner::new(store.clone(), deliverable_engine.clone()));
        let goal_validator = Arc::new(GoalValidator::new(store.clone(), telemetry.clone(), task_planner.clone()));
        let recovery_analyser = Arc::new(RecoveryAnalyser::new(store.clone()));
        let thinking_recorder = Arc::new(ThinkingRecorder::new(store.clone(), telemetry.clone(), clock.clone()));
        let runtime = Arc::new(MockAgentRuntime::with_default_response(MockResponse::success("done")));
        let executor = Arc::new(Executor::new(
            store.clone(),
            runtime,
            telemetry.clone(),
            clock.clone(),
            deliverable_engine.clone(),
            recovery_analyser,
            thinking_recorder,
            2,
        ));

        let monitor = Arc::new(GoalMonitor::new(
            store.clone(),
            telemetry,
            clock,
            health_manager,
            goal_validator,
            task_planner,
            deliverable_engine,
            executor,
            20,
        ));
        (monitor, store)
    }

    #[tokio::test]
    async fn zero_progress_goal_gets_replanned_and_enqueued() {
        let (monitor, store) = monitor().await;
        let mut workspace = Workspace::new("w", "acquire at least 500 contacts");
        workspace.transition_to(WorkspaceStatus::Active).unwrap();
        let workspace = store.create_workspace(workspace).await.unwrap();
        store.create_agent(Agent::new(workspace.id, "writer", Seniority::Senior, "gpt-4o-mini")).await.unwrap();

        monitor.validate_now(workspace.id).await.unwrap();
        let report = monitor.run_cycle().await.unwrap();

        assert!(report.goals_validated > 0);
        assert!(report.tasks_enqueued > 0);
    }

    #[tokio::test]
    async fn unhealthy_workspace_is_skipped_this_cycle() {
        let (monitor, store) = monitor().await;
        let mut workspace = Workspace::new("w", "acquire at least 500 contacts");
        workspace.transition_to(WorkspaceStatus::Active).unwrap();
        let workspace = store.create_workspace(workspace).await.unwrap();
        // No agents at all -> HealthManager excludes this workspace.

        monitor.validate_now(workspace.id).await.unwrap();
        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.goals_validated, 0);
    }

    #[tokio::test]
    async fn freshly_validated_goal_is_not_revalidated_next_cycle() {
        let (monitor, store) = monitor().await;
        let mut workspace = Workspace::new("w", "acquire at least 500 contacts");
        workspace.transition_to(WorkspaceStatus::Active).unwrap();
        let workspace = store.create_workspace(workspace).await.unwrap();
        store.create_agent(Agent::new(workspace.id, "writer", Seniority::Senior, "gpt-4o-mini")).await.unwrap();
        monitor.validate_now(workspace.id).await.unwrap();

        let first = monitor.run_cycle().await.unwrap();
        assert!(first.goals_validated > 0, "a freshly seeded goal is due on its first cycle");

        let second = monitor.run_cycle().await.unwrap();
        assert_eq!(second.goals_validated, 0, "a just-validated goal is not due again within the interval");
    }
}
