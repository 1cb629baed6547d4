//! In-memory `Store` and `Telemetry` fakes for wiring components in tests
//! without a real database or LLM, per the ambient test-tooling stack.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::models::*;
use crate::domain::ports::{AlertSeverity, AlertType, Store, StoreResult, TaskFilter, Telemetry};

#[derive(Default)]
struct Tables {
    workspaces: HashMap<Uuid, Workspace>,
    agents: HashMap<Uuid, Agent>,
    goals: HashMap<Uuid, Goal>,
    requirements: HashMap<Uuid, AssetRequirement>,
    tasks: HashMap<Uuid, Task>,
    artifacts: HashMap<Uuid, Artifact>,
    deliverables: HashMap<Uuid, Deliverable>,
    thinking: HashMap<Uuid, ThinkingProcess>,
    recovery: Vec<RecoveryAttempt>,
    insights: HashMap<Uuid, Insight>,
    idempotency: HashMap<String, Uuid>,
    events: Vec<(Uuid, String, serde_json::Value)>,
}

/// A single-process, non-durable `Store` over a mutex-guarded table set.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { tables: Mutex::new(Tables::default()) }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_workspace(&self, id: Uuid) -> StoreResult<Workspace> {
        self.tables.lock().unwrap().workspaces.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn list_active_workspaces(&self) -> StoreResult<Vec<Workspace>> {
        Ok(self.tables.lock().unwrap().workspaces.values().filter(|w| !w.status.is_terminal()).cloned().collect())
    }

    async fn list_workspaces_with_pending_tasks(&self) -> StoreResult<Vec<Workspace>> {
        let tables = self.tables.lock().unwrap();
        let pending_workspace_ids: std::collections::HashSet<Uuid> = tables
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.workspace_id)
            .collect();
        Ok(tables.workspaces.values().filter(|w| pending_workspace_ids.contains(&w.id)).cloned().collect())
    }

    async fn create_workspace(&self, workspace: Workspace) -> StoreResult<Workspace> {
        self.tables.lock().unwrap().workspaces.insert(workspace.id, workspace.clone());
        Ok(workspace)
    }

    async fn update_workspace_status(
        &self,
        id: Uuid,
        new_status: WorkspaceStatus,
        expected_status: WorkspaceStatus,
    ) -> StoreResult<Workspace> {
        let mut tables = self.tables.lock().unwrap();
        let workspace = tables.workspaces.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if workspace.status != expected_status {
            return Err(StoreError::Conflict {
                expected: expected_status.as_str().to_string(),
                actual: workspace.status.as_str().to_string(),
            });
        }
        workspace.transition_to(new_status).map_err(StoreError::Invalid)?;
        Ok(workspace.clone())
    }

    async fn list_agents(&self, workspace_id: Uuid) -> StoreResult<Vec<Agent>> {
        Ok(self.tables.lock().unwrap().agents.values().filter(|a| a.workspace_id == workspace_id).cloned().collect())
    }

    async fn get_agent(&self, id: Uuid) -> StoreResult<Agent> {
        self.tables.lock().unwrap().agents.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn create_agent(&self, agent: Agent) -> StoreResult<Agent> {
        self.tables.lock().unwrap().agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn update_agent_status(&self, id: Uuid, new_status: AgentStatus) -> StoreResult<Agent> {
        let mut tables = self.tables.lock().unwrap();
        let agent = tables.agents.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        agent.status = new_status;
        Ok(agent.clone())
    }

    async fn list_active_goals(&self) -> StoreResult<Vec<Goal>> {
        Ok(self.tables.lock().unwrap().goals.values().filter(|g| g.status == GoalStatus::Active).cloned().collect())
    }

    async fn list_workspace_goals(&self, workspace_id: Uuid, status: Option<GoalStatus>) -> StoreResult<Vec<Goal>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .goals
            .values()
            .filter(|g| g.workspace_id == workspace_id && status.map_or(true, |s| g.status == s))
            .cloned()
            .collect())
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Goal> {
        self.tables.lock().unwrap().goals.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn create_goal(&self, goal: Goal) -> StoreResult<Goal> {
        self.tables.lock().unwrap().goals.insert(goal.id, goal.clone());
        Ok(goal)
    }

    async fn update_goal(
        &self,
        id: Uuid,
        new_current_value: f64,
        new_status: GoalStatus,
        expected_current_value: f64,
    ) -> StoreResult<Goal> {
        let mut tables = self.tables.lock().unwrap();
        let goal = tables.goals.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if (goal.current_value - expected_current_value).abs() > f64::EPSILON {
            return Err(StoreError::Conflict {
                expected: expected_current_value.to_string(),
                actual: goal.current_value.to_string(),
            });
        }
        goal.current_value = new_current_value;
        goal.status = new_status;
        Ok(goal.clone())
    }

    async fn record_goal_validation(&self, id: Uuid) -> StoreResult<Goal> {
        let mut tables = self.tables.lock().unwrap();
        let goal = tables.goals.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        goal.record_validation();
        Ok(goal.clone())
    }

    async fn list_orphaned_goals(&self) -> StoreResult<Vec<Goal>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.goals.values().filter(|g| !tables.workspaces.contains_key(&g.workspace_id)).cloned().collect())
    }

    async fn delete_goal(&self, id: Uuid) -> StoreResult<()> {
        self.tables.lock().unwrap().goals.remove(&id);
        Ok(())
    }

    async fn get_asset_requirements(&self, goal_id: Uuid) -> StoreResult<Vec<AssetRequirement>> {
        Ok(self.tables.lock().unwrap().requirements.values().filter(|r| r.goal_id == goal_id).cloned().collect())
    }

    async fn create_asset_requirement(&self, requirement: AssetRequirement) -> StoreResult<AssetRequirement> {
        self.tables.lock().unwrap().requirements.insert(requirement.id, requirement.clone());
        Ok(requirement)
    }

    async fn update_asset_requirement_status(&self, id: Uuid, status: RequirementStatus) -> StoreResult<AssetRequirement> {
        let mut tables = self.tables.lock().unwrap();
        let requirement = tables.requirements.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        requirement.status = status;
        Ok(requirement.clone())
    }

    async fn list_tasks(&self, workspace_id: Uuid, filter: Option<TaskFilter>) -> StoreResult<Vec<Task>> {
        let filter = filter.unwrap_or_default();
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| t.workspace_id == workspace_id)
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.goal_id.map_or(true, |g| t.goal_id == Some(g)))
            .filter(|t| filter.is_corrective.map_or(true, |c| t.is_corrective == c))
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Task> {
        self.tables.lock().unwrap().tasks.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn create_task(&self, task: Task, idempotency_key: Option<String>) -> StoreResult<Task> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(key) = &idempotency_key {
            if let Some(existing_id) = tables.idempotency.get(key) {
                return Ok(tables.tasks.get(existing_id).cloned().expect("idempotency index points at live row"));
            }
        }
        tables.tasks.insert(task.id, task.clone());
        if let Some(key) = idempotency_key {
            tables.idempotency.insert(key, task.id);
        }
        Ok(task)
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        new_status: TaskStatus,
        result: Option<TaskResult>,
        expected_status: TaskStatus,
    ) -> StoreResult<Task> {
        let mut tables = self.tables.lock().unwrap();
        let task = tables.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if task.status != expected_status {
            return Err(StoreError::Conflict {
                expected: expected_status.as_str().to_string(),
                actual: task.status.as_str().to_string(),
            });
        }
        task.status = new_status;
        if let Some(result) = result {
            task.result = Some(result);
        }
        Ok(task.clone())
    }

    async fn increment_task_recovery_count(&self, id: Uuid) -> StoreResult<Task> {
        let mut tables = self.tables.lock().unwrap();
        let task = tables.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        task.recovery_count += 1;
        Ok(task.clone())
    }

    async fn find_active_corrective_task(&self, goal_id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tasks
            .values()
            .find(|t| {
                t.goal_id == Some(goal_id)
                    && t.is_corrective
                    && !matches!(t.status, TaskStatus::Completed | TaskStatus::Failed)
            })
            .cloned())
    }

    async fn insert_artifact(&self, artifact: Artifact) -> StoreResult<Artifact> {
        self.tables.lock().unwrap().artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn list_artifacts(&self, requirement_id: Uuid) -> StoreResult<Vec<Artifact>> {
        Ok(self.tables.lock().unwrap().artifacts.values().filter(|a| a.requirement_id == requirement_id).cloned().collect())
    }

    async fn insert_deliverable(&self, deliverable: Deliverable) -> StoreResult<Deliverable> {
        let mut tables = self.tables.lock().unwrap();
        tables.deliverables.retain(|_, d| d.goal_id != deliverable.goal_id);
        tables.deliverables.insert(deliverable.id, deliverable.clone());
        Ok(deliverable)
    }

    async fn get_deliverable(&self, goal_id: Uuid) -> StoreResult<Option<Deliverable>> {
        Ok(self.tables.lock().unwrap().deliverables.values().find(|d| d.goal_id == goal_id).cloned())
    }

    async fn start_thinking_process(&self, process: ThinkingProcess) -> StoreResult<ThinkingProcess> {
        self.tables.lock().unwrap().thinking.insert(process.process_id, process.clone());
        Ok(process)
    }

    async fn update_thinking_process(&self, process: ThinkingProcess) -> StoreResult<ThinkingProcess> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.thinking.contains_key(&process.process_id) {
            return Err(StoreError::NotFound(process.process_id));
        }
        tables.thinking.insert(process.process_id, process.clone());
        Ok(process)
    }

    async fn get_thinking_process(&self, process_id: Uuid) -> StoreResult<ThinkingProcess> {
        self.tables.lock().unwrap().thinking.get(&process_id).cloned().ok_or(StoreError::NotFound(process_id))
    }

    async fn list_thinking_processes(&self, workspace_id: Uuid, limit: u32) -> StoreResult<Vec<ThinkingProcess>> {
        let mut processes: Vec<_> =
            self.tables.lock().unwrap().thinking.values().filter(|p| p.workspace_id == workspace_id).cloned().collect();
        processes.sort_by_key(|p| std::cmp::Reverse(p.started_at));
        processes.truncate(limit as usize);
        Ok(processes)
    }

    async fn insert_recovery_attempt(&self, attempt: RecoveryAttempt) -> StoreResult<RecoveryAttempt> {
        self.tables.lock().unwrap().recovery.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_recovery_attempts(&self, task_id: Uuid) -> StoreResult<Vec<RecoveryAttempt>> {
        Ok(self.tables.lock().unwrap().recovery.iter().filter(|r| r.task_id == task_id).cloned().collect())
    }

    async fn insert_insight(&self, insight: Insight) -> StoreResult<Insight> {
        self.tables.lock().unwrap().insights.insert(insight.id, insight.clone());
        Ok(insight)
    }

    async fn get_insights(&self, workspace_id: Uuid, tags: Option<Vec<String>>, limit: u32) -> StoreResult<Vec<Insight>> {
        let insights: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .insights
            .values()
            .filter(|i| i.workspace_id == workspace_id)
            .filter(|i| tags.as_ref().map_or(true, |tags| tags.iter().any(|t| i.has_tag(t))))
            .cloned()
            .collect();
        Ok(insights.into_iter().take(limit as usize).collect())
    }

    async fn log_event(&self, workspace_id: Uuid, event_type: &str, payload: serde_json::Value) -> StoreResult<()> {
        self.tables.lock().unwrap().events.push((workspace_id, event_type.to_string(), payload));
        Ok(())
    }
}

impl InMemoryStore {
    /// Test-only accessor for events recorded via `log_event`.
    pub fn logged_events(&self) -> Vec<(Uuid, String, serde_json::Value)> {
        self.tables.lock().unwrap().events.clone()
    }
}

/// A `Telemetry` fake that records every call for assertions instead of
/// logging or broadcasting anywhere.
#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<(String, serde_json::Value)>>,
    pub alerts: Mutex<Vec<(Option<Uuid>, AlertType, AlertSeverity, String)>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Telemetry for RecordingTelemetry {
    async fn broadcast(&self, event_type: &str, payload: serde_json::Value) {
        self.events.lock().unwrap().push((event_type.to_string(), payload));
    }

    async fn emit_metric(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}

    async fn alert(
        &self,
        workspace_id: Option<Uuid>,
        alert_type: AlertType,
        severity: AlertSeverity,
        description: &str,
        _component: &str,
    ) {
        self.alerts.lock().unwrap().push((workspace_id, alert_type, severity, description.to_string()));
    }
}
