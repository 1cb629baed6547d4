//! Store port — the single source of durable truth for every entity.
//!
//! Purely passive: the store emits nothing and never calls back into the
//! application layer. All writes are atomic per row; multi-row operations
//! need not be cross-row transactional but must be idempotent under retry
//! via a caller-supplied idempotency key.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::models::{
    Agent, AgentStatus, Artifact, AssetRequirement, Deliverable, Goal, GoalStatus, Insight,
    RecoveryAttempt, Task, TaskResult, TaskStatus, ThinkingProcess, Workspace, WorkspaceStatus,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Optional status filter used by `list_tasks`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub goal_id: Option<Uuid>,
    pub is_corrective: Option<bool>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_workspace(&self, id: Uuid) -> StoreResult<Workspace>;
    async fn list_active_workspaces(&self) -> StoreResult<Vec<Workspace>>;
    async fn list_workspaces_with_pending_tasks(&self) -> StoreResult<Vec<Workspace>>;
    async fn create_workspace(&self, workspace: Workspace) -> StoreResult<Workspace>;
    /// CAS on `Workspace.status`: fails with `Conflict` if the stored status
    /// does not match `expected_status`.
    async fn update_workspace_status(
        &self,
        id: Uuid,
        new_status: WorkspaceStatus,
        expected_status: WorkspaceStatus,
    ) -> StoreResult<Workspace>;

    async fn list_agents(&self, workspace_id: Uuid) -> StoreResult<Vec<Agent>>;
    async fn get_agent(&self, id: Uuid) -> StoreResult<Agent>;
    async fn create_agent(&self, agent: Agent) -> StoreResult<Agent>;
    async fn update_agent_status(&self, id: Uuid, new_status: AgentStatus) -> StoreResult<Agent>;

    /// Batch fetch across workspaces, used by the Goal Monitor to avoid N+1
    /// queries per reconciliation cycle.
    async fn list_active_goals(&self) -> StoreResult<Vec<Goal>>;
    async fn list_workspace_goals(&self, workspace_id: Uuid, status: Option<GoalStatus>) -> StoreResult<Vec<Goal>>;
    async fn get_goal(&self, id: Uuid) -> StoreResult<Goal>;
    async fn create_goal(&self, goal: Goal) -> StoreResult<Goal>;
    /// CAS on `Goal.current_value`.
    async fn update_goal(
        &self,
        id: Uuid,
        new_current_value: f64,
        new_status: GoalStatus,
        expected_current_value: f64,
    ) -> StoreResult<Goal>;
    async fn record_goal_validation(&self, id: Uuid) -> StoreResult<Goal>;
    /// Goals whose `workspace_id` no longer resolves to a workspace row —
    /// the Health Manager's orphaned-goal cleanup target.
    async fn list_orphaned_goals(&self) -> StoreResult<Vec<Goal>>;
    async fn delete_goal(&self, id: Uuid) -> StoreResult<()>;

    async fn get_asset_requirements(&self, goal_id: Uuid) -> StoreResult<Vec<AssetRequirement>>;
    async fn create_asset_requirement(&self, requirement: AssetRequirement) -> StoreResult<AssetRequirement>;
    async fn update_asset_requirement_status(
        &self,
        id: Uuid,
        status: crate::domain::models::RequirementStatus,
    ) -> StoreResult<AssetRequirement>;

    async fn list_tasks(&self, workspace_id: Uuid, filter: Option<TaskFilter>) -> StoreResult<Vec<Task>>;
    async fn get_task(&self, id: Uuid) -> StoreResult<Task>;
    /// Idempotent under retry: a second call with the same `idempotency_key`
    /// returns the already-created row instead of inserting a duplicate.
    async fn create_task(&self, task: Task, idempotency_key: Option<String>) -> StoreResult<Task>;
    /// CAS on `Task.status`.
    async fn update_task_status(
        &self,
        id: Uuid,
        new_status: TaskStatus,
        result: Option<TaskResult>,
        expected_status: TaskStatus,
    ) -> StoreResult<Task>;
    async fn increment_task_recovery_count(&self, id: Uuid) -> StoreResult<Task>;
    async fn find_active_corrective_task(&self, goal_id: Uuid) -> StoreResult<Option<Task>>;

    async fn insert_artifact(&self, artifact: Artifact) -> StoreResult<Artifact>;
    async fn list_artifacts(&self, requirement_id: Uuid) -> StoreResult<Vec<Artifact>>;

    async fn insert_deliverable(&self, deliverable: Deliverable) -> StoreResult<Deliverable>;
    async fn get_deliverable(&self, goal_id: Uuid) -> StoreResult<Option<Deliverable>>;

    async fn start_thinking_process(&self, process: ThinkingProcess) -> StoreResult<ThinkingProcess>;
    async fn update_thinking_process(&self, process: ThinkingProcess) -> StoreResult<ThinkingProcess>;
    async fn get_thinking_process(&self, process_id: Uuid) -> StoreResult<ThinkingProcess>;
    async fn list_thinking_processes(&self, workspace_id: Uuid, limit: u32) -> StoreResult<Vec<ThinkingProcess>>;

    async fn insert_recovery_attempt(&self, attempt: RecoveryAttempt) -> StoreResult<RecoveryAttempt>;
    async fn list_recovery_attempts(&self, task_id: Uuid) -> StoreResult<Vec<RecoveryAttempt>>;

    async fn insert_insight(&self, insight: Insight) -> StoreResult<Insight>;
    async fn get_insights(&self, workspace_id: Uuid, tags: Option<Vec<String>>, limit: u32) -> StoreResult<Vec<Insight>>;

    /// Opaque structured event; concrete shape lives in `adapters::telemetry`.
    async fn log_event(&self, workspace_id: Uuid, event_type: &str, payload: serde_json::Value) -> StoreResult<()>;
}
