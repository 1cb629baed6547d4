//! SQLite implementation of the `Store` port.
//!
//! Query logic is grouped by entity in sibling modules as free functions
//! over `&SqlitePool`; this module only owns the pool and wires the `Store`
//! trait to them, since a trait may only be implemented once per type.

mod agents;
mod artifacts;
mod asset_requirements;
mod goals;
mod insights;
mod recovery;
mod rows;
mod tasks;
mod thinking;
mod workspaces;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::models::{
    Agent, AgentStatus, Artifact, AssetRequirement, Deliverable, Goal, GoalStatus, Insight, RecoveryAttempt,
    RequirementStatus, Task, TaskResult, TaskStatus, ThinkingProcess, Workspace, WorkspaceStatus,
};
use crate::domain::ports::store::{Store, StoreResult, TaskFilter};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_workspace(&self, id: Uuid) -> StoreResult<Workspace> {
        workspaces::get_workspace(&self.pool, id).await
    }

    async fn list_active_workspaces(&self) -> StoreResult<Vec<Workspace>> {
        workspaces::list_active_workspaces(&self.pool).await
    }

    async fn list_workspaces_with_pending_tasks(&self) -> StoreResult<Vec<Workspace>> {
        workspaces::list_workspaces_with_pending_tasks(&self.pool).await
    }

    async fn create_workspace(&self, workspace: Workspace) -> StoreResult<Workspace> {
        workspaces::create_workspace(&self.pool, workspace).await
    }

    async fn update_workspace_status(
        &self,
        id: Uuid,
        new_status: WorkspaceStatus,
        expected_status: WorkspaceStatus,
    ) -> StoreResult<Workspace> {
        workspaces::update_workspace_status(&self.pool, id, new_status, expected_status).await
    }

    async fn list_agents(&self, workspace_id: Uuid) -> StoreResult<Vec<Agent>> {
        agents::list_agents(&self.pool, workspace_id).await
    }

    async fn get_agent(&self, id: Uuid) -> StoreResult<Agent> {
        agents::get_agent(&self.pool, id).await
    }

    async fn create_agent(&self, agent: Agent) -> StoreResult<Agent> {
        agents::create_agent(&self.pool, agent).await
    }

    async fn update_agent_status(&self, id: Uuid, new_status: AgentStatus) -> StoreResult<Agent> {
        agents::update_agent_status(&self.pool, id, new_status).await
    }

    async fn list_active_goals(&self) -> StoreResult<Vec<Goal>> {
        goals::list_active_goals(&self.pool).await
    }

    async fn list_workspace_goals(&self, workspace_id: Uuid, status: Option<GoalStatus>) -> StoreResult<Vec<Goal>> {
        goals::list_workspace_goals(&self.pool, workspace_id, status).await
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Goal> {
        goals::get_goal(&self.pool, id).await
    }

    async fn create_goal(&self, goal: Goal) -> StoreResult<Goal> {
        goals::create_goal(&self.pool, goal).await
    }

    async fn update_goal(
        &self,
        id: Uuid,
        new_current_value: f64,
        new_status: GoalStatus,
        expected_current_value: f64,
    ) -> StoreResult<Goal> {
        goals::update_goal(&self.pool, id, new_current_value, new_status, expected_current_value).await
    }

    async fn record_goal_validation(&self, id: Uuid) -> StoreResult<Goal> {
        goals::record_goal_validation(&self.pool, id).await
    }

    async fn list_orphaned_goals(&self) -> StoreResult<Vec<Goal>> {
        goals::list_orphaned_goals(&self.pool).await
    }

    async fn delete_goal(&self, id: Uuid) -> StoreResult<()> {
        goals::delete_goal(&self.pool, id).await
    }

    async fn get_asset_requirements(&self, goal_id: Uuid) -> StoreResult<Vec<AssetRequirement>> {
        asset_requirements::get_asset_requirements(&self.pool, goal_id).await
    }

    async fn create_asset_requirement(&self, requirement: AssetRequirement) -> StoreResult<AssetRequirement> {
        asset_requirements::create_asset_requirement(&self.pool, requirement).await
    }

    async fn update_asset_requirement_status(&self, id: Uuid, status: RequirementStatus) -> StoreResult<AssetRequirement> {
        asset_requirements::update_asset_requirement_status(&self.pool, id, status).await
    }

    async fn list_tasks(&self, workspace_id: Uuid, filter: Option<TaskFilter>) -> StoreResult<Vec<Task>> {
        tasks::list_tasks(&self.pool, workspace_id, filter).await
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Task> {
        tasks::get_task(&self.pool, id).await
    }

    async fn create_task(&self, task: Task, idempotency_key: Option<String>) -> StoreResult<Task> {
        tasks::create_task(&self.pool, task, idempotency_key).await
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        new_status: TaskStatus,
        result: Option<TaskResult>,
        expected_status: TaskStatus,
    ) -> StoreResult<Task> {
        tasks::update_task_status(&self.pool, id, new_status, result, expected_status).await
    }

    async fn increment_task_recovery_count(&self, id: Uuid) -> StoreResult<Task> {
        tasks::increment_task_recovery_count(&self.pool, id).await
    }

    async fn find_active_corrective_task(&self, goal_id: Uuid) -> StoreResult<Option<Task>> {
        tasks::find_active_corrective_task(&self.pool, goal_id).await
    }

    async fn insert_artifact(&self, artifact: Artifact) -> StoreResult<Artifact> {
        artifacts::insert_artifact(&self.pool, artifact).await
    }

    async fn list_artifacts(&self, requirement_id: Uuid) -> StoreResult<Vec<Artifact>> {
        artifacts::list_artifacts(&self.pool, requirement_id).await
    }

    async fn insert_deliverable(&self, deliverable: Deliverable) -> StoreResult<Deliverable> {
        artifacts::insert_deliverable(&self.pool, deliverable).await
    }

    async fn get_deliverable(&self, goal_id: Uuid) -> StoreResult<Option<Deliverable>> {
        artifacts::get_deliverable(&self.pool, goal_id).await
    }

    async fn start_thinking_process(&self, process: ThinkingProcess) -> StoreResult<ThinkingProcess> {
        thinking::start_thinking_process(&self.pool, process).await
    }

    async fn update_thinking_process(&self, process: ThinkingProcess) -> StoreResult<ThinkingProcess> {
        thinking::update_thinking_process(&self.pool, process).await
    }

    async fn get_thinking_process(&self, process_id: Uuid) -> StoreResult<ThinkingProcess> {
        thinking::get_thinking_process(&self.pool, process_id).await
    }

    async fn list_thinking_processes(&self, workspace_id: Uuid, limit: u32) -> StoreResult<Vec<ThinkingProcess>> {
        thinking::list_thinking_processes(&self.pool, workspace_id, limit).await
    }

    async fn insert_recovery_attempt(&self, attempt: RecoveryAttempt) -> StoreResult<RecoveryAttempt> {
        recovery::insert_recovery_attempt(&self.pool, attempt).await
    }

    async fn list_recovery_attempts(&self, task_id: Uuid) -> StoreResult<Vec<RecoveryAttempt>> {
        recovery::list_recovery_attempts(&self.pool, task_id).await
    }

    async fn insert_insight(&self, insight: Insight) -> StoreResult<Insight> {
        insights::insert_insight(&self.pool, insight).await
    }

    async fn get_insights(&self, workspace_id: Uuid, tags: Option<Vec<String>>, limit: u32) -> StoreResult<Vec<Insight>> {
        insights::get_insights(&self.pool, workspace_id, tags, limit).await
    }

    async fn log_event(&self, workspace_id: Uuid, event_type: &str, payload: serde_json::Value) -> StoreResult<()> {
        insights::log_event(&self.pool, workspace_id, event_type, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{all_embedded_migrations, create_test_pool, Migrator};
    use crate::domain::models::WorkspaceStatus;

    async fn test_store() -> SqliteStore {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());
        migrator.run_embedded_migrations(all_embedded_migrations()).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn workspace_round_trip_and_cas() {
        let store = test_store().await;
        let ws = Workspace::new("acme", "grow contacts to 1000");
        store.create_workspace(ws.clone()).await.unwrap();

        let fetched = store.get_workspace(ws.id).await.unwrap();
        assert_eq!(fetched.status, WorkspaceStatus::Created);

        store.update_workspace_status(ws.id, WorkspaceStatus::Active, WorkspaceStatus::Created).await.unwrap();
        let conflict = store.update_workspace_status(ws.id, WorkspaceStatus::Completed, WorkspaceStatus::Created).await;
        assert!(matches!(conflict, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn task_idempotency_key_dedupes_inserts() {
        let store = test_store().await;
        let ws = Workspace::new("acme", "g");
        store.create_workspace(ws.clone()).await.unwrap();

        let task = Task::new(ws.id, "plan", "bootstrap");
        let first = store.create_task(task.clone(), Some("key-1".to_string())).await.unwrap();
        let second = store.create_task(Task::new(ws.id, "plan-dup", "bootstrap"), Some("key-1".to_string())).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn goal_cas_rejects_stale_current_value() {
        let store = test_store().await;
        let ws = Workspace::new("acme", "g");
        store.create_workspace(ws.clone()).await.unwrap();
        let goal = Goal::new(ws.id, "contacts", 100.0, "count");
        store.create_goal(goal.clone()).await.unwrap();

        store.update_goal(goal.id, 10.0, GoalStatus::Active, 0.0).await.unwrap();
        let conflict = store.update_goal(goal.id, 20.0, GoalStatus::Active, 0.0).await;
        assert!(matches!(conflict, Err(StoreError::Conflict { .. })));
    }
}
