//! Workspace Health Manager (C9) — scores workspace health, auto-heals what
//! it safely can, and alerts on what it can't.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use uuid::Uuid;

use crate::domain::models::{AgentStatus, Workspace, WorkspaceStatus};
use crate::domain::ports::{AlertSeverity, AlertType, Store, Telemetry};

/// Default TTL for a `processing_tasks` lock before the Health Manager
/// treats it as stuck rather than in-flight.
const PROCESSING_LOCK_TTL_SECONDS: i64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issue {
    NoAgents,
    NoAvailableAgents,
    StuckProcessingLock,
    NeedsIntervention,
}

impl Issue {
    fn is_auto_recoverable(self) -> bool {
        matches!(self, Self::NeedsIntervention | Self::StuckProcessingLock)
    }
}

pub struct HealthReport {
    pub workspace_id: Uuid,
    pub health_score: u8,
    pub issues: Vec<Issue>,
    pub recovered: Vec<Issue>,
    pub excluded: bool,
}

pub struct HealthManager {
    store: Arc<dyn Store>,
    telemetry: Arc<dyn Telemetry>,
}

impl HealthManager {
    pub fn new(store: Arc<dyn Store>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { store, telemetry }
    }

    /// Scans every active workspace, attempting auto-recovery for anything
    /// that qualifies and alerting on what doesn't. Runs orphaned-goal
    /// cleanup first, since those goals reference workspaces that no
    /// longer exist and so would never surface in the per-workspace pass
    /// below.
    pub async fn scan(&self) -> Result<Vec<HealthReport>> {
        self.cleanup_orphaned_goals().await.context("cleaning up orphaned goals")?;
        let workspaces = self.store.list_active_workspaces().await.context("listing active workspaces")?;
        let assessments = join_all(workspaces.into_iter().map(|w| self.assess_and_recover(w))).await;
        assessments.into_iter().collect()
    }

    /// Deletes every goal whose `workspace_id` no longer resolves to a
    /// workspace row, logging one `system` event per affected workspace id
    /// so the deletion is auditable even though the workspace itself is
    /// gone.
    async fn cleanup_orphaned_goals(&self) -> Result<usize> {
        let orphaned = self.store.list_orphaned_goals().await.context("listing orphaned goals")?;
        let mut by_workspace: HashMap<Uuid, usize> = HashMap::new();
        for goal in &orphaned {
            *by_workspace.entry(goal.workspace_id).or_insert(0) += 1;
        }
        for goal in &orphaned {
            self.store.delete_goal(goal.id).await.context("deleting orphaned goal")?;
        }
        for (workspace_id, goals_deleted) in &by_workspace {
            self.store
                .log_event(
                    *workspace_id,
                    "system",
                    serde_json::json!({ "action": "orphaned_goals_cleanup", "goals_deleted": goals_deleted }),
                )
                .await
                .context("logging orphaned_goals_cleanup event")?;
        }
        Ok(orphaned.len())
    }

    async fn assess_and_recover(&self, mut workspace: Workspace) -> Result<HealthReport> {
        let mut issues = Vec::new();
        let mut recovered = Vec::new();

        if workspace.status == WorkspaceStatus::NeedsIntervention {
            issues.push(Issue::NeedsIntervention);
        }
        if workspace.status == WorkspaceStatus::ProcessingTasks
            && workspace.processing_lock_expired(PROCESSING_LOCK_TTL_SECONDS)
        {
            issues.push(Issue::StuckProcessingLock);
        }

        let agents = self.store.list_agents(workspace.id).await.context("listing agents")?;
        if agents.is_empty() {
            issues.push(Issue::NoAgents);
        } else if !agents.iter().any(|a| matches!(a.status, AgentStatus::Available | AgentStatus::Active)) {
            issues.push(Issue::NoAvailableAgents);
        }

        for issue in issues.clone() {
            if !issue.is_auto_recoverable() {
                continue;
            }
            match issue {
                Issue::NeedsIntervention => {
                    if self
                        .store
                        .update_workspace_status(workspace.id, WorkspaceStatus::Active, WorkspaceStatus::NeedsIntervention)
                        .await
                        .is_ok()
                    {
                        workspace.status = WorkspaceStatus::Active;
                        recovered.push(issue);
                    }
                }
                Issue::StuckProcessingLock => {
                    if self
                        .store
                        .update_workspace_status(workspace.id, WorkspaceStatus::Active, WorkspaceStatus::ProcessingTasks)
                        .await
                        .is_ok()
                    {
                        workspace.status = WorkspaceStatus::Active;
                        recovered.push(issue);
                    }
                }
                _ => {}
            }
        }

        let unrecovered: Vec<Issue> = issues.iter().copied().filter(|i| !recovered.contains(i)).collect();
        let excluded = !unrecovered.is_empty();

        if excluded {
            self.telemetry
                .alert(
                    Some(workspace.id),
                    alert_type_for(&unrecovered),
                    AlertSeverity::Critical,
                    &format!("workspace {} has unrecoverable issues: {unrecovered:?}", workspace.id),
                    "health_manager",
                )
                .await;
        }

        let health_score = compute_health_score(&workspace, &unrecovered, agents.len());

        Ok(HealthReport { workspace_id: workspace.id, health_score, issues, recovered, excluded })
    }
}

fn alert_type_for(issues: &[Issue]) -> AlertType {
    if issues.contains(&Issue::NoAgents) {
        AlertType::NoAgentsAtAll
    } else if issues.contains(&Issue::NoAvailableAgents) {
        AlertType::NoAvailableAgents
    } else {
        AlertType::HealthCheckError
    }
}

fn compute_health_score(workspace: &Workspace, unrecovered: &[Issue], agent_count: usize) -> u8 {
    let mut score: i32 = 100;
    if workspace.status == WorkspaceStatus::Created {
        score -= 30;
    }
    if agent_count == 0 {
        score -= 40;
    }
    score -= 15 * i32::try_from(unrecovered.len()).unwrap_or(i32::MAX);
    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{InMemoryStore, RecordingTelemetry};
    use crate::domain::models::{Agent, Seniority};

    fn manager() -> (HealthManager, Arc<InMemoryStore>, Arc<RecordingTelemetry>) {
        let store = Arc::new(InMemoryStore::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        (HealthManager::new(store.clone(), telemetry.clone()), store, telemetry)
    }

    #[tokio::test]
    async fn needs_intervention_workspace_is_auto_reset() {
        let (manager, store, _telemetry) = manager();
        let mut workspace = Workspace::new("w", "goal text");
        workspace.transition_to(WorkspaceStatus::Active).unwrap();
        workspace.transition_to(WorkspaceStatus::NeedsIntervention).unwrap();
        let workspace = store.create_workspace(workspace).await.unwrap();
        store.create_agent(Agent::new(workspace.id, "writer", Seniority::Senior, "m")).await.unwrap();

        let reports = manager.scan().await.unwrap();
        let report = reports.into_iter().find(|r| r.workspace_id == workspace.id).unwrap();
        assert!(report.recovered.contains(&Issue::NeedsIntervention));
        assert!(!report.excluded);
    }

    #[tokio::test]
    async fn workspace_with_no_agents_is_alerted_and_excluded() {
        let (manager, store, telemetry) = manager();
        let mut workspace = Workspace::new("w", "goal text");
        workspace.transition_to(WorkspaceStatus::Active).unwrap();
        store.create_workspace(workspace.clone()).await.unwrap();

        let reports = manager.scan().await.unwrap();
        let report = reports.into_iter().find(|r| r.workspace_id == workspace.id).unwrap();
        assert!(report.excluded);
        assert!(!telemetry.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn goals_referencing_a_missing_workspace_are_deleted_and_logged() {
        let (manager, store, _telemetry) = manager();
        let missing_workspace_id = Uuid::new_v4();
        let goal = crate::domain::models::Goal::new(missing_workspace_id, "contacts", 50.0, "count");
        store.create_goal(goal.clone()).await.unwrap();

        manager.scan().await.unwrap();

        assert!(store.get_goal(goal.id).await.is_err());
        let events = store.logged_events();
        let (workspace_id, event_type, payload) =
            events.iter().find(|(_, t, _)| t == "system").expect("cleanup event logged");
        assert_eq!(*workspace_id, missing_workspace_id);
        assert_eq!(event_type, "system");
        assert_eq!(payload["action"], "orphaned_goals_cleanup");
        assert_eq!(payload["goals_deleted"], 1);
    }
}
