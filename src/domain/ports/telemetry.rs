//! Telemetry port — fire-and-forget event broadcast, metrics, and alerts.
//!
//! Broadcast failures must never propagate into the calling component; every
//! adapter implementation swallows send errors and logs at debug.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    OrphanedWorkspace,
    NoAgentsAtAll,
    NoAvailableAgents,
    NoTasksForGoal,
    CorrectiveTaskNoAgent,
    CriticalUnrecoverableIssues,
    HealthCheckError,
}

#[async_trait]
pub trait Telemetry: Send + Sync {
    /// Broadcasts a real-time event; subscribers (if any) receive it, but the
    /// absence of subscribers is never an error.
    async fn broadcast(&self, event_type: &str, payload: serde_json::Value);

    async fn emit_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]);

    async fn alert(
        &self,
        workspace_id: Option<Uuid>,
        alert_type: AlertType,
        severity: AlertSeverity,
        description: &str,
        component: &str,
    );
}
