//! Workspace domain model — the unit of tenancy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Created,
    Active,
    ProcessingTasks,
    NeedsIntervention,
    Paused,
    Completed,
}

impl Default for WorkspaceStatus {
    fn default() -> Self {
        Self::Created
    }
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::ProcessingTasks => "processing_tasks",
            Self::NeedsIntervention => "needs_intervention",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "active" => Some(Self::Active),
            "processing_tasks" => Some(Self::ProcessingTasks),
            "needs_intervention" => Some(Self::NeedsIntervention),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// `created -> active -> (processing_tasks <-> active) -> completed`, with
    /// `needs_intervention` reachable from any non-terminal state and
    /// recoverable back to `active`.
    pub fn valid_transitions(&self) -> &'static [WorkspaceStatus] {
        match self {
            Self::Created => &[Self::Active, Self::NeedsIntervention],
            Self::Active => &[
                Self::ProcessingTasks,
                Self::NeedsIntervention,
                Self::Paused,
                Self::Completed,
            ],
            Self::ProcessingTasks => &[Self::Active, Self::NeedsIntervention],
            Self::NeedsIntervention => &[Self::Active],
            Self::Paused => &[Self::Active, Self::NeedsIntervention],
            Self::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Budget ceiling associated with a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceBudget {
    pub max_amount: f64,
    pub currency: String,
}

impl Default for WorkspaceBudget {
    fn default() -> Self {
        Self { max_amount: 0.0, currency: "USD".to_string() }
    }
}

/// Tenant-scoped container for one business goal and its team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub goal_text: String,
    pub status: WorkspaceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub budget: WorkspaceBudget,
    /// When `status` entered `processing_tasks`; used by the Health Manager
    /// to recover the short-lived lock when its TTL has elapsed.
    pub processing_since: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, goal_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            goal_text: goal_text.into(),
            status: WorkspaceStatus::default(),
            created_at: now,
            updated_at: now,
            budget: WorkspaceBudget::default(),
            processing_since: None,
        }
    }

    pub fn with_budget(mut self, max_amount: f64, currency: impl Into<String>) -> Self {
        self.budget = WorkspaceBudget { max_amount, currency: currency.into() };
        self
    }

    pub fn can_transition_to(&self, new_status: WorkspaceStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: WorkspaceStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition workspace from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        self.processing_since = if new_status == WorkspaceStatus::ProcessingTasks {
            Some(self.updated_at)
        } else {
            None
        };
        Ok(())
    }

    /// Whether the `processing_tasks` lock has outlived its TTL and should be
    /// recovered by the Health Manager.
    pub fn processing_lock_expired(&self, ttl_seconds: i64) -> bool {
        match (self.status, self.processing_since) {
            (WorkspaceStatus::ProcessingTasks, Some(since)) => {
                (Utc::now() - since).num_seconds() > ttl_seconds
            }
            _ => false,
        }
    }
}
