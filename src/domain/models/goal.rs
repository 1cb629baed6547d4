//! Goal domain model — a measurable objective within a workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Blocked,
}

impl Default for GoalStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!(
            (self, new_status),
            (Self::Active, Self::Completed)
                | (Self::Active, Self::Blocked)
                | (Self::Blocked, Self::Active)
                | (Self::Blocked, Self::Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoalPriority(u8);

impl GoalPriority {
    /// Clamps into the spec's `1..3` range.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 3))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for GoalPriority {
    fn default() -> Self {
        Self(2)
    }
}

/// A measurable objective with a numeric target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub workspace_id: Uuid,
    /// Free text, classified by the Goal Validator (e.g. `contacts`, `email_sequences`).
    pub metric_type: String,
    pub target_value: f64,
    /// Monotonic non-decreasing under success, unless this is a reduction metric.
    pub current_value: f64,
    pub unit: String,
    pub priority: GoalPriority,
    pub status: GoalStatus,
    /// Reduction metrics (e.g. "reduce churn to below X") are satisfied by
    /// `current_value <= target_value` instead of `>=`.
    pub is_minimum: bool,
    pub last_validation_at: Option<DateTime<Utc>>,
    pub asset_requirements_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        workspace_id: Uuid,
        metric_type: impl Into<String>,
        target_value: f64,
        unit: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            metric_type: metric_type.into(),
            target_value,
            current_value: 0.0,
            unit: unit.into(),
            priority: GoalPriority::default(),
            status: GoalStatus::default(),
            is_minimum: true,
            last_validation_at: None,
            asset_requirements_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = GoalPriority::new(priority);
        self
    }

    pub fn with_minimum(mut self, is_minimum: bool) -> Self {
        self.is_minimum = is_minimum;
        self
    }

    /// `current_value <= target_value` except for reduction metrics.
    pub fn respects_target_invariant(&self) -> bool {
        if self.is_minimum {
            true
        } else {
            self.current_value <= self.target_value
        }
    }

    pub fn progress_fraction(&self) -> f64 {
        if self.target_value <= 0.0 {
            return 1.0;
        }
        (self.current_value / self.target_value).clamp(0.0, 1.0)
    }

    pub fn can_transition_to(&self, new_status: GoalStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: GoalStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition goal from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_validation(&mut self) {
        self.last_validation_at = Some(Utc::now());
    }

    pub fn needs_validation(&self, interval_minutes: i64) -> bool {
        match self.last_validation_at {
            None => true,
            Some(t) => (Utc::now() - t).num_minutes() >= interval_minutes,
        }
    }
}
