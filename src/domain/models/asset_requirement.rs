//! AssetRequirement domain model — a concrete deliverable piece demanded by a goal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Pending,
    InProgress,
    Fulfilled,
}

impl Default for RequirementStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RequirementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Fulfilled => "fulfilled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "fulfilled" => Some(Self::Fulfilled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!(
            (self, new_status),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Fulfilled)
                | (Self::InProgress, Self::Pending)
        )
    }
}

/// A single concrete asset the Deliverable Engine must produce to satisfy a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRequirement {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub asset_name: String,
    pub asset_type: String,
    pub asset_format: String,
    pub acceptance_criteria: String,
    pub priority: u8,
    /// Relative contribution to the goal's business value, in `[0, 1]`.
    pub business_value_score: f64,
    pub status: RequirementStatus,
}

impl AssetRequirement {
    pub fn new(
        goal_id: Uuid,
        asset_name: impl Into<String>,
        asset_type: impl Into<String>,
        asset_format: impl Into<String>,
        acceptance_criteria: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            asset_name: asset_name.into(),
            asset_type: asset_type.into(),
            asset_format: asset_format.into(),
            acceptance_criteria: acceptance_criteria.into(),
            priority: 2,
            business_value_score: 0.5,
            status: RequirementStatus::default(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 3);
        self
    }

    pub fn with_business_value(mut self, score: f64) -> Self {
        self.business_value_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn can_transition_to(&self, new_status: RequirementStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: RequirementStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition requirement from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_value_score_clamps() {
        let req = AssetRequirement::new(Uuid::new_v4(), "landing page", "document", "markdown", "has headline")
            .with_business_value(1.5);
        assert!((req.business_value_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fulfilled_is_reachable_only_through_in_progress() {
        let mut req = AssetRequirement::new(Uuid::new_v4(), "x", "document", "markdown", "y");
        assert!(!req.can_transition_to(RequirementStatus::Fulfilled));
        req.transition_to(RequirementStatus::InProgress).unwrap();
        assert!(req.transition_to(RequirementStatus::Fulfilled).is_ok());
    }
}
