//! Artifact domain model — a concrete piece of output produced against a requirement.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Draft,
    Approved,
    Rejected,
}

impl Default for ArtifactStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!(
            (self, new_status),
            (Self::Draft, Self::Approved) | (Self::Draft, Self::Rejected) | (Self::Rejected, Self::Draft)
        )
    }
}

/// A task's structured output, scored and tracked against a requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub requirement_id: Uuid,
    pub task_id: Uuid,
    pub content: serde_json::Value,
    /// `[0, 100]`, assigned by the Deliverable Engine's validation step.
    pub quality_score: f64,
    pub status: ArtifactStatus,
}

impl Artifact {
    pub fn new(workspace_id: Uuid, requirement_id: Uuid, task_id: Uuid, content: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            requirement_id,
            task_id,
            content,
            quality_score: 0.0,
            status: ArtifactStatus::default(),
        }
    }

    pub fn score(mut self, quality_score: f64) -> Self {
        self.quality_score = quality_score.clamp(0.0, 100.0);
        self
    }

    pub fn can_transition_to(&self, new_status: ArtifactStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: ArtifactStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition artifact from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        Ok(())
    }
}
