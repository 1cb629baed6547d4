//! Deliverable domain model — the aggregated, human-facing output for a goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One titled section of a deliverable, sourced from one or more artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverableSection {
    pub title: String,
    pub content: String,
    pub source_artifact_ids: Vec<Uuid>,
}

/// The aggregated, human-facing output produced for a goal by the
/// Deliverable Engine once its asset requirements are fulfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub summary: String,
    pub sections: Vec<DeliverableSection>,
    /// `[0, 100]`, the weighted average of contributing artifact quality scores.
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
    /// Cache key components: latest contributing task update timestamp and a
    /// content hash, so unchanged inputs skip re-aggregation (§9 Design Notes).
    pub cache_key: Option<String>,
}

impl Deliverable {
    pub fn new(workspace_id: Uuid, goal_id: Uuid, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            goal_id,
            title: title.into(),
            summary: summary.into(),
            sections: Vec::new(),
            quality_score: 0.0,
            created_at: Utc::now(),
            cache_key: None,
        }
    }

    pub fn with_section(mut self, section: DeliverableSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = score.clamp(0.0, 100.0);
        self
    }

    pub fn with_cache_key(mut self, latest_task_update: DateTime<Utc>, content_hash: impl std::fmt::Display) -> Self {
        self.cache_key = Some(format!("{}:{}", latest_task_update.timestamp(), content_hash));
        self
    }

    pub fn is_cache_valid(&self, latest_task_update: DateTime<Utc>, content_hash: impl std::fmt::Display) -> bool {
        self.cache_key.as_deref() == Some(&format!("{}:{}", latest_task_update.timestamp(), content_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_matches_same_inputs_only() {
        let t = Utc::now();
        let d = Deliverable::new(Uuid::new_v4(), Uuid::new_v4(), "Report", "summary").with_cache_key(t, "abc");
        assert!(d.is_cache_valid(t, "abc"));
        assert!(!d.is_cache_valid(t, "def"));
    }

    #[test]
    fn quality_score_clamps() {
        let d = Deliverable::new(Uuid::new_v4(), Uuid::new_v4(), "t", "s").with_quality_score(-5.0);
        assert!((d.quality_score - 0.0).abs() < f64::EPSILON);
    }
}
