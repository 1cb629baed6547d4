//! Insight domain model — a distilled lesson fed back into future planning.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    FailureLesson,
    SuccessPattern,
    Constraint,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailureLesson => "failure_lesson",
            Self::SuccessPattern => "success_pattern",
            Self::Constraint => "constraint",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "failure_lesson" => Some(Self::FailureLesson),
            "success_pattern" => Some(Self::SuccessPattern),
            "constraint" => Some(Self::Constraint),
            _ => None,
        }
    }
}

/// A distilled, taggable observation recorded by the Goal Validator's
/// corrective-action step and consumed as `memory_context` by the Task Planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub insight_type: InsightType,
    pub content: String,
    pub tags: Vec<String>,
    /// `[0, 1]`.
    pub confidence: f64,
}

impl Insight {
    pub fn new(workspace_id: Uuid, insight_type: InsightType, content: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            insight_type,
            content: content.into(),
            tags: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_support_case_insensitive_lookup() {
        let i = Insight::new(Uuid::new_v4(), InsightType::FailureLesson, "validation schema mismatch", 0.8)
            .with_tags(["Schema".to_string(), "retry".to_string()]);
        assert!(i.has_tag("schema"));
        assert!(!i.has_tag("timeout"));
    }

    #[test]
    fn confidence_clamps_to_unit_interval() {
        let i = Insight::new(Uuid::new_v4(), InsightType::Constraint, "c", -0.2);
        assert!((i.confidence - 0.0).abs() < f64::EPSILON);
    }
}
