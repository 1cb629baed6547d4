//! ThinkingProcess domain model — an append-only trace of an agent's reasoning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed, closed set of step kinds per §9 Design Notes — the Thinking
/// Recorder never accepts an unrecognised kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStepType {
    Analysis,
    Reasoning,
    Evaluation,
    Conclusion,
    Perspective,
    CriticalReview,
    Synthesis,
}

impl ThinkingStepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Reasoning => "reasoning",
            Self::Evaluation => "evaluation",
            Self::Conclusion => "conclusion",
            Self::Perspective => "perspective",
            Self::CriticalReview => "critical_review",
            Self::Synthesis => "synthesis",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "analysis" => Some(Self::Analysis),
            "reasoning" => Some(Self::Reasoning),
            "evaluation" => Some(Self::Evaluation),
            "conclusion" => Some(Self::Conclusion),
            "perspective" => Some(Self::Perspective),
            "critical_review" => Some(Self::CriticalReview),
            "synthesis" => Some(Self::Synthesis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub step_type: ThinkingStepType,
    pub content: String,
    /// `[0, 1]`.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl ThinkingStep {
    pub fn new(step_type: ThinkingStepType, content: impl Into<String>, confidence: f64) -> Self {
        Self {
            step_type,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// An append-only trace of an agent's or service's reasoning, sealed once complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingProcess {
    pub process_id: Uuid,
    pub workspace_id: Uuid,
    pub context: String,
    pub title: Option<String>,
    pub steps: Vec<ThinkingStep>,
    pub final_conclusion: Option<String>,
    pub overall_confidence: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary_metadata: Option<serde_json::Value>,
}

impl ThinkingProcess {
    pub fn start(workspace_id: Uuid, context: impl Into<String>) -> Self {
        Self {
            process_id: Uuid::new_v4(),
            workspace_id,
            context: context.into(),
            title: None,
            steps: Vec::new(),
            final_conclusion: None,
            overall_confidence: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            summary_metadata: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.completed_at.is_none()
    }

    /// Appends a step. Steps may only be appended while the process is active.
    pub fn append(&mut self, step: ThinkingStep) -> Result<(), String> {
        if !self.is_active() {
            return Err(format!("thinking process {} is sealed", self.process_id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Idempotent: calling `complete` on an already-sealed process is a no-op
    /// that returns the existing conclusion rather than erroring.
    pub fn complete(&mut self, final_conclusion: impl Into<String>, overall_confidence: f64) {
        if !self.is_active() {
            return;
        }
        self.final_conclusion = Some(final_conclusion.into());
        self.overall_confidence = overall_confidence.clamp(0.0, 1.0);
        self.completed_at = Some(Utc::now());
    }
}
