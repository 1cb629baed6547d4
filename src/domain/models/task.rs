//! Task domain model — a unit of work for a single agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Queued, Self::Failed],
            Self::Queued => &[Self::InProgress, Self::Pending, Self::Failed],
            Self::InProgress => &[Self::Completed, Self::Failed],
            // Failed can return to Pending when the Recovery Analyser orders a retry.
            Self::Failed => &[Self::Pending],
            Self::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Base score contribution used by the Task Planner's prioritisation.
    pub fn base_score(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
        }
    }
}

/// Token usage and cost recorded when a task finishes, best-effort per §4.2.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokensUsed {
    pub input: u64,
    pub output: u64,
    /// True when the runtime could not report exact counts.
    pub estimated: bool,
}

/// Payload written to `Task.result` on completion or failure, mirroring
/// the Executor's result envelope in the external interfaces table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub output: Option<String>,
    /// Structured payload conforming to the task's expected-output schema, if any.
    pub structured_payload: Option<serde_json::Value>,
    pub status_detail: String,
    pub execution_time_seconds: f64,
    pub model_used: Option<String>,
    pub tokens_used: TokensUsed,
    pub cost_estimated: f64,
    pub agent_metadata: serde_json::Value,
    pub error: Option<String>,
}

/// A discrete unit of work for a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub goal_id: Option<Uuid>,
    pub asset_requirement_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub assigned_role: Option<String>,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub is_corrective: bool,
    pub numerical_target: Option<f64>,
    pub contribution_expected: Option<f64>,
    pub recovery_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub dependencies: Vec<Uuid>,
    pub context_data: HashMap<String, serde_json::Value>,
    pub result: Option<TaskResult>,
    pub idempotency_key: Option<String>,
    pub ai_generated: bool,
}

impl Task {
    pub fn new(workspace_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            goal_id: None,
            asset_requirement_id: None,
            agent_id: None,
            assigned_role: None,
            name: name.into(),
            description: description.into(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            is_corrective: false,
            numerical_target: None,
            contribution_expected: None,
            recovery_count: 0,
            created_at: now,
            updated_at: now,
            deadline: None,
            dependencies: Vec::new(),
            context_data: HashMap::new(),
            result: None,
            idempotency_key: None,
            ai_generated: false,
        }
    }

    pub fn with_goal(mut self, goal_id: Uuid) -> Self {
        self.goal_id = Some(goal_id);
        self
    }

    pub fn with_asset_requirement(mut self, requirement_id: Uuid) -> Self {
        self.asset_requirement_id = Some(requirement_id);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.dependencies.contains(&task_id) && task_id != self.id {
            self.dependencies.push(task_id);
        }
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn as_corrective(mut self, deadline_hours: i64, memory_context: serde_json::Value) -> Self {
        self.is_corrective = true;
        self.priority = TaskPriority::High;
        self.deadline = Some(Utc::now() + chrono::Duration::hours(deadline_hours));
        self.context_data.insert("memory_context".to_string(), memory_context);
        self
    }

    pub fn with_ai_generated(mut self, context_snapshot: serde_json::Value) -> Self {
        self.ai_generated = true;
        self.context_data.insert("generation_context".to_string(), context_snapshot);
        self
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition the task, enforcing the `in_progress => agent_id.is_some()`
    /// invariant from §3.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition task from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        if new_status == TaskStatus::InProgress && self.agent_id.is_none() {
            return Err("task cannot enter in_progress without an assigned agent".to_string());
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn assign_agent(&mut self, agent_id: Uuid, role: impl Into<String>) {
        self.agent_id = Some(agent_id);
        self.assigned_role = Some(role.into());
    }

    /// `recovery_count <= MAX_RECOVERY_ATTEMPTS_PER_TASK`.
    pub fn can_recover(&self, max_attempts: u32) -> bool {
        self.recovery_count < max_attempts
    }

    pub fn record_recovery_attempt(&mut self) {
        self.recovery_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, result: TaskResult) {
        self.result = Some(result);
        // Completion always goes through InProgress per the state graph; a
        // caller that skips straight from Pending would hit the guard above.
        self.status = TaskStatus::Completed;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, result: TaskResult) {
        self.result = Some(result);
        self.status = TaskStatus::Failed;
        self.updated_at = Utc::now();
    }
}
