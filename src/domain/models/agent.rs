//! Agent domain model — a configured LLM persona bound to a workspace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    Senior,
    Expert,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Senior => "senior",
            Self::Expert => "expert",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "junior" => Some(Self::Junior),
            "senior" => Some(Self::Senior),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

/// Availability state of an agent. `active` holds exactly while the agent is
/// assigned to a non-terminal task — the Executor is the only writer of that
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Available,
    Active,
    Busy,
    Offline,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Active => "active",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(Self::Available),
            "active" => Some(Self::Active),
            "busy" => Some(Self::Busy),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// LLM configuration bound to an agent. Policy (which model to use for which
/// role) lives outside the core; this just records what was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
}

impl LlmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

/// A configured LLM persona bound to exactly one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub role: String,
    pub seniority: Seniority,
    pub status: AgentStatus,
    pub skills: Vec<String>,
    pub llm_config: LlmConfig,
}

impl Agent {
    pub fn new(workspace_id: Uuid, role: impl Into<String>, seniority: Seniority, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            role: role.into(),
            seniority,
            status: AgentStatus::default(),
            skills: Vec::new(),
            llm_config: LlmConfig::new(model),
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn with_skills(mut self, skills: impl IntoIterator<Item = String>) -> Self {
        self.skills.extend(skills);
        self
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s.eq_ignore_ascii_case(skill))
    }

    pub fn has_all_skills(&self, required: &[String]) -> bool {
        required.iter().all(|r| self.has_skill(r))
    }

    pub fn is_assignable(&self) -> bool {
        self.status.is_assignable()
    }
}
