//! AgentRuntime port — the LLM backend that executes a single task.
//!
//! Adapted from the teacher's `Substrate` trait: this system never streams
//! or resumes a session, so the surface collapses to one cancellable call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::AgentRuntimeError;
use crate::domain::models::{Agent, Task};

/// Best-effort token usage reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
    pub estimated: bool,
}

/// Successful outcome of one `execute` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRuntimeOutput {
    pub output: Option<String>,
    pub structured_payload: Option<serde_json::Value>,
    pub usage: RuntimeUsage,
    pub agent_metadata: serde_json::Value,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    async fn is_available(&self) -> Result<bool, AgentRuntimeError>;

    /// Executes `task` on behalf of `agent`, cancelling the call if `deadline`
    /// elapses first. A non-conforming structured payload surfaces as
    /// `AgentRuntimeError::Validation` carrying the offending field path,
    /// which feeds the Recovery Analyser's pattern matcher directly.
    async fn execute(
        &self,
        task: &Task,
        agent: &Agent,
        deadline: DateTime<Utc>,
    ) -> Result<AgentRuntimeOutput, AgentRuntimeError>;
}
