//! Mock agent runtime for testing — never makes a network call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::error::AgentRuntimeError;
use crate::domain::models::{Agent, Task};
use crate::domain::ports::agent_runtime::{AgentRuntime, AgentRuntimeOutput, RuntimeUsage};

/// Canned response configuration.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub output: String,
    pub structured_payload: Option<serde_json::Value>,
    pub fail: Option<AgentRuntimeError>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            output: "Mock task completed successfully.".to_string(),
            structured_payload: None,
            fail: None,
            input_tokens: 100,
            output_tokens: 50,
        }
    }
}

impl MockResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self { output: output.into(), ..Default::default() }
    }

    pub fn failure(error: AgentRuntimeError) -> Self {
        Self { fail: Some(error), ..Default::default() }
    }

    pub fn with_structured_payload(mut self, payload: serde_json::Value) -> Self {
        self.structured_payload = Some(payload);
        self
    }
}

/// Mock runtime that returns canned responses, optionally per-task.
pub struct MockAgentRuntime {
    default_response: MockResponse,
    response_overrides: Arc<RwLock<HashMap<Uuid, MockResponse>>>,
}

impl MockAgentRuntime {
    pub fn new() -> Self {
        Self {
            default_response: MockResponse::default(),
            response_overrides: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self {
            default_response: response,
            response_overrides: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set_response_for_task(&self, task_id: Uuid, response: MockResponse) {
        self.response_overrides.write().await.insert(task_id, response);
    }

    async fn response_for(&self, task_id: Uuid) -> MockResponse {
        self.response_overrides
            .read()
            .await
            .get(&task_id)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockAgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRuntime for MockAgentRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> Result<bool, AgentRuntimeError> {
        Ok(true)
    }

    async fn execute(
        &self,
        task: &Task,
        agent: &Agent,
        _deadline: DateTime<Utc>,
    ) -> Result<AgentRuntimeOutput, AgentRuntimeError> {
        let response = self.response_for(task.id).await;

        if let Some(err) = response.fail {
            return Err(err);
        }

        Ok(AgentRuntimeOutput {
            output: Some(response.output),
            structured_payload: response.structured_payload,
            usage: RuntimeUsage {
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                model: agent.llm_config.model.clone(),
                estimated: false,
            },
            agent_metadata: serde_json::json!({ "runtime": "mock" }),
        })
    }
}
