//! Anthropic Messages API agent runtime.
//!
//! A single non-streaming call per `execute`: the orchestrator never resumes
//! or streams a session, so this adapter trims the teacher's SSE substrate
//! down to one request/response round trip with a hard deadline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::domain::error::AgentRuntimeError;
use crate::domain::models::{Agent, Task};
use crate::domain::ports::agent_runtime::{AgentRuntime, AgentRuntimeOutput, RuntimeUsage};

/// Configuration for the Anthropic API runtime.
#[derive(Debug, Clone)]
pub struct AnthropicApiConfig {
    /// API key (read from `ANTHROPIC_API_KEY` if not set explicitly).
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub max_tokens: u32,
}

impl Default for AnthropicApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            max_tokens: 4096,
        }
    }
}

impl AnthropicApiConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: &'static str,
    pub text: String,
}

impl ContentBlock {
    fn text(content: impl Into<String>) -> Self {
        Self { block_type: "text", text: content.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ResponseBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Anthropic Messages API agent runtime.
pub struct AnthropicApiRuntime {
    config: AnthropicApiConfig,
    client: Client,
}

impl AnthropicApiRuntime {
    pub fn new(config: AnthropicApiConfig) -> Result<Self, AgentRuntimeError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AgentRuntimeError::Connection(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn with_defaults() -> Result<Self, AgentRuntimeError> {
        Self::new(AnthropicApiConfig::default())
    }

    fn build_request(&self, task: &Task, agent: &Agent) -> MessagesRequest {
        let prompt = format!(
            "You are acting as {}.\n\nTask: {}\n\n{}",
            agent.role, task.name, task.description
        );
        MessagesRequest {
            model: agent.llm_config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: Some(format!("You are a {} agent with skills: {}.", agent.role, agent.skills.join(", "))),
            messages: vec![Message { role: MessageRole::User, content: vec![ContentBlock::text(prompt)] }],
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> AgentRuntimeError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AgentRuntimeError::RateLimit(body.to_string());
        }
        if status.is_server_error() {
            return AgentRuntimeError::Connection(format!("{status}: {body}"));
        }
        if let Ok(err) = serde_json::from_str::<ApiErrorBody>(body) {
            return AgentRuntimeError::Unknown(format!("{}: {}", err.error.error_type, err.error.message));
        }
        AgentRuntimeError::Unknown(format!("{status}: {body}"))
    }
}

#[async_trait]
impl AgentRuntime for AnthropicApiRuntime {
    fn name(&self) -> &'static str {
        "anthropic_api"
    }

    async fn is_available(&self) -> Result<bool, AgentRuntimeError> {
        Ok(self.config.get_api_key().is_some())
    }

    async fn execute(
        &self,
        task: &Task,
        agent: &Agent,
        deadline: DateTime<Utc>,
    ) -> Result<AgentRuntimeOutput, AgentRuntimeError> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| AgentRuntimeError::Unknown("ANTHROPIC_API_KEY not set".to_string()))?;

        let timeout = (deadline - Utc::now())
            .to_std()
            .map_err(|_| AgentRuntimeError::Timeout(0))?;

        let request = self.build_request(task, agent);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .timeout(timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentRuntimeError::Timeout(timeout.as_secs())
                } else {
                    AgentRuntimeError::Connection(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AgentRuntimeError::Unknown(format!("malformed response: {e}")))?;

        let text = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(AgentRuntimeOutput {
            output: Some(text),
            structured_payload: None,
            usage: RuntimeUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
                model: request.model,
                estimated: false,
            },
            agent_metadata: serde_json::json!({ "runtime": "anthropic_api" }),
        })
    }
}
