//! Integration tests for the Anthropic Messages API runtime against a mock
//! HTTP server, rather than the real API.

use chrono::Utc;
use foreman::adapters::substrates::anthropic_api::{AnthropicApiConfig, AnthropicApiRuntime};
use foreman::domain::error::AgentRuntimeError;
use foreman::domain::models::{Agent, Seniority, Task};
use foreman::domain::ports::AgentRuntime;
use mockito::Server;
use uuid::Uuid;

fn task_and_agent(workspace_id: Uuid) -> (Task, Agent) {
    let task = Task::new(workspace_id, "draft outline", "write a five-point outline");
    let agent = Agent::new(workspace_id, "writer", Seniority::Senior, "claude-haiku-4-5");
    (task, agent)
}

fn success_body() -> String {
    serde_json::json!({
        "content": [{ "type": "text", "text": "Here is the outline." }],
        "usage": { "input_tokens": 42, "output_tokens": 8 },
    })
    .to_string()
}

#[tokio::test]
async fn execute_parses_a_successful_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(success_body())
        .create_async()
        .await;

    let config = AnthropicApiConfig { base_url: server.url(), ..AnthropicApiConfig::default() }
        .with_api_key("test-key");
    let runtime = AnthropicApiRuntime::new(config).unwrap();
    let (task, agent) = task_and_agent(Uuid::new_v4());

    let output = runtime.execute(&task, &agent, Utc::now() + chrono::Duration::seconds(5)).await.unwrap();

    assert_eq!(output.output.as_deref(), Some("Here is the outline."));
    assert_eq!(output.usage.input_tokens, 42);
    assert_eq!(output.usage.output_tokens, 8);
    mock.assert_async().await;
}

#[tokio::test]
async fn execute_classifies_a_429_as_rate_limit() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(429)
        .with_body(r#"{"error": {"type": "rate_limit_error", "message": "slow down"}}"#)
        .create_async()
        .await;

    let config = AnthropicApiConfig { base_url: server.url(), ..AnthropicApiConfig::default() }
        .with_api_key("test-key");
    let runtime = AnthropicApiRuntime::new(config).unwrap();
    let (task, agent) = task_and_agent(Uuid::new_v4());

    let err = runtime.execute(&task, &agent, Utc::now() + chrono::Duration::seconds(5)).await.unwrap_err();

    assert!(matches!(err, AgentRuntimeError::RateLimit(_)));
}

#[tokio::test]
async fn execute_without_an_api_key_fails_before_any_request() {
    let runtime = AnthropicApiRuntime::new(AnthropicApiConfig::default()).unwrap();
    let (task, agent) = task_and_agent(Uuid::new_v4());

    let err = runtime.execute(&task, &agent, Utc::now() + chrono::Duration::seconds(5)).await.unwrap_err();

    assert!(matches!(err, AgentRuntimeError::Unknown(_)));
}
