//! `AgentRuntime` adapter implementations.

pub mod anthropic_api;
pub mod mock;

pub use anthropic_api::{AnthropicApiConfig, AnthropicApiRuntime};
pub use mock::{MockAgentRuntime, MockResponse};
