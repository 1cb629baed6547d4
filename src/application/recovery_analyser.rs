//! Recovery Analyser (C5) — classifies a task failure and chooses a
//! retry/backoff/escalation strategy.
//!
//! The pattern table is adapted from the teacher's recovery-analysis engine:
//! an ordered list of named regexes, each carrying a default strategy,
//! confidence, and transience flag, consulted before any optional LLM step.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{Agent, RecoveryStrategy, Seniority, Task};
use crate::domain::ports::{AgentRuntime, Store};

/// The exact phrase a missing-field validation error carries; §8 property 3
/// requires this literal match to force `immediate_retry` at confidence ≥0.9.
const MISSING_FIELD_PHRASE: &str = "OrchestrationContext\n  field required";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Skip,
    Escalate,
    CircuitBreak,
}

impl Decision {
    fn for_strategy(strategy: RecoveryStrategy) -> Self {
        match strategy {
            RecoveryStrategy::ImmediateRetry | RecoveryStrategy::ExponentialBackoff | RecoveryStrategy::LinearBackoff => {
                Self::Retry
            }
            RecoveryStrategy::CircuitBreaker => Self::CircuitBreak,
            RecoveryStrategy::Abandon => Self::Skip,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub task_id: Uuid,
    pub workspace_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub error_message: String,
    pub error_type: String,
    pub previous_attempts: u32,
    pub workspace_health_score: f64,
    pub system_load: f64,
    pub last_success_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDecisionOutput {
    pub decision: String,
    pub strategy: RecoveryStrategy,
    pub confidence: f64,
    pub delay_seconds: u64,
    pub max_attempts: u32,
    pub reasoning: String,
    pub pattern_matched: Option<String>,
    /// `true` when this decision came from the LLM path rather than the
    /// deterministic pattern table.
    pub ai_analysis_used: bool,
}

struct Pattern {
    name: &'static str,
    regex: fn() -> &'static Regex,
    strategy: RecoveryStrategy,
    base_confidence: f64,
    max_attempts: u32,
}

macro_rules! pattern_regex {
    ($fn_name:ident, $re:expr) => {
        fn $fn_name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            CELL.get_or_init(|| Regex::new($re).unwrap())
        }
    };
}

pattern_regex!(re_timeout, r"(?i)timed?\s*out|timeout");
pattern_regex!(re_rate_limit, r"(?i)429|rate.?limit|too many requests");
pattern_regex!(re_connection, r"(?i)connection refused|connection reset|econnrefused");
pattern_regex!(re_auth, r"(?i)unauthorized|401|forbidden|403|auth(entication)? failed");
pattern_regex!(re_validation, r"(?i)validation error|field required|schema");
pattern_regex!(re_oom, r"(?i)out of memory|oom");
pattern_regex!(re_permission, r"(?i)permission denied|eacces");
pattern_regex!(re_not_found, r"(?i)not found|404");
pattern_regex!(re_conflict, r"(?i)conflict|409|already exists");
pattern_regex!(re_quota, r"(?i)quota exceeded|insufficient.?(quota|credits|balance)");
pattern_regex!(re_malformed, r"(?i)malformed|invalid json|parse error");

fn pattern_table() -> &'static [Pattern] {
    static TABLE: OnceLock<Vec<Pattern>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            Pattern { name: "timeout", regex: re_timeout, strategy: RecoveryStrategy::ExponentialBackoff, base_confidence: 0.8, max_attempts: 3 },
            Pattern { name: "rate_limit", regex: re_rate_limit, strategy: RecoveryStrategy::LinearBackoff, base_confidence: 0.85, max_attempts: 5 },
            Pattern { name: "connection_refused", regex: re_connection, strategy: RecoveryStrategy::ExponentialBackoff, base_confidence: 0.75, max_attempts: 3 },
            Pattern { name: "auth_failure", regex: re_auth, strategy: RecoveryStrategy::Abandon, base_confidence: 0.9, max_attempts: 0 },
            Pattern { name: "validation_error", regex: re_validation, strategy: RecoveryStrategy::ImmediateRetry, base_confidence: 0.6, max_attempts: 2 },
            Pattern { name: "out_of_memory", regex: re_oom, strategy: RecoveryStrategy::CircuitBreaker, base_confidence: 0.7, max_attempts: 1 },
            Pattern { name: "permission_denied", regex: re_permission, strategy: RecoveryStrategy::Abandon, base_confidence: 0.85, max_attempts: 0 },
            Pattern { name: "not_found", regex: re_not_found, strategy: RecoveryStrategy::Abandon, base_confidence: 0.7, max_attempts: 0 },
            Pattern { name: "conflict", regex: re_conflict, strategy: RecoveryStrategy::ImmediateRetry, base_confidence: 0.65, max_attempts: 2 },
            Pattern { name: "quota_exceeded", regex: re_quota, strategy: RecoveryStrategy::CircuitBreaker, base_confidence: 0.8, max_attempts: 1 },
            Pattern { name: "malformed_response", regex: re_malformed, strategy: RecoveryStrategy::ImmediateRetry, base_confidence: 0.6, max_attempts: 2 },
        ]
    })
}

pub struct RecoveryAnalyser {
    store: Arc<dyn Store>,
    base_backoff_seconds: u64,
    agent_runtime: Option<Arc<dyn AgentRuntime>>,
    ai_enabled: bool,
    ai_model: String,
}

impl RecoveryAnalyser {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            base_backoff_seconds: 30,
            agent_runtime: None,
            ai_enabled: false,
            ai_model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_base_backoff_seconds(mut self, seconds: u64) -> Self {
        self.base_backoff_seconds = seconds;
        self
    }

    /// Enables the LLM-backed analysis path. Gated independently by
    /// `with_ai_enabled` so a runtime can be wired in while still disabled
    /// by configuration.
    pub fn with_agent_runtime(mut self, agent_runtime: Arc<dyn AgentRuntime>) -> Self {
        self.agent_runtime = Some(agent_runtime);
        self
    }

    pub fn with_ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    pub fn with_ai_model(mut self, model: impl Into<String>) -> Self {
        self.ai_model = model.into();
        self
    }

    /// Matches the error message/type against the ordered pattern table,
    /// falling back to `unknown` with a conservative escalate strategy.
    fn match_pattern(error_message: &str, error_type: &str) -> (&'static str, RecoveryStrategy, f64, u32) {
        if error_message.contains(MISSING_FIELD_PHRASE) {
            return ("missing_required_field", RecoveryStrategy::ImmediateRetry, 0.95, 2);
        }
        for pattern in pattern_table() {
            if (pattern.regex)().is_match(error_message) || pattern.name == error_type {
                return (pattern.name, pattern.strategy, pattern.base_confidence, pattern.max_attempts);
            }
        }
        ("unknown", RecoveryStrategy::LinearBackoff, 0.4, 2)
    }

    fn adjust_confidence(&self, base: f64, ctx: &RecoveryContext) -> f64 {
        let mut confidence = base * 0.9_f64.powi(ctx.previous_attempts as i32);
        if ctx.workspace_health_score < 70.0 {
            confidence *= 0.85;
        }
        if ctx.system_load > 0.8 {
            confidence *= 0.90;
        }
        if let Some(last_success) = ctx.last_success_time {
            if (chrono::Utc::now() - last_success).num_seconds() <= 3600 {
                confidence = (confidence * 1.1).min(1.0);
            }
        }
        confidence.clamp(0.0, 1.0)
    }

    /// Asks the configured runtime for the same decision schema the
    /// deterministic path produces. Returns `None` on any unavailability,
    /// transport error, or malformed payload — the caller falls back to the
    /// pattern table rather than treating this as fatal.
    async fn ask_llm(&self, ctx: &RecoveryContext, pattern_name: &str) -> Option<RecoveryDecisionOutput> {
        let runtime = self.agent_runtime.as_ref()?;
        if !matches!(runtime.is_available().await, Ok(true)) {
            return None;
        }

        let prompt = format!(
            "A task failed and needs a recovery decision. Respond with JSON matching \
             {{\"decision\": \"retry|skip|escalate|circuit_break\", \
             \"strategy\": \"immediate_retry|exponential_backoff|linear_backoff|circuit_breaker|abandon\", \
             \"confidence\": <0-1>, \"max_attempts\": <int>, \"reasoning\": \"<string>\"}}.\n\
             error_type: {}\nerror_message: {}\nprevious_attempts: {}\n\
             workspace_health_score: {:.1}\nsystem_load: {:.2}\nheuristic_pattern: {pattern_name}",
            ctx.error_type, ctx.error_message, ctx.previous_attempts, ctx.workspace_health_score, ctx.system_load
        );
        let task = Task::new(ctx.workspace_id, "recovery-analysis", prompt);
        let agent = Agent::new(ctx.workspace_id, "recovery-analyser", Seniority::Expert, self.ai_model.clone());
        let deadline = Utc::now() + chrono::Duration::seconds(15);

        let output = runtime.execute(&task, &agent, deadline).await.ok()?;
        let payload = output.structured_payload?;

        let strategy = payload.get("strategy").and_then(serde_json::Value::as_str).and_then(RecoveryStrategy::from_str)?;
        let confidence = payload.get("confidence").and_then(serde_json::Value::as_f64).unwrap_or(0.5).clamp(0.0, 1.0);
        let max_attempts = payload.get("max_attempts").and_then(serde_json::Value::as_u64).unwrap_or(2) as u32;
        let reasoning = payload
            .get("reasoning")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("llm selected `{}` for pattern `{pattern_name}`", strategy.as_str()));
        let decision = payload
            .get("decision")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| match Decision::for_strategy(strategy) {
                Decision::Retry => "retry".to_string(),
                Decision::Skip => "skip".to_string(),
                Decision::Escalate => "escalate".to_string(),
                Decision::CircuitBreak => "circuit_break".to_string(),
            });
        let delay_seconds = strategy.delay_seconds(self.base_backoff_seconds, ctx.previous_attempts.max(1));

        Some(RecoveryDecisionOutput {
            decision,
            strategy,
            confidence,
            delay_seconds,
            max_attempts,
            reasoning,
            pattern_matched: Some(pattern_name.to_string()),
            ai_analysis_used: true,
        })
    }

    pub async fn analyse(&self, ctx: &RecoveryContext) -> Result<RecoveryDecisionOutput> {
        let (pattern_name, strategy, base_confidence, max_attempts) =
            Self::match_pattern(&ctx.error_message, &ctx.error_type);

        let output = if self.ai_enabled {
            self.ask_llm(ctx, pattern_name).await
        } else {
            None
        };

        let output = match output {
            Some(output) => output,
            None => {
                let confidence = self.adjust_confidence(base_confidence, ctx);
                let delay_seconds = strategy.delay_seconds(self.base_backoff_seconds, ctx.previous_attempts.max(1));
                let decision = Decision::for_strategy(strategy);
                let reasoning = format!(
                    "matched pattern `{pattern_name}` after {} previous attempt(s); workspace health {:.0}, system load {:.2}",
                    ctx.previous_attempts, ctx.workspace_health_score, ctx.system_load
                );
                RecoveryDecisionOutput {
                    decision: match decision {
                        Decision::Retry => "retry",
                        Decision::Skip => "skip",
                        Decision::Escalate => "escalate",
                        Decision::CircuitBreak => "circuit_break",
                    }
                    .to_string(),
                    strategy,
                    confidence,
                    delay_seconds,
                    max_attempts,
                    reasoning,
                    pattern_matched: Some(pattern_name.to_string()),
                    ai_analysis_used: false,
                }
            }
        };

        let attempt = crate::domain::models::RecoveryAttempt::new(
            ctx.task_id,
            ctx.previous_attempts + 1,
            output.strategy,
            output.confidence,
            self.base_backoff_seconds,
            output.reasoning.clone(),
        );
        self.store.insert_recovery_attempt(attempt).await?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(error_message: &str) -> RecoveryContext {
        RecoveryContext {
            task_id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            agent_id: None,
            error_message: error_message.to_string(),
            error_type: "unknown".to_string(),
            previous_attempts: 0,
            workspace_health_score: 90.0,
            system_load: 0.1,
            last_success_time: None,
        }
    }

    #[test]
    fn quality_gate_matches_missing_field_phrase() {
        let (name, strategy, confidence, max_attempts) = RecoveryAnalyser::match_pattern(
            "1 validation error for TaskOutput\nOrchestrationContext\n  field required (type=value_error.missing)",
            "validation",
        );
        assert_eq!(name, "missing_required_field");
        assert_eq!(strategy, RecoveryStrategy::ImmediateRetry);
        assert!(confidence >= 0.9);
        assert_eq!(max_attempts, 2);
    }

    #[test]
    fn rate_limit_maps_to_linear_backoff() {
        let (name, strategy, ..) = RecoveryAnalyser::match_pattern("429 Too Many Requests", "connection");
        assert_eq!(name, "rate_limit");
        assert_eq!(strategy, RecoveryStrategy::LinearBackoff);
    }

    #[test]
    fn confidence_decays_with_repeated_attempts() {
        let analyser = RecoveryAnalyser::new(unreachable_store());
        let mut context = ctx("timeout");
        let high = analyser.adjust_confidence(0.8, &context);
        context.previous_attempts = 3;
        let low = analyser.adjust_confidence(0.8, &context);
        assert!(low < high);
    }

    #[test]
    fn low_health_score_penalises_confidence() {
        let analyser = RecoveryAnalyser::new(unreachable_store());
        let mut context = ctx("timeout");
        context.workspace_health_score = 50.0;
        let penalised = analyser.adjust_confidence(0.8, &context);
        assert!(penalised < 0.8);
    }

    #[tokio::test]
    async fn analyse_falls_back_to_pattern_table_when_ai_disabled() {
        let store = Arc::new(crate::application::test_support::InMemoryStore::new());
        let analyser = RecoveryAnalyser::new(store).with_ai_enabled(false).with_base_backoff_seconds(0);
        let decision = analyser.analyse(&ctx("connection reset")).await.unwrap();
        assert!(!decision.ai_analysis_used);
        assert_eq!(decision.pattern_matched.as_deref(), Some("connection_refused"));
    }

    #[tokio::test]
    async fn analyse_uses_llm_decision_when_enabled_and_available() {
        use crate::adapters::substrates::mock::{MockAgentRuntime, MockResponse};

        let store = Arc::new(crate::application::test_support::InMemoryStore::new());
        let runtime = Arc::new(MockAgentRuntime::with_default_response(MockResponse::success("ok").with_structured_payload(
            serde_json::json!({
                "decision": "circuit_break",
                "strategy": "circuit_breaker",
                "confidence": 0.77,
                "max_attempts": 1,
                "reasoning": "repeated timeouts indicate a downstream outage"
            }),
        )));
        let analyser = RecoveryAnalyser::new(store)
            .with_agent_runtime(runtime)
            .with_ai_enabled(true)
            .with_base_backoff_seconds(0);

        let decision = analyser.analyse(&ctx("timeout")).await.unwrap();
        assert!(decision.ai_analysis_used);
        assert_eq!(decision.decision, "circuit_break");
        assert_eq!(decision.strategy, RecoveryStrategy::CircuitBreaker);
        assert!((decision.confidence - 0.77).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn analyse_falls_back_when_llm_payload_is_malformed() {
        use crate::adapters::substrates::mock::{MockAgentRuntime, MockResponse};

        let store = Arc::new(crate::application::test_support::InMemoryStore::new());
        let runtime = Arc::new(MockAgentRuntime::with_default_response(MockResponse::success("ok")));
        let analyser = RecoveryAnalyser::new(store)
            .with_agent_runtime(runtime)
            .with_ai_enabled(true)
            .with_base_backoff_seconds(0);

        let decision = analyser.analyse(&ctx("429 too many requests")).await.unwrap();
        assert!(!decision.ai_analysis_used);
        assert_eq!(decision.pattern_matched.as_deref(), Some("rate_limit"));
    }

    /// A `Store` is never invoked in these pure-function unit tests.
    fn unreachable_store() -> Arc<dyn Store> {
        struct Unreachable;
        #[async_trait::async_trait]
        impl Store for Unreachable {
            async fn get_workspace(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::Workspace> { unimplemented!() }
            async fn list_active_workspaces(&self) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Workspace>> { unimplemented!() }
            async fn list_workspaces_with_pending_tasks(&self) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Workspace>> { unimplemented!() }
            async fn create_workspace(&self, _: crate::domain::models::Workspace) -> crate::domain::ports::StoreResult<crate::domain::models::Workspace> { unimplemented!() }
            async fn update_workspace_status(&self, _: Uuid, _: crate::domain::models::WorkspaceStatus, _: crate::domain::models::WorkspaceStatus) -> crate::domain::ports::StoreResult<crate::domain::models::Workspace> { unimplemented!() }
            async fn list_agents(&self, _: Uuid) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Agent>> { unimplemented!() }
            async fn get_agent(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::Agent> { unimplemented!() }
            async fn create_agent(&self, _: crate::domain::models::Agent) -> crate::domain::ports::StoreResult<crate::domain::models::Agent> { unimplemented!() }
            async fn update_agent_status(&self, _: Uuid, _: crate::domain::models::AgentStatus) -> crate::domain::ports::StoreResult<crate::domain::models::Agent> { unimplemented!() }
            async fn list_active_goals(&self) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Goal>> { unimplemented!() }
            async fn list_workspace_goals(&self, _: Uuid, _: Option<crate::domain::models::GoalStatus>) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Goal>> { unimplemented!() }
            async fn get_goal(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::Goal> { unimplemented!() }
            async fn create_goal(&self, _: crate::domain::models::Goal) -> crate::domain::ports::StoreResult<crate::domain::models::Goal> { unimplemented!() }
            async fn update_goal(&self, _: Uuid, _: f64, _: crate::domain::models::GoalStatus, _: f64) -> crate::domain::ports::StoreResult<crate::domain::models::Goal> { unimplemented!() }
            async fn record_goal_validation(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::Goal> { unimplemented!() }
            async fn list_orphaned_goals(&self) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Goal>> { unimplemented!() }
            async fn delete_goal(&self, _: Uuid) -> crate::domain::ports::StoreResult<()> { unimplemented!() }
            async fn get_asset_requirements(&self, _: Uuid) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::AssetRequirement>> { unimplemented!() }
            async fn create_asset_requirement(&self, _: crate::domain::models::AssetRequirement) -> crate::domain::ports::StoreResult<crate::domain::models::AssetRequirement> { unimplemented!() }
            async fn update_asset_requirement_status(&self, _: Uuid, _: crate::domain::models::RequirementStatus) -> crate::domain::ports::StoreResult<crate::domain::models::AssetRequirement> { unimplemented!() }
            async fn list_tasks(&self, _: Uuid, _: Option<crate::domain::ports::TaskFilter>) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Task>> { unimplemented!() }
            async fn get_task(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::Task> { unimplemented!() }
            async fn create_task(&self, _: crate::domain::models::Task, _: Option<String>) -> crate::domain::ports::StoreResult<crate::domain::models::Task> { unimplemented!() }
            async fn update_task_status(&self, _: Uuid, _: crate::domain::models::TaskStatus, _: Option<crate::domain::models::TaskResult>, _: crate::domain::models::TaskStatus) -> crate::domain::ports::StoreResult<crate::domain::models::Task> { unimplemented!() }
            async fn increment_task_recovery_count(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::Task> { unimplemented!() }
            async fn find_active_corrective_task(&self, _: Uuid) -> crate::domain::ports::StoreResult<Option<crate::domain::models::Task>> { unimplemented!() }
            async fn insert_artifact(&self, _: crate::domain::models::Artifact) -> crate::domain::ports::StoreResult<crate::domain::models::Artifact> { unimplemented!() }
            async fn list_artifacts(&self, _: Uuid) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Artifact>> { unimplemented!() }
            async fn insert_deliverable(&self, _: crate::domain::models::Deliverable) -> crate::domain::ports::StoreResult<crate::domain::models::Deliverable> { unimplemented!() }
            async fn get_deliverable(&self, _: Uuid) -> crate::domain::ports::StoreResult<Option<crate::domain::models::Deliverable>> { unimplemented!() }
            async fn start_thinking_process(&self, _: crate::domain::models::ThinkingProcess) -> crate::domain::ports::StoreResult<crate::domain::models::ThinkingProcess> { unimplemented!() }
            async fn update_thinking_process(&self, _: crate::domain::models::ThinkingProcess) -> crate::domain::ports::StoreResult<crate::domain::models::ThinkingProcess> { unimplemented!() }
            async fn get_thinking_process(&self, _: Uuid) -> crate::domain::ports::StoreResult<crate::domain::models::ThinkingProcess> { unimplemented!() }
            async fn list_thinking_processes(&self, _: Uuid, _: u32) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::ThinkingProcess>> { unimplemented!() }
            async fn insert_recovery_attempt(&self, _: crate::domain::models::RecoveryAttempt) -> crate::domain::ports::StoreResult<crate::domain::models::RecoveryAttempt> { unimplemented!() }
            async fn list_recovery_attempts(&self, _: Uuid) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::RecoveryAttempt>> { unimplemented!() }
            async fn insert_insight(&self, _: crate::domain::models::Insight) -> crate::domain::ports::StoreResult<crate::domain::models::Insight> { unimplemented!() }
            async fn get_insights(&self, _: Uuid, _: Option<Vec<String>>, _: u32) -> crate::domain::ports::StoreResult<Vec<crate::domain::models::Insight>> { unimplemented!() }
            async fn log_event(&self, _: Uuid, _: &str, _: serde_json::Value) -> crate::domain::ports::StoreResult<()> { unimplemented!() }
        }
        Arc::new(Unreachable)
    }
}
