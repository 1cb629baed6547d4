//! Wires every port to a concrete adapter and builds the application-layer
//! components into one `Services` bundle.
//!
//! Every collaborator — store, agent runtime, telemetry, clock, config — is
//! passed in explicitly rather than reached for through a global or
//! singleton, so a process (or a test) can swap any one of them without
//! touching the others.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{create_migrated_test_pool, initialize_database, SqliteStore};
use crate::adapters::substrates::anthropic_api::{AnthropicApiConfig, AnthropicApiRuntime};
use crate::adapters::substrates::mock::MockAgentRuntime;
use crate::adapters::telemetry::TracingTelemetry;
use crate::application::{
    DeliverableEngine, Executor, GoalMonitor, GoalValidator, HealthManager, RecoveryAnalyser,
    TaskPlanner, ThinkingRecorder,
};
use crate::domain::models::Config;
use crate::domain::ports::{AgentRuntime, Clock, Store, SystemClock, Telemetry};

/// Every running part of the orchestrator, built once per process.
pub struct Services {
    pub store: Arc<dyn Store>,
    pub agent_runtime: Arc<dyn AgentRuntime>,
    pub telemetry: Arc<dyn Telemetry>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub thinking_recorder: Arc<ThinkingRecorder>,
    pub recovery_analyser: Arc<RecoveryAnalyser>,
    pub deliverable_engine: Arc<DeliverableEngine>,
    pub task_planner: Arc<TaskPlanner>,
    pub goal_validator: Arc<GoalValidator>,
    pub health_manager: Arc<HealthManager>,
    pub executor: Arc<Executor>,
    pub goal_monitor: Arc<GoalMonitor>,
}

impl Services {
    /// Builds the production bundle: a file-backed SQLite store at
    /// `config.database.path`, the real Anthropic runtime when an API key is
    /// available (falling back to the mock runtime otherwise so a process
    /// never fails to start just because a key wasn't provided yet), and the
    /// broadcast-backed telemetry adapter.
    pub async fn build(config: Config) -> Result<Self> {
        let database_url = format!("sqlite:{}", config.database.path);
        let pool = initialize_database(&database_url).await.context("initializing database")?;
        let agent_runtime = select_agent_runtime(&config)?;
        Ok(Self::assemble(pool, agent_runtime, config))
    }

    /// Builds a bundle backed by an in-memory SQLite database — for
    /// integration tests and local experimentation that still want a real
    /// `Store` implementation rather than the unit-test-only in-memory
    /// fake.
    pub async fn build_for_testing(config: Config, agent_runtime: Arc<dyn AgentRuntime>) -> Result<Self> {
        let pool = create_migrated_test_pool().await.context("creating in-memory test database")?;
        Ok(Self::assemble(pool, agent_runtime, config))
    }

    fn assemble(pool: SqlitePool, agent_runtime: Arc<dyn AgentRuntime>, config: Config) -> Self {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
        let telemetry: Arc<dyn Telemetry> = Arc::new(TracingTelemetry::default());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let thinking_recorder = Arc::new(ThinkingRecorder::new(store.clone(), telemetry.clone(), clock.clone()));
        let recovery_analyser = Arc::new(
            RecoveryAnalyser::new(store.clone())
                .with_agent_runtime(agent_runtime.clone())
                .with_ai_enabled(config.enable_ai_recovery_decisions)
                .with_ai_model(config.ai_enhancement_model.clone()),
        );
        let deliverable_engine = Arc::new(
            DeliverableEngine::new(store.clone())
                .with_agent_runtime(agent_runtime.clone())
                .with_ai_enabled(config.enable_goal_driven_system)
                .with_ai_model(config.ai_enhancement_model.clone()),
        );
        let task_planner = Arc::new(
            TaskPlanner::new(store.clone(), deliverable_engine.clone())
                .with_max_tasks_per_cycle(config.max_goal_driven_tasks_per_cycle as usize)
                .with_agent_runtime(agent_runtime.clone())
                .with_ai_enabled(config.enable_goal_driven_system)
                .with_ai_model(config.ai_enhancement_model.clone()),
        );
        let goal_validator = Arc::new(GoalValidator::new(store.clone(), telemetry.clone(), task_planner.clone()));
        let health_manager = Arc::new(HealthManager::new(store.clone(), telemetry.clone()));

        let executor = Arc::new(
            Executor::new(
                store.clone(),
                agent_runtime.clone(),
                telemetry.clone(),
                clock.clone(),
                deliverable_engine.clone(),
                recovery_analyser.clone(),
                thinking_recorder.clone(),
                config.max_concurrent_tasks,
            )
            .with_max_recovery_attempts(config.max_recovery_attempts_per_task),
        );

        let goal_monitor = Arc::new(
            GoalMonitor::new(
                store.clone(),
                telemetry.clone(),
                clock.clone(),
                health_manager.clone(),
                goal_validator.clone(),
                task_planner.clone(),
                deliverable_engine.clone(),
                executor.clone(),
                config.goal_validation_interval_minutes,
            )
            .with_cache_limits(config.goal_monitor_cache_max_entries, config.goal_monitor_cache_ttl_seconds),
        );

        Self {
            store,
            agent_runtime,
            telemetry,
            clock,
            config,
            thinking_recorder,
            recovery_analyser,
            deliverable_engine,
            task_planner,
            goal_validator,
            health_manager,
            executor,
            goal_monitor,
        }
    }

    /// Starts the Executor's worker pool and the Goal Monitor's background
    /// loop. A no-op for the Executor if `config.disable_task_executor` is
    /// set — useful for a read-only/inspection process that must not claim
    /// tasks out from under a primary instance.
    pub async fn start(&self) -> Result<()> {
        if !self.config.disable_task_executor {
            self.executor.start().await.context("starting executor")?;
        }
        if self.config.enable_goal_driven_system {
            self.goal_monitor.start();
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.goal_monitor.stop();
        self.executor.stop().await.context("stopping executor")
    }
}

/// Prefers the real Anthropic runtime when a key is reachable (explicit
/// config or `ANTHROPIC_API_KEY`); otherwise falls back to the mock runtime
/// so the rest of the pipeline remains exercisable without credentials.
fn select_agent_runtime(config: &Config) -> Result<Arc<dyn AgentRuntime>> {
    let anthropic_config = AnthropicApiConfig::default();
    if anthropic_config.get_api_key().is_some() {
        let runtime = AnthropicApiRuntime::new(anthropic_config).map_err(|e| anyhow::anyhow!(e))?;
        return Ok(Arc::new(runtime));
    }
    tracing::warn!(
        model = %config.ai_enhancement_model,
        "ANTHROPIC_API_KEY not set; falling back to the mock agent runtime"
    );
    Ok(Arc::new(MockAgentRuntime::new()))
}
