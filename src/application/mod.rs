//! Application layer: the orchestration components (C4-C11) that sit
//! between the domain ports and a running process.
//!
//! Each component owns one responsibility from the reconciliation loop and
//! depends only on domain ports (`Store`, `AgentRuntime`, `Telemetry`,
//! `Clock`), never on a concrete adapter.

pub mod deliverable_engine;
pub mod executor;
pub mod goal_monitor;
pub mod goal_validator;
pub mod health_manager;
pub mod recovery_analyser;
pub mod task_planner;
pub mod thinking_recorder;

#[cfg(test)]
pub mod test_support;

pub use deliverable_engine::DeliverableEngine;
pub use executor::Executor;
pub use goal_monitor::GoalMonitor;
pub use goal_validator::GoalValidator;
pub use health_manager::HealthManager;
pub use recovery_analyser::RecoveryAnalyser;
pub use task_planner::TaskPlanner;
pub use thinking_recorder::ThinkingRecorder;
