//! Foreman - autonomous goal-driven agent orchestrator.
//!
//! Plans, executes, validates, and recovers LLM-backed tasks without human
//! supervision. Organized as ports and adapters:
//! - `domain` — entities, invariants, and port traits (no I/O dependencies).
//! - `application` — the components that implement the orchestration loop.
//! - `adapters` — SQLite storage, agent runtimes, and telemetry.
//! - `services` — wires a concrete `Services` bundle for a process to run.

pub mod adapters;
pub mod application;
pub mod domain;
pub mod services;

pub use services::Services;
