//! Thinking Recorder (C4) — append-only reasoning trace per task or planning
//! episode, broadcast live via Telemetry as each step lands.

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::domain::models::{ThinkingProcess, ThinkingStep, ThinkingStepType};
use crate::domain::ports::{Clock, Store, Telemetry};

pub struct ThinkingRecorder {
    store: Arc<dyn Store>,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
}

impl ThinkingRecorder {
    pub fn new(store: Arc<dyn Store>, telemetry: Arc<dyn Telemetry>, clock: Arc<dyn Clock>) -> Self {
        Self { store, telemetry, clock }
    }

    pub async fn start(&self, workspace_id: Uuid, context: impl Into<String>) -> Result<ThinkingProcess> {
        let context = context.into();
        let process = ThinkingProcess::start(workspace_id, context.clone());
        let process = self
            .store
            .start_thinking_process(process)
            .await
            .context("persisting new thinking process")?;

        self.telemetry
            .broadcast(
                "process_started",
                serde_json::json!({
                    "process_id": process.process_id,
                    "workspace_id": workspace_id,
                    "context": context,
                }),
            )
            .await;

        Ok(process)
    }

    /// Appends a step. Fails with `DomainError::ThinkingProcessSealed` (via the
    /// model's own check) if the process already completed; this error never
    /// hides as a silent no-op because callers depend on it to stop a
    /// finished worker from mutating a sealed trace.
    pub async fn append(
        &self,
        process_id: Uuid,
        step_type: ThinkingStepType,
        content: impl Into<String>,
        confidence: f64,
        metadata: Option<serde_json::Value>,
    ) -> Result<ThinkingProcess> {
        let mut process = self.store.get_thinking_process(process_id).await.context("loading thinking process")?;
        let content = content.into();
        let step = ThinkingStep {
            step_type,
            content: content.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: self.clock.now(),
            metadata: metadata.unwrap_or(serde_json::Value::Null),
        };
        process.append(step.clone()).map_err(|e| anyhow::anyhow!(e)).context("appending thinking step")?;
        let process = self.store.update_thinking_process(process).await.context("persisting appended step")?;

        self.telemetry
            .broadcast(
                "step_added",
                serde_json::json!({
                    "process_id": process_id,
                    "step": {
                        "type": step.step_type.as_str(),
                        "content": step.content,
                        "confidence": step.confidence,
                        "timestamp": step.timestamp,
                    },
                }),
            )
            .await;

        Ok(process)
    }

    /// Idempotent: completing an already-completed process is a no-op that
    /// returns the existing final state.
    pub async fn complete(
        &self,
        process_id: Uuid,
        conclusion: impl Into<String>,
        confidence: f64,
    ) -> Result<ThinkingProcess> {
        let mut process = self.store.get_thinking_process(process_id).await.context("loading thinking process")?;
        let was_active = process.is_active();
        process.complete(conclusion.into(), confidence.clamp(0.0, 1.0));
        let process = self.store.update_thinking_process(process).await.context("persisting completed process")?;

        if was_active {
            self.telemetry
                .broadcast(
                    "process_completed",
                    serde_json::json!({
                        "process_id": process_id,
                        "conclusion": process.final_conclusion,
                        "confidence": process.overall_confidence,
                        "total_steps": process.steps.len(),
                    }),
                )
                .await;
        }

        Ok(process)
    }

    pub async fn get(&self, process_id: Uuid) -> Result<ThinkingProcess> {
        self.store.get_thinking_process(process_id).await.context("loading thinking process")
    }

    pub async fn list(&self, workspace_id: Uuid, limit: u32) -> Result<Vec<ThinkingProcess>> {
        self.store.list_thinking_processes(workspace_id, limit).await.context("listing thinking processes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteStore};
    use crate::adapters::telemetry::TracingTelemetry;
    use crate::domain::ports::SystemClock;

    async fn recorder() -> ThinkingRecorder {
        let pool = create_migrated_test_pool().await.unwrap();
        ThinkingRecorder::new(
            Arc::new(SqliteStore::new(pool)),
            Arc::new(TracingTelemetry::default()),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn append_then_complete_seals_process() {
        let recorder = recorder().await;
        let workspace_id = Uuid::new_v4();
        let process = recorder.start(workspace_id, "plan bootstrap task").await.unwrap();

        recorder
            .append(process.process_id, ThinkingStepType::Analysis, "looking at the goal text", 0.8, None)
            .await
            .unwrap();
        let completed = recorder.complete(process.process_id, "plan ready", 0.9).await.unwrap();

        assert!(!completed.is_active());
        assert_eq!(completed.steps.len(), 1);
    }

    #[tokio::test]
    async fn append_after_completion_is_rejected() {
        let recorder = recorder().await;
        let process = recorder.start(Uuid::new_v4(), "ctx").await.unwrap();
        recorder.complete(process.process_id, "done", 1.0).await.unwrap();

        let result = recorder
            .append(process.process_id, ThinkingStepType::Reasoning, "too late", 0.5, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let recorder = recorder().await;
        let process = recorder.start(Uuid::new_v4(), "ctx").await.unwrap();
        recorder.complete(process.process_id, "first", 0.7).await.unwrap();
        let second = recorder.complete(process.process_id, "second", 0.9).await.unwrap();

        assert_eq!(second.final_conclusion.as_deref(), Some("first"));
    }
}
