//! `TracingTelemetry`: logs every event via `tracing` and rebroadcasts it
//! over a `tokio::sync::broadcast` channel for live subscribers (thinking
//! steps, recovery decisions, system alerts), the same pattern the teacher
//! uses for shutdown/event signaling in `SwarmOrchestrator`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::ports::telemetry::{AlertSeverity, AlertType, Telemetry};

/// A single broadcast frame. Subscribers that lag behind simply miss frames
/// (per `tokio::sync::broadcast` semantics) rather than blocking a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Event {
        event_type: String,
        payload: serde_json::Value,
    },
    Metric {
        name: String,
        value: f64,
        tags: Vec<(String, String)>,
    },
    Alert {
        workspace_id: Option<Uuid>,
        alert_type: AlertType,
        severity: AlertSeverity,
        description: String,
        component: String,
    },
}

pub struct TracingTelemetry {
    sender: broadcast::Sender<TelemetryEvent>,
}

impl TracingTelemetry {
    /// `capacity` bounds how many unread frames a lagging subscriber may miss
    /// before being dropped; 256 matches the teacher's shutdown-channel order
    /// of magnitude scaled up for higher-frequency thinking-step traffic.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: TelemetryEvent) {
        // No subscribers is the common case (no live dashboard attached); a
        // send error here is not a fault in this component.
        let _ = self.sender.send(event);
    }
}

impl Default for TracingTelemetry {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Telemetry for TracingTelemetry {
    async fn broadcast(&self, event_type: &str, payload: serde_json::Value) {
        tracing::info!(event_type, %payload, "telemetry event");
        self.send(TelemetryEvent::Event {
            event_type: event_type.to_string(),
            payload,
        });
    }

    async fn emit_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        tracing::debug!(metric = name, value, ?tags, "telemetry metric");
        self.send(TelemetryEvent::Metric {
            name: name.to_string(),
            value,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        });
    }

    async fn alert(
        &self,
        workspace_id: Option<Uuid>,
        alert_type: AlertType,
        severity: AlertSeverity,
        description: &str,
        component: &str,
    ) {
        match severity {
            AlertSeverity::Critical => {
                tracing::error!(?workspace_id, ?alert_type, component, "{description}")
            }
            AlertSeverity::Warning => {
                tracing::warn!(?workspace_id, ?alert_type, component, "{description}")
            }
        }
        self.send(TelemetryEvent::Alert {
            workspace_id,
            alert_type,
            severity,
            description: description.to_string(),
            component: component.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_broadcast_event() {
        let telemetry = TracingTelemetry::new(8);
        let mut rx = telemetry.subscribe();

        telemetry.broadcast("goal.validated", serde_json::json!({"goal_id": "abc"})).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, TelemetryEvent::Event { event_type, .. } if event_type == "goal.validated"));
    }

    #[tokio::test]
    async fn alert_without_subscribers_does_not_panic() {
        let telemetry = TracingTelemetry::default();
        telemetry
            .alert(None, AlertType::NoAgentsAtAll, AlertSeverity::Warning, "no agents", "health_manager")
            .await;
    }

    #[tokio::test]
    async fn metric_is_broadcast_with_tags() {
        let telemetry = TracingTelemetry::new(8);
        let mut rx = telemetry.subscribe();

        telemetry.emit_metric("task_queue_depth", 4.0, &[("workspace", "acme")]).await;

        let event = rx.recv().await.unwrap();
        match event {
            TelemetryEvent::Metric { name, value, tags } => {
                assert_eq!(name, "task_queue_depth");
                assert_eq!(value, 4.0);
                assert_eq!(tags, vec![("workspace".to_string(), "acme".to_string())]);
            }
            _ => panic!("expected metric event"),
        }
    }
}
