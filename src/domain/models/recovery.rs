//! RecoveryAttempt domain model — the Recovery Analyser's decision record for a failed task.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The action ordered by the Recovery Analyser for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    ImmediateRetry,
    ExponentialBackoff,
    LinearBackoff,
    CircuitBreaker,
    Abandon,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmediateRetry => "immediate_retry",
            Self::ExponentialBackoff => "exponential_backoff",
            Self::LinearBackoff => "linear_backoff",
            Self::CircuitBreaker => "circuit_breaker",
            Self::Abandon => "abandon",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "immediate_retry" => Some(Self::ImmediateRetry),
            "exponential_backoff" => Some(Self::ExponentialBackoff),
            "linear_backoff" => Some(Self::LinearBackoff),
            "circuit_breaker" => Some(Self::CircuitBreaker),
            "abandon" => Some(Self::Abandon),
            _ => None,
        }
    }

    /// Delay in seconds before the retry is eligible to run, per §4.5's
    /// delay computation table. `attempt_number` is 1-based.
    pub fn delay_seconds(&self, base_seconds: u64, attempt_number: u32) -> u64 {
        match self {
            Self::ImmediateRetry => 0,
            Self::ExponentialBackoff => {
                let exp = attempt_number.saturating_sub(1).min(32);
                base_seconds.saturating_mul(2u64.saturating_pow(exp)).min(300)
            }
            Self::LinearBackoff => base_seconds.saturating_mul(u64::from(attempt_number)).min(600),
            Self::CircuitBreaker => 1800,
            Self::Abandon => 0,
        }
    }
}

/// A single recovery decision recorded for one failed task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub task_id: Uuid,
    pub attempt_number: u32,
    pub strategy: RecoveryStrategy,
    /// `[0, 1]`, confidence the Recovery Analyser has in this decision.
    pub confidence: f64,
    pub delay_seconds: u64,
    pub reasoning: String,
    /// `None` until the retried task itself resolves.
    pub success: Option<bool>,
}

impl RecoveryAttempt {
    pub fn new(
        task_id: Uuid,
        attempt_number: u32,
        strategy: RecoveryStrategy,
        confidence: f64,
        base_delay_seconds: u64,
        reasoning: impl Into<String>,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            task_id,
            attempt_number,
            delay_seconds: strategy.delay_seconds(base_delay_seconds, attempt_number),
            strategy,
            confidence,
            reasoning: reasoning.into(),
            success: None,
        }
    }

    pub fn resolve(&mut self, success: bool) {
        self.success = Some(success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        assert_eq!(RecoveryStrategy::ExponentialBackoff.delay_seconds(10, 1), 10);
        assert_eq!(RecoveryStrategy::ExponentialBackoff.delay_seconds(10, 2), 20);
        assert_eq!(RecoveryStrategy::ExponentialBackoff.delay_seconds(10, 3), 40);
        assert_eq!(RecoveryStrategy::ExponentialBackoff.delay_seconds(200, 10), 300);
    }

    #[test]
    fn linear_backoff_scales_and_caps() {
        assert_eq!(RecoveryStrategy::LinearBackoff.delay_seconds(100, 3), 300);
        assert_eq!(RecoveryStrategy::LinearBackoff.delay_seconds(500, 5), 600);
    }

    #[test]
    fn circuit_breaker_is_fixed() {
        assert_eq!(RecoveryStrategy::CircuitBreaker.delay_seconds(1, 99), 1800);
    }

    #[test]
    fn confidence_clamps() {
        let a = RecoveryAttempt::new(Uuid::new_v4(), 1, RecoveryStrategy::ImmediateRetry, 1.5, 5, "quality gate");
        assert!((a.confidence - 1.0).abs() < f64::EPSILON);
    }
}
