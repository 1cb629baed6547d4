use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{map_sqlx, recovery_attempt_from_row};
use crate::domain::error::StoreError;
use crate::domain::models::RecoveryAttempt;

pub async fn insert_recovery_attempt(pool: &SqlitePool, attempt: RecoveryAttempt) -> Result<RecoveryAttempt, StoreError> {
    sqlx::query(
        "INSERT INTO recovery_attempts (task_id, attempt_number, strategy, confidence, delay_seconds, reasoning, success, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(attempt.task_id.to_string())
    .bind(i64::from(attempt.attempt_number))
    .bind(attempt.strategy.as_str())
    .bind(attempt.confidence)
    .bind(attempt.delay_seconds as i64)
    .bind(&attempt.reasoning)
    .bind(attempt.success.map(i64::from))
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(attempt)
}

pub async fn list_recovery_attempts(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<RecoveryAttempt>, StoreError> {
    let rows = sqlx::query("SELECT * FROM recovery_attempts WHERE task_id = ? ORDER BY attempt_number ASC")
        .bind(task_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    rows.iter().map(recovery_attempt_from_row).collect()
}
