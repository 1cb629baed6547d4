use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{map_sqlx, thinking_process_from_row};
use crate::domain::error::StoreError;
use crate::domain::models::ThinkingProcess;

pub async fn start_thinking_process(pool: &SqlitePool, process: ThinkingProcess) -> Result<ThinkingProcess, StoreError> {
    sqlx::query(
        "INSERT INTO thinking_processes (process_id, workspace_id, context, title, steps, final_conclusion, overall_confidence, started_at, completed_at, summary_metadata)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(process.process_id.to_string())
    .bind(process.workspace_id.to_string())
    .bind(&process.context)
    .bind(&process.title)
    .bind(serde_json::to_string(&process.steps).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(&process.final_conclusion)
    .bind(process.overall_confidence)
    .bind(process.started_at.to_rfc3339())
    .bind(process.completed_at.map(|t| t.to_rfc3339()))
    .bind(process.summary_metadata.as_ref().map(serde_json::to_string).transpose().map_err(|e| StoreError::Invalid(e.to_string()))?)
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(process)
}

pub async fn update_thinking_process(pool: &SqlitePool, process: ThinkingProcess) -> Result<ThinkingProcess, StoreError> {
    let result = sqlx::query(
        "UPDATE thinking_processes SET title = ?, steps = ?, final_conclusion = ?, overall_confidence = ?, completed_at = ?, summary_metadata = ? WHERE process_id = ?",
    )
    .bind(&process.title)
    .bind(serde_json::to_string(&process.steps).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(&process.final_conclusion)
    .bind(process.overall_confidence)
    .bind(process.completed_at.map(|t| t.to_rfc3339()))
    .bind(process.summary_metadata.as_ref().map(serde_json::to_string).transpose().map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(process.process_id.to_string())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(process.process_id));
    }
    Ok(process)
}

pub async fn get_thinking_process(pool: &SqlitePool, process_id: Uuid) -> Result<ThinkingProcess, StoreError> {
    let row = sqlx::query("SELECT * FROM thinking_processes WHERE process_id = ?")
        .bind(process_id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound(process_id))?;
    thinking_process_from_row(&row)
}

pub async fn list_thinking_processes(pool: &SqlitePool, workspace_id: Uuid, limit: u32) -> Result<Vec<ThinkingProcess>, StoreError> {
    let rows = sqlx::query("SELECT * FROM thinking_processes WHERE workspace_id = ? ORDER BY started_at DESC LIMIT ?")
        .bind(workspace_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    rows.iter().map(thinking_process_from_row).collect()
}
