use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{artifact_from_row, deliverable_from_row, map_sqlx};
use crate::domain::error::StoreError;
use crate::domain::models::{Artifact, Deliverable};

pub async fn insert_artifact(pool: &SqlitePool, artifact: Artifact) -> Result<Artifact, StoreError> {
    sqlx::query(
        "INSERT INTO artifacts (id, workspace_id, requirement_id, task_id, content, quality_score, status)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(artifact.id.to_string())
    .bind(artifact.workspace_id.to_string())
    .bind(artifact.requirement_id.to_string())
    .bind(artifact.task_id.to_string())
    .bind(serde_json::to_string(&artifact.content).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(artifact.quality_score)
    .bind(artifact.status.as_str())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(artifact)
}

pub async fn list_artifacts(pool: &SqlitePool, requirement_id: Uuid) -> Result<Vec<Artifact>, StoreError> {
    let rows = sqlx::query("SELECT * FROM artifacts WHERE requirement_id = ?")
        .bind(requirement_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    rows.iter().map(artifact_from_row).collect()
}

pub async fn insert_deliverable(pool: &SqlitePool, deliverable: Deliverable) -> Result<Deliverable, StoreError> {
    sqlx::query(
        "INSERT INTO deliverables (id, workspace_id, goal_id, title, summary, sections, quality_score, created_at, cache_key)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(goal_id) DO UPDATE SET title=excluded.title, summary=excluded.summary, sections=excluded.sections, quality_score=excluded.quality_score, cache_key=excluded.cache_key",
    )
    .bind(deliverable.id.to_string())
    .bind(deliverable.workspace_id.to_string())
    .bind(deliverable.goal_id.to_string())
    .bind(&deliverable.title)
    .bind(&deliverable.summary)
    .bind(serde_json::to_string(&deliverable.sections).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(deliverable.quality_score)
    .bind(deliverable.created_at.to_rfc3339())
    .bind(&deliverable.cache_key)
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(deliverable)
}

pub async fn get_deliverable(pool: &SqlitePool, goal_id: Uuid) -> Result<Option<Deliverable>, StoreError> {
    let row = sqlx::query("SELECT * FROM deliverables WHERE goal_id = ?")
        .bind(goal_id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?;
    row.as_ref().map(deliverable_from_row).transpose()
}
