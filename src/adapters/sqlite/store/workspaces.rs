use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{map_sqlx, workspace_from_row};
use crate::domain::error::StoreError;
use crate::domain::models::{Workspace, WorkspaceStatus};

pub async fn get_workspace(pool: &SqlitePool, id: Uuid) -> Result<Workspace, StoreError> {
    let row = sqlx::query("SELECT * FROM workspaces WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound(id))?;
    workspace_from_row(&row)
}

pub async fn list_active_workspaces(pool: &SqlitePool) -> Result<Vec<Workspace>, StoreError> {
    let rows = sqlx::query("SELECT * FROM workspaces WHERE status NOT IN ('completed')")
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    rows.iter().map(workspace_from_row).collect()
}

pub async fn list_workspaces_with_pending_tasks(pool: &SqlitePool) -> Result<Vec<Workspace>, StoreError> {
    let rows = sqlx::query(
        "SELECT DISTINCT w.* FROM workspaces w
         JOIN tasks t ON t.workspace_id = w.id
         WHERE t.status = 'pending'",
    )
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    rows.iter().map(workspace_from_row).collect()
}

pub async fn create_workspace(pool: &SqlitePool, workspace: Workspace) -> Result<Workspace, StoreError> {
    sqlx::query(
        "INSERT INTO workspaces (id, name, goal_text, status, created_at, updated_at, budget_max_amount, budget_currency, processing_since)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(workspace.id.to_string())
    .bind(&workspace.name)
    .bind(&workspace.goal_text)
    .bind(workspace.status.as_str())
    .bind(workspace.created_at.to_rfc3339())
    .bind(workspace.updated_at.to_rfc3339())
    .bind(workspace.budget.max_amount)
    .bind(&workspace.budget.currency)
    .bind(workspace.processing_since.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(workspace)
}

pub async fn update_workspace_status(
    pool: &SqlitePool,
    id: Uuid,
    new_status: WorkspaceStatus,
    expected_status: WorkspaceStatus,
) -> Result<Workspace, StoreError> {
    let now = chrono::Utc::now();
    let processing_since = if new_status == WorkspaceStatus::ProcessingTasks { Some(now.to_rfc3339()) } else { None };
    let result = sqlx::query(
        "UPDATE workspaces SET status = ?, updated_at = ?, processing_since = ? WHERE id = ? AND status = ?",
    )
    .bind(new_status.as_str())
    .bind(now.to_rfc3339())
    .bind(processing_since)
    .bind(id.to_string())
    .bind(expected_status.as_str())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;

    if result.rows_affected() == 0 {
        let current = get_workspace(pool, id).await?;
        if current.status != expected_status {
            return Err(StoreError::Conflict { expected: expected_status.as_str().into(), actual: current.status.as_str().into() });
        }
        return Err(StoreError::NotFound(id));
    }
    get_workspace(pool, id).await
}
