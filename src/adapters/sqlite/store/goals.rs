use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{goal_from_row, map_sqlx};
use crate::domain::error::StoreError;
use crate::domain::models::{Goal, GoalStatus};

pub async fn list_active_goals(pool: &SqlitePool) -> Result<Vec<Goal>, StoreError> {
    let rows = sqlx::query("SELECT * FROM goals WHERE status = 'active'").fetch_all(pool).await.map_err(map_sqlx)?;
    rows.iter().map(goal_from_row).collect()
}

pub async fn list_workspace_goals(
    pool: &SqlitePool,
    workspace_id: Uuid,
    status: Option<GoalStatus>,
) -> Result<Vec<Goal>, StoreError> {
    let rows = match status {
        Some(s) => sqlx::query("SELECT * FROM goals WHERE workspace_id = ? AND status = ?")
            .bind(workspace_id.to_string())
            .bind(s.as_str())
            .fetch_all(pool)
            .await,
        None => sqlx::query("SELECT * FROM goals WHERE workspace_id = ?")
            .bind(workspace_id.to_string())
            .fetch_all(pool)
            .await,
    }
    .map_err(map_sqlx)?;
    rows.iter().map(goal_from_row).collect()
}

pub async fn get_goal(pool: &SqlitePool, id: Uuid) -> Result<Goal, StoreError> {
    let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound(id))?;
    goal_from_row(&row)
}

pub async fn create_goal(pool: &SqlitePool, goal: Goal) -> Result<Goal, StoreError> {
    sqlx::query(
        "INSERT INTO goals (id, workspace_id, metric_type, target_value, current_value, unit, priority, status, is_minimum, last_validation_at, asset_requirements_count, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(goal.id.to_string())
    .bind(goal.workspace_id.to_string())
    .bind(&goal.metric_type)
    .bind(goal.target_value)
    .bind(goal.current_value)
    .bind(&goal.unit)
    .bind(i64::from(goal.priority.value()))
    .bind(goal.status.as_str())
    .bind(i64::from(goal.is_minimum))
    .bind(goal.last_validation_at.map(|t| t.to_rfc3339()))
    .bind(i64::from(goal.asset_requirements_count))
    .bind(goal.created_at.to_rfc3339())
    .bind(goal.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(goal)
}

pub async fn update_goal(
    pool: &SqlitePool,
    id: Uuid,
    new_current_value: f64,
    new_status: GoalStatus,
    expected_current_value: f64,
) -> Result<Goal, StoreError> {
    let now = chrono::Utc::now();
    let result = sqlx::query(
        "UPDATE goals SET current_value = ?, status = ?, updated_at = ? WHERE id = ? AND current_value = ?",
    )
    .bind(new_current_value)
    .bind(new_status.as_str())
    .bind(now.to_rfc3339())
    .bind(id.to_string())
    .bind(expected_current_value)
    .execute(pool)
    .await
    .map_err(map_sqlx)?;

    if result.rows_affected() == 0 {
        let current = get_goal(pool, id).await?;
        if (current.current_value - expected_current_value).abs() > f64::EPSILON {
            return Err(StoreError::Conflict {
                expected: expected_current_value.to_string(),
                actual: current.current_value.to_string(),
            });
        }
        return Err(StoreError::NotFound(id));
    }
    get_goal(pool, id).await
}

pub async fn record_goal_validation(pool: &SqlitePool, id: Uuid) -> Result<Goal, StoreError> {
    let now = chrono::Utc::now();
    sqlx::query("UPDATE goals SET last_validation_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    get_goal(pool, id).await
}

pub async fn list_orphaned_goals(pool: &SqlitePool) -> Result<Vec<Goal>, StoreError> {
    let rows = sqlx::query(
        "SELECT g.* FROM goals g LEFT JOIN workspaces w ON w.id = g.workspace_id WHERE w.id IS NULL",
    )
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    rows.iter().map(goal_from_row).collect()
}

pub async fn delete_goal(pool: &SqlitePool, id: Uuid) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM goals WHERE id = ?").bind(id.to_string()).execute(pool).await.map_err(map_sqlx)?;
    Ok(())
}
