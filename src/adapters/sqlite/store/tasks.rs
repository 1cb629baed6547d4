use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{map_sqlx, task_from_row};
use crate::domain::error::StoreError;
use crate::domain::ports::store::TaskFilter;
use crate::domain::models::{Task, TaskResult, TaskStatus};

pub async fn list_tasks(pool: &SqlitePool, workspace_id: Uuid, filter: Option<TaskFilter>) -> Result<Vec<Task>, StoreError> {
    let mut sql = "SELECT * FROM tasks WHERE workspace_id = ?".to_string();
    let filter = filter.unwrap_or_default();
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.goal_id.is_some() {
        sql.push_str(" AND goal_id = ?");
    }
    if filter.is_corrective.is_some() {
        sql.push_str(" AND is_corrective = ?");
    }
    let mut query = sqlx::query(&sql).bind(workspace_id.to_string());
    if let Some(s) = filter.status {
        query = query.bind(s.as_str());
    }
    if let Some(g) = filter.goal_id {
        query = query.bind(g.to_string());
    }
    if let Some(c) = filter.is_corrective {
        query = query.bind(i64::from(c));
    }
    let rows = query.fetch_all(pool).await.map_err(map_sqlx)?;
    rows.iter().map(task_from_row).collect()
}

pub async fn get_task(pool: &SqlitePool, id: Uuid) -> Result<Task, StoreError> {
    let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound(id))?;
    task_from_row(&row)
}

pub async fn create_task(pool: &SqlitePool, task: Task, idempotency_key: Option<String>) -> Result<Task, StoreError> {
    if let Some(ref key) = idempotency_key {
        if let Some(row) = sqlx::query("SELECT * FROM tasks WHERE idempotency_key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx)?
        {
            return task_from_row(&row);
        }
    }

    let task = Task { idempotency_key: idempotency_key.or(task.idempotency_key), ..task };

    sqlx::query(
        "INSERT INTO tasks (id, workspace_id, goal_id, asset_requirement_id, agent_id, assigned_role, name, description, status, priority, is_corrective, numerical_target, contribution_expected, recovery_count, created_at, updated_at, deadline, dependencies, context_data, result, idempotency_key, ai_generated)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task.id.to_string())
    .bind(task.workspace_id.to_string())
    .bind(task.goal_id.map(|u| u.to_string()))
    .bind(task.asset_requirement_id.map(|u| u.to_string()))
    .bind(task.agent_id.map(|u| u.to_string()))
    .bind(&task.assigned_role)
    .bind(&task.name)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(i64::from(task.is_corrective))
    .bind(task.numerical_target)
    .bind(task.contribution_expected)
    .bind(i64::from(task.recovery_count))
    .bind(task.created_at.to_rfc3339())
    .bind(task.updated_at.to_rfc3339())
    .bind(task.deadline.map(|t| t.to_rfc3339()))
    .bind(serde_json::to_string(&task.dependencies).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(serde_json::to_string(&task.context_data).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(task.result.as_ref().map(serde_json::to_string).transpose().map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(&task.idempotency_key)
    .bind(i64::from(task.ai_generated))
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            expected: "unique idempotency_key".into(),
            actual: "duplicate".into(),
        },
        _ => map_sqlx(e),
    })?;
    Ok(task)
}

pub async fn update_task_status(
    pool: &SqlitePool,
    id: Uuid,
    new_status: TaskStatus,
    result: Option<TaskResult>,
    expected_status: TaskStatus,
) -> Result<Task, StoreError> {
    let now = chrono::Utc::now();
    let result_json = result.as_ref().map(serde_json::to_string).transpose().map_err(|e| StoreError::Invalid(e.to_string()))?;
    let update = sqlx::query("UPDATE tasks SET status = ?, result = COALESCE(?, result), updated_at = ? WHERE id = ? AND status = ?")
        .bind(new_status.as_str())
        .bind(result_json)
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .bind(expected_status.as_str())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;

    if update.rows_affected() == 0 {
        let current = get_task(pool, id).await?;
        if current.status != expected_status {
            return Err(StoreError::Conflict { expected: expected_status.as_str().into(), actual: current.status.as_str().into() });
        }
        return Err(StoreError::NotFound(id));
    }
    get_task(pool, id).await
}

pub async fn increment_task_recovery_count(pool: &SqlitePool, id: Uuid) -> Result<Task, StoreError> {
    let result = sqlx::query("UPDATE tasks SET recovery_count = recovery_count + 1, updated_at = ? WHERE id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    get_task(pool, id).await
}

pub async fn find_active_corrective_task(pool: &SqlitePool, goal_id: Uuid) -> Result<Option<Task>, StoreError> {
    let row = sqlx::query(
        "SELECT * FROM tasks WHERE goal_id = ? AND is_corrective = 1 AND status NOT IN ('completed', 'failed') LIMIT 1",
    )
    .bind(goal_id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx)?;
    row.as_ref().map(task_from_row).transpose()
}
