use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{insight_from_row, map_sqlx};
use crate::domain::error::StoreError;
use crate::domain::models::Insight;

pub async fn insert_insight(pool: &SqlitePool, insight: Insight) -> Result<Insight, StoreError> {
    sqlx::query("INSERT INTO insights (id, workspace_id, insight_type, content, tags, confidence, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
        .bind(insight.id.to_string())
        .bind(insight.workspace_id.to_string())
        .bind(insight.insight_type.as_str())
        .bind(&insight.content)
        .bind(serde_json::to_string(&insight.tags).map_err(|e| StoreError::Invalid(e.to_string()))?)
        .bind(insight.confidence)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(insight)
}

pub async fn get_insights(
    pool: &SqlitePool,
    workspace_id: Uuid,
    tags: Option<Vec<String>>,
    limit: u32,
) -> Result<Vec<Insight>, StoreError> {
    let rows = sqlx::query("SELECT * FROM insights WHERE workspace_id = ? ORDER BY created_at DESC LIMIT ?")
        .bind(workspace_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    let insights: Vec<Insight> = rows.iter().map(insight_from_row).collect::<Result<_, _>>()?;
    match tags {
        None => Ok(insights),
        Some(tags) => Ok(insights.into_iter().filter(|i| tags.iter().any(|t| i.has_tag(t))).collect()),
    }
}

pub async fn log_event(pool: &SqlitePool, workspace_id: Uuid, event_type: &str, payload: serde_json::Value) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO events (workspace_id, event_type, payload, recorded_at) VALUES (?, ?, ?, ?)")
        .bind(workspace_id.to_string())
        .bind(event_type)
        .bind(payload.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(())
}
