use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{asset_requirement_from_row, map_sqlx};
use crate::domain::error::StoreError;
use crate::domain::models::{AssetRequirement, RequirementStatus};

pub async fn get_asset_requirements(pool: &SqlitePool, goal_id: Uuid) -> Result<Vec<AssetRequirement>, StoreError> {
    let rows = sqlx::query("SELECT * FROM asset_requirements WHERE goal_id = ?")
        .bind(goal_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    rows.iter().map(asset_requirement_from_row).collect()
}

pub async fn create_asset_requirement(
    pool: &SqlitePool,
    requirement: AssetRequirement,
) -> Result<AssetRequirement, StoreError> {
    sqlx::query(
        "INSERT INTO asset_requirements (id, goal_id, asset_name, asset_type, asset_format, acceptance_criteria, priority, business_value_score, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(requirement.id.to_string())
    .bind(requirement.goal_id.to_string())
    .bind(&requirement.asset_name)
    .bind(&requirement.asset_type)
    .bind(&requirement.asset_format)
    .bind(&requirement.acceptance_criteria)
    .bind(i64::from(requirement.priority))
    .bind(requirement.business_value_score)
    .bind(requirement.status.as_str())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(requirement)
}

pub async fn update_asset_requirement_status(
    pool: &SqlitePool,
    id: Uuid,
    status: RequirementStatus,
) -> Result<AssetRequirement, StoreError> {
    let result = sqlx::query("UPDATE asset_requirements SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    let row = sqlx::query("SELECT * FROM asset_requirements WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
    asset_requirement_from_row(&row)
}
