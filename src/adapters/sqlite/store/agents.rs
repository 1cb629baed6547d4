use sqlx::SqlitePool;
use uuid::Uuid;

use super::rows::{agent_from_row, map_sqlx};
use crate::domain::error::StoreError;
use crate::domain::models::{Agent, AgentStatus};

pub async fn list_agents(pool: &SqlitePool, workspace_id: Uuid) -> Result<Vec<Agent>, StoreError> {
    let rows = sqlx::query("SELECT * FROM agents WHERE workspace_id = ?")
        .bind(workspace_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    rows.iter().map(agent_from_row).collect()
}

pub async fn get_agent(pool: &SqlitePool, id: Uuid) -> Result<Agent, StoreError> {
    let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound(id))?;
    agent_from_row(&row)
}

pub async fn create_agent(pool: &SqlitePool, agent: Agent) -> Result<Agent, StoreError> {
    sqlx::query(
        "INSERT INTO agents (id, workspace_id, role, seniority, status, skills, llm_model) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(agent.id.to_string())
    .bind(agent.workspace_id.to_string())
    .bind(&agent.role)
    .bind(agent.seniority.as_str())
    .bind(agent.status.as_str())
    .bind(serde_json::to_string(&agent.skills).map_err(|e| StoreError::Invalid(e.to_string()))?)
    .bind(&agent.llm_config.model)
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(agent)
}

pub async fn update_agent_status(pool: &SqlitePool, id: Uuid, new_status: AgentStatus) -> Result<Agent, StoreError> {
    let result = sqlx::query("UPDATE agents SET status = ? WHERE id = ?")
        .bind(new_status.as_str())
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    get_agent(pool, id).await
}
