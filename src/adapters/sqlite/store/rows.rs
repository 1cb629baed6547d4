//! Row <-> domain-model conversions shared by every store submodule.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::models::{
    Agent, AgentStatus, Artifact, ArtifactStatus, AssetRequirement, Deliverable, DeliverableSection, Goal,
    GoalPriority, GoalStatus, Insight, InsightType, LlmConfig, RecoveryAttempt, RecoveryStrategy, RequirementStatus,
    Seniority, Task, TaskPriority, TaskResult, TaskStatus, ThinkingProcess, ThinkingStep, Workspace, WorkspaceBudget,
    WorkspaceStatus,
};

pub fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Invalid(e.to_string()))
}

pub fn parse_optional_uuid(s: Option<String>) -> Result<Option<Uuid>, StoreError> {
    s.map(|s| parse_uuid(&s)).transpose()
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Invalid(e.to_string()))
}

pub fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

pub fn parse_json<T: serde::de::DeserializeOwned + Default>(s: Option<String>) -> Result<T, StoreError> {
    match s {
        None => Ok(T::default()),
        Some(s) if s.is_empty() => Ok(T::default()),
        Some(s) => serde_json::from_str(&s).map_err(|e| StoreError::Invalid(e.to_string())),
    }
}

pub fn workspace_from_row(row: &SqliteRow) -> Result<Workspace, StoreError> {
    Ok(Workspace {
        id: parse_uuid(row.try_get::<String, _>("id").map_err(map_sqlx)?.as_str())?,
        name: row.try_get("name").map_err(map_sqlx)?,
        goal_text: row.try_get("goal_text").map_err(map_sqlx)?,
        status: WorkspaceStatus::from_str(&row.try_get::<String, _>("status").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad workspace status".into()))?,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(map_sqlx)?)?,
        updated_at: parse_datetime(&row.try_get::<String, _>("updated_at").map_err(map_sqlx)?)?,
        budget: WorkspaceBudget {
            max_amount: row.try_get("budget_max_amount").map_err(map_sqlx)?,
            currency: row.try_get("budget_currency").map_err(map_sqlx)?,
        },
        processing_since: parse_optional_datetime(row.try_get("processing_since").map_err(map_sqlx)?)?,
    })
}

pub fn agent_from_row(row: &SqliteRow) -> Result<Agent, StoreError> {
    let skills: Vec<String> = parse_json(Some(row.try_get::<String, _>("skills").map_err(map_sqlx)?))?;
    Ok(Agent {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        role: row.try_get("role").map_err(map_sqlx)?,
        seniority: Seniority::from_str(&row.try_get::<String, _>("seniority").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad seniority".into()))?,
        status: AgentStatus::from_str(&row.try_get::<String, _>("status").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad agent status".into()))?,
        skills,
        llm_config: LlmConfig::new(row.try_get::<String, _>("llm_model").map_err(map_sqlx)?),
    })
}

pub fn goal_from_row(row: &SqliteRow) -> Result<Goal, StoreError> {
    Ok(Goal {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        metric_type: row.try_get("metric_type").map_err(map_sqlx)?,
        target_value: row.try_get("target_value").map_err(map_sqlx)?,
        current_value: row.try_get("current_value").map_err(map_sqlx)?,
        unit: row.try_get("unit").map_err(map_sqlx)?,
        priority: GoalPriority::new(row.try_get::<i64, _>("priority").map_err(map_sqlx)? as u8),
        status: GoalStatus::from_str(&row.try_get::<String, _>("status").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad goal status".into()))?,
        is_minimum: row.try_get::<i64, _>("is_minimum").map_err(map_sqlx)? != 0,
        last_validation_at: parse_optional_datetime(row.try_get("last_validation_at").map_err(map_sqlx)?)?,
        asset_requirements_count: row.try_get::<i64, _>("asset_requirements_count").map_err(map_sqlx)? as u32,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(map_sqlx)?)?,
        updated_at: parse_datetime(&row.try_get::<String, _>("updated_at").map_err(map_sqlx)?)?,
    })
}

pub fn task_from_row(row: &SqliteRow) -> Result<Task, StoreError> {
    let dependencies: Vec<Uuid> = parse_json(Some(row.try_get::<String, _>("dependencies").map_err(map_sqlx)?))?;
    let context_data = parse_json(Some(row.try_get::<String, _>("context_data").map_err(map_sqlx)?))?;
    let result: Option<TaskResult> = row
        .try_get::<Option<String>, _>("result")
        .map_err(map_sqlx)?
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::Invalid(e.to_string()))?;
    Ok(Task {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        goal_id: parse_optional_uuid(row.try_get("goal_id").map_err(map_sqlx)?)?,
        asset_requirement_id: parse_optional_uuid(row.try_get("asset_requirement_id").map_err(map_sqlx)?)?,
        agent_id: parse_optional_uuid(row.try_get("agent_id").map_err(map_sqlx)?)?,
        assigned_role: row.try_get("assigned_role").map_err(map_sqlx)?,
        name: row.try_get("name").map_err(map_sqlx)?,
        description: row.try_get("description").map_err(map_sqlx)?,
        status: TaskStatus::from_str(&row.try_get::<String, _>("status").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad task status".into()))?,
        priority: TaskPriority::from_str(&row.try_get::<String, _>("priority").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad task priority".into()))?,
        is_corrective: row.try_get::<i64, _>("is_corrective").map_err(map_sqlx)? != 0,
        numerical_target: row.try_get("numerical_target").map_err(map_sqlx)?,
        contribution_expected: row.try_get("contribution_expected").map_err(map_sqlx)?,
        recovery_count: row.try_get::<i64, _>("recovery_count").map_err(map_sqlx)? as u32,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(map_sqlx)?)?,
        updated_at: parse_datetime(&row.try_get::<String, _>("updated_at").map_err(map_sqlx)?)?,
        deadline: parse_optional_datetime(row.try_get("deadline").map_err(map_sqlx)?)?,
        dependencies,
        context_data,
        result,
        idempotency_key: row.try_get("idempotency_key").map_err(map_sqlx)?,
        ai_generated: row.try_get::<i64, _>("ai_generated").map_err(map_sqlx)? != 0,
    })
}

pub fn asset_requirement_from_row(row: &SqliteRow) -> Result<AssetRequirement, StoreError> {
    Ok(AssetRequirement {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        goal_id: parse_uuid(&row.try_get::<String, _>("goal_id").map_err(map_sqlx)?)?,
        asset_name: row.try_get("asset_name").map_err(map_sqlx)?,
        asset_type: row.try_get("asset_type").map_err(map_sqlx)?,
        asset_format: row.try_get("asset_format").map_err(map_sqlx)?,
        acceptance_criteria: row.try_get("acceptance_criteria").map_err(map_sqlx)?,
        priority: row.try_get::<i64, _>("priority").map_err(map_sqlx)? as u8,
        business_value_score: row.try_get("business_value_score").map_err(map_sqlx)?,
        status: RequirementStatus::from_str(&row.try_get::<String, _>("status").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad requirement status".into()))?,
    })
}

pub fn artifact_from_row(row: &SqliteRow) -> Result<Artifact, StoreError> {
    Ok(Artifact {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        requirement_id: parse_uuid(&row.try_get::<String, _>("requirement_id").map_err(map_sqlx)?)?,
        task_id: parse_uuid(&row.try_get::<String, _>("task_id").map_err(map_sqlx)?)?,
        content: parse_json(Some(row.try_get::<String, _>("content").map_err(map_sqlx)?))?,
        quality_score: row.try_get("quality_score").map_err(map_sqlx)?,
        status: ArtifactStatus::from_str(&row.try_get::<String, _>("status").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad artifact status".into()))?,
    })
}

pub fn deliverable_from_row(row: &SqliteRow) -> Result<Deliverable, StoreError> {
    let sections: Vec<DeliverableSection> = parse_json(Some(row.try_get::<String, _>("sections").map_err(map_sqlx)?))?;
    Ok(Deliverable {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        goal_id: parse_uuid(&row.try_get::<String, _>("goal_id").map_err(map_sqlx)?)?,
        title: row.try_get("title").map_err(map_sqlx)?,
        summary: row.try_get("summary").map_err(map_sqlx)?,
        sections,
        quality_score: row.try_get("quality_score").map_err(map_sqlx)?,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(map_sqlx)?)?,
        cache_key: row.try_get("cache_key").map_err(map_sqlx)?,
    })
}

pub fn thinking_process_from_row(row: &SqliteRow) -> Result<ThinkingProcess, StoreError> {
    let steps: Vec<ThinkingStep> = parse_json(Some(row.try_get::<String, _>("steps").map_err(map_sqlx)?))?;
    let summary_metadata: Option<String> = row.try_get("summary_metadata").map_err(map_sqlx)?;
    Ok(ThinkingProcess {
        process_id: parse_uuid(&row.try_get::<String, _>("process_id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        context: row.try_get("context").map_err(map_sqlx)?,
        title: row.try_get("title").map_err(map_sqlx)?,
        steps,
        final_conclusion: row.try_get("final_conclusion").map_err(map_sqlx)?,
        overall_confidence: row.try_get("overall_confidence").map_err(map_sqlx)?,
        started_at: parse_datetime(&row.try_get::<String, _>("started_at").map_err(map_sqlx)?)?,
        completed_at: parse_optional_datetime(row.try_get("completed_at").map_err(map_sqlx)?)?,
        summary_metadata: summary_metadata
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| StoreError::Invalid(e.to_string()))?,
    })
}

pub fn recovery_attempt_from_row(row: &SqliteRow) -> Result<RecoveryAttempt, StoreError> {
    Ok(RecoveryAttempt {
        task_id: parse_uuid(&row.try_get::<String, _>("task_id").map_err(map_sqlx)?)?,
        attempt_number: row.try_get::<i64, _>("attempt_number").map_err(map_sqlx)? as u32,
        strategy: RecoveryStrategy::from_str(&row.try_get::<String, _>("strategy").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad recovery strategy".into()))?,
        confidence: row.try_get("confidence").map_err(map_sqlx)?,
        delay_seconds: row.try_get::<i64, _>("delay_seconds").map_err(map_sqlx)? as u64,
        reasoning: row.try_get("reasoning").map_err(map_sqlx)?,
        success: row.try_get::<Option<i64>, _>("success").map_err(map_sqlx)?.map(|v| v != 0),
    })
}

pub fn insight_from_row(row: &SqliteRow) -> Result<Insight, StoreError> {
    let tags: Vec<String> = parse_json(Some(row.try_get::<String, _>("tags").map_err(map_sqlx)?))?;
    Ok(Insight {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(map_sqlx)?)?,
        workspace_id: parse_uuid(&row.try_get::<String, _>("workspace_id").map_err(map_sqlx)?)?,
        insight_type: InsightType::from_str(&row.try_get::<String, _>("insight_type").map_err(map_sqlx)?)
            .ok_or_else(|| StoreError::Invalid("bad insight type".into()))?,
        content: row.try_get("content").map_err(map_sqlx)?,
        tags,
        confidence: row.try_get("confidence").map_err(map_sqlx)?,
    })
}

pub fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound(Uuid::nil()),
        other => StoreError::Unavailable(other.to_string()),
    }
}
