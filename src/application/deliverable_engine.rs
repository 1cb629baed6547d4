//! Deliverable Engine (C8) — turns task output into scored artifacts and,
//! once a goal has enough of them, aggregates a final deliverable.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{
    Agent, Artifact, ArtifactStatus, AssetRequirement, Deliverable, DeliverableSection, Goal, Seniority, Task,
    TaskStatus,
};
use crate::domain::ports::{AgentRuntime, Store};

/// Highest-priority source: keywords already present on the goal record
/// itself (`metric_type`/`unit`), the way a caller-supplied goal classifies
/// its own target.
fn from_goal_metadata(goal: &Goal) -> Vec<AssetRequirement> {
    let lower = format!("{} {}", goal.metric_type, goal.unit).to_lowercase();
    let mut requirements = Vec::new();

    if lower.contains("contact") || lower.contains("lead") {
        requirements.push(
            AssetRequirement::new(goal.id, "contact database", "document", "json", "contacts[] with verified emails")
                .with_priority(1)
                .with_business_value(0.8),
        );
    }
    if lower.contains("email") {
        requirements.push(
            AssetRequirement::new(goal.id, "email sequence", "document", "markdown", "subject + body per step")
                .with_priority(2)
                .with_business_value(0.6),
        );
    }
    if lower.contains("content") || lower.contains("post") || lower.contains("article") || lower.contains("blog") {
        requirements.push(
            AssetRequirement::new(goal.id, "content calendar", "document", "markdown", "scheduled posts with copy")
                .with_priority(2)
                .with_business_value(0.6),
        );
    }
    requirements
}

fn strip_verb_prefix(name: &str) -> String {
    for prefix in ["Plan ", "Create ", "Draft ", "Produce ", "Research "] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    name.to_string()
}

/// Second-priority source: a completed task already carries a structured
/// result, so the shape it actually produced is more reliable than a guess.
fn from_completed_tasks(goal: &Goal, tasks: &[&Task]) -> Vec<AssetRequirement> {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| {
            let payload = t.result.as_ref()?.structured_payload.as_ref()?;
            let asset_name = strip_verb_prefix(&t.name);
            let asset_type = if payload.get("contacts").is_some() { "contact_database" } else { "document" };
            Some(
                AssetRequirement::new(goal.id, asset_name, asset_type, "json", "matches the structured output already produced")
                    .with_priority(2)
                    .with_business_value(0.65),
            )
        })
        .collect()
}

/// Third-priority source: a task already queued or in flight implies the
/// asset it names, even before it has produced anything.
fn from_pending_tasks(goal: &Goal, tasks: &[&Task]) -> Vec<AssetRequirement> {
    tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Queued | TaskStatus::InProgress))
        .filter(|t| t.name.starts_with("Create ") || t.name.starts_with("Produce "))
        .map(|t| {
            AssetRequirement::new(goal.id, strip_verb_prefix(&t.name), "document", "markdown", "inferred from an in-flight task name")
                .with_priority(3)
                .with_business_value(0.4)
        })
        .collect()
}

fn push_unique(requirements: &mut Vec<AssetRequirement>, seen: &mut HashSet<String>, candidate: AssetRequirement) {
    if requirements.len() >= 5 {
        return;
    }
    if seen.insert(candidate.asset_name.to_lowercase()) {
        requirements.push(candidate);
    }
}

/// Per-type schema checks. Never fails the caller; violations surface as a
/// non-empty error list instead.
fn validate_payload(asset_type: &str, payload: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    match asset_type {
        "contact_database" => {
            if !payload.get("contacts").is_some_and(serde_json::Value::is_array) {
                errors.push("missing contacts[] array".to_string());
            }
            match payload.get("total_contacts").and_then(serde_json::Value::as_i64) {
                Some(n) if n >= 0 => {}
                _ => errors.push("total_contacts must be a non-negative integer".to_string()),
            }
            match payload.get("quality_score").and_then(serde_json::Value::as_f64) {
                Some(q) if (0.0..=1.0).contains(&q) => {}
                _ => errors.push("quality_score must be in [0, 1]".to_string()),
            }
        }
        _ => {
            if payload.is_null() {
                errors.push("payload is empty".to_string());
            }
        }
    }
    errors
}

fn quality_score_from_payload(payload: &serde_json::Value, errors: &[String]) -> f64 {
    if !errors.is_empty() {
        return 30.0;
    }
    payload.get("quality_score").and_then(serde_json::Value::as_f64).map_or(70.0, |q| q * 100.0)
}

/// Recovers a best-effort summary from a task's structured payload even when
/// it doesn't parse as the expected shape, per the progressive-recovery
/// contract: structured JSON, then regex fields, then the free-text summary,
/// then a synthesised minimal line.
fn recover_summary(task: &Task, goal_context: &str) -> String {
    let Some(result) = &task.result else {
        return format!("{} has not produced output yet for goal '{}'.", task.name, goal_context);
    };
    if let Some(payload) = &result.structured_payload {
        if let Some(summary) = payload.get("summary").and_then(serde_json::Value::as_str) {
            return summary.to_string();
        }
        return payload.to_string();
    }
    if let Some(output) = &result.output {
        if !output.trim().is_empty() {
            return output.clone();
        }
    }
    format!("{} completed with status '{}', no further detail recovered.", task.name, result.status_detail)
}

fn content_hash(tasks: &[Task]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for task in tasks {
        task.id.hash(&mut hasher);
        task.name.hash(&mut hasher);
        if let Some(result) = &task.result {
            if let Some(output) = &result.output {
                output.chars().take(500).collect::<String>().hash(&mut hasher);
            }
            if let Some(payload) = &result.structured_payload {
                payload.to_string().chars().take(500).collect::<String>().hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

fn latest_update(tasks: &[Task]) -> DateTime<Utc> {
    tasks.iter().map(|t| t.updated_at).max().unwrap_or_else(Utc::now)
}

pub struct DeliverableEngine {
    store: Arc<dyn Store>,
    agent_runtime: Option<Arc<dyn AgentRuntime>>,
    ai_enabled: bool,
    ai_model: String,
}

impl DeliverableEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, agent_runtime: None, ai_enabled: false, ai_model: "gpt-4o-mini".to_string() }
    }

    pub fn with_agent_runtime(mut self, agent_runtime: Arc<dyn AgentRuntime>) -> Self {
        self.agent_runtime = Some(agent_runtime);
        self
    }

    pub fn with_ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    pub fn with_ai_model(mut self, model: impl Into<String>) -> Self {
        self.ai_model = model.into();
        self
    }

    /// Ensures asset requirements exist for a goal, invoking the generator
    /// on demand. Called by the Task Planner before it plans tasks.
    pub async fn ensure_requirements(&self, goal: &Goal) -> Result<Vec<AssetRequirement>> {
        let existing = self.store.get_asset_requirements(goal.id).await.context("loading asset requirements")?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let mut created = Vec::new();
        for requirement in self.generate_requirements(goal).await.context("generating asset requirements")? {
            created.push(self.store.create_asset_requirement(requirement).await.context("creating asset requirement")?);
        }
        Ok(created)
    }

    /// Merges requirement sources in priority order — goal metadata,
    /// completed-task results, pending-task inference, then the LLM fills
    /// any remaining slots up to the 3-5 target — deduplicating by asset
    /// name as each source is folded in.
    async fn generate_requirements(&self, goal: &Goal) -> Result<Vec<AssetRequirement>> {
        let mut requirements = Vec::new();
        let mut seen = HashSet::new();

        for candidate in from_goal_metadata(goal) {
            push_unique(&mut requirements, &mut seen, candidate);
        }

        let tasks = self.store.list_tasks(goal.workspace_id, None).await.context("loading tasks for requirement inference")?;
        let goal_tasks: Vec<&Task> = tasks.iter().filter(|t| t.goal_id == Some(goal.id)).collect();

        for candidate in from_completed_tasks(goal, &goal_tasks) {
            push_unique(&mut requirements, &mut seen, candidate);
        }
        for candidate in from_pending_tasks(goal, &goal_tasks) {
            push_unique(&mut requirements, &mut seen, candidate);
        }

        if requirements.len() < 3 {
            if let Some(llm_candidates) = self.llm_requirements(goal).await {
                for candidate in llm_candidates {
                    push_unique(&mut requirements, &mut seen, candidate);
                }
            }
        }

        if requirements.is_empty() {
            requirements.push(
                AssetRequirement::new(goal.id, "deliverable summary", "document", "markdown", "addresses the goal text")
                    .with_priority(2)
                    .with_business_value(0.5),
            );
        }
        requirements.truncate(5);
        Ok(requirements)
    }

    /// Last-resort source: asks the LLM to derive 3-5 requirements directly
    /// from the goal's metric. Returns `None` on disabled/unavailable/
    /// malformed responses so the caller keeps whatever it already merged.
    async fn llm_requirements(&self, goal: &Goal) -> Option<Vec<AssetRequirement>> {
        if !self.ai_enabled {
            return None;
        }
        let runtime = self.agent_runtime.as_ref()?;
        if !matches!(runtime.is_available().await, Ok(true)) {
            return None;
        }

        let prompt = format!(
            "Derive 3-5 concrete asset requirements that would satisfy this goal. Respond with JSON \
             {{\"requirements\": [{{\"asset_name\": \"<string>\", \"asset_type\": \"<string>\", \
             \"asset_format\": \"<string>\", \"acceptance_criteria\": \"<string>\", \"priority\": <1-3>, \
             \"business_value_score\": <0-1>}}]}}.\n\
             goal_metric_type: {}\ngoal_target: {}\ngoal_unit: {}",
            goal.metric_type, goal.target_value, goal.unit
        );
        let task = Task::new(goal.workspace_id, "requirement-generation", prompt);
        let agent = Agent::new(goal.workspace_id, "deliverable-engine", Seniority::Expert, self.ai_model.clone());
        let deadline = Utc::now() + chrono::Duration::seconds(20);

        let output = runtime.execute(&task, &agent, deadline).await.ok()?;
        let payload = output.structured_payload?;
        let entries = payload.get("requirements").and_then(serde_json::Value::as_array)?;

        let mut requirements = Vec::new();
        for entry in entries.iter().take(5) {
            let asset_name = entry.get("asset_name").and_then(serde_json::Value::as_str)?.to_string();
            let asset_type = entry.get("asset_type").and_then(serde_json::Value::as_str).unwrap_or("document").to_string();
            let asset_format = entry.get("asset_format").and_then(serde_json::Value::as_str).unwrap_or("markdown").to_string();
            let acceptance_criteria = entry
                .get("acceptance_criteria")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("addresses the goal text")
                .to_string();
            let priority = entry.get("priority").and_then(serde_json::Value::as_u64).map(|p| p as u8).unwrap_or(2);
            let business_value = entry.get("business_value_score").and_then(serde_json::Value::as_f64).unwrap_or(0.5);
            requirements.push(
                AssetRequirement::new(goal.id, asset_name, asset_type, asset_format, acceptance_criteria)
                    .with_priority(priority)
                    .with_business_value(business_value),
            );
        }
        if requirements.is_empty() {
            None
        } else {
            Some(requirements)
        }
    }

    /// Structures a completed task's output into an `Artifact` scored
    /// against its requirement's schema.
    pub async fn structure_output(&self, task: &Task, requirement: &AssetRequirement) -> Result<Artifact> {
        let payload = task
            .result
            .as_ref()
            .and_then(|r| r.structured_payload.clone())
            .unwrap_or_else(|| serde_json::json!({ "summary": recover_summary(task, &requirement.asset_name) }));

        let errors = validate_payload(&requirement.asset_type, &payload);
        let score = quality_score_from_payload(&payload, &errors);

        let mut artifact = Artifact::new(task.workspace_id, requirement.id, task.id, payload).score(score);
        if errors.is_empty() && score >= 50.0 {
            artifact.transition_to(ArtifactStatus::Approved).ok();
        }
        self.store.insert_artifact(artifact.clone()).await.context("persisting artifact")?;
        Ok(artifact)
    }

    /// Aggregates approved artifacts for a goal into a final deliverable,
    /// reusing the cached one if nothing relevant changed.
    pub async fn aggregate(&self, goal: &Goal) -> Result<Deliverable> {
        let tasks = self.store.list_tasks(goal.workspace_id, None).await.context("loading tasks for aggregation")?;
        let goal_tasks: Vec<Task> = tasks.into_iter().filter(|t| t.goal_id == Some(goal.id)).collect();
        let cache_key_update = latest_update(&goal_tasks);
        let hash = content_hash(&goal_tasks);

        if let Some(existing) = self.store.get_deliverable(goal.id).await.context("checking deliverable cache")? {
            if existing.is_cache_valid(cache_key_update, hash) {
                return Ok(existing);
            }
        }

        let requirements = self.store.get_asset_requirements(goal.id).await.context("loading requirements")?;
        let mut deliverable =
            Deliverable::new(goal.workspace_id, goal.id, format!("Deliverable: {}", goal.metric_type), String::new());

        let mut total_score = 0.0;
        let mut section_count = 0.0;
        for requirement in &requirements {
            let artifacts = self.store.list_artifacts(requirement.id).await.context("loading artifacts")?;
            let approved: Vec<_> = artifacts.into_iter().filter(|a| a.status == ArtifactStatus::Approved).collect();
            if approved.is_empty() {
                continue;
            }
            let avg_score = approved.iter().map(|a| a.quality_score).sum::<f64>() / approved.len() as f64;
            let content = approved
                .iter()
                .map(|a| a.content.to_string())
                .collect::<Vec<_>>()
                .join("\n\n");
            deliverable = deliverable.with_section(DeliverableSection {
                title: requirement.asset_name.clone(),
                content,
                source_artifact_ids: approved.iter().map(|a| a.id).collect(),
            });
            total_score += avg_score;
            section_count += 1.0;
        }

        let overall_score = if section_count > 0.0 { total_score / section_count } else { 0.0 };
        let summary = if deliverable.sections.is_empty() {
            format!(
                "No approved artifacts yet for '{}'; status reflects work in progress.",
                goal.metric_type
            )
        } else {
            format!("{} section(s) addressing '{}'.", deliverable.sections.len(), goal.metric_type)
        };

        let deliverable = deliverable
            .with_quality_score(overall_score)
            .with_cache_key(cache_key_update, hash);
        let deliverable = Deliverable { summary, ..deliverable };

        self.store.insert_deliverable(deliverable.clone()).await.context("persisting deliverable")
    }
}
