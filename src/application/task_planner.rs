//! Task Planner (C7) — turns a goal's asset requirements into a
//! prioritised, dependency-ordered batch of tasks within a per-cycle budget.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::deliverable_engine::DeliverableEngine;
use crate::domain::models::{Agent, AssetRequirement, Goal, Seniority, Task, TaskPriority};
use crate::domain::ports::{AgentRuntime, Store};

/// Kinds of generated work, mirroring the LLM-backed task schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Research,
    Creation,
    Analysis,
    Validation,
    Integration,
}

impl TaskType {
    fn weight(self) -> f64 {
        match self {
            Self::Integration => 3.5,
            Self::Creation => 3.0,
            Self::Analysis => 2.5,
            Self::Validation => 2.0,
            Self::Research => 2.0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Creation => "creation",
            Self::Analysis => "analysis",
            Self::Validation => "validation",
            Self::Integration => "integration",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "research" => Some(Self::Research),
            "creation" => Some(Self::Creation),
            "analysis" => Some(Self::Analysis),
            "validation" => Some(Self::Validation),
            "integration" => Some(Self::Integration),
            _ => None,
        }
    }
}

/// A planner-internal draft before dependency sequencing and the per-cycle
/// cap are applied.
struct Draft {
    name: String,
    description: String,
    task_type: TaskType,
    dependencies: Vec<String>,
    base_priority: u8,
    estimated_duration_hours: Option<f64>,
    success_criteria: Option<String>,
    quality_checkpoints: Vec<String>,
    required_skills: Vec<String>,
    tools_needed: Vec<String>,
}

fn string_array(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn base_score(priority: u8) -> f64 {
    f64::from(priority)
}

fn urgency_score(progress_fraction: f64) -> f64 {
    if progress_fraction < 0.3 {
        2.0
    } else if progress_fraction < 0.7 {
        1.0
    } else {
        0.0
    }
}

/// The deterministic fallback used when the LLM is unavailable: a
/// plan-then-create pair per `asset_type`.
fn template_drafts(requirement: &AssetRequirement) -> Vec<Draft> {
    let plan_name = format!("Plan {}", requirement.asset_name);
    let create_name = format!("Create {}", requirement.asset_name);
    vec![
        Draft {
            name: plan_name.clone(),
            description: format!("Outline the approach for {} ({})", requirement.asset_name, requirement.asset_type),
            task_type: TaskType::Research,
            dependencies: Vec::new(),
            base_priority: requirement.priority,
            estimated_duration_hours: None,
            success_criteria: None,
            quality_checkpoints: Vec::new(),
            required_skills: Vec::new(),
            tools_needed: Vec::new(),
        },
        Draft {
            name: create_name,
            description: format!("Produce {} satisfying: {}", requirement.asset_name, requirement.acceptance_criteria),
            task_type: TaskType::Creation,
            dependencies: vec![plan_name],
            base_priority: requirement.priority,
            estimated_duration_hours: None,
            success_criteria: None,
            quality_checkpoints: Vec::new(),
            required_skills: Vec::new(),
            tools_needed: Vec::new(),
        },
    ]
}

/// Parses the LLM's task-generation response into drafts, rejecting batches
/// outside the 2-5 task contract so the caller falls back to the template.
fn parse_llm_drafts(payload: &serde_json::Value, requirement: &AssetRequirement) -> Option<Vec<Draft>> {
    let entries = payload.get("tasks").and_then(serde_json::Value::as_array)?;
    let mut drafts = Vec::new();
    for entry in entries.iter().take(5) {
        let name = entry.get("name").and_then(serde_json::Value::as_str)?.to_string();
        let description = entry.get("description").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
        let task_type =
            entry.get("task_type").and_then(serde_json::Value::as_str).and_then(TaskType::from_str).unwrap_or(TaskType::Creation);
        let dependencies = string_array(entry.get("depends_on"));
        let estimated_duration_hours = entry.get("estimated_duration_hours").and_then(serde_json::Value::as_f64);
        let success_criteria = entry.get("success_criteria").and_then(serde_json::Value::as_str).map(str::to_string);
        drafts.push(Draft {
            name,
            description,
            task_type,
            dependencies,
            base_priority: requirement.priority,
            estimated_duration_hours,
            success_criteria,
            quality_checkpoints: string_array(entry.get("quality_checkpoints")),
            required_skills: string_array(entry.get("required_skills")),
            tools_needed: string_array(entry.get("tools_needed")),
        });
    }
    if drafts.len() < 2 {
        return None;
    }
    Some(drafts)
}

/// Topologically sorts drafts by named dependency, breaking ties by score
/// (higher first). Cyclic or dangling dependencies degrade to declaration
/// order rather than panicking — a malformed LLM plan must never wedge
/// the planner.
fn topo_sort(drafts: Vec<(Draft, f64)>) -> Vec<(Draft, f64)> {
    let by_name: HashMap<String, usize> =
        drafts.iter().enumerate().map(|(i, (draft, _))| (draft.name.clone(), i)).collect();
    let mut in_degree = vec![0usize; drafts.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); drafts.len()];

    for (i, (draft, _)) in drafts.iter().enumerate() {
        for dep in &draft.dependencies {
            if let Some(&dep_idx) = by_name.get(dep) {
                in_degree[i] += 1;
                dependents[dep_idx].push(i);
            }
        }
    }

    let mut ready: Vec<usize> = (0..drafts.len()).filter(|&i| in_degree[i] == 0).collect();
    ready.sort_by(|&a, &b| drafts[b].1.partial_cmp(&drafts[a].1).unwrap_or(std::cmp::Ordering::Equal));

    let mut order = Vec::with_capacity(drafts.len());
    let mut visited = vec![false; drafts.len()];
    while let Some(i) = ready.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        order.push(i);
        let mut newly_ready = Vec::new();
        for &dep in &dependents[i] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                newly_ready.push(dep);
            }
        }
        newly_ready.sort_by(|&a, &b| drafts[b].1.partial_cmp(&drafts[a].1).unwrap_or(std::cmp::Ordering::Equal));
        ready.extend(newly_ready);
        ready.sort_by(|&a, &b| drafts[b].1.partial_cmp(&drafts[a].1).unwrap_or(std::cmp::Ordering::Equal));
    }
    // Anything never freed (a cycle) is appended in original order.
    for (i, visited) in visited.iter().enumerate() {
        if !visited {
            order.push(i);
        }
    }

    let mut drafts: Vec<Option<(Draft, f64)>> = drafts.into_iter().map(Some).collect();
    order.into_iter().map(|i| drafts[i].take().expect("each index visited once")).collect()
}

pub struct TaskPlanner {
    store: Arc<dyn Store>,
    deliverable_engine: Arc<DeliverableEngine>,
    max_tasks_per_cycle: usize,
    /// `(workspace_id, metric_type) -> last corrective task creation`, the
    /// global cooldown guarding against corrective-task storms.
    corrective_cooldowns: Mutex<HashMap<(Uuid, String), chrono::DateTime<Utc>>>,
    cooldown_seconds: i64,
    agent_runtime: Option<Arc<dyn AgentRuntime>>,
    ai_enabled: bool,
    ai_model: String,
}

impl TaskPlanner {
    pub fn new(store: Arc<dyn Store>, deliverable_engine: Arc<DeliverableEngine>) -> Self {
        Self {
            store,
            deliverable_engine,
            max_tasks_per_cycle: 10,
            corrective_cooldowns: Mutex::new(HashMap::new()),
            cooldown_seconds: 300,
            agent_runtime: None,
            ai_enabled: false,
            ai_model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_max_tasks_per_cycle(mut self, max: usize) -> Self {
        self.max_tasks_per_cycle = max;
        self
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

    /// Generates 2-5 tasks for a requirement via the LLM, per the structured
    /// task schema. Returns `None` on disabled/unavailable/malformed
    /// responses so the caller falls back to the deterministic template.
    async fn llm_drafts(&self, goal: &Goal, requirement: &AssetRequirement) -> Option<Vec<Draft>> {
        if !self.ai_enabled {
            return None;
        }
        let runtime = self.agent_runtime.as_ref()?;
        if !matches!(runtime.is_available().await, Ok(true)) {
            return None;
        }

        let prompt = format!(
            "Generate 2-5 tasks that together satisfy this asset requirement. Respond with JSON \
             {{\"tasks\": [{{\"name\": \"<string>\", \"description\": \"<string>\", \
             \"task_type\": \"research|creation|analysis|validation|integration\", \
             \"depends_on\": [\"<earlier task name>\"], \"estimated_duration_hours\": <number>, \
             \"success_criteria\": \"<string>\", \"quality_checkpoints\": [\"<string>\"], \
             \"required_skills\": [\"<string>\"], \"tools_needed\": [\"<string>\"]}}]}}.\n\
             goal_metric_type: {}\ngoal_target: {}\nasset_name: {}\nasset_type: {}\nacceptance_criteria: {}",
            goal.metric_type, goal.target_value, requirement.asset_name, requirement.asset_type, requirement.acceptance_criteria
        );
        let task = Task::new(goal.workspace_id, "task-planning", prompt);
        let agent = Agent::new(goal.workspace_id, "task-planner", Seniority::Expert, self.ai_model.clone());
        let deadline = Utc::now() + Duration::seconds(20);

        let output = runtime.execute(&task, &agent, deadline).await.ok()?;
        let payload = output.structured_payload?;
        parse_llm_drafts(&payload, requirement)
    }

    /// Plans the full initial batch of tasks for a goal's asset requirements.
    pub async fn plan_initial(&self, goal: &Goal) -> Result<Vec<Task>> {
        let requirements = self.deliverable_engine.ensure_requirements(goal).await.context("ensuring asset requirements")?;
        let mut tasks = Vec::new();
        for requirement in &requirements {
            if requirement.status == crate::domain::models::RequirementStatus::Fulfilled {
                continue;
            }
            tasks.extend(self.plan_from_requirement(goal, requirement).await?);
            if tasks.len() >= self.max_tasks_per_cycle {
                break;
            }
        }
        tasks.truncate(self.max_tasks_per_cycle);
        Ok(tasks)
    }

    /// Plans and persists tasks for a single requirement, already
    /// prioritised and dependency-sequenced.
    pub async fn plan_from_requirement(&self, goal: &Goal, requirement: &AssetRequirement) -> Result<Vec<Task>> {
        let (drafts, fallback_used) = match self.llm_drafts(goal, requirement).await {
            Some(drafts) => (drafts, false),
            None => (template_drafts(requirement), true),
        };
        let progress = goal.progress_fraction();

        let scored: Vec<(Draft, f64)> = drafts
            .into_iter()
            .map(|draft| {
                let score = base_score(draft.base_priority)
                    + urgency_score(progress)
                    + requirement.business_value_score
                    + draft.task_type.weight()
                    + if draft.dependencies.is_empty() { 1.0 } else { 0.0 };
                (draft, score)
            })
            .collect();

        let ordered = topo_sort(scored);
        let generation_context = serde_json::json!({
            "goal_metric_type": goal.metric_type,
            "goal_target": goal.target_value,
            "asset_requirement_id": requirement.id,
            "asset_name": requirement.asset_name,
            "fallback_used": fallback_used,
        });

        let mut created = Vec::new();
        let mut name_to_id: HashMap<String, Uuid> = HashMap::new();
        for (draft, _score) in ordered {
            let priority = if draft.base_priority >= 3 { TaskPriority::High } else { TaskPriority::Medium };
            let idempotency_key = format!("{}:{}:{}", goal.id, requirement.id, draft.name);
            let mut task = Task::new(goal.workspace_id, draft.name.clone(), draft.description)
                .with_goal(goal.id)
                .with_asset_requirement(requirement.id)
                .with_priority(priority)
                .with_idempotency_key(idempotency_key.clone())
                .with_ai_generated(generation_context.clone());
            task.context_data.insert("task_type".to_string(), serde_json::json!(draft.task_type.as_str()));
            task.context_data.insert("fallback_used".to_string(), serde_json::json!(fallback_used));
            if let Some(hours) = draft.estimated_duration_hours {
                task.context_data.insert("estimated_duration_hours".to_string(), serde_json::json!(hours));
                task.context_data.insert("estimated_duration_seconds".to_string(), serde_json::json!((hours * 3600.0) as i64));
            }
            if let Some(criteria) = &draft.success_criteria {
                task.context_data.insert("success_criteria".to_string(), serde_json::json!(criteria));
            }
            if !draft.quality_checkpoints.is_empty() {
                task.context_data.insert("quality_checkpoints".to_string(), serde_json::json!(draft.quality_checkpoints));
            }
            if !draft.required_skills.is_empty() {
                task.context_data.insert("required_skills".to_string(), serde_json::json!(draft.required_skills));
            }
            if !draft.tools_needed.is_empty() {
                task.context_data.insert("tools_needed".to_string(), serde_json::json!(draft.tools_needed));
            }
            for dep_name in &draft.dependencies {
                if let Some(&dep_id) = name_to_id.get(dep_name) {
                    task = task.with_dependency(dep_id);
                }
            }

            let persisted = self
                .store
                .create_task(task, Some(idempotency_key))
                .await
                .context("persisting planned task")?;
            name_to_id.insert(draft.name, persisted.id);
            created.push(persisted);
        }
        Ok(created)
    }

    /// Plans a single high-priority corrective task for a deficient
    /// requirement, honouring the per-(workspace, metric_type) cooldown.
    pub async fn plan_corrective(
        &self,
        goal: &Goal,
        metric_type: &str,
        gap_context: serde_json::Value,
    ) -> Result<Option<Task>> {
        if let Some(existing) = self.store.find_active_corrective_task(goal.id).await.context("checking active corrective task")? {
            return Ok(Some(existing));
        }

        let key = (goal.workspace_id, metric_type.to_string());
        {
            let mut cooldowns = self.corrective_cooldowns.lock().await;
            if let Some(last) = cooldowns.get(&key) {
                if (Utc::now() - *last).num_seconds() < self.cooldown_seconds {
                    return Ok(None);
                }
            }
            cooldowns.insert(key, Utc::now());
        }

        let task = Task::new(
            goal.workspace_id,
            format!("Correct gap in {metric_type}"),
            format!("Address the shortfall reported by validation: {gap_context}"),
        )
        .with_goal(goal.id)
        .as_corrective(24, gap_context);

        let idempotency_key = format!("corrective:{}:{}", goal.id, metric_type);
        let task = self.store.create_task(task.with_idempotency_key(idempotency_key.clone()), Some(idempotency_key)).await.context("persisting corrective task")?;
        Ok(Some(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::InMemoryStore;
    use proptest::prop_assert;

    fn planner() -> TaskPlanner {
        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(DeliverableEngine::new(store.clone()));
        TaskPlanner::new(store, engine)
    }

    #[tokio::test]
    async fn plan_initial_produces_dependency_ordered_tasks() {
        let planner = planner();
        let goal = Goal::new(Uuid::new_v4(), "contacts", 500.0, "contacts");
        let tasks = planner.plan_initial(&goal).await.unwrap();

        assert!(tasks.len() >= 2);
        let create_task = tasks.iter().find(|t| t.name.starts_with("Create")).unwrap();
        let plan_task = tasks.iter().find(|t| t.name.starts_with("Plan")).unwrap();
        assert!(create_task.dependencies.contains(&plan_task.id));
    }

    #[tokio::test]
    async fn plan_from_requirement_is_idempotent_under_retry() {
        let planner = planner();
        let goal = Goal::new(Uuid::new_v4(), "contacts", 500.0, "contacts");
        let requirement = AssetRequirement::new(goal.id, "contact database", "document", "json", "x");

        let first = planner.plan_from_requirement(&goal, &requirement).await.unwrap();
        let second = planner.plan_from_requirement(&goal, &requirement).await.unwrap();
        assert_eq!(first.iter().map(|t| t.id).collect::<Vec<_>>(), second.iter().map(|t| t.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn plan_from_requirement_uses_llm_drafts_when_available() {
        use crate::adapters::substrates::mock::{MockAgentRuntime, MockResponse};

        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(DeliverableEngine::new(store.clone()));
        let runtime = Arc::new(MockAgentRuntime::with_default_response(MockResponse::success("ok").with_structured_payload(
            serde_json::json!({
                "tasks": [
                    {"name": "Research competitor pages", "description": "survey 10 competitor sites", "task_type": "research", "estimated_duration_hours": 2.0, "required_skills": ["research"]},
                    {"name": "Draft contact list", "description": "compile verified contacts", "task_type": "creation", "depends_on": ["Research competitor pages"], "estimated_duration_hours": 4.0, "success_criteria": "500 verified contacts"}
                ]
            }),
        )));
        let planner = TaskPlanner::new(store, engine).with_agent_runtime(runtime).with_ai_enabled(true);
        let goal = Goal::new(Uuid::new_v4(), "contacts", 500.0, "contacts");
        let requirement = AssetRequirement::new(goal.id, "contact database", "document", "json", "x");

        let tasks = planner.plan_from_requirement(&goal, &requirement).await.unwrap();

        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| !t.context_data.get("fallback_used").and_then(serde_json::Value::as_bool).unwrap()));
        let draft_task = tasks.iter().find(|t| t.name == "Draft contact list").unwrap();
        assert_eq!(
            draft_task.context_data.get("success_criteria").and_then(serde_json::Value::as_str),
            Some("500 verified contacts")
        );
    }

    #[tokio::test]
    async fn plan_from_requirement_falls_back_to_template_on_malformed_llm_output() {
        use crate::adapters::substrates::mock::{MockAgentRuntime, MockResponse};

        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(DeliverableEngine::new(store.clone()));
        let runtime = Arc::new(MockAgentRuntime::with_default_response(MockResponse::success("ok").with_structured_payload(
            serde_json::json!({ "tasks": [{"name": "only one task"}] }),
        )));
        let planner = TaskPlanner::new(store, engine).with_agent_runtime(runtime).with_ai_enabled(true);
        let goal = Goal::new(Uuid::new_v4(), "contacts", 500.0, "contacts");
        let requirement = AssetRequirement::new(goal.id, "contact database", "document", "json", "x");

        let tasks = planner.plan_from_requirement(&goal, &requirement).await.unwrap();

        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.context_data.get("fallback_used").and_then(serde_json::Value::as_bool).unwrap()));
    }

    #[tokio::test]
    async fn corrective_task_respects_cooldown() {
        let planner = planner();
        let goal = Goal::new(Uuid::new_v4(), "contacts", 500.0, "contacts");
        let first = planner.plan_corrective(&goal, "contacts", serde_json::json!({"gap": 40})).await.unwrap();
        assert!(first.is_some());

        let second = planner.plan_corrective(&goal, "contacts", serde_json::json!({"gap": 41})).await.unwrap();
        assert!(second.is_some());
        assert_eq!(second.unwrap().id, first.unwrap().id);
    }

    proptest::proptest! {
        /// For any acyclic chain of drafts (each depending on at most the
        /// previous one), `topo_sort` must place every draft after all of
        /// its named dependencies.
        #[test]
        fn topo_sort_never_orders_a_draft_before_its_dependency(size in 1usize..20) {
            let names: Vec<String> = (0..size).map(|i| format!("task-{i}")).collect();
            let drafts: Vec<(Draft, f64)> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let dependencies = if i > 0 && i % 2 == 0 { vec![names[i - 1].clone()] } else { Vec::new() };
                    (
                        Draft {
                            name: name.clone(),
                            description: String::new(),
                            task_type: TaskType::Research,
                            dependencies,
                            base_priority: 5,
                            estimated_duration_hours: None,
                            success_criteria: None,
                            quality_checkpoints: Vec::new(),
                            required_skills: Vec::new(),
                            tools_needed: Vec::new(),
                        },
                        f64::from(i as u32),
                    )
                })
                .collect();

            let sorted = topo_sort(drafts);
            let position: HashMap<String, usize> =
                sorted.iter().enumerate().map(|(i, (draft, _))| (draft.name.clone(), i)).collect();

            for (draft, _) in &sorted {
                for dep in &draft.dependencies {
                    if let Some(&dep_pos) = position.get(dep) {
                        prop_assert!(dep_pos < position[&draft.name]);
                    }
                }
            }
        }
    }
}
