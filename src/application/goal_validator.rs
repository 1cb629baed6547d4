//! Goal Validator (C6) — extracts measurable requirements from free-text
//! workspace goals, validates completed work against them, and gates phase
//! transitions on how much of the goal has actually been achieved.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use regex::Regex;
use uuid::Uuid;

use crate::application::task_planner::TaskPlanner;
use crate::domain::models::{Goal, GoalStatus, Insight, InsightType, Task, Workspace};
use crate::domain::ports::{Store, Telemetry};

/// A single measurable requirement parsed out of a goal's free text.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub requirement_type: String,
    pub target_value: f64,
    pub unit: String,
    pub is_percentage: bool,
    pub is_minimum: bool,
    pub domain: String,
    pub source_span: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn from_gap_percentage(gap: f64) -> Self {
        if gap >= 80.0 {
            Self::Critical
        } else if gap >= 50.0 {
            Self::High
        } else if gap >= 20.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn bucket_label(self) -> &'static str {
        match self {
            Self::Critical => "80",
            Self::High => "50",
            Self::Medium => "20",
            Self::Low => "0",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub requirement: Requirement,
    pub valid: bool,
    pub severity: Severity,
    pub confidence: f64,
    pub target: f64,
    pub actual: f64,
    pub gap_percentage: f64,
    pub message: String,
    pub recommendations: Vec<String>,
    pub extracted_metrics: serde_json::Value,
    pub goal_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Passed,
    Warning,
    Failed,
    Blocked,
}

pub struct GateDecision {
    pub status: GateStatus,
    pub achievement_rate: f64,
    pub can_proceed: bool,
    pub recommendations: Vec<String>,
}

macro_rules! static_regex {
    ($fn_name:ident, $re:expr) => {
        fn $fn_name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            CELL.get_or_init(|| Regex::new($re).expect("static regex is valid"))
        }
    };
}

static_regex!(re_at_least, r"(?i)at least (\d[\d,]*(?:\.\d+)?)\s+([a-zA-Z][a-zA-Z \-]{2,30}?)(?:\.|,|$|\s+(?:and|within|by|in))");
static_regex!(re_percentage, r"(\d+(?:\.\d+)?)\s?%");
static_regex!(re_currency, r"\$\s?(\d[\d,]*(?:\.\d+)?)");
static_regex!(re_duration, r"(?i)(\d+)\s*(minutes?|hours?|days?|weeks?|months?|years?)");
static_regex!(re_ratio, r"(\d+)\s*:\s*(\d+)");
static_regex!(re_multiplier, r"(\d+(?:\.\d+)?)\s*[x×]\b");
static_regex!(re_score, r"(?i)score of (\d+(?:\.\d+)?)");
static_regex!(re_quantity_noun, r"(\d[\d,]*(?:\.\d+)?)\s+([a-zA-Z][a-zA-Z \-]{2,30}?)(?:\.|,|$|\s+(?:and|within|by|in|of))");

const STOPWORD_UNITS: &[&str] = &["of", "to", "in", "for", "with", "by", "the", "a", "an"];

fn parse_number(raw: &str) -> f64 {
    raw.replace(',', "").parse().unwrap_or(0.0)
}

fn classify_type(unit: &str) -> (String, String) {
    let lower = unit.to_lowercase();

    // Phase (a): direct lexical signals.
    let direct = [
        ("contacts", &["contact", "lead", "prospect"] as &[&str]),
        ("email_sequences", &["email sequence", "email campaign", "drip"]),
        ("content", &["post", "article", "blog", "content piece"]),
        ("financial", &["dollar", "revenue", "sale", "$"]),
        ("deliverables", &["deliverable", "template", "document"]),
    ];
    for (type_name, signals) in direct {
        if signals.iter().any(|s| lower.contains(s)) {
            return (type_name.to_string(), concept_domain(type_name));
        }
    }

    // Phase (b): concept-score voting across a fixed ontology.
    let ontology: &[(&str, &[&str])] = &[
        ("creation", &["create", "build", "write", "design", "produce"]),
        ("collection", &["collect", "gather", "acquire", "obtain"]),
        ("performance", &["increase", "improve", "grow", "boost", "rate"]),
        ("communication", &["message", "outreach", "sequence", "campaign"]),
        ("financial", &["revenue", "cost", "price", "budget", "dollar"]),
        ("temporal", &["day", "week", "month", "year", "hour", "minute"]),
        ("health", &["wellness", "health", "fitness"]),
        ("technology", &["integration", "api", "system", "platform"]),
        ("education", &["course", "training", "lesson", "curriculum"]),
    ];
    let mut best: Option<(&str, usize)> = None;
    for (concept, keywords) in ontology {
        let score = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if score > 0 && best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((concept, score));
        }
    }
    match best {
        Some((concept, _)) => ("deliverables".to_string(), concept.to_string()),
        None => ("deliverables".to_string(), "creation".to_string()),
    }
}

fn concept_domain(type_name: &str) -> String {
    match type_name {
        "contacts" => "collection",
        "email_sequences" | "content" => "communication",
        "financial" => "financial",
        _ => "creation",
    }
    .to_string()
}

fn is_quality_match(unit_span: &str) -> bool {
    let trimmed = unit_span.trim();
    if trimmed.len() < 3 {
        return false;
    }
    if STOPWORD_UNITS.contains(&trimmed.to_lowercase().as_str()) {
        return false;
    }
    // A unit that is itself a bare temporal word misparsed off a percentage
    // match ("50% within the month") isn't a quantity noun.
    if re_duration().is_match(trimmed) && trimmed.chars().next().is_some_and(|c| !c.is_ascii_digit()) {
        return false;
    }
    true
}

fn dedup_key(requirement_type: &str, value: f64, context: &str, is_percentage: bool) -> (String, String) {
    if is_percentage || requirement_type == "email_sequences" {
        (requirement_type.to_string(), context.to_string())
    } else {
        (requirement_type.to_string(), format!("{value}"))
    }
}

/// Extracts an ordered, deduplicated list of measurable requirements from a
/// goal's free text. Pure and deterministic, per the classifier contract.
pub fn extract_requirements(goal_text: &str) -> Vec<Requirement> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut requirements = Vec::new();

    for capture in re_percentage().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key("percentage", value, &span, true);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type: "percentage".to_string(),
                target_value: value,
                unit: "%".to_string(),
                is_percentage: true,
                is_minimum: true,
                domain: "performance".to_string(),
                source_span: span,
            });
        }
    }

    for capture in re_currency().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key("financial", value, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type: "financial".to_string(),
                target_value: value,
                unit: "dollars".to_string(),
                is_percentage: false,
                is_minimum: true,
                domain: "financial".to_string(),
                source_span: span,
            });
        }
    }

    for capture in re_at_least().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let unit_span = capture[2].trim();
        if !is_quality_match(unit_span) {
            continue;
        }
        let (requirement_type, domain) = classify_type(unit_span);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key(&requirement_type, value, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type,
                target_value: value,
                unit: unit_span.to_string(),
                is_percentage: false,
                is_minimum: true,
                domain,
                source_span: span,
            });
        }
    }

    for capture in re_quantity_noun().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let unit_span = capture[2].trim();
        if !is_quality_match(unit_span) {
            continue;
        }
        let (requirement_type, domain) = classify_type(unit_span);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key(&requirement_type, value, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type,
                target_value: value,
                unit: unit_span.to_string(),
                is_percentage: false,
                is_minimum: false,
                domain,
                source_span: span,
            });
        }
    }

    for capture in re_duration().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let unit = capture[2].to_lowercase();
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key("temporal", value, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type: "temporal".to_string(),
                target_value: value,
                unit,
                is_percentage: false,
                is_minimum: true,
                domain: "temporal".to_string(),
                source_span: span,
            });
        }
    }

    for capture in re_ratio().captures_iter(goal_text) {
        let a = parse_number(&capture[1]);
        let b = parse_number(&capture[2]).max(1.0);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key("ratio", a / b, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type: "ratio".to_string(),
                target_value: a / b,
                unit: "ratio".to_string(),
                is_percentage: false,
                is_minimum: true,
                domain: "performance".to_string(),
                source_span: span,
            });
        }
    }

    for capture in re_multiplier().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key("multiplier", value, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type: "multiplier".to_string(),
                target_value: value,
                unit: "x".to_string(),
                is_percentage: false,
                is_minimum: true,
                domain: "performance".to_string(),
                source_span: span,
            });
        }
    }

    for capture in re_score().captures_iter(goal_text) {
        let value = parse_number(&capture[1]);
        let span = capture.get(0).unwrap().as_str().to_string();
        let key = dedup_key("score", value, &span, false);
        if seen.insert(key) {
            requirements.push(Requirement {
                requirement_type: "score".to_string(),
                target_value: value,
                unit: "points".to_string(),
                is_percentage: false,
                is_minimum: true,
                domain: "performance".to_string(),
                source_span: span,
            });
        }
    }

    // Implicit requirements: canonical phrases imply a requirement with no
    // explicit number attached.
    let lower = goal_text.to_lowercase();
    if (lower.contains("within a month") || lower.contains("within 30 days")) && !requirements.iter().any(|r| r.requirement_type == "temporal") {
        requirements.push(Requirement {
            requirement_type: "temporal".to_string(),
            target_value: 30.0,
            unit: "days".to_string(),
            is_percentage: false,
            is_minimum: true,
            domain: "temporal".to_string(),
            source_span: "within a month".to_string(),
        });
    }
    if lower.contains("high quality") || lower.contains("high-quality") {
        requirements.push(Requirement {
            requirement_type: "percentage".to_string(),
            target_value: 80.0,
            unit: "%".to_string(),
            is_percentage: true,
            is_minimum: true,
            domain: "performance".to_string(),
            source_span: "high quality".to_string(),
        });
    }

    requirements
}

fn structured_metric(payload: &serde_json::Value, requirement_type: &str) -> Option<f64> {
    match requirement_type {
        "contacts" => payload.get("contacts").and_then(serde_json::Value::as_array).map(|a| a.len() as f64).or_else(|| {
            payload.get("total_contacts").and_then(serde_json::Value::as_f64)
        }),
        "email_sequences" => payload.get("email_sequences").and_then(serde_json::Value::as_array).map(|a| a.len() as f64),
        "content" | "deliverables" => ["content_calendar", "posts", "articles", "templates"]
            .iter()
            .find_map(|key| payload.get(key).and_then(serde_json::Value::as_array).map(|a| a.len() as f64)),
        "percentage" => payload.get("quality_score").and_then(serde_json::Value::as_f64),
        _ => None,
    }
}

fn regex_fallback_metric(text: &str, requirement: &Requirement) -> Option<f64> {
    let pattern = format!(r"(\d[\d,]*(?:\.\d+)?)\s*{}", regex::escape(&requirement.unit));
    Regex::new(&pattern).ok().and_then(|re| re.captures(text)).map(|c| parse_number(&c[1]))
}

pub struct GoalValidator {
    store: Arc<dyn Store>,
    telemetry: Arc<dyn Telemetry>,
    task_planner: Arc<TaskPlanner>,
}

impl GoalValidator {
    pub fn new(store: Arc<dyn Store>, telemetry: Arc<dyn Telemetry>, task_planner: Arc<TaskPlanner>) -> Self {
        Self { store, telemetry, task_planner }
    }

    /// Seeds one `Goal` row per extracted requirement, skipping types that
    /// already have a goal so re-running validation never duplicates goals.
    pub async fn seed_goals(&self, workspace: &Workspace) -> Result<Vec<Goal>> {
        let existing = self.store.list_workspace_goals(workspace.id, None).await.context("loading existing goals")?;
        let existing_types: HashSet<String> = existing.iter().map(|g| g.metric_type.clone()).collect();

        let mut created = existing;
        for requirement in extract_requirements(&workspace.goal_text) {
            if existing_types.contains(&requirement.requirement_type) {
                continue;
            }
            let goal = Goal::new(workspace.id, requirement.requirement_type, requirement.target_value, requirement.unit)
                .with_minimum(requirement.is_minimum);
            created.push(self.store.create_goal(goal).await.context("persisting seeded goal")?);
        }
        Ok(created)
    }

    /// Validates one goal's achievement against a workspace's completed
    /// tasks.
    pub fn validate_goal(&self, goal: &Goal, tasks: &[Task]) -> ValidationResult {
        let requirement = Requirement {
            requirement_type: goal.metric_type.clone(),
            target_value: goal.target_value,
            unit: goal.unit.clone(),
            is_percentage: goal.unit == "%",
            is_minimum: goal.is_minimum,
            domain: concept_domain(&goal.metric_type),
            source_span: String::new(),
        };

        let mut structured_hit = false;
        let mut matched_key = false;
        let mut values = Vec::new();
        let mut extracted_metrics = serde_json::Map::new();

        for task in tasks {
            let Some(result) = &task.result else { continue };
            if let Some(payload) = &result.structured_payload {
                if let Some(value) = structured_metric(payload, &requirement.requirement_type) {
                    values.push(value);
                    structured_hit = true;
                    matched_key = true;
                    extracted_metrics.insert(task.id.to_string(), serde_json::json!(value));
                    continue;
                }
            }
            if let Some(output) = &result.output {
                if let Some(value) = regex_fallback_metric(output, &requirement) {
                    values.push(value);
                    extracted_metrics.insert(task.id.to_string(), serde_json::json!(value));
                }
            }
        }

        let actual = if requirement.is_percentage {
            values.iter().cloned().fold(0.0, f64::max)
        } else {
            values.iter().sum()
        };

        let gap_percentage = if requirement.target_value > 0.0 {
            ((requirement.target_value - actual) / requirement.target_value * 100.0).max(0.0)
        } else {
            0.0
        };

        let valid = if requirement.is_minimum {
            actual >= requirement.target_value
        } else {
            actual >= requirement.target_value * 0.9
        };

        let severity = Severity::from_gap_percentage(gap_percentage);

        let mut confidence: f64 = 0.7;
        if structured_hit {
            confidence += 0.2;
        }
        if matched_key {
            confidence += 0.1;
        }
        let confidence = confidence.min(1.0);

        let mut recommendations = Vec::new();
        if !valid {
            recommendations.push(format!(
                "Increase {} from {actual} toward target {} {}",
                requirement.requirement_type, requirement.target_value, requirement.unit
            ));
        }

        ValidationResult {
            message: format!(
                "{}: {actual}/{} {} ({:.1}% gap)",
                requirement.requirement_type, requirement.target_value, requirement.unit, gap_percentage
            ),
            requirement,
            valid,
            severity,
            confidence,
            target: goal.target_value,
            actual,
            gap_percentage,
            recommendations,
            extracted_metrics: serde_json::Value::Object(extracted_metrics),
            goal_id: Some(goal.id),
        }
    }

    /// When a validation result is critical or high severity, records an
    /// insight and routes a corrective task through the Task Planner.
    pub async fn apply_corrective_action(&self, goal: &Goal, result: &ValidationResult) -> Result<()> {
        if result.severity < Severity::High {
            return Ok(());
        }

        let insight = Insight::new(
            goal.workspace_id,
            InsightType::FailureLesson,
            result.message.clone(),
            result.confidence,
        )
        .with_tags([
            format!("metric_{}", result.requirement.requirement_type),
            format!("gap_{}pct", result.severity.bucket_label()),
            "course_correction".to_string(),
        ])
        .with_tags(if result.severity == Severity::Critical { vec!["critical_gap".to_string()] } else { vec![] });

        self.store.insert_insight(insight).await.context("recording corrective insight")?;

        let memory_context = serde_json::json!({
            "metric_type": result.requirement.requirement_type,
            "target": result.target,
            "actual": result.actual,
            "gap_percentage": result.gap_percentage,
            "recommendations": result.recommendations,
        });

        if let Some(task) = self
            .task_planner
            .plan_corrective(goal, &result.requirement.requirement_type, memory_context)
            .await
            .context("planning corrective task")?
        {
            self.telemetry
                .broadcast(
                    "corrective_task_created",
                    serde_json::json!({ "task_id": task.id, "goal_id": goal.id, "metric_type": result.requirement.requirement_type }),
                )
                .await;
        }

        Ok(())
    }

    /// Evaluates a phase transition gate against a batch of validation
    /// results, per the transition-specific threshold table.
    pub fn evaluate_gate(current_phase: &str, next_phase: &str, results: &[ValidationResult]) -> GateDecision {
        let achievement_rate = if results.is_empty() {
            1.0
        } else {
            results.iter().map(|r| (1.0 - r.gap_percentage / 100.0).clamp(0.0, 1.0)).sum::<f64>() / results.len() as f64
        };

        let (critical_threshold, warning_threshold, remediation_allowed) = match (current_phase, next_phase) {
            ("analysis", "implementation") => (0.8, 0.6, true),
            ("implementation", "finalization") => (0.9, 0.7, true),
            ("finalization", "completion") => (0.95, 0.8, false),
            _ => (0.8, 0.6, true),
        };

        let recommendations: Vec<String> =
            results.iter().filter(|r| !r.valid).flat_map(|r| r.recommendations.clone()).collect();

        let has_critical = results.iter().any(|r| r.severity == Severity::Critical);

        let status = if !remediation_allowed && has_critical {
            GateStatus::Blocked
        } else if achievement_rate >= critical_threshold {
            GateStatus::Passed
        } else if achievement_rate >= warning_threshold {
            GateStatus::Warning
        } else if remediation_allowed {
            GateStatus::Failed
        } else {
            GateStatus::Blocked
        };

        let can_proceed = !matches!(status, GateStatus::Blocked);

        GateDecision { status, achievement_rate, can_proceed, recommendations }
    }

    pub fn goal_status_for(valid: bool) -> GoalStatus {
        if valid {
            GoalStatus::Completed
        } else {
            GoalStatus::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{InMemoryStore, RecordingTelemetry};
    use crate::domain::models::TaskResult;

    fn validator() -> (GoalValidator, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(crate::application::deliverable_engine::DeliverableEngine::new(store.clone()));
        let planner = Arc::new(TaskPlanner::new(store.clone(), engine));
        let telemetry = Arc::new(RecordingTelemetry::new());
        (GoalValidator::new(store.clone(), telemetry, planner), store)
    }

    #[test]
    fn extracts_minimum_count_and_percentage() {
        let reqs = extract_requirements("Collect at least 500 contacts and achieve a 25% open rate within 30 days.");
        assert!(reqs.iter().any(|r| r.requirement_type == "contacts" && (r.target_value - 500.0).abs() < f64::EPSILON));
        assert!(reqs.iter().any(|r| r.is_percentage && (r.target_value - 25.0).abs() < f64::EPSILON));
        assert!(reqs.iter().any(|r| r.requirement_type == "temporal" && (r.target_value - 30.0).abs() < f64::EPSILON));
    }

    #[test]
    fn percentage_requirements_dedup_by_exact_span() {
        let reqs = extract_requirements("Hit 25% growth, then another 25% on top of that.");
        assert_eq!(reqs.iter().filter(|r| r.is_percentage).count(), 1);
    }

    #[test]
    fn drops_short_and_prepositional_units() {
        let reqs = extract_requirements("Spend 3 of the available budget and reach 10 of them.");
        assert!(reqs.iter().all(|r| r.unit != "of"));
    }

    #[test]
    fn gap_percentage_and_severity_bins() {
        let (validator, _store) = validator();
        let goal = Goal::new(Uuid::new_v4(), "contacts", 100.0, "contacts");
        let mut task = Task::new(goal.workspace_id, "gather", "d").with_goal(goal.id);
        task.result = Some(TaskResult {
            structured_payload: Some(serde_json::json!({ "total_contacts": 15 })),
            ..Default::default()
        });

        let result = validator.validate_goal(&goal, std::slice::from_ref(&task));
        assert!((result.gap_percentage - 85.0).abs() < 1.0);
        assert_eq!(result.severity, Severity::Critical);
        assert!(!result.valid);
    }

    #[test]
    fn exact_target_tolerates_ten_percent_shortfall() {
        let (validator, _store) = validator();
        let mut goal = Goal::new(Uuid::new_v4(), "percentage", 80.0, "%");
        goal.is_minimum = false;
        let mut task = Task::new(goal.workspace_id, "survey", "d").with_goal(goal.id);
        task.result = Some(TaskResult {
            structured_payload: Some(serde_json::json!({ "quality_score": 73.0 })),
            ..Default::default()
        });

        let result = validator.validate_goal(&goal, std::slice::from_ref(&task));
        assert!(result.valid);
    }

    #[test]
    fn gate_blocks_finalization_to_completion_without_remediation() {
        let results = vec![];
        let decision = GoalValidator::evaluate_gate("finalization", "completion", &results);
        assert_eq!(decision.status, GateStatus::Passed);

        let low_achievement = vec![ValidationResult {
            requirement: Requirement {
                requirement_type: "contacts".to_string(),
                target_value: 100.0,
                unit: "contacts".to_string(),
                is_percentage: false,
                is_minimum: true,
                domain: "collection".to_string(),
                source_span: String::new(),
            },
            valid: false,
            severity: Severity::Critical,
            confidence: 0.9,
            target: 100.0,
            actual: 10.0,
            gap_percentage: 90.0,
            message: String::new(),
            recommendations: vec!["do more".to_string()],
            extracted_metrics: serde_json::Value::Null,
            goal_id: None,
        }];
        let decision = GoalValidator::evaluate_gate("finalization", "completion", &low_achievement);
        assert_eq!(decision.status, GateStatus::Blocked);
        assert!(!decision.can_proceed);
    }

    fn validation_result(gap_percentage: f64, severity: Severity) -> ValidationResult {
        ValidationResult {
            requirement: Requirement {
                requirement_type: "contacts".to_string(),
                target_value: 100.0,
                unit: "contacts".to_string(),
                is_percentage: false,
                is_minimum: true,
                domain: "collection".to_string(),
                source_span: String::new(),
            },
            valid: gap_percentage == 0.0,
            severity,
            confidence: 0.9,
            target: 100.0,
            actual: 100.0 - gap_percentage,
            gap_percentage,
            message: String::new(),
            recommendations: vec![],
            extracted_metrics: serde_json::Value::Null,
            goal_id: None,
        }
    }

    #[test]
    fn gate_blocks_finalization_to_completion_on_any_critical_requirement_despite_high_average() {
        let mut results: Vec<ValidationResult> =
            (0..9).map(|_| validation_result(0.0, Severity::Low)).collect();
        results.push(validation_result(85.0, Severity::Critical));

        let decision = GoalValidator::evaluate_gate("finalization", "completion", &results);

        assert!(decision.achievement_rate > 0.9, "average should still land in the warning band");
        assert_eq!(decision.status, GateStatus::Blocked);
        assert!(!decision.can_proceed);
    }
}
