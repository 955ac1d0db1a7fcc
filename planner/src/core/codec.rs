//! Checkpoint codec: mission state across serialization boundaries.
//!
//! A checkpoint is `{"version": 1, "mission": {...}}`. Decoding is total:
//! whatever arrives, a complete [`Mission`] comes out. Missing fields take the
//! record defaults; `id` and `created_at` come from the fallback mission when
//! absent and are never regenerated. For any valid mission `m`,
//! `decode_state(Some(&encode_state(&m.into())), _)` reproduces `m` exactly.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::core::types::{ExecutionResult, Mission, MissionStatus};

pub const CHECKPOINT_VERSION: u64 = 1;

/// Typed state handed between phases and checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionState {
    pub mission: Mission,
}

impl From<Mission> for MissionState {
    fn from(mission: Mission) -> Self {
        Self { mission }
    }
}

/// Serialize a state into its checkpoint document.
pub fn encode_state(state: &MissionState) -> Value {
    json!({
        "version": CHECKPOINT_VERSION,
        "mission": encode_mission(&state.mission),
    })
}

pub fn encode_mission(mission: &Mission) -> Value {
    let results: Vec<Value> = mission
        .execution_results
        .iter()
        .map(|result| json!({"step": result.step, "log": result.log}))
        .collect();
    json!({
        "id": mission.id,
        "goal": mission.goal,
        "clarified_goal": mission.clarified_goal,
        "status": mission.status.as_str(),
        "plan": mission.plan,
        "execution_results": results,
        "current_step_index": mission.current_step_index,
        "report": mission.report,
        "created_at": mission.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    })
}

/// Rebuild typed state from an untyped checkpoint.
///
/// Absent state or an absent/non-mapping `mission` slot yields `fallback`.
pub fn decode_state(raw: Option<&Value>, fallback: &Mission) -> MissionState {
    let Some(raw) = raw else {
        return MissionState::from(fallback.clone());
    };
    if let Some(version) = raw.get("version").and_then(Value::as_u64)
        && version != CHECKPOINT_VERSION
    {
        warn!(version, "decoding checkpoint with unknown version");
    }
    match raw.get("mission") {
        Some(Value::Object(fields)) => MissionState::from(reconstruct_mission(fields, fallback)),
        Some(other) => {
            warn!(kind = value_kind(other), "checkpoint mission slot is not a mapping");
            MissionState::from(fallback.clone())
        }
        None => MissionState::from(fallback.clone()),
    }
}

/// Rebuild a mission field by field from a plain mapping.
pub fn reconstruct_mission(fields: &Map<String, Value>, fallback: &Mission) -> Mission {
    let id = string_field(fields, "id")
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| fallback.id.clone());
    let created_at = string_field(fields, "created_at")
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(fallback.created_at);
    let status = string_field(fields, "status")
        .and_then(|raw| MissionStatus::parse(&raw))
        .unwrap_or(MissionStatus::Pending);
    let plan: Vec<String> = match fields.get("plan") {
        Some(Value::Array(items)) => items.iter().map(text_of).collect(),
        _ => Vec::new(),
    };
    let mut execution_results: Vec<ExecutionResult> = match fields.get("execution_results") {
        Some(Value::Array(items)) => items.iter().filter_map(result_of).collect(),
        _ => Vec::new(),
    };

    let mut current_step_index = fields
        .get("current_step_index")
        .and_then(Value::as_u64)
        .map(|idx| idx as usize)
        .unwrap_or(execution_results.len());
    if current_step_index > plan.len() {
        warn!(
            mission_id = %id,
            current_step_index,
            plan_len = plan.len(),
            "clamping step index to plan length"
        );
        current_step_index = plan.len();
    }
    if execution_results.len() > current_step_index {
        warn!(
            mission_id = %id,
            dropped = execution_results.len() - current_step_index,
            "dropping execution results past the step index"
        );
        execution_results.truncate(current_step_index);
    }
    // Fewer results than the index claims: trust the results.
    current_step_index = current_step_index.min(execution_results.len());

    Mission {
        id,
        goal: string_field(fields, "goal").unwrap_or_default(),
        clarified_goal: string_field(fields, "clarified_goal").unwrap_or_default(),
        status,
        plan,
        execution_results,
        current_step_index,
        report: string_field(fields, "report").unwrap_or_default(),
        created_at,
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn result_of(value: &Value) -> Option<ExecutionResult> {
    let record = value.as_object()?;
    Some(ExecutionResult {
        step: record.get("step").map(text_of)?,
        log: record.get("log").map(text_of).unwrap_or_default(),
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
