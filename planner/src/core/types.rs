//! Mission record and status lifecycle.
//!
//! These types are the stable contract shared by the orchestrator, the
//! checkpoint codec and every collaborator. They carry no I/O.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a mission.
///
/// Variants are declared in lifecycle order; `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    Pending,
    Clarifying,
    Planning,
    Executing,
    Reporting,
    Completed,
    Failed,
}

impl MissionStatus {
    pub const ALL: [MissionStatus; 7] = [
        MissionStatus::Pending,
        MissionStatus::Clarifying,
        MissionStatus::Planning,
        MissionStatus::Executing,
        MissionStatus::Reporting,
        MissionStatus::Completed,
        MissionStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Pending => "PENDING",
            MissionStatus::Clarifying => "CLARIFYING",
            MissionStatus::Planning => "PLANNING",
            MissionStatus::Executing => "EXECUTING",
            MissionStatus::Reporting => "REPORTING",
            MissionStatus::Completed => "COMPLETED",
            MissionStatus::Failed => "FAILED",
        }
    }

    /// Parse the wire representation (`"EXECUTING"`). Case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Failed)
    }

    /// Whether a mission in `self` may move to `next`.
    ///
    /// Terminal states admit nothing. `Failed` is reachable from any other
    /// state. Otherwise the status may stay put or move forward.
    pub fn can_transition_to(self, next: MissionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == MissionStatus::Failed {
            return true;
        }
        next >= self
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change. Recover with `downcast_ref::<StatusTransitionError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransitionError {
    pub from: MissionStatus,
    pub to: MissionStatus,
}

impl fmt::Display for StatusTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal status transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for StatusTransitionError {}

/// Outcome of one executed plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step: String,
    pub log: String,
}

/// One end-to-end clarify → plan → execute → report run for a single goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub goal: String,
    pub clarified_goal: String,
    pub status: MissionStatus,
    pub plan: Vec<String>,
    pub execution_results: Vec<ExecutionResult>,
    pub current_step_index: usize,
    pub report: String,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    /// Create a pending mission with a fresh id.
    pub fn new(goal: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), goal)
    }

    /// Create a pending mission with an explicit id.
    pub fn with_id(id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            clarified_goal: String::new(),
            status: MissionStatus::Pending,
            plan: Vec::new(),
            execution_results: Vec::new(),
            current_step_index: 0,
            report: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Move to `next`, enforcing the forward-only lifecycle.
    pub fn set_status(&mut self, next: MissionStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Force the mission into `Failed`. No-op once terminal.
    pub fn mark_failed(&mut self) {
        if !self.status.is_terminal() {
            self.status = MissionStatus::Failed;
        }
    }

    /// Whether execution has started (the plan is frozen from then on).
    pub fn execution_started(&self) -> bool {
        self.current_step_index > 0
    }

    /// The step the next execute iteration will run, if any remain.
    pub fn next_step(&self) -> Option<&str> {
        self.plan.get(self.current_step_index).map(String::as_str)
    }

    pub fn has_remaining_steps(&self) -> bool {
        self.current_step_index < self.plan.len()
    }

    /// Append the result for the current step and advance the index by one.
    pub fn record_step(&mut self, step: String, log: String) {
        self.execution_results.push(ExecutionResult { step, log });
        self.current_step_index += 1;
    }

    pub fn descriptor(&self) -> MissionDescriptor {
        MissionDescriptor {
            id: self.id.clone(),
            goal: self.goal.clone(),
            status: self.status,
            plan: self.plan.clone(),
            report: self.report.clone(),
            created_at: self.created_at,
        }
    }
}

/// Summary returned by submission and listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionDescriptor {
    pub id: String,
    pub goal: String,
    pub status: MissionStatus,
    pub plan: Vec<String>,
    pub report: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&MissionStatus::Executing).expect("serialize");
        assert_eq!(json, "\"EXECUTING\"");
        assert_eq!(MissionStatus::parse("reporting"), Some(MissionStatus::Reporting));
        assert_eq!(MissionStatus::parse("unknown"), None);
    }

    #[test]
    fn status_moves_forward_only() {
        let mut mission = Mission::new("goal");
        mission.set_status(MissionStatus::Clarifying).expect("clarify");
        mission.set_status(MissionStatus::Planning).expect("plan");
        mission.set_status(MissionStatus::Planning).expect("re-assert");
        let err = mission.set_status(MissionStatus::Clarifying).unwrap_err();
        assert_eq!(err.from, MissionStatus::Planning);
        assert_eq!(err.to, MissionStatus::Clarifying);
        mission.set_status(MissionStatus::Reporting).expect("skip empty plan");
    }

    #[test]
    fn terminal_states_are_final() {
        let mut mission = Mission::new("goal");
        mission.set_status(MissionStatus::Failed).expect("fail from pending");
        assert!(mission.set_status(MissionStatus::Completed).is_err());
        assert!(mission.set_status(MissionStatus::Failed).is_err());

        let mut done = Mission::new("goal");
        done.set_status(MissionStatus::Completed).expect("complete");
        done.mark_failed();
        assert_eq!(done.status, MissionStatus::Completed);
    }

    #[test]
    fn record_step_advances_index_by_one() {
        let mut mission = Mission::new("goal");
        mission.plan = vec!["a".to_string(), "b".to_string()];
        assert_eq!(mission.next_step(), Some("a"));
        mission.record_step("a".to_string(), "ok".to_string());
        assert_eq!(mission.current_step_index, 1);
        assert_eq!(mission.execution_results.len(), 1);
        assert_eq!(mission.next_step(), Some("b"));
        assert!(mission.execution_started());
    }
}
