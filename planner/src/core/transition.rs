//! Phase graph of the mission state machine.
//!
//! The graph is fixed: `Clarifying -> Planning -> {Executing | Reporting}`,
//! `Executing -> {Executing | Reporting}`, `Reporting -> End`. The conditional
//! edge is the same after planning and after every executed step, so the
//! number of `Executing` visits equals the plan length.

use std::fmt;

use serde::Serialize;

use crate::core::types::{Mission, MissionStatus};

/// A named phase of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Clarifying,
    Planning,
    Executing,
    Reporting,
}

impl Phase {
    /// Graph entry point for a fresh mission.
    pub const ENTRY: Phase = Phase::Clarifying;

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Clarifying => "clarify_goal",
            Phase::Planning => "create_plan",
            Phase::Executing => "execute_step",
            Phase::Reporting => "synthesize_report",
        }
    }

    /// Status a mission carries while this phase runs.
    pub fn status(self) -> MissionStatus {
        match self {
            Phase::Clarifying => MissionStatus::Clarifying,
            Phase::Planning => MissionStatus::Planning,
            Phase::Executing => MissionStatus::Executing,
            Phase::Reporting => MissionStatus::Reporting,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge taken after a phase completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Enter(Phase),
    End,
}

/// Loop predicate: another step if any remain, otherwise the report.
pub fn continuation(mission: &Mission) -> Phase {
    if mission.current_step_index < mission.plan.len() {
        Phase::Executing
    } else {
        Phase::Reporting
    }
}

/// Pure transition function `(phase, mission) -> next`.
pub fn next(phase: Phase, mission: &Mission) -> Transition {
    match phase {
        Phase::Clarifying => Transition::Enter(Phase::Planning),
        Phase::Planning | Phase::Executing => Transition::Enter(continuation(mission)),
        Phase::Reporting => Transition::End,
    }
}

/// Phase a checkpointed mission continues from, or `None` when terminal.
pub fn resume_phase(mission: &Mission) -> Option<Phase> {
    match mission.status {
        MissionStatus::Pending | MissionStatus::Clarifying => Some(Phase::Clarifying),
        MissionStatus::Planning => Some(Phase::Planning),
        MissionStatus::Executing => Some(continuation(mission)),
        MissionStatus::Reporting => Some(Phase::Reporting),
        MissionStatus::Completed | MissionStatus::Failed => None,
    }
}
