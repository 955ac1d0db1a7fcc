//! Phase-by-phase mission execution.
//!
//! The orchestrator walks the phase graph from [`crate::core::transition`],
//! running one phase at a time against a mutable [`Mission`]. Every phase
//! persists the mission when it finishes, so an error leaves the last
//! completed phase on disk and a resumed mission never repeats a recorded
//! step.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::normalize::{extract_clarified_goal, extract_plan, extract_report};
use crate::core::transition::{Phase, Transition, next};
use crate::core::types::Mission;
use crate::io::events::{EventEmitter, LogLevel, MissionEvent};
use crate::io::prompt::PromptEngine;
use crate::io::reasoner::{Reasoner, ResponseMode};
use crate::io::step_executor::StepExecutor;
use crate::io::store::MissionStore;

/// Collaborators borrowed for one mission run.
pub struct Orchestrator<'a> {
    pub reasoner: &'a dyn Reasoner,
    pub step_executor: &'a dyn StepExecutor,
    pub store: &'a dyn MissionStore,
    pub events: &'a dyn EventEmitter,
    pub prompts: &'a PromptEngine,
}

impl Orchestrator<'_> {
    /// Drive `mission` from the graph entry until the graph ends.
    pub fn run(&self, mission: &mut Mission) -> Result<()> {
        self.run_from(Phase::ENTRY, mission)
    }

    /// Drive `mission` starting at `entry`. Stops at the first phase error.
    #[instrument(skip_all, fields(mission_id = %mission.id, entry = %entry))]
    pub fn run_from(&self, entry: Phase, mission: &mut Mission) -> Result<()> {
        let mut phase = entry;
        loop {
            debug!(phase = %phase, "entering phase");
            self.run_phase(phase, mission)
                .with_context(|| format!("phase {phase} failed"))?;
            match next(phase, mission) {
                Transition::Enter(following) => phase = following,
                Transition::End => return Ok(()),
            }
        }
    }

    fn run_phase(&self, phase: Phase, mission: &mut Mission) -> Result<()> {
        self.enter(phase, mission)?;
        match phase {
            Phase::Clarifying => self.clarify(mission)?,
            Phase::Planning => self.plan(mission)?,
            Phase::Executing => self.execute_step(mission)?,
            Phase::Reporting => self.report(mission)?,
        }
        self.store
            .update(mission)
            .with_context(|| format!("persist mission {} after {phase}", mission.id))
    }

    fn enter(&self, phase: Phase, mission: &mut Mission) -> Result<()> {
        mission.set_status(phase.status())?;
        self.events.emit(MissionEvent::StatusUpdate {
            mission_id: mission.id.clone(),
            status: mission.status,
            node: phase,
        });
        Ok(())
    }

    fn clarify(&self, mission: &mut Mission) -> Result<()> {
        self.log(mission, "Clarifying the mission goal...");
        let prompt = self.prompts.clarify(&mission.goal)?;
        let response = self
            .reasoner
            .invoke(&prompt, ResponseMode::Structured)
            .context("clarify goal")?;
        let extraction = extract_clarified_goal(&response, &mission.goal);
        if extraction.is_fallback() {
            warn!(mission_id = %mission.id, "clarify response unusable, keeping raw goal");
        }
        mission.clarified_goal = extraction.into_inner();
        let message = format!("Goal clarified: {}", mission.clarified_goal);
        self.log(mission, message);
        Ok(())
    }

    fn plan(&self, mission: &mut Mission) -> Result<()> {
        if mission.execution_started() {
            return Err(anyhow!(
                "plan is frozen once execution has started (step {})",
                mission.current_step_index
            ));
        }
        self.log(mission, "Creating a step-by-step plan...");
        let prompt = self.prompts.plan(&mission.clarified_goal)?;
        let response = self
            .reasoner
            .invoke(&prompt, ResponseMode::Structured)
            .context("create plan")?;
        let extraction = extract_plan(&response);
        if extraction.is_fallback() {
            warn!(mission_id = %mission.id, "plan response unusable, using raw text as one step");
        }
        mission.plan = extraction.into_inner();
        info!(mission_id = %mission.id, steps = mission.plan.len(), "plan created");
        self.events.emit(MissionEvent::Log {
            mission_id: mission.id.clone(),
            level: LogLevel::Info,
            message: format!("Plan created with {} steps.", mission.plan.len()),
            plan: Some(mission.plan.clone()),
        });
        Ok(())
    }

    fn execute_step(&self, mission: &mut Mission) -> Result<()> {
        let total = mission.plan.len();
        let number = mission.current_step_index + 1;
        let step = mission
            .next_step()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no step left to execute (index {})", mission.current_step_index))?;
        self.log(mission, format!("Executing step {number}/{total}: {step}"));

        let log = match self.step_executor.execute(&step) {
            Ok(log) => {
                self.log(mission, format!("Step {number} result: {log}"));
                log
            }
            Err(err) => {
                let log = format!("Step failed: '{step}': {err:#}");
                warn!(mission_id = %mission.id, step = number, error = %format!("{err:#}"), "step failed");
                self.events
                    .emit(MissionEvent::warning(&mission.id, log.clone()));
                log
            }
        };
        mission.record_step(step, log);
        Ok(())
    }

    fn report(&self, mission: &mut Mission) -> Result<()> {
        self.log(mission, "Synthesizing final report...");
        let prompt = self
            .prompts
            .report(&mission.clarified_goal, &mission.execution_results)?;
        let response = self
            .reasoner
            .invoke(&prompt, ResponseMode::FreeText)
            .context("synthesize report")?;
        mission.report = extract_report(&response);
        self.log(mission, "Report generated.");
        Ok(())
    }

    fn log(&self, mission: &Mission, message: impl Into<String>) {
        self.events.emit(MissionEvent::info(&mission.id, message));
    }
}
