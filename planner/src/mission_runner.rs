//! Top-level mission execution with failure containment.
//!
//! [`MissionRunner::run`] never fails: reasoning errors, persistence errors and
//! panics inside the orchestrator all end with the mission marked `FAILED` and
//! its partial state persisted.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, instrument, warn};

use crate::core::transition::{Phase, resume_phase};
use crate::core::types::{Mission, MissionStatus};
use crate::io::events::{EventEmitter, MissionEvent};
use crate::io::prompt::PromptEngine;
use crate::io::reasoner::Reasoner;
use crate::io::step_executor::StepExecutor;
use crate::io::store::MissionStore;
use crate::orchestrator::Orchestrator;

/// Shared, thread-safe mission runner.
#[derive(Clone)]
pub struct MissionRunner {
    reasoner: Option<Arc<dyn Reasoner>>,
    step_executor: Arc<dyn StepExecutor>,
    store: Arc<dyn MissionStore>,
    events: Arc<dyn EventEmitter>,
    prompts: Arc<PromptEngine>,
}

impl MissionRunner {
    /// `reasoner` is `None` when the reasoning service was unreachable at startup.
    pub fn new(
        reasoner: Option<Arc<dyn Reasoner>>,
        step_executor: Arc<dyn StepExecutor>,
        store: Arc<dyn MissionStore>,
        events: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            reasoner,
            step_executor,
            store,
            events,
            prompts: Arc::new(PromptEngine::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MissionStore> {
        &self.store
    }

    pub fn reasoner_available(&self) -> bool {
        self.reasoner.is_some()
    }

    /// Run a freshly created mission to its terminal state.
    pub fn run(&self, mission: Mission) -> Mission {
        self.events.emit(MissionEvent::info(
            &mission.id,
            format!("Mission started: {}", mission.goal),
        ));
        self.drive(mission, Phase::ENTRY)
    }

    /// Continue a checkpointed mission from where it stopped.
    ///
    /// Only loading can fail. Terminal missions are returned unchanged.
    pub fn resume(&self, id: &str) -> Result<Mission> {
        let mission = self.store.get(id)?;
        let Some(phase) = resume_phase(&mission) else {
            info!(mission_id = %id, status = %mission.status, "mission already finished");
            return Ok(mission);
        };
        self.events.emit(MissionEvent::info(
            &mission.id,
            format!("Mission resumed at {phase}"),
        ));
        Ok(self.drive(mission, phase))
    }

    #[instrument(skip_all, fields(mission_id = %mission.id, entry = %entry))]
    fn drive(&self, mut mission: Mission, entry: Phase) -> Mission {
        let Some(reasoner) = self.reasoner.as_deref() else {
            error!("reasoning service unavailable, failing mission");
            self.events.emit(MissionEvent::error(
                &mission.id,
                "Reasoning service is unavailable; mission cannot run.",
            ));
            self.fail(&mut mission, entry);
            return mission;
        };

        let orchestrator = Orchestrator {
            reasoner,
            step_executor: self.step_executor.as_ref(),
            store: self.store.as_ref(),
            events: self.events.as_ref(),
            prompts: self.prompts.as_ref(),
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            orchestrator.run_from(entry, &mut mission)
        }));

        match outcome {
            Ok(Ok(())) => self.complete(&mut mission),
            Ok(Err(err)) => {
                let chain = format!("{err:#}");
                error!(error = %chain, "mission failed");
                self.events
                    .emit(MissionEvent::error(&mission.id, format!("Mission failed: {chain}")));
                let at = resume_phase(&mission).unwrap_or(entry);
                self.fail(&mut mission, at);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "mission panicked");
                self.events.emit(MissionEvent::error(
                    &mission.id,
                    format!("Mission failed: {message}"),
                ));
                let at = resume_phase(&mission).unwrap_or(entry);
                self.fail(&mut mission, at);
            }
        }
        mission
    }

    fn complete(&self, mission: &mut Mission) {
        if !mission.report.is_empty() {
            self.events.emit(MissionEvent::FinalReport {
                mission_id: mission.id.clone(),
                report: mission.report.clone(),
            });
        }
        if mission.status != MissionStatus::Failed {
            if let Err(err) = mission.set_status(MissionStatus::Completed) {
                warn!(error = %err, "could not mark mission completed");
            } else {
                self.events.emit(MissionEvent::StatusUpdate {
                    mission_id: mission.id.clone(),
                    status: MissionStatus::Completed,
                    node: Phase::Reporting,
                });
            }
        }
        self.persist(mission);
        info!(status = %mission.status, steps = mission.current_step_index, "mission finished");
        self.events
            .emit(MissionEvent::info(&mission.id, "Mission finished."));
    }

    fn fail(&self, mission: &mut Mission, at: Phase) {
        mission.mark_failed();
        self.events.emit(MissionEvent::StatusUpdate {
            mission_id: mission.id.clone(),
            status: mission.status,
            node: at,
        });
        self.persist(mission);
    }

    fn persist(&self, mission: &Mission) {
        if let Err(err) = self.store.update(mission) {
            error!(error = %format!("{err:#}"), "failed to persist mission");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
