//! Scripted collaborators and fixtures for mission tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::core::normalize::ReasonerResponse;
use crate::core::types::{Mission, MissionDescriptor};
use crate::io::events::{EventEmitter, MissionEvent};
use crate::io::reasoner::{Reasoner, ResponseMode};
use crate::io::step_executor::{StepExecutor, completed_log};
use crate::io::store::{FileMissionStore, MemoryMissionStore, MissionStore};
use crate::mission_runner::MissionRunner;

/// One scripted reasoner answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(ReasonerResponse),
    Fail(String),
    Panic(String),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Respond(ReasonerResponse::Text(text.into()))
    }

    pub fn json(value: serde_json::Value) -> Self {
        ScriptedReply::Respond(ReasonerResponse::Json(value))
    }
}

/// Reasoner that replays a fixed script and records every prompt it saw.
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<(String, ResponseMode)>>,
}

impl ScriptedReasoner {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in order.
    pub fn calls(&self) -> Vec<(String, ResponseMode)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|replies| replies.len()).unwrap_or(0)
    }
}

impl Reasoner for ScriptedReasoner {
    fn invoke(&self, prompt: &str, mode: ResponseMode) -> Result<ReasonerResponse> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("calls lock poisoned"))?
            .push((prompt.to_string(), mode));
        let reply = self
            .replies
            .lock()
            .map_err(|_| anyhow!("replies lock poisoned"))?
            .pop_front();
        match reply {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            Some(ScriptedReply::Panic(message)) => panic!("{message}"),
            None => Err(anyhow!("scripted reasoner exhausted")),
        }
    }

    fn probe(&self) -> Result<()> {
        Ok(())
    }
}

/// Replies for a full clarify, plan and report run.
pub fn mission_script(clarified_goal: &str, steps: &[&str], report: &str) -> Vec<ScriptedReply> {
    vec![
        ScriptedReply::text(json!({ "clarified_goal": clarified_goal }).to_string()),
        ScriptedReply::text(json!({ "steps": steps }).to_string()),
        ScriptedReply::text(report),
    ]
}

/// Collects events in emission order.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<MissionEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MissionEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(MissionEvent::name).collect()
    }

    /// Messages of all log events.
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MissionEvent::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: MissionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Step executor that completes every step immediately.
#[derive(Debug, Default)]
pub struct InstantStepExecutor {
    executed: Mutex<Vec<String>>,
}

impl InstantStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|steps| steps.clone()).unwrap_or_default()
    }
}

impl StepExecutor for InstantStepExecutor {
    fn execute(&self, step: &str) -> Result<String> {
        self.executed
            .lock()
            .map_err(|_| anyhow!("executed lock poisoned"))?
            .push(step.to_string());
        Ok(completed_log(step))
    }
}

/// Step executor that fails the named steps and completes the rest.
#[derive(Debug, Default)]
pub struct FailingStepExecutor {
    failing: HashSet<String>,
}

impl FailingStepExecutor {
    pub fn failing<'a>(steps: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing: steps.into_iter().map(str::to_string).collect(),
        }
    }
}

impl StepExecutor for FailingStepExecutor {
    fn execute(&self, step: &str) -> Result<String> {
        if self.failing.contains(step) {
            return Err(anyhow!("tool crashed"));
        }
        Ok(completed_log(step))
    }
}

/// Memory store whose `update` starts failing after `ok_updates` successes.
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryMissionStore,
    ok_updates: usize,
    updates: AtomicUsize,
}

impl FlakyStore {
    pub fn new(ok_updates: usize) -> Self {
        Self {
            inner: MemoryMissionStore::new(),
            ok_updates,
            updates: AtomicUsize::new(0),
        }
    }
}

impl MissionStore for FlakyStore {
    fn create(&self, mission: &Mission) -> Result<()> {
        self.inner.create(mission)
    }

    fn update(&self, mission: &Mission) -> Result<()> {
        if self.updates.fetch_add(1, Ordering::SeqCst) >= self.ok_updates {
            return Err(anyhow!("disk full"));
        }
        self.inner.update(mission)
    }

    fn get(&self, id: &str) -> Result<Mission> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<MissionDescriptor>> {
        self.inner.list()
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id)
    }
}

/// Scratch data directory with a file-backed mission store.
pub struct TestEnv {
    pub temp: TempDir,
    pub store: Arc<FileMissionStore>,
    pub events: Arc<RecordingEmitter>,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(FileMissionStore::new(temp.path().join("missions"))?);
        Ok(Self {
            temp,
            store,
            events: Arc::new(RecordingEmitter::new()),
        })
    }

    /// Runner over this environment's store and emitter.
    pub fn runner(
        &self,
        reasoner: Option<Arc<dyn Reasoner>>,
        step_executor: Arc<dyn StepExecutor>,
    ) -> MissionRunner {
        MissionRunner::new(
            reasoner,
            step_executor,
            self.store.clone(),
            self.events.clone(),
        )
    }
}
