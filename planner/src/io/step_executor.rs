//! Step execution abstraction.
//!
//! The [`StepExecutor`] trait is where tool-invoking executors plug in. The
//! shipped [`SimulatedStepExecutor`] only waits and reports success.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument};

/// Runs one plan step and returns its result log.
pub trait StepExecutor: Send + Sync {
    fn execute(&self, step: &str) -> Result<String>;
}

/// Placeholder executor that simulates work with a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedStepExecutor {
    delay: Duration,
}

impl SimulatedStepExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedStepExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl StepExecutor for SimulatedStepExecutor {
    #[instrument(skip_all, fields(delay_ms = self.delay.as_millis() as u64))]
    fn execute(&self, step: &str) -> Result<String> {
        debug!(step, "simulating step");
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(completed_log(step))
    }
}

/// Result log for a step that finished normally.
pub fn completed_log(step: &str) -> String {
    format!("Completed step: '{step}'")
}
