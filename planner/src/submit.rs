//! Mission submission: validate a goal and record a pending mission.

use std::fmt;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::types::Mission;
use crate::io::store::MissionStore;

/// Missing or blank goal. Recover with `downcast_ref::<EmptyGoalError>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyGoalError;

impl fmt::Display for EmptyGoalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Goal not provided")
    }
}

impl std::error::Error for EmptyGoalError {}

/// Create and store a `PENDING` mission for `goal`.
///
/// A blank goal is rejected; any other goal is stored exactly as given. The
/// caller schedules execution; nothing runs here.
pub fn prepare_mission(goal: Option<&str>, store: &dyn MissionStore) -> Result<Mission> {
    let goal = goal.filter(|goal| !goal.trim().is_empty()).ok_or(EmptyGoalError)?;
    let mission = Mission::new(goal);
    store
        .create(&mission)
        .with_context(|| format!("create mission {}", mission.id))?;
    info!(mission_id = %mission.id, "mission submitted");
    Ok(mission)
}
