//! Semantic invariants of a mission record not expressible via JSON Schema.

use crate::core::types::{Mission, MissionStatus};

/// Check mission invariants:
/// - `current_step_index <= plan.len()`
/// - `execution_results.len() == current_step_index`
/// - a non-empty report implies every step ran
/// - a completed mission has a report phase behind it (index at plan end)
pub fn validate_invariants(mission: &Mission) -> Vec<String> {
    let mut errors = Vec::new();
    let id = mission.id.as_str();

    if mission.current_step_index > mission.plan.len() {
        errors.push(format!(
            "{id}: current_step_index {} exceeds plan length {}",
            mission.current_step_index,
            mission.plan.len()
        ));
    }

    if mission.execution_results.len() != mission.current_step_index {
        errors.push(format!(
            "{id}: {} execution results recorded but current_step_index is {}",
            mission.execution_results.len(),
            mission.current_step_index
        ));
    }

    if !mission.report.is_empty() && mission.current_step_index != mission.plan.len() {
        errors.push(format!(
            "{id}: report present with {}/{} steps executed",
            mission.current_step_index,
            mission.plan.len()
        ));
    }

    if mission.status == MissionStatus::Completed && mission.has_remaining_steps() {
        errors.push(format!("{id}: completed with steps remaining"));
    }

    for (idx, (result, step)) in mission
        .execution_results
        .iter()
        .zip(mission.plan.iter())
        .enumerate()
    {
        if &result.step != step {
            errors.push(format!(
                "{id}: result {} is for '{}' but plan step is '{}'",
                idx + 1,
                result.step,
                step
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(steps: &[&str]) -> Mission {
        let mut mission = Mission::with_id("m-1", "goal");
        mission.plan = steps.iter().map(|s| s.to_string()).collect();
        mission
    }

    #[test]
    fn fresh_and_partially_executed_missions_are_valid() {
        let mut mission = planned(&["a", "b"]);
        assert!(validate_invariants(&mission).is_empty());
        mission.record_step("a".to_string(), "ok".to_string());
        assert!(validate_invariants(&mission).is_empty());
    }

    #[test]
    fn reports_index_and_result_mismatches() {
        let mut mission = planned(&["a"]);
        mission.current_step_index = 2;
        mission.report = "done".to_string();

        let errors = validate_invariants(&mission);
        assert!(errors.iter().any(|err| err.contains("exceeds plan length")));
        assert!(errors.iter().any(|err| err.contains("execution results")));
        assert!(errors.iter().any(|err| err.contains("report present")));
    }

    #[test]
    fn reports_results_out_of_plan_order() {
        let mut mission = planned(&["a", "b"]);
        mission.record_step("b".to_string(), "ok".to_string());
        let errors = validate_invariants(&mission);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("plan step is 'a'"));
    }
}
