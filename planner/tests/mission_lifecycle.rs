//! End-to-end mission tests: submission, phase graph, failure containment,
//! checkpoints and resume, driven through `MissionRunner` with scripted
//! collaborators.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::json;

use planner::core::invariants::validate_invariants;
use planner::core::types::{Mission, MissionDescriptor, MissionStatus};
use planner::io::events::MissionEvent;
use planner::io::reasoner::ResponseMode;
use planner::io::store::{MemoryMissionStore, MissionNotFoundError, MissionStore};
use planner::mission_runner::MissionRunner;
use planner::submit::prepare_mission;
use planner::test_support::{
    FailingStepExecutor, FlakyStore, InstantStepExecutor, RecordingEmitter, ScriptedReasoner,
    ScriptedReply, TestEnv, mission_script,
};

const BLOG_GOAL: &str = "Write a blog post about serverless architecture";

fn scripted(replies: Vec<ScriptedReply>) -> Arc<ScriptedReasoner> {
    Arc::new(ScriptedReasoner::new(replies))
}

/// Happy path: three-step plan runs to completion and is persisted.
#[test]
fn blog_post_mission_completes_all_steps() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(mission_script(
        "Publish a 1500-word post on serverless trade-offs",
        &["Research", "Draft", "Edit"],
        "# Serverless\n\nAll steps completed.",
    ));
    let runner = env.runner(Some(reasoner.clone()), Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some(BLOG_GOAL), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Completed);
    assert_eq!(finished.clarified_goal, "Publish a 1500-word post on serverless trade-offs");
    assert_eq!(finished.plan, vec!["Research", "Draft", "Edit"]);
    assert_eq!(finished.current_step_index, 3);
    assert_eq!(finished.execution_results.len(), 3);
    assert_eq!(finished.execution_results[1].log, "Completed step: 'Draft'");
    assert!(!finished.report.is_empty());
    assert!(validate_invariants(&finished).is_empty());

    let stored = env.store.get(&finished.id).expect("stored");
    assert_eq!(stored, finished);

    let calls = reasoner.calls();
    let modes: Vec<ResponseMode> = calls.iter().map(|(_, mode)| *mode).collect();
    assert_eq!(
        modes,
        vec![ResponseMode::Structured, ResponseMode::Structured, ResponseMode::FreeText]
    );
    assert!(calls[0].0.contains(BLOG_GOAL));
    assert!(calls[1].0.contains("serverless trade-offs"));
    assert!(calls[2].0.contains("Completed step: 'Edit'"));
}

#[test]
fn unavailable_reasoner_fails_without_planning() {
    let env = TestEnv::new().expect("env");
    let runner = env.runner(None, Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some(BLOG_GOAL), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Failed);
    assert!(finished.plan.is_empty());
    assert!(finished.execution_results.is_empty());
    assert_eq!(env.store.get(&finished.id).expect("stored").status, MissionStatus::Failed);
    assert!(
        env.events
            .messages()
            .iter()
            .any(|message| message.contains("unavailable"))
    );
}

#[test]
fn free_text_plan_becomes_single_step() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(vec![
        ScriptedReply::text("{\"clarified_goal\": \"Do the thing\"}"),
        ScriptedReply::text("do step one"),
        ScriptedReply::text("Report"),
    ]);
    let runner = env.runner(Some(reasoner), Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some("thing"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.plan, vec!["do step one"]);
    assert_eq!(finished.status, MissionStatus::Completed);
    assert_eq!(finished.current_step_index, 1);
}

#[test]
fn nested_clarified_goal_uses_description() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(vec![
        ScriptedReply::json(json!({
            "clarified_goal": {"description": "Ship the v2 API docs", "priority": "high"}
        })),
        ScriptedReply::json(json!({"steps": ["Outline"]})),
        ScriptedReply::text("Done"),
    ]);
    let runner = env.runner(Some(reasoner.clone()), Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some("docs"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.clarified_goal, "Ship the v2 API docs");
    assert!(reasoner.calls()[1].0.contains("Ship the v2 API docs"));
}

#[test]
fn empty_plan_goes_straight_to_report() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(mission_script("Nothing to do", &[], "Nothing was needed."));
    let executor = Arc::new(InstantStepExecutor::new());
    let runner = env.runner(Some(reasoner), executor.clone());

    let mission = prepare_mission(Some("idle"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Completed);
    assert!(finished.plan.is_empty());
    assert!(executor.executed().is_empty());
    assert_eq!(finished.report, "Nothing was needed.");
}

/// A reasoner error in the report phase keeps every executed step on disk.
#[test]
fn reasoner_error_mid_mission_persists_partial_state() {
    let env = TestEnv::new().expect("env");
    let mut replies = mission_script("Clarified", &["One", "Two"], "unused");
    replies[2] = ScriptedReply::Fail("connection reset".to_string());
    let runner = env.runner(Some(scripted(replies)), Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some("goal"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Failed);
    assert_eq!(finished.current_step_index, 2);
    assert!(finished.report.is_empty());
    let stored = env.store.get(&finished.id).expect("stored");
    assert_eq!(stored, finished);

    let failure = env
        .events
        .messages()
        .into_iter()
        .find(|message| message.starts_with("Mission failed"))
        .expect("failure event");
    assert!(failure.contains("connection reset"), "{failure}");
}

#[test]
fn panicking_phase_is_contained() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(vec![ScriptedReply::Panic("backend exploded".to_string())]);
    let runner = env.runner(Some(reasoner), Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some("goal"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Failed);
    assert_eq!(env.store.get(&finished.id).expect("stored").status, MissionStatus::Failed);
    assert!(
        env.events
            .messages()
            .iter()
            .any(|message| message.contains("backend exploded"))
    );
}

#[test]
fn step_failure_is_recorded_and_mission_completes() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(mission_script("Clarified", &["Research", "Draft", "Edit"], "Report"));
    let runner = env.runner(Some(reasoner), Arc::new(FailingStepExecutor::failing(["Draft"])));

    let mission = prepare_mission(Some("goal"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Completed);
    assert_eq!(finished.current_step_index, 3);
    assert_eq!(
        finished.execution_results[1].log,
        "Step failed: 'Draft': tool crashed"
    );
    assert_eq!(finished.execution_results[2].log, "Completed step: 'Edit'");
}

#[test]
fn persistence_failure_fails_the_mission() {
    let store = Arc::new(FlakyStore::new(2));
    let events = Arc::new(RecordingEmitter::new());
    let reasoner = scripted(mission_script("Clarified", &["One", "Two"], "Report"));
    let runner = MissionRunner::new(
        Some(reasoner),
        Arc::new(InstantStepExecutor::new()),
        store.clone(),
        events.clone(),
    );

    let mission = prepare_mission(Some("goal"), store.as_ref()).expect("submit");
    let finished = runner.run(mission);

    assert_eq!(finished.status, MissionStatus::Failed);
    assert_eq!(finished.current_step_index, 1);
    // Clarify and plan made it to the store before the disk filled up.
    assert_eq!(store.get(&finished.id).expect("stored").plan, vec!["One", "Two"]);
}

#[test]
fn resume_executes_only_remaining_steps() {
    let env = TestEnv::new().expect("env");
    let mut checkpoint = Mission::new("Resume me");
    checkpoint.clarified_goal = "Resume me, clearly".to_string();
    checkpoint.status = MissionStatus::Executing;
    checkpoint.plan = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    checkpoint.record_step("a".to_string(), "Completed step: 'a'".to_string());
    env.store.create(&checkpoint).expect("create");

    let reasoner = scripted(vec![ScriptedReply::text("Resumed report")]);
    let executor = Arc::new(InstantStepExecutor::new());
    let runner = env.runner(Some(reasoner.clone()), executor.clone());

    let finished = runner.resume(&checkpoint.id).expect("resume");

    assert_eq!(executor.executed(), vec!["b", "c"]);
    assert_eq!(finished.status, MissionStatus::Completed);
    assert_eq!(finished.current_step_index, 3);
    assert_eq!(finished.execution_results[0].log, "Completed step: 'a'");
    assert_eq!(finished.report, "Resumed report");
    assert_eq!(reasoner.calls().len(), 1);
}

#[test]
fn resume_leaves_terminal_missions_alone() {
    let env = TestEnv::new().expect("env");
    let mut done = Mission::new("done");
    done.status = MissionStatus::Failed;
    env.store.create(&done).expect("create");

    let reasoner = scripted(Vec::new());
    let runner = env.runner(Some(reasoner.clone()), Arc::new(InstantStepExecutor::new()));

    assert_eq!(runner.resume(&done.id).expect("resume"), done);
    assert!(reasoner.calls().is_empty());

    let err = runner.resume("missing-id").unwrap_err();
    assert!(err.downcast_ref::<MissionNotFoundError>().is_some());
}

/// Records every checkpoint written for later inspection.
#[derive(Default)]
struct SnapshotStore {
    inner: MemoryMissionStore,
    snapshots: Mutex<Vec<Mission>>,
}

impl MissionStore for SnapshotStore {
    fn create(&self, mission: &Mission) -> Result<()> {
        self.inner.create(mission)
    }

    fn update(&self, mission: &Mission) -> Result<()> {
        self.snapshots.lock().expect("lock").push(mission.clone());
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

#[test]
fn every_checkpoint_keeps_index_and_results_in_step() {
    let store = Arc::new(SnapshotStore::default());
    let reasoner = scripted(mission_script("C", &["1", "2", "3", "4"], "R"));
    let runner = MissionRunner::new(
        Some(reasoner),
        Arc::new(InstantStepExecutor::new()),
        store.clone(),
        Arc::new(RecordingEmitter::new()),
    );

    let mission = prepare_mission(Some("goal"), store.as_ref()).expect("submit");
    runner.run(mission);

    let snapshots = store.snapshots.lock().expect("lock").clone();
    // clarify, plan, four steps, report, final
    assert_eq!(snapshots.len(), 8);
    let mut previous = 0;
    for snapshot in &snapshots {
        assert!(validate_invariants(snapshot).is_empty(), "{snapshot:?}");
        assert!(snapshot.current_step_index <= snapshot.plan.len());
        assert!(snapshot.current_step_index - previous <= 1);
        previous = snapshot.current_step_index;
    }
}

#[test]
fn events_follow_program_order() {
    let env = TestEnv::new().expect("env");
    let reasoner = scripted(mission_script("Clarified", &["Only step"], "# Report"));
    let runner = env.runner(Some(reasoner), Arc::new(InstantStepExecutor::new()));

    let mission = prepare_mission(Some("goal"), env.store.as_ref()).expect("submit");
    let finished = runner.run(mission);
    let events = env.events.events();

    assert!(events.iter().all(|event| event.mission_id() == finished.id));
    assert_eq!(env.events.messages().first().map(String::as_str), Some("Mission started: goal"));
    assert_eq!(env.events.messages().last().map(String::as_str), Some("Mission finished."));

    let statuses: Vec<(MissionStatus, &str)> = events
        .iter()
        .filter_map(|event| match event {
            MissionEvent::StatusUpdate { status, node, .. } => Some((*status, node.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            (MissionStatus::Clarifying, "clarify_goal"),
            (MissionStatus::Planning, "create_plan"),
            (MissionStatus::Executing, "execute_step"),
            (MissionStatus::Reporting, "synthesize_report"),
            (MissionStatus::Completed, "synthesize_report"),
        ]
    );

    let plan_event = events
        .iter()
        .find_map(|event| match event {
            MissionEvent::Log { plan: Some(plan), .. } => Some(plan.clone()),
            _ => None,
        })
        .expect("plan event");
    assert_eq!(plan_event, vec!["Only step"]);

    let names = env.events.names();
    let report_at = names.iter().position(|name| *name == "final_report").expect("report");
    let executing_at = env
        .events
        .messages()
        .iter()
        .position(|message| message == "Executing step 1/1: Only step");
    assert!(executing_at.is_some());
    assert!(report_at > names.iter().position(|name| *name == "status_update").expect("status"));
}
