//! Goal-driven mission planner CLI.
//!
//! Missions are checkpointed under the configured data directory
//! (`.planner/data/missions/<id>.json`); progress events stream to stdout as
//! JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use planner::core::types::{Mission, MissionStatus};
use planner::exit_codes;
use planner::io::config::{DEFAULT_CONFIG_PATH, PlannerConfig, load_config};
use planner::io::events::JsonLinesEmitter;
use planner::io::reasoner::{CommandReasoner, Reasoner, probe_reasoner};
use planner::io::step_executor::SimulatedStepExecutor;
use planner::io::store::{FileMissionStore, MissionStore};
use planner::logging;
use planner::mission_runner::MissionRunner;
use planner::submit::prepare_mission;

#[derive(Parser)]
#[command(name = "planner", version, about = "Goal-driven mission planner")]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a goal and run the mission to completion.
    Run {
        /// Free-form goal text.
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        goal: Vec<String>,
    },
    /// Continue a checkpointed mission from its last completed phase.
    Resume { id: String },
    /// List missions, newest first.
    List,
    /// Delete a mission record.
    Delete { id: String },
    /// Check that the reasoning service answers.
    Probe,
}

fn main() {
    logging::init("warn");
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Run { goal } => cmd_run(&cfg, &goal.join(" ")),
        Command::Resume { id } => cmd_resume(&cfg, &id),
        Command::List => cmd_list(&cfg),
        Command::Delete { id } => cmd_delete(&cfg, &id),
        Command::Probe => cmd_probe(&cfg),
    }
}

fn cmd_run(cfg: &PlannerConfig, goal: &str) -> Result<i32> {
    let store = open_store(cfg)?;
    let mission = prepare_mission(Some(goal), store.as_ref())?;
    let runner = build_runner(cfg, store)?;
    Ok(finish(&runner.run(mission)))
}

fn cmd_resume(cfg: &PlannerConfig, id: &str) -> Result<i32> {
    let store = open_store(cfg)?;
    let runner = build_runner(cfg, store)?;
    Ok(finish(&runner.resume(id)?))
}

fn cmd_list(cfg: &PlannerConfig) -> Result<i32> {
    let store = open_store(cfg)?;
    for mission in store.list()? {
        println!(
            "{}\t{}\t{}\t{}",
            mission.id,
            mission.status,
            mission.created_at.format("%Y-%m-%d %H:%M:%S"),
            mission.goal
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_delete(cfg: &PlannerConfig, id: &str) -> Result<i32> {
    open_store(cfg)?.delete(id)?;
    println!("deleted {id}");
    Ok(exit_codes::OK)
}

fn cmd_probe(cfg: &PlannerConfig) -> Result<i32> {
    let reasoner = CommandReasoner::new(cfg.reasoner.clone())?;
    match reasoner.probe() {
        Ok(()) => {
            println!("reasoner available");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("reasoner unavailable: {err:#}");
            Ok(exit_codes::UNAVAILABLE)
        }
    }
}

fn open_store(cfg: &PlannerConfig) -> Result<Arc<FileMissionStore>> {
    Ok(Arc::new(FileMissionStore::new(cfg.missions_dir())?))
}

fn build_runner(cfg: &PlannerConfig, store: Arc<FileMissionStore>) -> Result<MissionRunner> {
    let reasoner = probe_reasoner(CommandReasoner::new(cfg.reasoner.clone())?)
        .map(|reasoner| Arc::new(reasoner) as Arc<dyn Reasoner>);
    Ok(MissionRunner::new(
        reasoner,
        Arc::new(SimulatedStepExecutor::new(cfg.step_delay())),
        store,
        Arc::new(JsonLinesEmitter::stdout()),
    ))
}

fn finish(mission: &Mission) -> i32 {
    eprintln!("mission {} {}", mission.id, mission.status);
    if mission.status == MissionStatus::Completed {
        exit_codes::OK
    } else {
        exit_codes::MISSION_FAILED
    }
}
