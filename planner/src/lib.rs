//! Goal-driven mission planner.
//!
//! A mission takes a free-form goal through a fixed graph of phases: clarify
//! the goal, plan a list of steps, execute each step, synthesize a report.
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (mission record, phase graph,
//!   response normalization, checkpoint codec). No I/O.
//! - **[`io`]**: Side-effecting collaborators (reasoning backend, persistence,
//!   events, configuration). Each sits behind a trait so tests can script it.
//!
//! [`orchestrator`] and [`mission_runner`] coordinate the two; [`submit`] is the
//! entry point shared by the CLI and the HTTP server.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod mission_runner;
pub mod orchestrator;
pub mod submit;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
