//! Reasoning-service abstraction.
//!
//! The [`Reasoner`] trait decouples mission phases from the actual model
//! backend (by default a local model CLI such as `ollama run`). Tests use
//! scripted reasoners that return predetermined responses without spawning
//! processes.

use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::normalize::ReasonerResponse;
use crate::io::config::ReasonerConfig;
use crate::io::process::run_command_with_timeout;

const PROBE_PROMPT: &str = "Respond with only the word 'test'";

/// How the service is asked to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// The service should try to answer with JSON.
    Structured,
    /// Unconstrained prose.
    FreeText,
}

/// Abstraction over reasoning backends.
///
/// Implementations must bound every call; a call that cannot finish in time
/// returns an error rather than blocking forever.
pub trait Reasoner: Send + Sync {
    fn invoke(&self, prompt: &str, mode: ResponseMode) -> Result<ReasonerResponse>;

    /// Check that the backend answers at all.
    fn probe(&self) -> Result<()> {
        self.invoke(PROBE_PROMPT, ResponseMode::FreeText).map(|_| ())
    }
}

/// Reasoner that pipes the prompt into a configured command.
#[derive(Debug, Clone)]
pub struct CommandReasoner {
    config: ReasonerConfig,
}

impl CommandReasoner {
    pub fn new(config: ReasonerConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(anyhow!("reasoner command must not be empty"));
        }
        Ok(Self { config })
    }

    fn build_command(&self, mode: ResponseMode) -> Command {
        let mut cmd = Command::new(&self.config.command[0]);
        cmd.args(&self.config.command[1..]);
        if mode == ResponseMode::Structured {
            cmd.args(&self.config.structured_args);
        }
        cmd
    }
}

impl Reasoner for CommandReasoner {
    #[instrument(skip_all, fields(mode = ?mode, prompt_bytes = prompt.len()))]
    fn invoke(&self, prompt: &str, mode: ResponseMode) -> Result<ReasonerResponse> {
        debug!(program = %self.config.command[0], "invoking reasoner");
        let output = run_command_with_timeout(
            self.build_command(mode),
            Some(prompt.as_bytes()),
            self.config.timeout(),
            self.config.output_limit_bytes,
        )
        .context("run reasoner command")?;

        if output.timed_out {
            warn!(timeout_secs = self.config.timeout_secs, "reasoner timed out");
            return Err(anyhow!(
                "reasoner timed out after {}s",
                self.config.timeout_secs
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "reasoner failed");
            return Err(anyhow!(
                "reasoner exited with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(5)
            ));
        }

        let text = output.stdout_lossy();
        debug!(response_bytes = text.len(), "reasoner answered");
        Ok(ReasonerResponse::Text(text.trim().to_string()))
    }
}

/// Probe `reasoner` once; `None` when it is unreachable.
///
/// Missions started without a reasoner fail immediately instead of planning.
pub fn probe_reasoner<R: Reasoner>(reasoner: R) -> Option<R> {
    match reasoner.probe() {
        Ok(()) => {
            info!("reasoner available");
            Some(reasoner)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "reasoner unavailable");
            None
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config(command: &[&str]) -> ReasonerConfig {
        ReasonerConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            structured_args: Vec::new(),
            timeout_secs: 5,
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn command_reasoner_returns_stdout_text() {
        let reasoner = CommandReasoner::new(config(&["cat"])).expect("reasoner");
        let response = reasoner
            .invoke("{\"steps\": [\"a\"]}\n", ResponseMode::Structured)
            .expect("invoke");
        assert_eq!(
            response,
            ReasonerResponse::Text("{\"steps\": [\"a\"]}".to_string())
        );
    }

    #[test]
    fn structured_mode_appends_structured_args() {
        let mut cfg = config(&["echo"]);
        cfg.structured_args = vec!["--format".to_string(), "json".to_string()];
        let reasoner = CommandReasoner::new(cfg).expect("reasoner");
        let structured = reasoner.invoke("", ResponseMode::Structured).expect("invoke");
        assert_eq!(structured, ReasonerResponse::Text("--format json".to_string()));
        let free = reasoner.invoke("", ResponseMode::FreeText).expect("invoke");
        assert_eq!(free, ReasonerResponse::Text(String::new()));
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let reasoner = CommandReasoner::new(config(&["false"])).expect("reasoner");
        let err = reasoner.invoke("x", ResponseMode::FreeText).unwrap_err();
        assert!(err.to_string().contains("exited with status"));
    }

    #[test]
    fn timeout_is_an_error() {
        let mut cfg = config(&["sleep", "5"]);
        cfg.timeout_secs = 1;
        let reasoner = CommandReasoner::new(cfg).expect("reasoner");
        let err = reasoner.invoke("x", ResponseMode::FreeText).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn timeout_holds_even_when_the_command_forks() {
        let mut cfg = config(&["sh", "-c", "sleep 20; echo late"]);
        cfg.timeout_secs = 1;
        let reasoner = CommandReasoner::new(cfg).expect("reasoner");
        let started = std::time::Instant::now();
        let err = reasoner.invoke("x", ResponseMode::FreeText).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn probe_filters_unavailable_backends() {
        let missing = CommandReasoner::new(config(&["planner-no-such-binary"])).expect("reasoner");
        assert!(probe_reasoner(missing).is_none());
        let echo = CommandReasoner::new(config(&["cat"])).expect("reasoner");
        assert!(probe_reasoner(echo).is_some());
    }
}
