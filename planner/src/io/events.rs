//! Mission progress events.
//!
//! Events are product output for observers (CLI stdout, SSE clients). They are
//! fire-and-forget: emitting never fails and never blocks a mission.

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::transition::Phase;
use crate::core::types::MissionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// A progress notification tied to one mission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionEvent {
    Log {
        mission_id: String,
        level: LogLevel,
        message: String,
        /// Present on the log that announces a fresh plan.
        plan: Option<Vec<String>>,
    },
    StatusUpdate {
        mission_id: String,
        status: MissionStatus,
        node: Phase,
    },
    FinalReport {
        mission_id: String,
        report: String,
    },
}

impl MissionEvent {
    pub fn info(mission_id: &str, message: impl Into<String>) -> Self {
        Self::log(mission_id, LogLevel::Info, message)
    }

    pub fn warning(mission_id: &str, message: impl Into<String>) -> Self {
        Self::log(mission_id, LogLevel::Warning, message)
    }

    pub fn error(mission_id: &str, message: impl Into<String>) -> Self {
        Self::log(mission_id, LogLevel::Error, message)
    }

    fn log(mission_id: &str, level: LogLevel, message: impl Into<String>) -> Self {
        MissionEvent::Log {
            mission_id: mission_id.to_string(),
            level,
            message: message.into(),
            plan: None,
        }
    }

    /// Event name on the wire (SSE `event:` field).
    pub fn name(&self) -> &'static str {
        match self {
            MissionEvent::Log { .. } => "log",
            MissionEvent::StatusUpdate { .. } => "status_update",
            MissionEvent::FinalReport { .. } => "final_report",
        }
    }

    pub fn mission_id(&self) -> &str {
        match self {
            MissionEvent::Log { mission_id, .. }
            | MissionEvent::StatusUpdate { mission_id, .. }
            | MissionEvent::FinalReport { mission_id, .. } => mission_id,
        }
    }

    /// JSON payload; always carries `mission_id`.
    pub fn payload(&self) -> Value {
        match self {
            MissionEvent::Log {
                mission_id,
                level,
                message,
                plan,
            } => {
                let mut payload = json!({
                    "mission_id": mission_id,
                    "level": level,
                    "message": message,
                });
                if let Some(plan) = plan {
                    payload["plan"] = json!(plan);
                }
                payload
            }
            MissionEvent::StatusUpdate {
                mission_id,
                status,
                node,
            } => json!({
                "mission_id": mission_id,
                "status": status,
                "node": node.as_str(),
            }),
            MissionEvent::FinalReport { mission_id, report } => json!({
                "mission_id": mission_id,
                "report": report,
            }),
        }
    }

    /// One self-describing JSON line: the payload plus an `event` field.
    pub fn to_json_line(&self) -> String {
        let mut line = self.payload();
        line["event"] = Value::String(self.name().to_string());
        line.to_string()
    }
}

/// Sink for mission events.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: MissionEvent);
}

/// Emits events as tracing records only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl EventEmitter for TracingEmitter {
    fn emit(&self, event: MissionEvent) {
        info!(
            mission_id = %event.mission_id(),
            event = event.name(),
            payload = %event.payload(),
            "mission event"
        );
    }
}

/// Writes one JSON line per event to a writer (stdout for the CLI).
pub struct JsonLinesEmitter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesEmitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.out.into_inner().ok()
    }
}

impl JsonLinesEmitter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> EventEmitter for JsonLinesEmitter<W> {
    fn emit(&self, event: MissionEvent) {
        let Ok(mut out) = self.out.lock() else {
            warn!(event = event.name(), "event writer lock poisoned, dropping event");
            return;
        };
        let line = event.to_json_line();
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(error = %err, event = event.name(), "failed to write event");
        }
    }
}
