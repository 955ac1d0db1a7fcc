//! Shared application state for the server.

use std::sync::Arc;

use planner::io::events::{EventEmitter, MissionEvent};
use planner::io::ideas::IdeaStore;
use planner::io::reasoner::Reasoner;
use planner::io::step_executor::StepExecutor;
use planner::io::store::MissionStore;
use planner::mission_runner::MissionRunner;
use tokio::sync::broadcast;
use tracing::debug;

/// Fans mission events out to every connected SSE client.
///
/// Sending never blocks; with no subscribers the event is dropped.
pub struct BroadcastEmitter {
    tx: Arc<broadcast::Sender<MissionEvent>>,
}

impl BroadcastEmitter {
    pub fn new(tx: Arc<broadcast::Sender<MissionEvent>>) -> Self {
        Self { tx }
    }
}

impl EventEmitter for BroadcastEmitter {
    fn emit(&self, event: MissionEvent) {
        debug!(mission_id = %event.mission_id(), event = event.name(), "broadcasting mission event");
        let _ = self.tx.send(event);
    }
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub runner: MissionRunner,
    pub ideas: Arc<IdeaStore>,
    /// Broadcast sender for mission events.
    pub event_tx: Arc<broadcast::Sender<MissionEvent>>,
}

impl AppState {
    pub fn new(
        reasoner: Option<Arc<dyn Reasoner>>,
        step_executor: Arc<dyn StepExecutor>,
        store: Arc<dyn MissionStore>,
        ideas: IdeaStore,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let event_tx = Arc::new(event_tx);
        let emitter = Arc::new(BroadcastEmitter::new(event_tx.clone()));
        Self {
            runner: MissionRunner::new(reasoner, step_executor, store, emitter),
            ideas: Arc::new(ideas),
            event_tx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_emitter_reaches_subscribers_and_tolerates_none() {
        let (tx, _) = broadcast::channel(4);
        let tx = Arc::new(tx);
        let emitter = BroadcastEmitter::new(tx.clone());
        emitter.emit(MissionEvent::info("m1", "nobody listening"));

        let mut rx = tx.subscribe();
        emitter.emit(MissionEvent::info("m1", "hello"));
        let received = rx.try_recv().expect("event");
        assert_eq!(received, MissionEvent::info("m1", "hello"));
    }
}
