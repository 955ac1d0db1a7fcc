//! Server-Sent Events stream of mission events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use planner::io::events::MissionEvent;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::AppState;

/// SSE frame for one mission event: named after the event, JSON payload as data.
pub fn to_sse_event(event: &MissionEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(to_sse_event(&event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
