//! Live event stream (SSE)

use crate::api::rest::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{Stream, StreamExt};
use opsintel_pipeline::SubscriberId;
use std::time::Duration;

/// Logs the end of a client connection when the stream is dropped
struct ConnectionLog {
    subscriber: SubscriberId,
}

impl Drop for ConnectionLog {
    fn drop(&mut self) {
        tracing::debug!(subscriber = self.subscriber, "Stream client disconnected");
    }
}

/// Replay buffered history, then forward live events until the client leaves
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let replay = state.pipeline.open_stream();
    let log = ConnectionLog {
        subscriber: replay.subscriber_id(),
    };
    tracing::debug!(
        subscriber = log.subscriber,
        backlog = replay.backlog_len(),
        "Stream client connected"
    );

    let mut shutdown = state.shutdown_tx.subscribe();
    let stopped = async move {
        if shutdown.wait_for(|stop| *stop).await.is_err() {
            // sender gone: no shutdown will ever be signalled
            std::future::pending::<()>().await;
        }
    };

    let stream = replay
        .map(move |event| {
            let _connection = &log;
            Event::default().json_data(&event)
        })
        .take_until(stopped);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.stream.keep_alive_secs.max(1)))
            .text("keep-alive"),
    )
}
