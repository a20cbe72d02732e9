//! Paced SSE delivery of simulated completion streams
//!
//! # SSE Format
//!
//! Each event is formatted as:
//! ```text
//! data: {"id":"...","object":"chat.completion.chunk",...}
//!
//! ```
//!
//! The stream ends with:
//! ```text
//! data: [DONE]
//!
//! ```

use crate::middleware::RequestId;
use crate::shared::translate::{StreamEvent, StreamEvents};
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;

/// Turn stream events into SSE frames, pausing `delay` after each content chunk
///
/// The producer is pulled lazily, one event per poll; a client that goes away
/// simply stops the pulling.
pub fn paced_events(
    events: StreamEvents,
    delay: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((events, false), move |(mut events, pause)| async move {
        if pause && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let event = events.next()?;
        let pause_next = event.is_content();
        Some((Ok(to_sse(&event)), (events, pause_next)))
    })
}

fn to_sse(event: &StreamEvent) -> Event {
    Event::default().data(event.to_data())
}

/// Build the SSE response for a stream
pub fn sse_response(events: StreamEvents, delay: Duration, request_id: RequestId) -> Response {
    tracing::debug!(
        request_id = %request_id,
        chunk_delay_ms = delay.as_millis() as u64,
        "Starting simulated stream"
    );

    Sse::new(paced_events(events, delay))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}
