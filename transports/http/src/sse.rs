//! Streaming encoder: dispatcher events to SSE frames
//!
//! Serializes the ordered event sequence into Server-Sent Events: each frame
//! is self-delimited and tagged with its variant (`data`, `end`, `error`),
//! in exactly the order the dispatcher produced them. The terminal frame is
//! always one of `end` or `error`; if the producer went away without one
//! (a protocol violation), the encoder closes the response with a
//! synthesized `error` frame of internal kind.
//!
//! When the consumer disconnects mid-stream, axum drops the response body;
//! that drops the event stream, which the dispatcher observes as
//! cancellation of the underlying invocation.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::StreamExt;
use pipehost_core::{ErrorKind, ErrorPayload, EventStream, StreamEvent};
use std::convert::Infallible;

/// Convert one stream event into its SSE frame
pub fn frame(event: &StreamEvent) -> Event {
    match event {
        StreamEvent::Data { data } => Event::default()
            .event("data")
            .data(serde_json::to_string(data).unwrap_or_default()),
        StreamEvent::End => Event::default().event("end").data(""),
        StreamEvent::Error { error } => Event::default()
            .event("error")
            .data(serde_json::to_string(error).unwrap_or_default()),
    }
}

/// Terminal frame synthesized when a producer ends without one
fn missing_terminal() -> StreamEvent {
    StreamEvent::Error {
        error: ErrorPayload::new(ErrorKind::Internal, "stream ended without a terminal event"),
    }
}

/// Encode a dispatcher event stream as an SSE response
pub fn encode(
    events: EventStream,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let frames = futures::stream::unfold((events, false), |(mut events, done)| async move {
        if done {
            return None;
        }
        match events.next().await {
            Some(event) => {
                let terminal = event.is_terminal();
                Some((Ok(frame(&event)), (events, terminal)))
            }
            // Producer went away without a terminal event.
            None => Some((Ok(frame(&missing_terminal())), (events, true))),
        }
    });

    Sse::new(frames).keep_alive(KeepAlive::default())
}
