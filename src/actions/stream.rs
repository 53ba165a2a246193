//! Server-Sent Events endpoint: history replay, then live tail.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::Stream;
use futures_util::stream;

use crate::models::StreamMessage;
use crate::session::StreamSession;
use crate::web::AppState;

fn sse_event(message: &StreamMessage) -> Event {
    // One `event:` line, one compact JSON `data:` line per message.
    let data = serde_json::to_string(&message.payload).unwrap_or_else(|_| "null".to_string());
    Event::default().event(message.kind.to_string()).data(data)
}

/// SSE stream with recent history followed by new events.
/// GET /v1/stream
///
/// The session lives inside the response body stream: when the client
/// disconnects axum drops the stream, which drops the session and its hub
/// subscription mid-await.
pub async fn stream_updates(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = StreamSession::open(
        &state.store,
        &state.hub,
        state.settings.heartbeat_interval(),
    );
    metrics::counter!("stream.sessions.opened").increment(1);

    let events = stream::unfold(session, |mut session| async move {
        let message = session.next_message().await?;
        Some((Ok(sse_event(&message)), session))
    });

    Sse::new(events)
}
