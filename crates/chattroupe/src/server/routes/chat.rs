//! Streaming chat endpoint

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::AppState;
use crate::session::PendingChat;
use crate::types::ChatRequest;

fn json_event(name: &'static str, data: serde_json::Value) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to encode {} event: {}", name, e);
            Event::default().event("error")
        })
}

/// POST /api/sessions/:id/chat - Send a message and stream the reply
///
/// Emits `fragment` events (`{"text": ...}`) as the reply arrives, then one
/// `done` event with the full reply, or an `error` event. The session stays
/// locked until the reply has been recorded, so other actions on it wait.
/// A client that disconnects cancels the upstream request; the text received
/// so far is kept and the message can be retried.
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>> + Send>> {
    let mut guard = state.session(id)?.lock_owned().await;
    let pending = state
        .assistant()
        .begin_chat(&mut guard, &request.message)
        .await?;

    let (tx, rx) = mpsc::channel::<Event>(32);

    tokio::spawn(async move {
        let PendingChat {
            mut reply,
            epoch,
            message,
        } = pending;
        let mut failure = None;
        let mut disconnected = false;

        while let Some(fragment) = reply.next().await {
            match fragment {
                Ok(text) => {
                    if tx.send(json_event("fragment", json!({ "text": text }))).await.is_err() {
                        tracing::debug!("Chat client disconnected; cancelling reply");
                        disconnected = true;
                        break;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if disconnected {
            guard.fail_chat(epoch, &message, reply.text());
            return;
        }

        let event = match failure {
            None => {
                guard.complete_chat(epoch, reply.text());
                json_event("done", json!({ "text": reply.text() }))
            }
            Some(e) => {
                tracing::error!("Chat stream failed: {}", e);
                guard.fail_chat(epoch, &message, reply.text());
                json_event(
                    "error",
                    json!({ "type": e.error_type(), "message": e.user_message() }),
                )
            }
        };
        drop(guard);
        let _ = tx.send(event).await;
    });

    let stream = ReceiverStream::new(rx).map(Ok::<Event, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
