//! Session lifecycle and chat history endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{HistoryResponse, SessionInfo};

/// POST /api/sessions - Start a session
pub async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionInfo>)> {
    let id = state.sessions().create();
    let session = state.session(id)?;
    let session = session.lock().await;

    Ok((
        StatusCode::CREATED,
        Json(SessionInfo {
            id,
            index_path: session.index_path().to_path_buf(),
            created_at: session.created_at(),
        }),
    ))
}

/// DELETE /api/sessions/:id - End a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions().remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/:id/history - Chat history in order
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>> {
    let session = state.session(id)?;
    let session = session.lock().await;

    Ok(Json(HistoryResponse {
        messages: session.history().messages().to_vec(),
    }))
}

/// DELETE /api/sessions/:id/history - Clear history, uploads and drafts
pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    state.assistant().clear(&mut session);
    Ok(StatusCode::NO_CONTENT)
}
