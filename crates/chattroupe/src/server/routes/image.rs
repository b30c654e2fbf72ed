//! Image upload and question endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use uuid::Uuid;

use super::documents::read_files;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AnswerResponse, ImageInfo, QuestionRequest};

/// PUT /api/sessions/:id/image - Upload or replace the image
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ImageInfo>> {
    let file = read_files(&mut multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::EmptyInput("an image file".to_string()))?;

    let session = state.session(id)?;
    let mut session = session.lock().await;
    let info = state
        .assistant()
        .set_image(&mut session, file.filename, file.data)
        .await?;

    Ok(Json(info))
}

/// POST /api/sessions/:id/image/ask - Ask about the image
pub async fn ask_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    let answer = state
        .assistant()
        .ask_image(&mut session, &request.question)
        .await?;

    Ok(Json(answer))
}

/// POST /api/sessions/:id/image/describe - Tell me about the image
pub async fn describe_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnswerResponse>> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    let answer = state.assistant().describe_image(&mut session).await?;

    Ok(Json(answer))
}
