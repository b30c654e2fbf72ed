//! PDF submission and question endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AnswerResponse, IngestSummary, QuestionRequest, SourceDocument};

/// Read every file field of a multipart body
pub(crate) async fn read_files(multipart: &mut Multipart) -> Result<Vec<SourceDocument>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::file_read("upload", format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::file_read(&filename, format!("Failed to read file: {}", e)))?;

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        files.push(SourceDocument::new(filename, data));
    }

    Ok(files)
}

/// POST /api/sessions/:id/documents - Submit & Process
///
/// Uploaded PDFs replace the session's pending set. A request without files
/// retries the pending set from an earlier failed submission.
pub async fn submit_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Option<Multipart>,
) -> Result<Json<IngestSummary>> {
    let documents = match multipart {
        Some(mut multipart) => read_files(&mut multipart).await?,
        None => Vec::new(),
    };

    let session = state.session(id)?;
    let mut session = session.lock().await;
    let summary = state
        .assistant()
        .submit_documents(&mut session, documents)
        .await?;

    Ok(Json(summary))
}

/// POST /api/sessions/:id/pdf/ask - Ask about the indexed PDFs
pub async fn ask_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    let answer = state
        .assistant()
        .ask_pdf(&mut session, &request.question)
        .await?;

    Ok(Json(answer))
}
