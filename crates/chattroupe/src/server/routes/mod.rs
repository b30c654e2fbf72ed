//! API routes for the ChatTroupe server

pub mod chat;
pub mod documents;
pub mod image;
pub mod sessions;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Sessions
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id", delete(sessions::delete_session))
        .route(
            "/sessions/:id/history",
            get(sessions::get_history).delete(sessions::clear_history),
        )
        // PDFs - with larger body limit for uploads
        .route(
            "/sessions/:id/documents",
            post(documents::submit_documents).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/sessions/:id/pdf/ask", post(documents::ask_pdf))
        // Image
        .route(
            "/sessions/:id/image",
            put(self::image::upload_image).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/sessions/:id/image/ask", post(self::image::ask_image))
        .route("/sessions/:id/image/describe", post(self::image::describe_image))
        // Chat
        .route("/sessions/:id/chat", post(chat::chat))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    Json(serde_json::json!({
        "name": "chattroupe",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Chat with your PDFs, ask about images, and talk to Gemini",
        "started_at": state.started_at(),
        "active_sessions": state.sessions().len(),
        "models": {
            "embedding": config.gemini.embedding_model,
            "qa": config.gemini.qa_model,
            "chat": config.gemini.chat_model,
            "vision": config.gemini.vision_model,
        },
        "endpoints": {
            "POST /api/sessions": "Start a session",
            "DELETE /api/sessions/:id": "End a session",
            "POST /api/sessions/:id/documents": "Upload PDFs and rebuild the index (empty body retries)",
            "POST /api/sessions/:id/pdf/ask": "Ask about the indexed PDFs",
            "PUT /api/sessions/:id/image": "Upload a PNG or JPEG image",
            "POST /api/sessions/:id/image/ask": "Ask about the image",
            "POST /api/sessions/:id/image/describe": "Describe the image",
            "POST /api/sessions/:id/chat": "Chat (server-sent events)",
            "GET /api/sessions/:id/history": "Chat history",
            "DELETE /api/sessions/:id/history": "Clear the session"
        }
    }))
}
