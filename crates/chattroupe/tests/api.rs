//! HTTP API tests driven through the router with mock providers

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chattroupe::providers::MockLlm;
use chattroupe::server::build_router;
use chattroupe::Draft;
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use common::{build_pdf, png, Harness};

const BOUNDARY: &str = "chattroupe-test-boundary";

// =============================================================================
// Helpers
// =============================================================================

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn multipart(method: &str, uri: &str, files: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
    let mut body = Vec::new();
    for (filename, content_type, data) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn create_session(app: &axum::Router) -> Uuid {
    let resp = app.clone().oneshot(post_empty("/api/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    json["id"].as_str().unwrap().parse().unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"OK");
}

#[tokio::test]
async fn test_info_lists_models() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());

    let resp = app
        .oneshot(Request::get("/api/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["name"], "chattroupe");
    assert!(json["models"].is_object());
}

#[tokio::test]
async fn test_pdf_question_flow() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());
    let id = create_session(&app).await;

    // Asking before anything is processed
    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/pdf/ask", id),
            serde_json::json!({ "question": "Who signed the lease?" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let json = body_json(resp).await;
    assert_eq!(json["error"]["type"], "no_index");

    let resp = app
        .clone()
        .oneshot(multipart(
            "POST",
            &format!("/api/sessions/{}/documents", id),
            &[(
                "lease.pdf",
                "application/pdf",
                build_pdf(&["The lease was signed by Maria Lopez"]),
            )],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary = body_json(resp).await;
    assert_eq!(summary["documents"][0], "lease.pdf");
    assert!(summary["chunks"].as_u64().unwrap() >= 1);

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/pdf/ask", id),
            serde_json::json!({ "question": "Who signed the lease?" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json["answer"].as_str().unwrap().contains("Maria Lopez"));

    let resp = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/pdf/ask", id),
            serde_json::json!({ "question": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_submission_without_pending_documents() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());
    let id = create_session(&app).await;

    let resp = app
        .oneshot(post_empty(&format!("/api/sessions/{}/documents", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"]["type"], "no_documents");
}

#[tokio::test]
async fn test_image_upload_and_questions() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_empty(&format!("/api/sessions/{}/image/describe", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["type"], "no_image");

    let resp = app
        .clone()
        .oneshot(multipart(
            "PUT",
            &format!("/api/sessions/{}/image", id),
            &[("diagram.png", "image/png", png(8, 5))],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info = body_json(resp).await;
    assert_eq!(info["width"], 8);
    assert_eq!(info["height"], 5);

    let resp = app
        .clone()
        .oneshot(post_empty(&format!("/api/sessions/{}/image/describe", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json["answer"].as_str().unwrap().starts_with("An image (image/png"));

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/image/ask", id),
            serde_json::json!({ "question": "What colour is it?" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json["answer"].as_str().unwrap().contains("What colour is it?"));

    // Not an image
    let resp = app
        .oneshot(multipart(
            "PUT",
            &format!("/api/sessions/{}/image", id),
            &[("notes.txt", "text/plain", b"hello".to_vec())],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["type"], "unsupported_type");
}

#[tokio::test]
async fn test_chat_streams_and_records_history() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/chat", id),
            serde_json::json!({ "message": "hello there friend" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(body.contains("event: fragment"));
    assert!(body.contains("event: done"));
    assert!(body.contains("You said: hello there friend"));

    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/api/sessions/{}/history", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["speaker"], "user");
    assert_eq!(messages[0]["text"], "hello there friend");
    assert_eq!(messages[1]["speaker"], "assistant");

    let resp = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/sessions/{}/history", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(
            Request::get(format!("/api/sessions/{}/history", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert!(json["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_chats_on_one_session_run_in_turn() {
    let harness = Harness::new(MockLlm::grounded().with_fragment_delay(Duration::from_millis(30)));
    let app = build_router(harness.state());
    let id = create_session(&app).await;
    let uri = format!("/api/sessions/{}/chat", id);

    let first = async {
        let resp = app
            .clone()
            .oneshot(post_json(&uri, serde_json::json!({ "message": "alpha one two" })))
            .await
            .unwrap();
        body_bytes(resp).await
    };
    let second = async {
        let resp = app
            .clone()
            .oneshot(post_json(&uri, serde_json::json!({ "message": "beta three four" })))
            .await
            .unwrap();
        body_bytes(resp).await
    };
    let (a, b) = tokio::join!(first, second);
    assert!(String::from_utf8(a).unwrap().contains("event: done"));
    assert!(String::from_utf8(b).unwrap().contains("event: done"));

    let resp = app
        .oneshot(
            Request::get(format!("/api/sessions/{}/history", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(resp).await;
    let speakers: Vec<&str> = json["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["speaker"].as_str().unwrap())
        .collect();
    assert_eq!(speakers, vec!["user", "assistant", "user", "assistant"]);

    // The later call saw the whole earlier exchange
    let requests = harness.llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].contents.len(), 3);
}

#[tokio::test]
async fn test_chat_disconnect_keeps_partial_reply_and_draft() {
    let harness = Harness::new(
        MockLlm::fixed("one two three four five six seven eight nine ten")
            .with_fragment_delay(Duration::from_millis(40)),
    );
    let state = harness.state();
    let app = build_router(state.clone());
    let id = create_session(&app).await;

    let resp = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/chat", id),
            serde_json::json!({ "message": "count" }),
        ))
        .await
        .unwrap();
    let mut body = resp.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(String::from_utf8_lossy(&first).contains("event: fragment"));
    drop(body);

    // The lock is released once the interrupted reply is recorded
    let session = state.session(id).unwrap();
    let session = tokio::time::timeout(Duration::from_secs(5), session.lock())
        .await
        .unwrap();

    let messages = session.history().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "count");
    assert!(messages[1].text.starts_with("one "));
    assert_ne!(messages[1].text, "one two three four five six seven eight nine ten");
    assert_eq!(session.draft(), Some(&Draft::Chat("count".into())));
}

#[tokio::test]
async fn test_chat_failure_is_reported_in_stream() {
    let harness = Harness::new(MockLlm::fixed("partial reply here").with_stream_failure_after(1));
    let app = build_router(harness.state());
    let id = create_session(&app).await;

    let resp = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/chat", id),
            serde_json::json!({ "message": "go" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(body.contains("event: fragment"));
    assert!(body.contains("event: error"));
    assert!(!body.contains("event: done"));
}

#[tokio::test]
async fn test_chat_request_refused_upfront() {
    let harness = Harness::new(MockLlm::failing("quota exceeded"));
    let app = build_router(harness.state());
    let id = create_session(&app).await;

    let resp = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/chat", id),
            serde_json::json!({ "message": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["error"]["type"], "llm_error");
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let harness = Harness::new(MockLlm::grounded());
    let app = build_router(harness.state());

    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/api/sessions/{}/history", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"]["type"], "session_not_found");

    let id = create_session(&app).await;
    let resp = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/sessions/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/chat", id),
            serde_json::json!({ "message": "still there?" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
