//! Integration tests for the remote clients against an in-process mock server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use doc_suggest::error::Error;
use doc_suggest::{
    Document, DocumentStore, DocumentStoreClient, EditSuggestion, HttpSessionProvider, LineEdit,
    NewProject, ReviewSession, SaveDocument, Session, SessionProvider, TemplateConfig,
    TemplateFile, handle_callback,
};

const TOKEN: &str = "test-token";

type Documents = Arc<Mutex<HashMap<String, String>>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid token" }))).into_response()
}

async fn list_projects(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "projects": [
        { "id": "p1", "name": "Thesis" },
        { "id": "p2", "name": "Blog", "description": "posts" }
    ]}))
    .into_response()
}

async fn create_project(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let files = body["template"]["files"].as_array().map_or(0, Vec::len);
    Json(json!({ "project": {
        "id": "p-new",
        "name": body["name"],
        "description": format!("{} template file(s)", files)
    }}))
    .into_response()
}

async fn delete_project(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "project not found" })))
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_document(
    State(documents): State<Documents>,
    headers: HeaderMap,
    Path((project, file)): Path<(String, String)>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let key = format!("{}/{}", project, file);
    match documents.lock().unwrap().get(&key) {
        Some(content) => Json(json!({ "document": { "id": file, "content": content } })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "document not found" }))).into_response(),
    }
}

async fn put_document(
    State(documents): State<Documents>,
    headers: HeaderMap,
    Path((project, file)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let Some(content) = body["content"].as_str() else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "content is required" })))
            .into_response();
    };
    documents
        .lock()
        .unwrap()
        .insert(format!("{}/{}", project, file), content.to_string());
    Json(json!({ "document": {
        "id": file,
        "filename": body["filename"],
        "content": content,
        "updated_at": "2026-01-01T00:00:00Z"
    }}))
    .into_response()
}

async fn token(Json(body): Json<Value>) -> Response {
    if body["auth_code"] == "empty-code" {
        return Json(json!({ "access_token": "" })).into_response();
    }
    if body["auth_code"] == "good-code" && body["code_verifier"] == "verifier" {
        Json(json!({
            "access_token": TOKEN,
            "refresh_token": "refresh",
            "user": { "id": "user-1", "email": "ada@example.com" }
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": "invalid flow state" })),
        )
            .into_response()
    }
}

/// Start the mock server and return its base URL
async fn spawn_server(documents: Documents) -> String {
    let router = Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/{id}", axum::routing::delete(delete_project))
        .route(
            "/api/projects/{project}/files/{file}",
            get(get_document).put(put_document),
        )
        .route("/auth/v1/token", post(token))
        .with_state(documents);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

fn session() -> Session {
    Session::from_token(TOKEN)
}

#[tokio::test]
async fn test_list_and_create_projects() {
    let base = spawn_server(Documents::default()).await;
    let store = DocumentStoreClient::new(&format!("{}/api", base)).unwrap();

    let projects = store.list_projects(&session()).await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[1].description.as_deref(), Some("posts"));

    let template = TemplateConfig {
        description: "Essay".to_string(),
        files: vec![TemplateFile {
            path: "essay.md".to_string(),
            content: "# Title\n".to_string(),
        }],
    };
    let project = store
        .create_project(
            &session(),
            &NewProject {
                name: "Essay".to_string(),
                description: None,
                template: Some(template),
            },
        )
        .await
        .unwrap();
    assert_eq!(project.id, "p-new");
    assert_eq!(project.description.as_deref(), Some("1 template file(s)"));
}

#[tokio::test]
async fn test_delete_project_surfaces_server_error() {
    let base = spawn_server(Documents::default()).await;
    let store = DocumentStoreClient::new(&format!("{}/api", base)).unwrap();

    store.delete_project(&session(), "p1").await.unwrap();

    match store.delete_project(&session(), "missing").await {
        Err(Error::Status { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "project not found");
        }
        other => panic!("Expected Error::Status, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let base = spawn_server(Documents::default()).await;
    let store = DocumentStoreClient::new(&format!("{}/api", base)).unwrap();

    let err = store
        .list_projects(&Session::from_token("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_review_then_save_document() {
    let documents = Documents::default();
    documents
        .lock()
        .unwrap()
        .insert("p1/f1".to_string(), "# Notes\nalpha\nbeta\n".to_string());
    let base = spawn_server(documents.clone()).await;
    let store = DocumentStoreClient::new(&format!("{}/api", base)).unwrap();

    let stored = store.fetch_document(&session(), "p1", "f1").await.unwrap();
    let document = Document::parse(&stored.content);
    let suggestions = vec![
        EditSuggestion::new(LineEdit::replace(2, 1, "Alpha"), &document).with_id("s1"),
        EditSuggestion::new(LineEdit::delete(3, 1), &document).with_id("s2"),
    ];
    let mut review = ReviewSession::new(document, suggestions).unwrap();
    review.accept("s1").unwrap();
    review.reject("s2").unwrap();

    let saved = store
        .save_document(
            &session(),
            "p1",
            "f1",
            &SaveDocument {
                content: review.current().to_text(),
                filename: Some("notes.md".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(saved.content, "# Notes\nAlpha\nbeta\n");
    assert_eq!(saved.filename.as_deref(), Some("notes.md"));
    assert_eq!(documents.lock().unwrap()["p1/f1"], "# Notes\nAlpha\nbeta\n");
}

#[tokio::test]
async fn test_fetch_missing_document() {
    let base = spawn_server(Documents::default()).await;
    let store = DocumentStoreClient::new(&format!("{}/api", base)).unwrap();

    let err = store.fetch_document(&session(), "p1", "nope").await.unwrap_err();

    assert!(err.to_string().contains("document not found"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_callback_with_http_provider() {
    let base = spawn_server(Documents::default()).await;
    let provider = HttpSessionProvider::new(&format!("{}/auth/v1", base), Some("anon".to_string())).unwrap();

    let outcome = handle_callback(
        &provider,
        "https://app.example",
        Some("good-code"),
        "verifier",
        Some("/projects/p1"),
    )
    .await;
    assert_eq!(outcome.location, "https://app.example/projects/p1");
    let session = outcome.session.unwrap();
    assert_eq!(session.access_token, TOKEN);
    assert_eq!(session.user.unwrap().id, "user-1");

    let failed = handle_callback(
        &provider,
        "https://app.example",
        Some("bad-code"),
        "verifier",
        Some("/projects/p1"),
    )
    .await;
    assert_eq!(failed.location, "https://app.example/auth/auth-code-error");
    assert!(failed.session.is_none());
}

#[tokio::test]
async fn test_exchange_without_access_token() {
    let base = spawn_server(Documents::default()).await;
    let provider = HttpSessionProvider::new(&format!("{}/auth/v1", base), None).unwrap();

    let err = provider.exchange_code("empty-code", "verifier").await.unwrap_err();

    assert!(matches!(err, Error::Exchange(_)), "unexpected error: {:?}", err);
}
