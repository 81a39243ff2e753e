//! Router construction, shared by `main` and the route tests.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{delete, get, post},
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::routes;
use crate::state::AppState;

/// Resolve the static files directory.
///
/// Priority:
/// 1. Explicit path if provided
/// 2. ./static if it exists
/// 3. Crate's built-in static directory
pub fn resolve_static_dir(explicit_path: Option<&str>) -> PathBuf {
    if let Some(path) = explicit_path {
        return PathBuf::from(path);
    }

    let local_static = PathBuf::from("static");
    if local_static.is_dir() {
        return local_static;
    }

    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

pub fn router(state: Arc<AppState>, static_dir: PathBuf) -> Router {
    let body_limit = state.body_limit();

    Router::new()
        // Pages
        .route("/", get(routes::index))
        // API endpoints - JSON
        .route("/api/upload", post(routes::upload_files))
        .route("/api/files/{session_id}", get(routes::list_files))
        .route("/api/session/{session_id}", delete(routes::clear_session))
        .route(
            "/api/preferences",
            get(routes::get_preferences).post(routes::set_preferences),
        )
        // API endpoints - PDF responses
        .route("/api/preview/{session_id}/{file_id}", get(routes::preview_file))
        .route("/api/merge/{session_id}", post(routes::merge_files))
        // Static files with Cache-Control: no-cache (cache but always revalidate via ETag)
        .nest_service(
            "/static",
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache"),
                ))
                .service(ServeDir::new(static_dir)),
        )
        // Middleware
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream};
    use pdf_merger_core::MergerConfig;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pdf-merger-test-boundary";

    fn test_app(root: &TempDir) -> Router {
        test_app_with(MergerConfig::with_upload_root(root.path())).0
    }

    fn test_app_with(config: MergerConfig) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(config).unwrap());
        (router(Arc::clone(&state), resolve_static_dir(None)), state)
    }

    fn one_page_pdf(label: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tj", vec![Object::string_literal(label)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("MediaBox", Object::Array(vec![0.into(), 0.into(), 300.into(), 300.into()])),
        ]));
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
                ("Count", Object::Integer(1)),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// Multipart body with one `files` part per entry and an optional `session_id`.
    fn multipart_body(files: &[(&str, Vec<u8>)], session_id: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(id) = session_id {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{id}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(files: &[(&str, Vec<u8>)], session_id: Option<&str>) -> Request<Body> {
        Request::post("/api/upload")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(files, session_id)))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders() {
        let root = TempDir::new().unwrap();
        let response = test_app(&root)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
        assert!(html.contains("id=\"upload-form\""));
        assert!(html.contains("accept=\".pdf\""));
    }

    #[tokio::test]
    async fn test_upload_then_merge() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let response = app
            .clone()
            .oneshot(upload_request(
                &[("first.pdf", one_page_pdf("first")), ("second.pdf", one_page_pdf("second"))],
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();
        assert_eq!(body["files"].as_array().unwrap().len(), 2);
        assert_eq!(body["files"][1], json!({"id": 1, "displayName": "second.pdf", "pageCount": 1}));
        assert_eq!(body["all_files"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/merge/{session_id}"),
                &json!({"files": [1, 0], "addPageNumbers": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"merged_document.pdf\""
        );
        assert_eq!(response.headers()[routes::PAGE_NUMBERS_HEADER], "applied");

        let merged = Document::load_mem(&body_bytes(response).await).unwrap();
        assert_eq!(merged.get_pages().len(), 2);

        let response = app
            .oneshot(Request::get(format!("/api/files/{session_id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_reuses_session() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let first = body_json(
            app.clone()
                .oneshot(upload_request(&[("a.pdf", one_page_pdf("a"))], None))
                .await
                .unwrap(),
        )
        .await;
        let session_id = first["session_id"].as_str().unwrap();

        let second = body_json(
            app.oneshot(upload_request(&[("b.pdf", one_page_pdf("b"))], Some(session_id)))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(second["session_id"], session_id);
        assert_eq!(second["files"][0]["id"], 1);
        assert_eq!(second["all_files"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_without_pdfs_is_bad_request() {
        let root = TempDir::new().unwrap();
        let response = test_app(&root)
            .oneshot(upload_request(&[("notes.txt", b"hello".to_vec())], None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("invalid input"));
    }

    #[tokio::test]
    async fn test_preview() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let body = body_json(
            app.clone()
                .oneshot(upload_request(&[("a.pdf", one_page_pdf("a"))], None))
                .await
                .unwrap(),
        )
        .await;
        let session_id = body["session_id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/preview/{session_id}/0"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let preview = Document::load_mem(&body_bytes(response).await).unwrap();
        assert_eq!(preview.get_pages().len(), 1);

        let response = app
            .oneshot(
                Request::get(format!("/api/preview/{session_id}/99"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        for uri in ["/api/files/not-a-session", "/api/preview/not-a-session/0"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_clear_session() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let body = body_json(
            app.clone()
                .oneshot(upload_request(&[("a.pdf", one_page_pdf("a"))], None))
                .await
                .unwrap(),
        )
        .await;
        let session_id = body["session_id"].as_str().unwrap();
        assert!(root.path().join(session_id).exists());

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::delete(format!("/api/session/{session_id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
        assert!(!root.path().join(session_id).exists());
    }

    #[tokio::test]
    async fn test_preferences_round_trip() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/preferences", &json!({"darkMode": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["darkMode"], true);
        let session_id = body["session_id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/preferences?session_id={session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!({"darkMode": true}));

        let response = app
            .oneshot(Request::get("/api/preferences").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!({"darkMode": false}));
    }

    #[tokio::test]
    async fn test_malformed_merge_body_still_ends_session() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let body = body_json(
            app.clone()
                .oneshot(upload_request(&[("a.pdf", one_page_pdf("a"))], None))
                .await
                .unwrap(),
        )
        .await;
        let session_id = body["session_id"].as_str().unwrap();
        assert!(root.path().join(session_id).exists());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/merge/{session_id}"),
                &json!({"files": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body = body_json(response).await;
        assert_eq!(body["status"], 422);
        assert!(body["error"].is_string());

        assert!(!root.path().join(session_id).exists());
        let response = app
            .oneshot(Request::get(format!("/api/files/{session_id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_extractor_errors_use_json_body() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/preview/6f1c2a4e-9b3d-4c5e-8f7a-0b1c2d3e4f5a/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], 400);

        let response = app
            .oneshot(
                Request::post("/api/preferences")
                    .body(Body::from(r#"{"darkMode": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(response).await["status"], 415);
    }

    #[tokio::test]
    async fn test_rejected_upload_leaves_no_session() {
        let root = TempDir::new().unwrap();
        let (app, state) = test_app_with(MergerConfig::with_upload_root(root.path()));

        let response = app
            .oneshot(upload_request(&[("notes.txt", b"hello".to_vec())], None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.merger.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_body_over_limit_is_payload_too_large() {
        let root = TempDir::new().unwrap();
        let mut config = MergerConfig::with_upload_root(root.path());
        config.max_upload_bytes = 1024;
        let (app, state) = test_app_with(config);
        assert!(state.body_limit() < 100 * 1024);

        let response = app
            .oneshot(upload_request(&[("big.pdf", vec![b'x'; 100 * 1024])], None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["status"], 413);
        assert_eq!(state.merger.session_count().await, 0);
    }
}
