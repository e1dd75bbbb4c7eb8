use api_lib::config::Config;
use api_lib::web::{self, AppState, LlmBackends};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use roadmap_core::memory::{InMemoryChatSessionStore, InMemoryRepository};
use roadmap_core::ports::{LlmService, PortResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Answers roadmap prompts with a two-day plan and everything else with canned prose.
struct FakeLlm;

#[async_trait]
impl LlmService for FakeLlm {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        if prompt.contains("exactly 2 days") {
            let reply = json!({
                "title": "Rust in two days",
                "timeline": "2 days",
                "prepType": "Skill Building",
                "roadmap": [
                    {"id": "day-1", "title": "Day 1: Ownership", "description": "Moves and borrows",
                     "topics": [{"id": "t1", "title": "Ownership"}, {"id": "t2", "title": "Borrowing"}]},
                    {"id": "day-2", "title": "Day 2: Traits", "description": "Generic code",
                     "topics": [{"id": "t3", "title": "Traits"}, {"id": "t4", "title": "Generics"}]}
                ]
            });
            return Ok(format!("Sure! {}", reply));
        }
        Ok("Some generated material.".to_string())
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

fn test_app() -> TestApp {
    let config = Config::from_vars(HashMap::new()).unwrap();
    let repo = Arc::new(InMemoryRepository::new());
    let state = Arc::new(AppState::new(
        Arc::new(config),
        repo.clone(),
        repo,
        LlmBackends::shared(Arc::new(FakeLlm)),
        Arc::new(InMemoryChatSessionStore::new()),
    ));
    TestApp {
        router: web::router(state.clone()),
        state,
    }
}

async fn call(
    app: &TestApp,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn build_journey(app: &TestApp, user: Uuid) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/roadmap/build",
        Some(user),
        Some(json!({"goal": "Learn Rust", "timelineDays": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["generationQueue"]["processing"], false);
}

#[tokio::test]
async fn api_routes_require_a_user_id() {
    let app = test_app();
    let (status, _) = call(&app, Method::GET, "/api/roadmap/journeys", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/roadmap/journeys")
        .header("x-user-id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn build_then_generate_initial_fills_every_topic() {
    let app = test_app();
    let user = Uuid::new_v4();
    let detail = build_journey(&app, user).await;
    let journey_id = detail["journey"]["id"].as_str().unwrap().to_string();
    assert_eq!(detail["journey"]["durationDays"], 2);
    assert_eq!(detail["days"][1]["dayNumber"], 2);
    assert_eq!(detail["days"][0]["topics"][0]["hasContent"], false);

    let (status, report) = call(
        &app,
        Method::POST,
        &format!("/api/topic-content/generate-initial/{}", journey_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["dayOneGenerated"].as_array().unwrap().len(), 2);
    assert_eq!(report["queued"], 2);

    app.state.queue.wait_idle().await;

    let (status, progress) = call(
        &app,
        Method::GET,
        &format!("/api/topic-content/status/{}", journey_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["totalTopics"], 4);
    assert_eq!(progress["generatedTopics"], 4);
    assert_eq!(progress["percentComplete"], 100);
    assert_eq!(progress["isComplete"], true);

    let (_, journeys) = call(&app, Method::GET, "/api/roadmap/journeys", Some(user), None).await;
    assert_eq!(journeys.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn topic_content_is_generated_on_first_read() {
    let app = test_app();
    let user = Uuid::new_v4();
    let detail = build_journey(&app, user).await;
    let topic_id = detail["days"][1]["topics"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/topic-content/topic/{}", topic_id);

    let (status, first) = call(&app, Method::GET, &uri, Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["generatedNow"], true);
    assert_eq!(first["name"], "Traits");

    let (_, second) = call(&app, Method::GET, &uri, Some(user), None).await;
    assert_eq!(second["generatedNow"], false);
    assert_eq!(second["content"], first["content"]);
}

#[tokio::test]
async fn other_users_cannot_read_a_journey() {
    let app = test_app();
    let owner = Uuid::new_v4();
    let detail = build_journey(&app, owner).await;
    let journey_id = detail["journey"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/roadmap/{}", journey_id),
        Some(Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/roadmap/{}", Uuid::new_v4()),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["details"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn invalid_timeline_is_a_bad_request() {
    let app = test_app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/roadmap/generate",
        Some(Uuid::new_v4()),
        Some(json!({"goal": "Learn Rust", "timelineDays": 400})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("365"));
}

#[tokio::test]
async fn progress_and_visits_are_tracked() {
    let app = test_app();
    let user = Uuid::new_v4();
    let detail = build_journey(&app, user).await;
    let journey_id = detail["journey"]["id"].as_str().unwrap().to_string();
    let topic_id = detail["days"][0]["topics"][0]["id"].as_str().unwrap().to_string();

    let (status, progress) = call(
        &app,
        Method::PATCH,
        &format!("/api/roadmap/{}/topic/{}", journey_id, topic_id),
        Some(user),
        Some(json!({"completed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["progressPercent"], 25);
    assert_eq!(progress["allTopicsCompleted"], false);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/roadmap/{}/visit/2", journey_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/roadmap/{}/visit/3", journey_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = call(
        &app,
        Method::GET,
        &format!("/api/roadmap/{}", journey_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(detail["journey"]["lastVisitedDay"], 2);
}

#[tokio::test]
async fn chat_and_simplify_round_trip() {
    let app = test_app();
    let user = Uuid::new_v4();
    let detail = build_journey(&app, user).await;
    let journey_id = detail["journey"]["id"].as_str().unwrap().to_string();

    let (status, reply) = call(
        &app,
        Method::POST,
        "/api/ai/chat",
        Some(user),
        Some(json!({"journeyId": journey_id, "message": "Where do I start?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", reply);
    assert!(reply["sessionId"].as_str().unwrap().starts_with("session-"));
    assert_eq!(reply["reply"], "Some generated material.");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/ai/chat",
        Some(user),
        Some(json!({"journeyId": journey_id, "message": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, simplified) = call(
        &app,
        Method::POST,
        "/api/ai/simplify",
        Some(user),
        Some(json!({"text": "Affine types constrain aliasing."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(simplified["simplified"], "Some generated material.");
}

const BOUNDARY: &str = "resume-upload-boundary";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

async fn upload(app: &TestApp, field: &str, content_type: &str, file: &[u8]) -> (StatusCode, Value) {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"resume\"\r\nContent-Type: {content_type}\r\n\r\n",
        b = BOUNDARY,
    )
    .into_bytes();
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/resume-parser/parse")
        .header("x-user-id", Uuid::new_v4().to_string())
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn docx_resume_text_is_extracted() {
    let app = test_app();
    let file = docx(&["Jane Doe", "Senior Rust engineer"]);

    let (status, body) = upload(&app, "file", DOCX_MIME, &file).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["rawText"], "Jane Doe\nSenior Rust engineer");
}

#[tokio::test]
async fn resume_upload_rejects_bad_input() {
    let app = test_app();

    let (status, body) = upload(&app, "file", "text/plain", b"plain text resume").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("PDF or DOCX"));

    let (status, body) = upload(&app, "attachment", DOCX_MIME, &docx(&["x"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "No file provided");

    let (status, body) = upload(&app, "file", DOCX_MIME, b"definitely not a zip").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("DOCX"));
}

#[tokio::test]
async fn resume_larger_than_five_megabytes_is_refused() {
    let app = test_app();
    let file = vec![b'a'; 5 * 1024 * 1024 + 1];

    let (status, _) = upload(&app, "file", "application/pdf", &file).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
