use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use quizgen::client::{ClientError, QuizApiClient};
use quizgen::config::Config;
use quizgen::session::{Feedback, QuizSession};
use quizgen::{build_state, routes::build_router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum Reply {
    Content(String),
    Status(StatusCode, Value),
    Raw(Value),
}

struct FakeProvider {
    question_reply: Reply,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
    auth: Mutex<Option<String>>,
}

type Shared = Arc<FakeProvider>;

async fn fake_chat_completions(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.calls.fetch_add(1, Ordering::SeqCst);
    fake.models
        .lock()
        .unwrap()
        .push(body["model"].as_str().unwrap_or_default().to_string());
    *fake.auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    let reply = if body["response_format"]["type"] == "json_object" {
        fake.question_reply.clone()
    } else {
        Reply::Content(format!("echo: {}", prompt))
    };
    match reply {
        Reply::Content(content) => (
            StatusCode::OK,
            Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })),
        ),
        Reply::Status(status, body) => (status, Json(body)),
        Reply::Raw(body) => (StatusCode::OK, Json(body)),
    }
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_server(question_reply: Reply) -> (String, Shared) {
    let fake = Arc::new(FakeProvider {
        question_reply,
        calls: AtomicUsize::new(0),
        models: Mutex::new(Vec::new()),
        auth: Mutex::new(None),
    });
    let provider_url = spawn(
        Router::new()
            .route("/v1/chat/completions", post(fake_chat_completions))
            .with_state(fake.clone()),
    )
    .await;

    let config = Config::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "OPENAI_BASE_URL" => Some(format!("{}/v1", provider_url)),
        _ => None,
    })
    .unwrap();
    let state = build_state(&config).expect("state");
    (spawn(build_router(state)).await, fake)
}

fn record(n: usize) -> Value {
    json!({
        "question": format!("Question {}?", n),
        "options": ["A", "B", "C", "D"],
        "correctAnswer": "C",
        "explanation": format!("C explains {}.", n)
    })
}

fn fenced_questions() -> Reply {
    let mut broken = record(99);
    broken.as_object_mut().unwrap().remove("correctAnswer");
    let payload = json!({ "questions": [record(1), broken, record(2), record(3)] });
    Reply::Content(format!("Sure!\n```json\n{}\n```", payload))
}

#[tokio::test]
async fn generate_questions_repairs_and_filters() {
    let (base, fake) = spawn_server(fenced_questions()).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/generate-questions", base))
        .json(&json!({ "text": "Some study notes.", "numQuestions": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<Value>().await.unwrap();
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0]["question"], "Question 1?");
    assert_eq!(questions[2]["question"], "Question 3?");
    assert_eq!(questions[1]["correctAnswer"], "C");

    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.models.lock().unwrap()[0], "gpt-3.5-turbo-0125");
    assert_eq!(fake.auth.lock().unwrap().as_deref(), Some("Bearer sk-test"));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_the_provider() {
    let (base, fake) = spawn_server(fenced_questions()).await;
    let client = reqwest::Client::new();
    let cases = [
        json!({ "text": "notes", "numQuestions": 0 }),
        json!({ "text": "notes", "numQuestions": -1 }),
        json!({ "text": "notes", "numQuestions": 2.5 }),
        json!({ "text": "notes", "numQuestions": "3" }),
        json!({ "text": "notes", "numQuestions": null }),
        json!({ "text": "   " }),
        json!({ "numQuestions": 3 }),
    ];
    for case in cases {
        let resp = client
            .post(format!("{}/api/generate-questions", base))
            .json(&case)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload {}", case);
        let body = resp.json::<Value>().await.unwrap();
        assert!(body["error"].is_string());
    }

    let resp = client
        .post(format!("{}/api/generate-questions", base))
        .json(&json!({ "text": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.json::<Value>().await.unwrap()["error"], "Source text cannot be empty.");

    let resp = client
        .post(format!("{}/api/generate-info", base))
        .json(&json!({ "topic": " " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.json::<Value>().await.unwrap()["error"], "Topic cannot be empty.");

    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn default_count_is_five() {
    let (base, _fake) = spawn_server(Reply::Content(json!({ "questions": [record(1)] }).to_string())).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/generate-questions", base))
        .json(&json!({ "text": "notes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn provider_errors_do_not_leak() {
    let (base, fake) = spawn_server(Reply::Status(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Incorrect API key provided: sk-test", "code": "invalid_api_key" } }),
    ))
    .await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/generate-questions", base))
        .header("x-request-id", "req-42")
        .json(&json!({ "text": "notes", "numQuestions": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let text = resp.text().await.unwrap();
    assert!(!text.contains("invalid_api_key"));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "An error occurred while generating questions.");
    assert_eq!(body["requestId"], "req-42");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unusable_completions_are_500() {
    let replies = [
        Reply::Content("Here are some questions: 1. What is...".to_string()),
        Reply::Content(json!({ "items": [] }).to_string()),
        Reply::Content(json!({ "questions": [{ "question": "no options" }] }).to_string()),
        Reply::Raw(json!({ "choices": [] })),
    ];
    for reply in replies {
        let (base, fake) = spawn_server(reply).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/generate-questions", base))
            .json(&json!({ "text": "notes", "numQuestions": 1 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert!(resp.json::<Value>().await.unwrap()["error"].is_string());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn generate_info_and_expand() {
    let (base, fake) = spawn_server(fenced_questions()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/generate-info", base))
        .json(&json!({ "topic": "Volcanoes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let text = resp.json::<Value>().await.unwrap()["informationalText"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(text.starts_with("echo: Generate comprehensive information about the topic: \"Volcanoes\""));

    let resp = client
        .post(format!("{}/api/generate-info", base))
        .json(&json!({ "topic": "Volcanoes", "currentText": text, "expansionQuery": "What is magma?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let expanded = resp.json::<Value>().await.unwrap()["informationalText"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(expanded.contains("Expand on this specific query: \"What is magma?\""));

    let resp = client
        .post(format!("{}/api/generate-info", base))
        .json(&json!({ "topic": "Volcanoes", "currentText": "x", "expansionQuery": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    assert!(fake.models.lock().unwrap().iter().all(|m| m == "gpt-3.5-turbo"));
}

#[tokio::test]
async fn api_client_feeds_a_session() {
    let (base, _fake) = spawn_server(fenced_questions()).await;
    let api = QuizApiClient::new(base);
    let questions = api.generate_questions("Some study notes.", 4).await.unwrap();
    assert_eq!(questions.len(), 3);

    let mut session = QuizSession::start(questions).unwrap();
    for answer in ["C", "A", "C"] {
        let feedback = session.submit_answer(Some(answer)).unwrap();
        assert!(!matches!(feedback, Feedback::NoSelection | Feedback::DataError { .. }));
        session.advance().unwrap();
    }
    let summary = session.summary().unwrap();
    assert_eq!(summary.score, 2);
    assert!((summary.percentage - 200.0 / 3.0).abs() < 1e-9);

    let info = api.expand_info("Volcanoes", "old text", "What is lava?").await.unwrap();
    assert!(info.contains("old text"));
}

#[tokio::test]
async fn api_client_reports_server_errors() {
    let (base, _fake) = spawn_server(Reply::Content(json!({ "questions": [] }).to_string())).await;
    let api = QuizApiClient::new(base);
    assert!(matches!(
        api.generate_questions("notes", 2).await,
        Err(ClientError::NoQuestions)
    ));

    let (base, _fake) = spawn_server(Reply::Content("not json".to_string())).await;
    match QuizApiClient::new(base).generate_questions("notes", 2).await {
        Err(ClientError::Server(message)) => {
            assert_eq!(message, "An error occurred while generating questions.")
        }
        other => panic!("unexpected result: {:?}", other.map(|q| q.len())),
    }
}
