// tests/api_tests.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use quiz_backend::{
    config::{Config, MailConfig},
    mail::{Delivery, MailError, Mailer, OutgoingMail},
    models::quiz::Quiz,
    routes,
    state::AppState,
    store::{StoreBackend, memory::MemoryBackend},
    utils::token::RandomTokens,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// Mail transport that records every message and bounces listed recipients.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    bounce: Vec<String>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<Delivery, MailError> {
        let bounced = self.bounce.contains(&mail.to);
        self.sent.lock().await.push(mail);
        if bounced {
            return Err(MailError::new("EENVELOPE", Some(550), "Recipient address rejected"));
        }
        Ok(Delivery {
            message_id: format!("test-{}", uuid::Uuid::new_v4()),
        })
    }
}

impl RecordingMailer {
    /// Waits for the background send to `to`, since finalize does not.
    async fn wait_for(&self, to: &str) -> Option<OutgoingMail> {
        for _ in 0..100 {
            if let Some(mail) = self.sent.lock().await.iter().find(|m| m.to == to) {
                return Some(mail.clone());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

fn sample_quiz() -> Quiz {
    serde_json::from_value(json!({
        "quizId": "Q1",
        "title": "Sample",
        "sections": [
            {
                "sectionId": "s1",
                "questions": [
                    {"questionId": 1, "question": "First?", "options": [{"key": "a"}, {"key": "b"}]},
                    {"questionId": "2", "question": "Second?", "options": [{"key": "a"}, {"key": "b"}]}
                ]
            }
        ],
        "scoringFramework": {
            "method": "categorical_sum",
            "categories": {"logic": ["1"], "people": [2]}
        }
    }))
    .expect("sample quiz must parse")
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the mail recorder.
async fn spawn_app(bounce: &[&str]) -> (String, Arc<RecordingMailer>) {
    let config = Config {
        database_url: None,
        rust_log: "error".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        quiz_seed_dir: None,
        mail: MailConfig {
            api_url: None,
            api_key: None,
            from_email: "quiz@x.com".to_string(),
            from_name: "Quiz".to_string(),
            owner_email: Some("owner@x.com".to_string()),
            results_site: None,
        },
    };

    let backend = Arc::new(MemoryBackend::new());
    backend
        .catalog()
        .put_quiz(&sample_quiz())
        .await
        .expect("Failed to seed quiz");

    let mailer = Arc::new(RecordingMailer {
        bounce: bounce.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });

    let state = AppState::with_parts(config, backend, mailer.clone(), Arc::new(RandomTokens));
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, mailer)
}

async fn register(client: &reqwest::Client, address: &str, email: &str) -> reqwest::Response {
    client
        .post(format!("{}/api/quizzes/Q1/register", address))
        .json(&json!({"name": "Ann", "email": email, "phone": "9876543210"}))
        .send()
        .await
        .expect("Failed to execute request")
}

async fn finalize(client: &reqwest::Client, address: &str, body: Value) -> reqwest::Response {
    client
        .post(format!("{}/api/quizzes/Q1/finalize", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

fn finalize_body(email: &str) -> Value {
    json!({
        "userId": "user_ann",
        "email": email,
        "name": "Ann",
        "answers": [
            {"questionId": "1", "selectedOption": "a"},
            {"questionId": "2", "selectedOption": "b"}
        ]
    })
}

#[tokio::test]
async fn health_check_404() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/health", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn quiz_is_served_flattened() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/api/quizzes/Q1", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["questionId"], "1");
    assert_eq!(questions[0]["sectionId"], "s1");

    let body: Value = client
        .get(format!("{}/api/quizzes/list", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"], json!(["Q1"]));
}

#[tokio::test]
async fn end_to_end_register_answer_finalize() {
    let (address, mailer) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let response = register(&client, &address, "ann@x.com").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let user_id = body["userId"].as_str().unwrap().to_string();
    assert!(user_id.starts_with("user_ann_x_com_"));

    for (question_id, key) in [("1", "a"), ("2", "b")] {
        let response = client
            .post(format!("{}/api/quizzes/Q1/answer", address))
            .json(&json!({"email": "ann@x.com", "questionId": question_id, "optionKey": key}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let mut body = finalize_body("ann@x.com");
    body["userId"] = json!(user_id);
    let response = finalize(&client, &address, body).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["score"]["categories"], json!({"logic": 1.0, "people": 1.0}));
    assert_eq!(body["score"]["topCategory"], "logic");
    let token = body["resultToken"].as_str().expect("token must be set").to_string();

    let welcome = mailer.wait_for("ann@x.com").await.expect("welcome mail attempted");
    assert!(welcome.text.contains("Top category: logic"));
    assert!(mailer.wait_for("owner@x.com").await.is_some());

    let response = client
        .get(format!("{}/api/results/Q1/{}", address, token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["email"], "ann@x.com");
    assert_eq!(body["data"]["raw"]["answers"][1]["selectedOption"], "b");
}

#[tokio::test]
async fn result_lookup_ignores_email_case() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    register(&client, &address, "Ann@X.com").await;
    let response = finalize(&client, &address, finalize_body("ann@x.com")).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(format!("{}/api/quizzes/results", address))
        .query(&[("email", "ANN@x.COM"), ("quizId", "Q1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["quizId"], "Q1");
    assert!(body["data"]["resultToken"].is_string());

    let response = client
        .get(format!("{}/api/quizzes/results", address))
        .query(&[("email", "nobody@x.com"), ("quizId", "Q1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn registration_conflicts_after_completion() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    register(&client, &address, "ann@x.com").await;
    // Re-registering while in progress just updates the attempt.
    assert_eq!(register(&client, &address, "ann@x.com").await.status().as_u16(), 200);

    finalize(&client, &address, finalize_body("ann@x.com")).await;
    let response = register(&client, &address, "ann@x.com").await;
    assert_eq!(response.status().as_u16(), 409);

    // The attempt stayed completed: finalizing again still works and
    // returns the same result.
    let first: Value = finalize(&client, &address, finalize_body("ann@x.com"))
        .await
        .json()
        .await
        .unwrap();
    let second: Value = finalize(&client, &address, finalize_body("ann@x.com"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["status"], "completed");
    assert_eq!(first["resultToken"], second["resultToken"]);
}

#[tokio::test]
async fn register_rejects_invalid_fields() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes/Q1/register", address))
        .json(&json!({"name": "Ann", "email": "not-an-email", "phone": "12ab"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["phone"].is_array());
}

#[tokio::test]
async fn answer_save_requires_registration() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes/Q1/answer", address))
        .json(&json!({"email": "ghost@x.com", "questionId": 1, "optionKey": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .post(format!("{}/api/quizzes/Q1/answer", address))
        .json(&json!({"email": "ghost@x.com", "questionId": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn answer_save_replaces_same_question() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();
    register(&client, &address, "ann@x.com").await;

    let mut last = Value::Null;
    for key in ["a", "b"] {
        last = client
            .post(format!("{}/api/quizzes/Q1/answer", address))
            .json(&json!({"email": "ann@x.com", "questionId": 1, "optionKey": key}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    }
    assert_eq!(last["answerCount"], 1);
    assert_eq!(last["status"], "in_progress");
}

#[tokio::test]
async fn finalize_rejects_bad_payloads() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();
    register(&client, &address, "ann@x.com").await;

    let response = finalize(&client, &address, json!({"email": "ann@x.com", "answers": []})).await;
    assert_eq!(response.status().as_u16(), 400);

    let mut body = finalize_body("ann@x.com");
    body["answers"] = json!({"questionId": "1"});
    let response = finalize(&client, &address, body).await;
    assert_eq!(response.status().as_u16(), 400);

    let mut body = finalize_body("ann@x.com");
    body["answers"] = json!([
        {"questionId": "1", "selectedOption": "a"},
        {"questionId": "2"}
    ]);
    let response = finalize(&client, &address, body).await;
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"][0]["index"], 1);
}

#[tokio::test]
async fn welcome_failure_does_not_fail_finalize() {
    let (address, mailer) = spawn_app(&["ann@x.com"]).await;
    let client = reqwest::Client::new();
    register(&client, &address, "ann@x.com").await;

    let response = finalize(&client, &address, finalize_body("ann@x.com")).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["score"]["total"], 2.0);

    // The bounced send was still attempted, and the owner mail still went out.
    assert!(mailer.wait_for("ann@x.com").await.is_some());
    assert!(mailer.wait_for("owner@x.com").await.is_some());
}

#[tokio::test]
async fn unknown_quiz_finalize_is_404() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes/nope_v1/finalize", address))
        .json(&finalize_body("ann@x.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();
    register(&client, &address, "ann@x.com").await;

    // Missing email on autosave.
    let response = client
        .post(format!("{}/api/quizzes/Q1/answer", address))
        .json(&json!({"questionId": 1, "optionKey": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("email"));

    // Missing phone on registration.
    let response = client
        .post(format!("{}/api/quizzes/Q1/register", address))
        .json(&json!({"name": "Ann", "email": "bob@x.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Wrong type for a field.
    let response = client
        .post(format!("{}/api/quizzes/Q1/register", address))
        .json(&json!({"name": ["Ann"], "email": "bob@x.com", "phone": "9876543210"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Not JSON at all.
    let response = client
        .post(format!("{}/api/quizzes/Q1/finalize", address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_quiz_is_404_everywhere() {
    let (address, _) = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes/nope_v1/register", address))
        .json(&json!({"name": "Ann", "email": "ann@x.com", "phone": "9876543210"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Quiz not found: nope_v1");

    let response = client
        .post(format!("{}/api/quizzes/nope_v1/answer", address))
        .json(&json!({"email": "ann@x.com", "questionId": 1, "optionKey": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/api/quizzes/results", address))
        .query(&[("email", "ann@x.com"), ("quizId", "nope_v1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/api/results/nope_v1/tok_1", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // The same email still registers normally on a real quiz.
    assert_eq!(register(&client, &address, "ann@x.com").await.status().as_u16(), 200);
}
