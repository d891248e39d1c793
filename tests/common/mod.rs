#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use taskhive::app::AppState;
use taskhive::config::Config;
use taskhive::error::AppError;
use taskhive::mailer::{Email, Mailer};
use taskhive::store::MemoryStore;
use uuid::Uuid;

pub const PASSWORD: &str = "Password123!";

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn last(&self) -> Option<Email> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("DATABASE_URL", "postgres://unused"),
        ("JWT_SECRET", "integration-test-secret"),
        ("JWT_EXPIRES_IN", "1h"),
        ("BCRYPT_COST", "4"),
        ("FRONTEND_URL", "http://localhost:5173"),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

pub fn context() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let state = web::Data::new(AppState::new(&test_config(), store.clone(), mailer.clone()));
    TestContext {
        state,
        store,
        mailer,
    }
}

pub async fn call_json<S, B>(app: &S, req: Request) -> (u16, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    // Middleware errors are turned into responses the same way the server does.
    let (status, body) = match test::try_call_service(app, req).await {
        Ok(resp) => (resp.status().as_u16(), test::read_body(resp).await),
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status().as_u16();
            let body = actix_web::body::to_bytes(resp.into_body())
                .await
                .unwrap_or_default();
            (status, body)
        }
    };
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&body).to_string())
        })
    };
    (status, json)
}

/// Signs a user up and returns their token and id.
pub async fn signup<S, B>(app: &S, name: &str, email: &str) -> (String, Uuid)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/signup")
        .set_json(json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
            "passwordConfirm": PASSWORD
        }))
        .to_request();
    let (status, body) = call_json(app, req).await;
    assert_eq!(status, 201, "signup failed: {}", body);

    let token = body["token"].as_str().unwrap().to_string();
    let id = Uuid::parse_str(body["data"]["user"]["id"].as_str().unwrap()).unwrap();
    (token, id)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Creates a project as the token's user and returns its id.
pub async fn create_project<S, B>(app: &S, token: &str, name: &str) -> Uuid
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/projects")
        .insert_header(bearer(token))
        .set_json(json!({ "name": name, "description": format!("{} project", name) }))
        .to_request();
    let (status, body) = call_json(app, req).await;
    assert_eq!(status, 201, "project creation failed: {}", body);
    Uuid::parse_str(body["data"]["project"]["id"].as_str().unwrap()).unwrap()
}

/// Adds the user registered under `email` to the project.
pub async fn add_member<S, B>(app: &S, token: &str, project_id: Uuid, email: &str) -> u16
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{}/members/add", project_id))
        .insert_header(bearer(token))
        .set_json(json!({ "email": email }))
        .to_request();
    call_json(app, req).await.0
}

pub async fn make_admin<S, B>(app: &S, token: &str, project_id: Uuid, user_id: Uuid) -> u16
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/projects/{}/members/role/makeAdmin", project_id))
        .insert_header(bearer(token))
        .set_json(json!({ "userId": user_id }))
        .to_request();
    call_json(app, req).await.0
}

/// Creates a task in the project and returns its id.
pub async fn create_task<S, B>(app: &S, token: &str, project_id: Uuid, title: &str) -> Uuid
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{}/tasks", project_id))
        .insert_header(bearer(token))
        .set_json(json!({ "title": title, "description": format!("{} details", title) }))
        .to_request();
    let (status, body) = call_json(app, req).await;
    assert_eq!(status, 201, "task creation failed: {}", body);
    Uuid::parse_str(body["data"]["task"]["id"].as_str().unwrap()).unwrap()
}
