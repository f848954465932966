//! Shared stub backend for the integration suites.

#![allow(dead_code)]

use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use taskboard_client::{ApiClient, ClientConfig, InMemoryTokenStore, Session, TokenStore};
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "test-token";

/// Route client logs through the test harness; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn user_json() -> Value {
    json!({
        "_id": "user-1",
        "name": "Test User",
        "email": "test@example.com",
        "age": 30
    })
}

/// In-memory `/tasks` backend that filters like the real one
#[derive(Clone, Default)]
pub struct FakeTaskBackend {
    tasks: Arc<Mutex<Vec<Map<String, Value>>>>,
    next_id: Arc<AtomicU64>,
    list_calls: Arc<AtomicUsize>,
}

impl FakeTaskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task directly, returning its id
    pub fn seed(&self, title: &str, category: &str, completed: bool) -> String {
        let id = format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut task = Map::new();
        task.insert("_id".into(), json!(id));
        task.insert("title".into(), json!(title));
        task.insert("category".into(), json!(category));
        task.insert("completed".into(), json!(completed));
        task.insert("createdAt".into(), json!("2024-04-20T10:15:00.000Z"));
        self.tasks.lock().unwrap().push(task);
        id
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(r"^/tasks(/[^/]+)?$"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    fn list(&self, request: &Request) -> ResponseTemplate {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let mut completed = None;
        let mut category = None;
        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "completed" => completed = Some(value == "true"),
                "category" => category = Some(value.to_string()),
                _ => {}
            }
        }

        let tasks: Vec<Value> = self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|task| completed.is_none_or(|c| task["completed"] == json!(c)))
            .filter(|task| {
                category
                    .as_ref()
                    .is_none_or(|c| task.get("category") == Some(&json!(c)))
            })
            .cloned()
            .map(Value::Object)
            .collect();

        ResponseTemplate::new(200).set_body_json(tasks)
    }

    fn create(&self, request: &Request) -> ResponseTemplate {
        let Ok(Value::Object(mut task)) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "bad body"}));
        };
        let id = format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        task.insert("_id".into(), json!(id));
        task.entry("completed").or_insert(json!(false));
        self.tasks.lock().unwrap().push(task.clone());
        ResponseTemplate::new(201).set_body_json(Value::Object(task))
    }

    fn update(&self, id: &str, request: &Request) -> ResponseTemplate {
        let Ok(Value::Object(patch)) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "bad body"}));
        };
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.iter_mut().find(|task| task["_id"] == json!(id)) {
            Some(task) => {
                task.extend(patch);
                ResponseTemplate::new(200).set_body_json(Value::Object(task.clone()))
            }
            None => ResponseTemplate::new(404),
        }
    }

    fn delete(&self, id: &str) -> ResponseTemplate {
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|task| task["_id"] != json!(id));
        if tasks.len() < before {
            ResponseTemplate::new(200)
        } else {
            ResponseTemplate::new(404)
        }
    }
}

impl Respond for FakeTaskBackend {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let authorized = request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some(format!("Bearer {TOKEN}").as_str());

        if !authorized {
            return ResponseTemplate::new(401).set_body_json(json!({"error": "Please authenticate."}));
        }

        let id = request.url.path().strip_prefix("/tasks/").map(str::to_string);

        match (request.method.as_str(), id) {
            ("GET", None) => self.list(request),
            ("POST", None) => self.create(request),
            ("PATCH", Some(id)) => self.update(&id, request),
            ("DELETE", Some(id)) => self.delete(&id),
            _ => ResponseTemplate::new(405),
        }
    }
}

pub fn api_client(server: &MockServer, tokens: Arc<dyn TokenStore>) -> ApiClient {
    init_tracing();
    ApiClient::builder(server.uri(), tokens)
        .build()
        .expect("Failed to build API client")
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::builder().api_url(server.uri()).build()
}

/// Mount `GET /users/me` accepting the test token
pub async fn mount_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(server)
        .await;
}

/// Session restored from a persisted test token
pub async fn logged_in_session(server: &MockServer) -> Session {
    mount_profile(server).await;
    let tokens = Arc::new(InMemoryTokenStore::with_token(TOKEN));
    let session = Session::new(api_client(server, tokens));
    session
        .bootstrap()
        .await
        .expect("Bootstrap with the test token should succeed");
    session
}
