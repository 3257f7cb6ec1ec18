//! Shared helpers for server integration tests.
//!
//! `ToyChannel` is a tiny in-process kernel understanding just enough to
//! exercise the server: integer assignments (`b = a * 2`), `print(...)`,
//! bare expressions, `sleep <ms>` and `hang` (never reports idle).

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use jupycell_core::{
    BridgeConfig, ChannelFactory, Error, ExecutionState, Message, MessageChannel, Result,
};
use jupycell_server::{AppState, SessionRegistry, create_router};
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Default)]
pub struct ToyChannel {
    vars: HashMap<String, i64>,
    queue: VecDeque<Message>,
    executions: usize,
    shutdowns: Arc<AtomicUsize>,
}

impl ToyChannel {
    fn new(shutdowns: Arc<AtomicUsize>) -> Self {
        let mut channel = Self {
            shutdowns,
            ..Default::default()
        };
        channel
            .queue
            .push_back(Message::status(ExecutionState::Idle, None));
        channel
    }

    fn eval(&self, expr: &str) -> std::result::Result<i64, String> {
        let mut total = 0;
        for term in expr.split('+') {
            let mut product = 1;
            for factor in term.split('*') {
                let factor = factor.trim();
                product *= match factor.parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => *self
                        .vars
                        .get(factor)
                        .ok_or_else(|| format!("name '{}' is not defined", factor))?,
                };
            }
            total += product;
        }
        Ok(total)
    }

    fn run_line(&mut self, line: &str, stdout: &mut String) -> std::result::Result<Option<i64>, String> {
        if let Some(ms) = line.strip_prefix("sleep ") {
            let ms = ms.trim().parse().map_err(|_| "bad sleep".to_string())?;
            std::thread::sleep(Duration::from_millis(ms));
            return Ok(None);
        }
        if let Some(arg) = line.strip_prefix("print(").and_then(|rest| rest.strip_suffix(')')) {
            let arg = arg.trim();
            let text = if let Some(literal) = arg
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
            {
                literal.to_string()
            } else {
                self.eval(arg)?.to_string()
            };
            stdout.push_str(&text);
            stdout.push('\n');
            return Ok(None);
        }
        if let Some((name, expr)) = line.split_once('=') {
            let value = self.eval(expr)?;
            self.vars.insert(name.trim().to_string(), value);
            return Ok(None);
        }
        self.eval(line).map(Some)
    }
}

impl MessageChannel for ToyChannel {
    fn execute(&mut self, code: &str) -> Result<String> {
        self.executions += 1;
        let msg_id = format!("toy-{}", self.executions);
        let parent = Some(msg_id.as_str());
        let mut replies = vec![Message::status(ExecutionState::Busy, parent)];

        if code.trim() == "hang" {
            self.queue.extend(replies);
            return Ok(msg_id);
        }

        let mut stdout = String::new();
        let mut failure = None;
        let mut result = None;
        for line in code.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match self.run_line(line, &mut stdout) {
                Ok(value) => result = value,
                Err(message) => {
                    failure = Some(message);
                    break;
                }
            }
        }

        if !stdout.is_empty() {
            replies.push(Message::stream("stdout", &stdout, parent));
        }
        if let Some(message) = failure {
            replies.push(Message::new(
                "error",
                parent,
                json!({ "ename": "NameError", "evalue": message, "traceback": [] }),
            ));
        } else if let Some(value) = result {
            replies.push(Message::new(
                "execute_result",
                parent,
                json!({
                    "execution_count": self.executions,
                    "data": { "text/plain": value.to_string() },
                    "metadata": {}
                }),
            ));
        }
        replies.push(Message::status(ExecutionState::Idle, parent));

        self.queue.extend(replies);
        Ok(msg_id)
    }

    fn poll(&mut self, _timeout: Duration) -> Result<Option<Message>> {
        Ok(self.queue.pop_front())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Starts `ToyChannel`s, or fails every start when `broken`.
#[derive(Default)]
pub struct ToyFactory {
    pub started: AtomicUsize,
    pub shutdowns: Arc<AtomicUsize>,
    pub broken: bool,
}

impl ChannelFactory for ToyFactory {
    fn start(&self) -> Result<Box<dyn MessageChannel>> {
        if self.broken {
            return Err(Error::ChannelUnavailable("no interpreter".to_string()));
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToyChannel::new(self.shutdowns.clone())))
    }
}

/// Router and state backed by the given factory.
pub fn test_app(factory: Arc<ToyFactory>) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        registry: SessionRegistry::new(factory, BridgeConfig::default()),
    });
    (create_router(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn start_kernel(app: &Router) -> u64 {
    let request = Request::builder()
        .method("POST")
        .uri("/start")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    json["kernel_id"].as_u64().expect("kernel_id missing")
}

pub async fn cell(app: &Router, body: Value) -> Value {
    let (status, json) = post_json(app, "/cell", body).await;
    assert_eq!(status, StatusCode::OK);
    json
}

pub async fn add_cell(app: &Router, kernel_id: u64, number: i64, code: &str) {
    let json = cell(
        app,
        json!({ "kernel_id": kernel_id, "action": "add", "cell_number": number, "code": code }),
    )
    .await;
    assert_eq!(json["status"], format!("Cell {} added.", number));
}
