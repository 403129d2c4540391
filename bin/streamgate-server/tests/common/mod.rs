#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use streamgate_core::{Backend, BackendError, CancellationToken, GenerateParams, IncrementStream};
use streamgate_server::config::Config;
use streamgate_server::routes;
use streamgate_server::state::AppState;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// One scripted backend action.
#[derive(Debug, Clone)]
pub enum Step {
    Text(&'static str),
    Fail(&'static str),
    /// Produce nothing until the call is cancelled.
    Hang,
    /// Stay silent for a while, then continue the script.
    Pause(Duration),
}

/// In-process backend that replays a script for every call.
#[derive(Default)]
pub struct StubBackend {
    script: Vec<Step>,
    fail_open: bool,
    pub opened: AtomicUsize,
    pub saw_cancel: Arc<AtomicBool>,
    pub last_params: Mutex<Option<GenerateParams>>,
}

impl StubBackend {
    pub fn scripted(script: Vec<Step>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn texts(texts: &[&'static str]) -> Self {
        Self::scripted(texts.iter().copied().map(Step::Text).collect())
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn saw_cancel(&self) -> bool {
        self.saw_cancel.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<GenerateParams> {
        self.last_params.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn open(
        &self,
        params: GenerateParams,
        cancel: CancellationToken,
    ) -> Result<IncrementStream, BackendError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params);
        if self.fail_open {
            return Err(BackendError::Unavailable("connection refused".into()));
        }

        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        let saw_cancel = Arc::clone(&self.saw_cancel);
        let worker_scope = cancel.clone();
        tokio::spawn(async move {
            for step in script {
                let item = match step {
                    Step::Text(text) => Ok(text.to_owned()),
                    Step::Fail(message) => Err(BackendError::Stream(message.to_owned())),
                    Step::Hang => {
                        worker_scope.cancelled().await;
                        saw_cancel.store(true, Ordering::SeqCst);
                        return;
                    }
                    Step::Pause(delay) => {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                };
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });

        Ok(IncrementStream::new(ReceiverStream::new(rx), cancel))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub backend: Arc<StubBackend>,
}

pub fn test_app(backend: StubBackend) -> TestApp {
    test_app_with(backend, Config::default())
}

pub fn test_app_with(backend: StubBackend, config: Config) -> TestApp {
    let backend = Arc::new(backend);
    let state = Arc::new(AppState::new(config, backend.clone()).unwrap());
    TestApp {
        router: routes::build(Arc::clone(&state)),
        state,
        backend,
    }
}

pub fn chat_request(body: serde_json::Value) -> Request<Body> {
    raw_chat_request(body.to_string())
}

pub fn raw_chat_request(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

/// Split an SSE body into the payloads of its `data:` frames, skipping
/// keep-alive comments.
pub fn sse_payloads(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .split("\n\n")
        .filter(|frame| !frame.trim().is_empty() && !frame.starts_with(':'))
        .map(|frame| frame.strip_prefix("data: ").unwrap_or(frame).to_owned())
        .collect()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
