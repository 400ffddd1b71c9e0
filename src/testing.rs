//! In-process station backend for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

#[derive(Debug, Clone)]
struct Canned {
    body: String,
    delay: Option<Duration>,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<Recorded>>,
    routes: Mutex<HashMap<String, Canned>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Records every request and answers with canned JSON per path (`{}` by default)
pub struct MockBackend {
    pub url: String,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let state = Arc::new(MockState::default());

        let app = Router::new().fallback(record).with_state(state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend serve");
        });

        Self { url: format!("http://{}", addr), state, task }
    }

    pub fn respond(&self, path: &str, body: &str) {
        self.respond_after(path, body, None);
    }

    pub fn respond_after(&self, path: &str, body: &str, delay: Option<Duration>) {
        self.state.routes.lock().unwrap().insert(
            path.trim_start_matches('/').to_string(),
            Canned { body: body.to_string(), delay },
        );
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    /// Highest number of requests the mock was serving at once
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests reached `path`; false on timeout
    pub async fn wait_for(&self, path: &str, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.requests_to(path).len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.requests_to(path).len() >= count
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record(State(state): State<Arc<MockState>>, method: Method, uri: Uri, body: String) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        body,
    });

    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(current, Ordering::SeqCst);

    let canned = state.routes.lock().unwrap().get(path.trim_start_matches('/')).cloned();
    let canned = canned.unwrap_or(Canned { body: "{}".to_string(), delay: None });
    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/json")], canned.body).into_response()
}
