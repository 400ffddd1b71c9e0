use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{InvalidInput, PanelError};

/// Produces the request body at invocation time
pub type GatherFn = Arc<dyn Fn() -> Result<Value, InvalidInput> + Send + Sync>;
/// Consumes the raw reply of a completed request
pub type SuccessFn = Arc<dyn Fn(Reply) -> Result<(), PanelError> + Send + Sync>;
/// Runs instead of the request when the gatherer rejects the input
pub type FailureFn = Arc<dyn Fn(&InvalidInput) + Send + Sync>;

/// Fully buffered response from the station
#[derive(Debug, Clone)]
pub struct Reply {
    pub endpoint: String,
    pub status: StatusCode,
    pub body: Bytes,
}

impl Reply {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PanelError> {
        serde_json::from_slice(&self.body).map_err(|source| PanelError::Decode {
            endpoint: self.endpoint.clone(),
            source,
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// GET and HEAD requests never carry a body
pub fn carries_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

pub fn parse_method(method: Option<&str>) -> Result<Method, PanelError> {
    match method {
        None => Ok(Method::POST),
        Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| PanelError::BadMethod(m.to_string())),
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// HTTP client bound to the station backend
#[derive(Debug, Clone)]
pub struct ActionClient {
    http: reqwest::Client,
    base_url: String,
}

impl ActionClient {
    pub fn new(base_url: &str) -> Result<Self, PanelError> {
        reqwest::Url::parse(base_url).map_err(|e| PanelError::BadUrl(format!("{}: {}", base_url, e)))?;
        // station services live on the local network
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|source| PanelError::Http { url: base_url.to_string(), source })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    /// Send one request to `/<name>`, serialising `body` as JSON when the method allows it
    pub async fn send(&self, name: &str, method: Method, body: Option<&Value>) -> Result<Reply, PanelError> {
        let url = self.endpoint(name);
        let mut request = self.http.request(method.clone(), &url);

        match body {
            Some(body) if carries_body(&method) => request = request.json(body),
            Some(body) if !is_empty_body(body) => {
                warn!("dropping request body for {} /{}: {} cannot carry one", method, name, method);
            }
            _ => {}
        }

        debug!("📤 {} {}", method, url);
        self.finish(request, url).await
    }

    /// GET `/<name>` with query parameters
    pub async fn get_query(&self, name: &str, query: &[(&str, &str)]) -> Result<Reply, PanelError> {
        let url = self.endpoint(name);
        debug!("📤 GET {} {:?}", url, query);
        let request = self.http.get(&url).query(query);
        self.finish(request, url).await
    }

    async fn finish(&self, request: reqwest::RequestBuilder, url: String) -> Result<Reply, PanelError> {
        let response = request
            .send()
            .await
            .map_err(|source| PanelError::Http { url: url.clone(), source })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| PanelError::Http { url: url.clone(), source })?;

        debug!("📥 {} from {} ({} bytes)", status, url, body.len());
        Ok(Reply { endpoint: url, status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Sent(StatusCode),
    Aborted,
}

/// Invocable binding of one named action to its gatherer and callbacks
#[derive(Clone)]
pub struct QueryHandler {
    client: ActionClient,
    name: String,
    method: Method,
    gather: GatherFn,
    on_success: SuccessFn,
    on_failure: Option<FailureFn>,
}

impl QueryHandler {
    pub fn new(client: ActionClient, name: &str, method: Method, gather: GatherFn, on_success: SuccessFn) -> Self {
        Self {
            client,
            name: name.to_string(),
            method,
            gather,
            on_success,
            on_failure: None,
        }
    }

    pub fn on_failure(mut self, on_failure: FailureFn) -> Self {
        self.on_failure = Some(on_failure);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub async fn invoke(&self) -> Result<QueryOutcome, PanelError> {
        let body = match (self.gather)() {
            Ok(body) => body,
            Err(invalid) => {
                debug!("🚫 {} aborted: {}", self.name, invalid);
                if let Some(on_failure) = &self.on_failure {
                    on_failure(&invalid);
                }
                return Ok(QueryOutcome::Aborted);
            }
        };

        let reply = self.client.send(&self.name, self.method.clone(), Some(&body)).await?;
        let status = reply.status;
        (self.on_success)(reply)?;
        Ok(QueryOutcome::Sent(status))
    }
}

impl std::fmt::Debug for QueryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandler")
            .field("name", &self.name)
            .field("method", &self.method)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_parse_method_defaults_to_post() {
        assert_eq!(parse_method(None).unwrap(), Method::POST);
        assert_eq!(parse_method(Some("get")).unwrap(), Method::GET);
        assert!(matches!(parse_method(Some("NOT A METHOD")), Err(PanelError::BadMethod(_))));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        assert!(matches!(ActionClient::new("not a url"), Err(PanelError::BadUrl(_))));
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let client = ActionClient::new("http://station:5000/").unwrap();
        assert_eq!(client.endpoint("snap"), "http://station:5000/snap");
        assert_eq!(client.endpoint("/data"), "http://station:5000/data");
    }

    #[tokio::test]
    async fn test_post_sends_gathered_json() {
        let backend = MockBackend::start().await;
        backend.respond("lights", r#"{"message": "Lights updated."}"#);
        let client = ActionClient::new(&backend.url).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let seen_in_callback = seen.clone();
        let handler = QueryHandler::new(
            client,
            "lights",
            Method::POST,
            Arc::new(|| Ok::<_, InvalidInput>(json!({"level": 40}))),
            Arc::new(move |reply: Reply| -> Result<(), PanelError> {
                *seen_in_callback.lock().unwrap() = Some(reply.text());
                Ok(())
            }),
        );

        let outcome = handler.invoke().await.unwrap();

        assert_eq!(outcome, QueryOutcome::Sent(StatusCode::OK));
        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/lights");
        assert_eq!(requests[0].json(), json!({"level": 40}));
        assert_eq!(seen.lock().unwrap().as_deref(), Some(r#"{"message": "Lights updated."}"#));
    }

    #[tokio::test]
    async fn test_get_drops_body() {
        let backend = MockBackend::start().await;
        let client = ActionClient::new(&backend.url).unwrap();

        client.send("photos", Method::GET, Some(&json!({"query": "123"}))).await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_skips_request() {
        let backend = MockBackend::start().await;
        let client = ActionClient::new(&backend.url).unwrap();

        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_in_callback = failures.clone();
        let handler = QueryHandler::new(
            client,
            "activate",
            Method::POST,
            Arc::new(|| Err::<Value, _>(InvalidInput::new("missing height"))),
            Arc::new(|_: Reply| -> Result<(), PanelError> { panic!("success callback must not run") }),
        )
        .on_failure(Arc::new(move |invalid: &InvalidInput| {
            failures_in_callback.lock().unwrap().push(invalid.to_string());
        }));

        let outcome = handler.invoke().await.unwrap();

        assert_eq!(outcome, QueryOutcome::Aborted);
        assert!(backend.requests().is_empty());
        assert_eq!(*failures.lock().unwrap(), vec!["missing height".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let client = ActionClient::new("http://127.0.0.1:1").unwrap();
        let result = client.send("snap", Method::POST, None).await;
        assert!(matches!(result, Err(PanelError::Http { .. })));
    }

    #[test]
    fn test_reply_json_reports_endpoint() {
        let reply = Reply {
            endpoint: "http://station/data".to_string(),
            status: StatusCode::OK,
            body: Bytes::from_static(b"not json"),
        };
        match reply.json::<Value>() {
            Err(PanelError::Decode { endpoint, .. }) => assert_eq!(endpoint, "http://station/data"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
