use thiserror::Error;

/// Raised by a gatherer when the panel inputs cannot produce a request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl InvalidInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url {0}")]
    BadUrl(String),

    #[error("no lookup service configured")]
    LookupUnavailable,

    #[error("no control named {0}")]
    UnknownControl(String),

    #[error("invalid http method {0}")]
    BadMethod(String),
}
