use thiserror::Error;

/// Failure talking to a remote backend.
///
/// Fetcher and mutator functions surface exactly these conditions; retry
/// policy (none) and user messaging are decided upstream.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("resource not found")]
    NotFound,
    #[error("malformed document: {message}")]
    Malformed { message: String },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request requires a signed-in session")]
    Unauthenticated,
    #[error("fetch stopped before completion")]
    Interrupted,
}

impl RemoteError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
