use thiserror::Error;

/// Errors produced while talking to the Cider RPC server or the sharing transport.
///
/// None of these cross the poller boundary: a failed poll cycle is logged and
/// treated as a disconnect, never surfaced to subscribers.
#[derive(Error, Debug)]
pub enum CiderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned HTTP status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unexpected response body from {0}")]
    InvalidBody(String),
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Playback controls are disabled in the configuration")]
    ControlsDisabled,
    #[error("Malformed track packet: {0}")]
    Packet(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl CiderError {
    pub fn status(endpoint: &str, status: reqwest::StatusCode) -> Self {
        CiderError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        }
    }

    pub fn packet(reason: impl Into<String>) -> Self {
        CiderError::Packet(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, CiderError>;
