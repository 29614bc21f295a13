// src/infra/errors.rs — Error types for tradecoach

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoachError {
    // Transport errors (retriable when the request never reached the server)
    #[error("Transport error: {message}")]
    Transport { message: String, retriable: bool },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Conversation '{session_id}' not found")]
    NotFound { session_id: String },

    // Engine errors
    #[error("A turn is already in flight; wait for it to finish")]
    TurnInFlight,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoachError {
    pub fn is_retriable(&self) -> bool {
        match self {
            CoachError::Transport { retriable, .. } => *retriable,
            CoachError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CoachError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return CoachError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            };
        }
        CoachError::Transport {
            retriable: e.is_timeout() || e.is_connect(),
            message: e.to_string(),
        }
    }
}
