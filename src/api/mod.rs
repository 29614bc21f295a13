// src/api/mod.rs — Remote coach API boundary

pub mod http;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::types::Message;
use crate::infra::errors::CoachError;
use crate::infra::session::Session;
use crate::stream::ByteStream;

/// Body of the streaming analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub message: String,
    pub session_id: String,
}

/// Everything the engine and the session directory need from the server.
#[async_trait]
pub trait CoachApi: Send + Sync {
    /// Start an analysis turn. The returned body is the raw event stream.
    async fn open_analysis(&self, request: &AnalysisRequest) -> Result<ByteStream, CoachError>;

    async fn list_conversations(&self) -> Result<Vec<Session>, CoachError>;

    /// Stored history for one conversation, oldest first.
    async fn fetch_messages(&self, session_id: &str) -> Result<Vec<Message>, CoachError>;

    async fn delete_conversation(&self, session_id: &str) -> Result<(), CoachError>;
}

pub use http::HttpCoachApi;
pub use retry::RetryingApi;
