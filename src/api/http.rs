// src/api/http.rs — reqwest implementation of the coach API

use async_trait::async_trait;
use futures::StreamExt;
use url::Url;

use super::types::{ConversationList, MessageList};
use super::{AnalysisRequest, CoachApi};
use crate::engine::types::Message;
use crate::infra::config::ApiConfig;
use crate::infra::errors::CoachError;
use crate::infra::session::Session;
use crate::stream::ByteStream;

pub struct HttpCoachApi {
    base_url: Url,
    stream_path: String,
    conversations_path: String,
    token: Option<String>,
    request_timeout: std::time::Duration,
    client: reqwest::Client,
}

impl HttpCoachApi {
    pub fn new(config: &ApiConfig) -> Result<Self, CoachError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CoachError::Config(format!("invalid base_url '{}': {}", config.base_url, e)))?;
        Ok(Self {
            base_url,
            stream_path: config.stream_path.clone(),
            conversations_path: config.conversations_path.clone(),
            token: config.token(),
            request_timeout: config.request_timeout(),
            client: reqwest::Client::new(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Join a path onto the base URL, keeping any path prefix the base carries.
    fn endpoint(&self, path: &str) -> Result<Url, CoachError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| CoachError::Config(format!("invalid URL '{}': {}", joined, e)))
    }

    fn conversation_url(&self, session_id: &str, suffix: Option<&str>) -> Result<Url, CoachError> {
        let mut url = self.endpoint(&self.conversations_path)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CoachError::Config("base_url cannot carry a path".into()))?;
            segments.pop_if_empty().push(session_id);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, CoachError> {
        let response = self.authorize(builder).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(id) = session_id {
                return Err(CoachError::NotFound {
                    session_id: id.to_string(),
                });
            }
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CoachError::Http {
                status: status.as_u16(),
                message: error_body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CoachApi for HttpCoachApi {
    async fn open_analysis(&self, request: &AnalysisRequest) -> Result<ByteStream, CoachError> {
        let url = self.endpoint(&self.stream_path)?;
        tracing::debug!("POST {} (session {})", url, request.session_id);

        // No request timeout: the stream is open for as long as the analysis runs.
        let builder = self
            .client
            .post(url)
            .header("accept", "text/event-stream")
            .json(request);
        let response = self.send(builder, None).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CoachError::from));
        Ok(Box::pin(stream))
    }

    async fn list_conversations(&self) -> Result<Vec<Session>, CoachError> {
        let url = self.endpoint(&self.conversations_path)?;
        let builder = self.client.get(url).timeout(self.request_timeout);
        let response = self.send(builder, None).await?;
        let list: ConversationList = response.json().await?;
        Ok(list.into_sessions())
    }

    async fn fetch_messages(&self, session_id: &str) -> Result<Vec<Message>, CoachError> {
        let url = self.conversation_url(session_id, Some("messages"))?;
        let builder = self.client.get(url).timeout(self.request_timeout);
        let response = self.send(builder, Some(session_id)).await?;
        let list: MessageList = response.json().await?;
        Ok(list.into_messages())
    }

    async fn delete_conversation(&self, session_id: &str) -> Result<(), CoachError> {
        let url = self.conversation_url(session_id, None)?;
        let builder = self.client.delete(url).timeout(self.request_timeout);
        self.send(builder, Some(session_id)).await?;
        Ok(())
    }
}
