// src/coach.rs — Coach session: directory + turn engine behind one handle

use std::sync::Arc;
use std::time::Duration;

use crate::api::CoachApi;
use crate::directory::SessionDirectory;
use crate::engine::turn::{TurnEngine, TurnOutcome, TurnProgress};
use crate::engine::Transcript;
use crate::infra::errors::CoachError;
use crate::infra::session::{ActiveSessionStore, Session};

/// One user's view of the coach: the active conversation and its transcript.
pub struct Coach {
    api: Arc<dyn CoachApi>,
    directory: SessionDirectory,
    engine: TurnEngine,
    idle_timeout: Option<Duration>,
}

impl Coach {
    pub fn new(
        api: Arc<dyn CoachApi>,
        store: Box<dyn ActiveSessionStore>,
    ) -> Result<Self, CoachError> {
        let directory = SessionDirectory::open(api.clone(), store)?;
        Ok(Self {
            api,
            directory,
            engine: TurnEngine::default(),
            idle_timeout: None,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(TurnProgress) + Send + 'static) -> Self {
        self.engine = self.engine.with_progress(progress);
        self
    }

    pub fn active_session_id(&self) -> &str {
        self.directory.active_id()
    }

    pub fn transcript(&self) -> &Transcript {
        self.engine.transcript()
    }

    pub fn engine(&self) -> &TurnEngine {
        &self.engine
    }

    pub fn is_input_locked(&self) -> bool {
        self.engine.is_input_locked()
    }

    /// Send one message and stream the reply into the transcript.
    pub async fn send(&mut self, text: &str) -> Result<TurnOutcome, CoachError> {
        let session_id = self.directory.active_id().to_string();
        let outcome = self
            .engine
            .run(self.api.as_ref(), &session_id, text, self.idle_timeout)
            .await?;
        self.adopt_assigned(&outcome);
        Ok(outcome)
    }

    /// Resolve an abandoned turn (e.g. the send future was dropped on Ctrl-C).
    ///
    /// Returns the outcome of the turn that was in flight, if any. A session id
    /// the server assigned before the cancel is still adopted.
    pub fn abort_turn(&mut self) -> Option<TurnOutcome> {
        self.engine.abort();
        let outcome = self.engine.take_outcome()?;
        self.adopt_assigned(&outcome);
        Some(outcome)
    }

    fn adopt_assigned(&mut self, outcome: &TurnOutcome) {
        if let Some(ref assigned) = outcome.session_id {
            // The active id already follows the server; only the durable copy is stale.
            if let Err(e) = self.directory.adopt(assigned) {
                tracing::warn!("Could not persist session id {}: {}", assigned, e);
            }
        }
    }

    pub async fn list_conversations(&self) -> Result<Vec<Session>, CoachError> {
        self.directory.list_conversations().await
    }

    pub fn create_conversation(&mut self) -> Result<String, CoachError> {
        self.ensure_idle()?;
        let transcript = self.directory.create_conversation()?;
        self.engine.replace_transcript(transcript)?;
        Ok(self.directory.active_id().to_string())
    }

    pub async fn load_conversation(&mut self, id: &str) -> Result<(), CoachError> {
        self.ensure_idle()?;
        let transcript = self.directory.load_conversation(id).await?;
        self.engine.replace_transcript(transcript)
    }

    pub async fn delete_conversation(&mut self, id: &str) -> Result<(), CoachError> {
        self.ensure_idle()?;
        if let Some(transcript) = self.directory.delete_conversation(id).await? {
            self.engine.replace_transcript(transcript)?;
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), CoachError> {
        if self.engine.is_input_locked() {
            Err(CoachError::TurnInFlight)
        } else {
            Ok(())
        }
    }
}
