// src/directory/mod.rs — Session directory: the set of conversations and the active one
//
// Every remote call and durable write happens before any in-memory change,
// so a failed operation leaves the directory exactly as it was.

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::CoachApi;
use crate::engine::transcript::Transcript;
use crate::infra::errors::CoachError;
use crate::infra::session::{self, ActiveSessionStore, Session};

pub struct SessionDirectory {
    api: Arc<dyn CoachApi>,
    store: Box<dyn ActiveSessionStore>,
    active_id: String,
    deleted: HashSet<String>,
}

impl SessionDirectory {
    /// Restore the active id from durable storage, or start a new conversation.
    pub fn open(
        api: Arc<dyn CoachApi>,
        store: Box<dyn ActiveSessionStore>,
    ) -> Result<Self, CoachError> {
        let active_id = match store.load() {
            Some(id) => id,
            None => {
                let id = session::new_session_id();
                store.save(&id)?;
                tracing::debug!("No stored session, starting {}", id);
                id
            }
        };
        Ok(Self {
            api,
            store,
            active_id,
            deleted: HashSet::new(),
        })
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// Conversations stored on the server, most recently updated first.
    pub async fn list_conversations(&self) -> Result<Vec<Session>, CoachError> {
        let mut sessions = self.api.list_conversations().await?;
        sessions.retain(|s| !self.deleted.contains(&s.id));
        // Stable sort: ties keep server order.
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Start a new conversation under a client-generated id. No server call.
    pub fn create_conversation(&mut self) -> Result<Transcript, CoachError> {
        let id = session::new_session_id();
        self.store.save(&id)?;
        tracing::info!("Started conversation {}", id);
        self.active_id = id;
        Ok(Transcript::fresh())
    }

    /// Fetch a conversation's history and make it active.
    pub async fn load_conversation(&mut self, id: &str) -> Result<Transcript, CoachError> {
        let messages = match self.api.fetch_messages(id).await {
            Ok(messages) => messages,
            // The active conversation exists only locally until its first exchange completes.
            Err(CoachError::NotFound { .. }) if id == self.active_id => Vec::new(),
            Err(e) => return Err(e),
        };
        self.store.save(id)?;
        tracing::info!("Switched to conversation {} ({} messages)", id, messages.len());
        self.deleted.remove(id);
        self.active_id = id.to_string();
        Ok(Transcript::from_history(messages))
    }

    /// Delete a conversation. Returns the fresh transcript when the active
    /// conversation was the one deleted.
    pub async fn delete_conversation(
        &mut self,
        id: &str,
    ) -> Result<Option<Transcript>, CoachError> {
        self.api.delete_conversation(id).await?;
        tracing::info!("Deleted conversation {}", id);

        let replacement = if id == self.active_id {
            match self.create_conversation() {
                Ok(t) => Some(t),
                Err(e) => {
                    // Server side is gone already; keep the tombstone so it stays hidden.
                    self.deleted.insert(id.to_string());
                    return Err(e);
                }
            }
        } else {
            None
        };
        self.deleted.insert(id.to_string());
        Ok(replacement)
    }

    /// Adopt the id the server assigned in a final message.
    ///
    /// The server already files the conversation under this id, so the
    /// in-memory switch happens even when the durable write fails; the write
    /// error is still returned.
    pub fn adopt(&mut self, id: &str) -> Result<(), CoachError> {
        self.deleted.remove(id);
        if id == self.active_id {
            return Ok(());
        }
        tracing::debug!("Server assigned session {}", id);
        self.active_id = id.to_string();
        self.store.save(id)
    }
}
