// src/infra/session.rs — Conversation sessions and the durable active-session id

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use crate::infra::errors::CoachError;
use crate::infra::paths;

/// Summary of one stored conversation, as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "session_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "preview", alias = "last_message")]
    pub last_message_preview: String,
    #[serde(default)]
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generate a fresh opaque session id.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Durable storage for the active session id. Survives restarts.
pub trait ActiveSessionStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, id: &str) -> Result<(), CoachError>;
}

/// Stores the id as a single line in `~/.tradecoach/state/active-session`.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new(paths::active_session_path())
    }
}

impl ActiveSessionStore for FileSessionStore {
    fn load(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let id = content.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    /// Atomic write (temp file + rename).
    fn save(&self, id: &str) -> Result<(), CoachError> {
        let dir = self
            .path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let tmp = dir.join(".active-session.tmp");
        let mut f = std::fs::File::create(&tmp)?;
        writeln!(f, "{}", id)?;
        f.flush()?;
        f.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process store, used by tests and one-shot commands.
#[derive(Default)]
pub struct MemorySessionStore {
    id: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Mutex::new(Some(id.into())),
        }
    }
}

impl ActiveSessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.id.lock().ok().and_then(|g| g.clone())
    }

    fn save(&self, id: &str) -> Result<(), CoachError> {
        let mut guard = self
            .id
            .lock()
            .map_err(|_| CoachError::Other(anyhow::anyhow!("session store lock poisoned")))?;
        *guard = Some(id.to_string());
        Ok(())
    }
}
