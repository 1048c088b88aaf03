//! Session store.
//!
//! Sessions live for the lifetime of the process and are only reachable
//! through a [`SessionStore`]. The store is shared between request tasks;
//! every mutation happens under its write lock, so each append is atomic.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SessionError;

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The connected client.
    User,
    /// This agent.
    Assistant,
}

/// One entry of a session's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    /// Who wrote it.
    pub role: Role,
    /// Flattened text.
    pub content: String,
}

impl PromptMessage {
    /// A message from the client.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A message from the agent.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Server-side conversation context.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    history: Vec<PromptMessage>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// History in append order.
    #[must_use]
    pub fn history(&self) -> &[PromptMessage] {
        &self.history
    }
}

/// Concurrency-safe map from session id to session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh identifier and inserts an empty session under it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] if the store lock is poisoned.
    pub fn create(&self) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;

        let mut id = Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let session = Session::new(id.clone());
        sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Returns true if `id` names a live session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] if the store lock is poisoned.
    pub fn contains(&self, id: &str) -> Result<bool, SessionError> {
        let sessions = self.sessions.read().map_err(|_| SessionError::Poisoned)?;
        Ok(sessions.contains_key(id))
    }

    /// Appends one message to a session's history and returns the new
    /// history length.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown ids and
    /// [`SessionError::Poisoned`] if the store lock is poisoned.
    pub fn append(&self, id: &str, message: PromptMessage) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        session.history.push(message);
        Ok(session.history.len())
    }

    /// Snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown ids and
    /// [`SessionError::Poisoned`] if the store lock is poisoned.
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().map_err(|_| SessionError::Poisoned)?;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    /// Number of live sessions.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, SessionError> {
        let sessions = self.sessions.read().map_err(|_| SessionError::Poisoned)?;
        Ok(sessions.len())
    }

    /// True if no session has been created.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, SessionError> {
        self.len().map(|n| n == 0)
    }
}
