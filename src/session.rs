//! Conversation session storage.
//!
//! Sessions are process-local, append-only turn logs keyed by an opaque id.
//! The store hands out one exclusive lock per session, so concurrent turns
//! on the same session serialize while distinct sessions never contend.
//! There is no expiry here; session lifetime policy belongs to the process
//! embedding the store.
//!
//! The store is an explicit dependency injected into the controller, not
//! ambient global state, so a persistent implementation can replace
//! [`MemorySessionStore`] without touching the controller.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::models::{ChatTurn, TurnRole};

/// An append-only conversation transcript.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn append(&mut self, role: TurnRole, content: impl Into<String>) {
        self.turns.push(ChatTurn::new(role, content));
    }

    /// Number of user-authored turns; drives the intake state machine.
    pub fn user_turn_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .count()
    }

    /// All user turns joined with single spaces. Used as the combined
    /// matching query: raw text rather than an LLM summary, so suggestion
    /// quality never depends on reply quality.
    pub fn combined_user_text(&self) -> String {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Keyed session storage with per-session locking.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get or create the session for `session_id`. Idempotent; the same id
    /// always yields the same session handle.
    async fn open(&self, session_id: &str) -> Arc<Mutex<ChatSession>>;

    /// Number of live sessions.
    async fn session_count(&self) -> usize;
}

/// In-memory session store. The outer `RwLock` only guards the map shape;
/// per-session mutation happens under each session's own `Mutex`, so
/// different sessions proceed independently.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<ChatSession>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn open(&self, session_id: &str) -> Arc<Mutex<ChatSession>> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ChatSession::default())))
            .clone()
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
