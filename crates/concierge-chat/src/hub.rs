//! Conversation hub: active sessions and per-client ordering.
//!
//! Each active client owns one profile behind an async mutex. A call holds
//! that mutex for its whole duration, so one client's messages are handled
//! strictly in arrival order while other clients proceed in parallel.
//!
//! A session stays in the map while any connection for its client is open,
//! so every connection of one client shares the same mutex.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use concierge_core::{ConversationStats, Reply, SessionProfile};
use concierge_memory::SessionMemory;

use crate::composer::ResponseComposer;
use crate::error::ChatError;
use crate::intent::classify;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// One client's in-memory state.
struct Session {
    profile: Mutex<SessionProfile>,
    /// Open connections for this client.
    connections: AtomicUsize,
}

impl Session {
    fn new(profile: SessionProfile) -> Self {
        Self {
            profile: Mutex::new(profile),
            connections: AtomicUsize::new(0),
        }
    }
}

pub struct ConversationHub {
    sessions: DashMap<String, Arc<Session>>,
    memory: Arc<SessionMemory>,
    composer: ResponseComposer,
}

impl ConversationHub {
    pub fn new(memory: Arc<SessionMemory>, composer: ResponseComposer) -> Self {
        Self {
            sessions: DashMap::new(),
            memory,
            composer,
        }
    }

    /// The active session for `client_id`, loading it on first use.
    fn session(&self, client_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.get(client_id) {
            return session.value().clone();
        }
        self.sessions
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(Session::new(self.load_profile(client_id))))
            .value()
            .clone()
    }

    fn active(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(client_id).map(|s| s.value().clone())
    }

    /// Load a profile to activate. A corrupt record is logged and replaced
    /// by an empty profile, which the next save writes over it.
    fn load_profile(&self, client_id: &str) -> SessionProfile {
        match self.memory.read(client_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => SessionProfile::new(client_id),
            Err(e) => {
                let err = ChatError::from(e);
                warn!(client_id, error = %err, "Starting from an empty profile");
                SessionProfile::new(client_id)
            }
        }
    }

    /// Start a connection for `client_id`, counting it as a new session.
    pub async fn begin_session(&self, client_id: &str) -> ConversationStats {
        let session = {
            let entry = self
                .sessions
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(Session::new(self.load_profile(client_id))));
            entry.connections.fetch_add(1, Ordering::AcqRel);
            entry.value().clone()
        };

        let mut profile = session.profile.lock().await;
        profile.session_count += 1;
        if let Err(e) = self.memory.save(&profile) {
            warn!(client_id, error = %e, "Failed to save profile");
        }
        info!(
            client_id,
            session_count = profile.session_count,
            turns = profile.turns.len(),
            "Session started"
        );
        self.memory.stats(&profile)
    }

    /// Validate, classify and answer one chat message.
    pub async fn handle_chat(&self, client_id: &str, message: &str) -> Result<Reply, ChatError> {
        let message = validate_message(message)?;

        let session = self.session(client_id);
        let mut profile = session.profile.lock().await;

        let intent = classify(message);
        debug!(client_id, intent = %intent, "Message classified");
        Ok(self.composer.compose(&mut profile, message, intent).await)
    }

    /// Reset `client_id` to an empty profile, active or not.
    pub async fn clear(&self, client_id: &str) -> Result<(), ChatError> {
        let session = match self.sessions.entry(client_id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(_) => {
                // The vacant entry keeps the shard locked, so nobody loads
                // the old profile while it is being replaced.
                self.memory.clear(client_id)?;
                return Ok(());
            }
        };
        let mut profile = session.profile.lock().await;
        self.composer.reset(&mut profile)
    }

    pub async fn stats(&self, client_id: &str) -> ConversationStats {
        match self.active(client_id) {
            Some(session) => {
                let profile = session.profile.lock().await;
                self.memory.stats(&profile)
            }
            None => self.memory.stats(&self.memory.load(client_id)),
        }
    }

    /// Close one connection. The session leaves memory once its last
    /// connection closes; the persisted profile stays.
    pub fn end_session(&self, client_id: &str) {
        if let Some(session) = self.active(client_id) {
            let _ = session
                .connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
        let removed = self.sessions.remove_if(client_id, |_, session| {
            session.connections.load(Ordering::Acquire) == 0
        });
        if removed.is_some() {
            info!(client_id, "Session ended");
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

fn validate_message(message: &str) -> Result<&str, ChatError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
    }
    Ok(trimmed)
}
