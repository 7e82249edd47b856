//! Session profile lifecycle on top of a [`ProfileStore`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use concierge_core::{
    ConversationStats, DiscussedItem, ExperienceCard, ExtractedPreferences, Result, Role,
    SessionProfile, Turn,
};

use crate::store::ProfileStore;

/// Most recent distinct items remembered as "previously discussed".
pub const MAX_DISCUSSED_ITEMS: usize = 20;

/// Loads, mutates and persists session profiles.
///
/// Mutating methods only touch the profile passed in; nothing reaches the
/// store until [`SessionMemory::save`] or [`SessionMemory::clear`].
pub struct SessionMemory {
    store: Arc<dyn ProfileStore>,
    max_history: usize,
}

impl SessionMemory {
    pub fn new(store: Arc<dyn ProfileStore>, max_history: usize) -> Self {
        Self {
            store,
            max_history: max_history.max(1),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// The persisted profile for `client_id`, if any.
    ///
    /// A record that does not deserialize is a `Serialization` error.
    pub fn read(&self, client_id: &str) -> Result<Option<SessionProfile>> {
        let Some(bytes) = self.store.get(client_id)? else {
            return Ok(None);
        };
        let mut profile: SessionProfile = serde_json::from_slice(&bytes)?;
        profile.client_id = client_id.to_string();
        debug!(client_id, turns = profile.turns.len(), "Profile loaded");
        Ok(Some(profile))
    }

    /// The persisted profile for `client_id`, or a fresh one.
    ///
    /// Unreadable or corrupt state is logged and replaced by an empty
    /// profile; loading never fails.
    pub fn load(&self, client_id: &str) -> SessionProfile {
        match self.read(client_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => SessionProfile::new(client_id),
            Err(e) => {
                warn!(client_id, error = %e, "Unreadable profile, starting fresh");
                SessionProfile::new(client_id)
            }
        }
    }

    /// Append a turn, evicting the oldest turns beyond the history cap.
    pub fn append_turn(&self, profile: &mut SessionProfile, role: Role, text: &str) {
        let now = Utc::now();
        profile.turns.push(Turn {
            role,
            text: text.to_string(),
            timestamp: now,
        });
        if profile.turns.len() > self.max_history {
            let excess = profile.turns.len() - self.max_history;
            profile.turns.drain(..excess);
        }
        profile.total_messages += 1;
        profile.last_interaction = now;
    }

    /// Union extracted interests and locations into the profile. The budget
    /// is replaced only when one was found.
    pub fn merge_preferences(&self, profile: &mut SessionProfile, extracted: &ExtractedPreferences) {
        profile.interests.extend(extracted.interests.iter().cloned());
        profile.locations.extend(extracted.locations.iter().cloned());
        if let Some(budget) = extracted.budget {
            profile.budget_hint = Some(budget);
        }
    }

    /// Remember the items just shown to the client.
    pub fn record_shown(&self, profile: &mut SessionProfile, cards: &[ExperienceCard]) {
        if cards.is_empty() {
            return;
        }
        let now = Utc::now();
        profile.last_shown_item_ids = cards.iter().map(|c| c.id.clone()).collect();
        for card in cards {
            profile.discussed_items.retain(|d| d.id != card.id);
            profile.discussed_items.push(DiscussedItem {
                id: card.id.clone(),
                title: card.title.clone(),
                discussed_at: now,
            });
        }
        if profile.discussed_items.len() > MAX_DISCUSSED_ITEMS {
            let excess = profile.discussed_items.len() - MAX_DISCUSSED_ITEMS;
            profile.discussed_items.drain(..excess);
        }
    }

    /// Persist the whole profile, replacing prior state.
    pub fn save(&self, profile: &SessionProfile) -> Result<()> {
        let bytes = serde_json::to_vec(profile)?;
        self.store.put(&profile.client_id, &bytes)
    }

    /// Reset `client_id` to an empty profile. The stored record is removed
    /// at once, so a later load starts fresh even if nothing else is saved.
    pub fn clear(&self, client_id: &str) -> Result<SessionProfile> {
        self.store.delete(client_id)?;
        info!(client_id, "Conversation memory cleared");
        Ok(SessionProfile::new(client_id))
    }

    pub fn stats(&self, profile: &SessionProfile) -> ConversationStats {
        ConversationStats {
            total_messages: profile.total_messages,
            session_count: profile.session_count,
            first_interaction: profile.first_interaction,
            last_interaction: profile.last_interaction,
            previously_discussed: profile.discussed_items.len(),
            known_interests: profile.interests.len(),
        }
    }
}
