use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Coarse classification of a user message's purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    Greeting,
    ExperienceRequest,
    CasualChat,
    Exit,
    ClearMemory,
    GetStats,
}

impl IntentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Greeting => "greeting",
            IntentLabel::ExperienceRequest => "experience_request",
            IntentLabel::CasualChat => "casual_chat",
            IntentLabel::Exit => "exit",
            IntentLabel::ClearMemory => "clear_memory",
            IntentLabel::GetStats => "get_stats",
        }
    }

    /// Whether replies for this intent are produced by the LLM collaborator.
    pub fn uses_llm(&self) -> bool {
        !matches!(self, IntentLabel::ClearMemory | IntentLabel::GetStats)
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A single product/experience record. Read-only; owned by the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    /// Price in whole rupees.
    pub price: u64,
}

impl CatalogItem {
    /// Price rendered the way replies show it, e.g. `₹15000`.
    pub fn budget_label(&self) -> String {
        format!("₹{}", self.price)
    }

    /// Text indexed for similarity search.
    pub fn document_text(&self) -> String {
        format!(
            "Title: {}\nCategory: {}\nLocation: {}\nBudget: {}\nDescription: {}",
            self.title, self.category, self.location, self.price, self.description
        )
    }
}

/// A catalog record returned by a similarity search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogHit {
    pub item: CatalogItem,
    /// Similarity as a percentage, rounded to two decimals.
    pub score: f64,
}

// =============================================================================
// Session profile
// =============================================================================

/// A single remembered message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Budget remembered for a client. A single amount is stored as a ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Option<u64>,
    pub max: u64,
}

impl BudgetRange {
    pub fn up_to(max: u64) -> Self {
        Self { min: None, max }
    }

    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn between(a: u64, b: u64) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            min: Some(lo),
            max: hi,
        }
    }
}

impl fmt::Display for BudgetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min {
            Some(min) => write!(f, "₹{} - ₹{}", min, self.max),
            None => write!(f, "up to ₹{}", self.max),
        }
    }
}

/// A catalog item that was shown to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscussedItem {
    pub id: String,
    pub title: String,
    pub discussed_at: DateTime<Utc>,
}

/// Everything remembered about one client across turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub client_id: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub budget_hint: Option<BudgetRange>,
    #[serde(default)]
    pub locations: BTreeSet<String>,
    #[serde(default)]
    pub last_shown_item_ids: Vec<String>,
    #[serde(default)]
    pub discussed_items: Vec<DiscussedItem>,
    #[serde(default)]
    pub session_count: u32,
    #[serde(default)]
    pub total_messages: u64,
    pub first_interaction: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl SessionProfile {
    /// A fresh, empty profile for `client_id`.
    pub fn new(client_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            client_id: client_id.into(),
            turns: Vec::new(),
            interests: BTreeSet::new(),
            budget_hint: None,
            locations: BTreeSet::new(),
            last_shown_item_ids: Vec::new(),
            discussed_items: Vec::new(),
            session_count: 0,
            total_messages: 0,
            first_interaction: now,
            last_interaction: now,
        }
    }

    /// True when nothing has been remembered yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
            && self.interests.is_empty()
            && self.locations.is_empty()
            && self.budget_hint.is_none()
            && self.last_shown_item_ids.is_empty()
            && self.discussed_items.is_empty()
    }

    /// The most recent turn authored by `role`, if any.
    pub fn last_turn_by(&self, role: Role) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == role)
    }
}

/// Preferences pulled out of a single message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedPreferences {
    pub interests: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub budget: Option<BudgetRange>,
}

impl ExtractedPreferences {
    pub fn is_empty(&self) -> bool {
        self.interests.is_empty() && self.locations.is_empty() && self.budget.is_none()
    }
}

/// Summary statistics for one client's conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_messages: u64,
    pub session_count: u32,
    pub first_interaction: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    pub previously_discussed: usize,
    pub known_interests: usize,
}

// =============================================================================
// Replies
// =============================================================================

/// A verified experience as sent to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperienceCard {
    pub id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub budget: String,
    pub description: String,
    pub similarity_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_perfect: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

impl ExperienceCard {
    /// A card built purely from catalog values.
    pub fn from_hit(hit: &CatalogHit) -> Self {
        Self {
            id: hit.item.id.clone(),
            title: hit.item.title.clone(),
            category: hit.item.category.clone(),
            location: hit.item.location.clone(),
            budget: hit.item.budget_label(),
            description: hit.item.description.clone(),
            similarity_score: hit.score,
            why_perfect: None,
            highlights: Vec::new(),
        }
    }
}

/// Wrapper matching the outbound `experiences` object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceList {
    pub experiences: Vec<ExperienceCard>,
}

/// The composed answer to one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub intent: IntentLabel,
    pub message: String,
    pub experiences: Option<ExperienceList>,
}

impl Reply {
    pub fn text(intent: IntentLabel, message: impl Into<String>) -> Self {
        Self {
            intent,
            message: message.into(),
            experiences: None,
        }
    }
}
