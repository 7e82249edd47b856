//! Verification of LLM replies against the grounding context.
//!
//! The LLM is asked for a JSON reply listing the experiences it recommends.
//! Each listed experience must name a record from the grounding context with
//! the same title and price; anything else is dropped. Surviving cards are
//! rebuilt from catalog values so the client only ever sees catalog facts,
//! plus the LLM's pitch text when it passes the quality checks.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use concierge_core::{CatalogHit, CatalogItem, ExperienceCard};

use crate::error::ChatError;

pub const DEFAULT_INTRO: &str = "Here are some verified experiences from our catalog.";
pub const DEFAULT_CLOSING: &str = "Which one interests you?";
/// Appended when at least one suggested item was dropped.
pub const UNVERIFIED_NOTE: &str =
    "I left out a suggestion I couldn't confirm against our catalog.";

const WHY_PERFECT_CHARS: std::ops::RangeInclusive<usize> = 20..=300;
const MAX_HIGHLIGHTS: usize = 3;
const MIN_HIGHLIGHTS: usize = 2;
const MAX_HIGHLIGHT_CHARS: usize = 200;

const GENERIC_HIGHLIGHTS: [&str; 3] = [
    "Hand-picked from our verified catalog.",
    "Suitable for a wide range of travelers.",
    "Details confirmed against our catalog listing.",
];

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("Invalid fenced JSON regex")
});

/// A reply whose experiences all match the grounding context.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedReply {
    pub intro: String,
    pub closing: String,
    pub cards: Vec<ExperienceCard>,
    /// Items dropped during verification.
    pub rejected: usize,
}

impl VerifiedReply {
    /// Cards for every grounding record, with templated pitch text.
    pub fn from_grounding(hits: &[CatalogHit], user_message: &str) -> Self {
        Self {
            intro: DEFAULT_INTRO.to_string(),
            closing: DEFAULT_CLOSING.to_string(),
            cards: hits.iter().map(|hit| templated_card(hit, user_message)).collect(),
            rejected: 0,
        }
    }

    /// `"{intro} I found: {titles}. {closing}"`, plus a note when items were
    /// dropped.
    pub fn message(&self) -> String {
        let titles = self
            .cards
            .iter()
            .map(|c| c.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut message = format!("{} I found: {}. {}", self.intro, titles, self.closing);
        if self.rejected > 0 {
            message.push(' ');
            message.push_str(UNVERIFIED_NOTE);
        }
        message
    }
}

// =============================================================================
// JSON extraction
// =============================================================================

/// Pull a JSON object out of LLM output: a fenced ```json block first, then
/// the outermost `{...}`, then the whole text.
pub fn extract_json(text: &str) -> Option<Value> {
    let fenced = FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let outermost = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => None,
    };

    [fenced, outermost, Some(text.trim())]
        .into_iter()
        .flatten()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(value) if value.is_object() => Some(value),
            _ => None,
        })
}

// =============================================================================
// Verification
// =============================================================================

/// Check every experience in `reply` against `hits`.
///
/// Returns `None` when the reply has no `experiences` list at all, which the
/// caller treats like unparseable output.
pub fn verify_reply(reply: &Value, hits: &[CatalogHit], user_message: &str) -> Option<VerifiedReply> {
    let experiences = reply.get("experiences")?.as_array()?;

    let mut seen = HashSet::new();
    let mut cards = Vec::new();
    let mut rejected = 0;

    for entry in experiences {
        match verify_item(entry, hits) {
            Ok((hit, fields)) => {
                if !seen.insert(hit.item.id.clone()) {
                    debug!(id = %hit.item.id, "Duplicate experience in LLM reply");
                    continue;
                }
                cards.push(build_card(hit, fields, user_message));
            }
            Err(e) => {
                warn!(error = %e, "Dropping unverified experience");
                rejected += 1;
            }
        }
    }

    Some(VerifiedReply {
        intro: text_field(reply, "conversational_intro").unwrap_or_else(|| DEFAULT_INTRO.to_string()),
        closing: text_field(reply, "conversational_closing")
            .unwrap_or_else(|| DEFAULT_CLOSING.to_string()),
        cards,
        rejected,
    })
}

fn verify_item<'a>(
    entry: &'a Value,
    hits: &'a [CatalogHit],
) -> Result<(&'a CatalogHit, &'a Map<String, Value>), ChatError> {
    let fields = entry
        .as_object()
        .ok_or_else(|| ChatError::ValidationMismatch("experience is not an object".to_string()))?;

    let id = fields
        .get("id")
        .and_then(scalar_string)
        .ok_or_else(|| ChatError::ValidationMismatch("missing id".to_string()))?;

    let hit = hits
        .iter()
        .find(|h| h.item.id == id)
        .ok_or_else(|| ChatError::ValidationMismatch(format!("id {} not in grounding context", id)))?;

    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ChatError::ValidationMismatch(format!("id {}: missing title", id)))?;
    if normalize(title) != normalize(&hit.item.title) {
        return Err(ChatError::ValidationMismatch(format!(
            "id {}: title {:?} does not match {:?}",
            id, title, hit.item.title
        )));
    }

    let price = fields
        .get("budget")
        .or_else(|| fields.get("price"))
        .and_then(price_of)
        .ok_or_else(|| ChatError::ValidationMismatch(format!("id {}: missing price", id)))?;
    if price != hit.item.price {
        return Err(ChatError::ValidationMismatch(format!(
            "id {}: price {} does not match {}",
            id, price, hit.item.price
        )));
    }

    Ok((hit, fields))
}

fn build_card(hit: &CatalogHit, fields: &Map<String, Value>, user_message: &str) -> ExperienceCard {
    let mut card = ExperienceCard::from_hit(hit);

    card.why_perfect = Some(
        fields
            .get("why_perfect")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| WHY_PERFECT_CHARS.contains(&s.chars().count()))
            .map(str::to_string)
            .unwrap_or_else(|| why_perfect(&hit.item, user_message)),
    );

    let highlights: Vec<String> = fields
        .get("highlights")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(clean_highlight)
                .take(MAX_HIGHLIGHTS)
                .collect()
        })
        .unwrap_or_default();

    card.highlights = if highlights.len() >= MIN_HIGHLIGHTS {
        highlights
    } else {
        templated_highlights(&hit.item)
    };
    card
}

fn templated_card(hit: &CatalogHit, user_message: &str) -> ExperienceCard {
    let mut card = ExperienceCard::from_hit(hit);
    card.why_perfect = Some(why_perfect(&hit.item, user_message));
    card.highlights = templated_highlights(&hit.item);
    card
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ids may come back as JSON numbers.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn price_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let start = s.find(|c: char| c.is_ascii_digit())?;
            let integer = s[start..].split('.').next().unwrap_or_default();
            let digits: String = integer
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == ',')
                .filter(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// =============================================================================
// Pitch text
// =============================================================================

fn clean_highlight(raw: &str) -> Option<String> {
    let sentence = raw.split('.').next().unwrap_or_default().trim();
    if sentence.chars().count() <= 10 {
        return None;
    }
    let mut out: String = sentence.chars().take(MAX_HIGHLIGHT_CHARS - 1).collect();
    if !out.ends_with(['!', '?']) {
        out.push('.');
    }
    Some(out)
}

/// A one-line pitch derived from catalog fields and the client's message.
pub fn why_perfect(item: &CatalogItem, user_message: &str) -> String {
    let category = item.category.to_lowercase();
    let description = item.description.to_lowercase();
    let has = |words: &[&str]| {
        words
            .iter()
            .any(|w| category.contains(w) || description.contains(w))
    };

    let location_mentioned = !item.location.trim().is_empty()
        && user_message
            .to_lowercase()
            .contains(&item.location.trim().to_lowercase());

    if has(&["adventure", "thrill"]) {
        format!(
            "Perfect for adventure enthusiasts! This {} experience in {} delivers excitement and unforgettable thrills.",
            item.category, item.location
        )
    } else if has(&["spa", "relax", "wellness"]) {
        format!(
            "Ideal for unwinding! This {} experience in {} offers a peaceful escape to recharge.",
            item.category, item.location
        )
    } else if has(&["romantic", "couple"]) {
        format!(
            "Perfect romantic getaway! This {} experience in {} is made for special moments together.",
            item.category, item.location
        )
    } else if has(&["cultural", "culture", "heritage"]) {
        format!(
            "Immerse yourself in authentic culture! This {} experience in {} brings local traditions to life.",
            item.category, item.location
        )
    } else if location_mentioned {
        format!(
            "Excellent choice for {}! This {} experience matches what you're looking for.",
            item.location, item.category
        )
    } else {
        format!(
            "Great match for your interests! This {} experience in {} offers exactly what you're seeking.",
            item.category, item.location
        )
    }
}

/// Up to three highlight sentences taken from the description, padded with
/// generic lines.
pub fn templated_highlights(item: &CatalogItem) -> Vec<String> {
    let description = item.description.trim();
    if description.chars().count() < 20 {
        return GENERIC_HIGHLIGHTS.iter().map(|s| s.to_string()).collect();
    }

    let mut highlights: Vec<String> = description
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > 15)
        .take(MAX_HIGHLIGHTS)
        .map(|s| {
            let s: String = s.chars().take(MAX_HIGHLIGHT_CHARS - 40).collect();
            if s.chars().count() < 30 {
                format!("{} for an unforgettable experience.", s)
            } else {
                format!("{}.", s)
            }
        })
        .collect();

    for generic in GENERIC_HIGHLIGHTS {
        if highlights.len() >= MAX_HIGHLIGHTS {
            break;
        }
        highlights.push(generic.to_string());
    }
    highlights
}
