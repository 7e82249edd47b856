//! Preference extraction from free-text messages.
//!
//! Pulls interests, destinations and a budget out of each user message so the
//! profile can carry them into later prompts.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use concierge_core::{BudgetRange, ExtractedPreferences};

// =============================================================================
// Lexicons
// =============================================================================

/// Interest labels and the word patterns that signal them. Patterns are
/// regex fragments matched as whole words.
const INTEREST_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "adventure",
        &[
            r"adventur(?:e|es|ous)",
            r"thrill(?:s|ing)?",
            r"exciting",
            r"action",
            r"trek(?:s|king)?",
            r"climb(?:s|ing)?",
            r"raft(?:s|ing)?",
            r"paraglid(?:e|ing)",
        ],
    ),
    (
        "relaxation",
        &[
            r"relax(?:ed|ing|ation)?",
            r"peaceful",
            r"calm",
            r"quiet",
            r"serene",
            r"spas?",
            r"yoga",
            r"meditat(?:e|ion|ing)",
        ],
    ),
    (
        "culture",
        &[
            r"cultur(?:e|al)",
            r"histor(?:y|ic|ical)",
            r"tradition(?:s|al)?",
            r"heritage",
            r"temples?",
            r"monuments?",
        ],
    ),
    (
        "nature",
        &[
            r"nature",
            r"outdoors?",
            r"forests?",
            r"mountains?",
            r"beach(?:es)?",
            r"wildlife",
            r"camp(?:s|ing)?",
        ],
    ),
    (
        "romantic",
        &[r"romantic", r"romance", r"honeymoon", r"couples?", r"anniversary", r"date"],
    ),
    (
        "luxury",
        &[
            r"luxury",
            r"luxurious",
            r"premium",
            r"exclusive",
            r"vip",
            r"5 star",
            r"five star",
            r"resorts?",
        ],
    ),
];

const BUILTIN_LOCATIONS: &[&str] = &[
    "goa", "kerala", "himachal", "rajasthan", "mumbai", "delhi", "bangalore",
];

// =============================================================================
// Compiled patterns
// =============================================================================

static INTEREST_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    INTEREST_KEYWORDS
        .iter()
        .map(|(interest, keywords)| {
            let re = Regex::new(&format!(r"(?i)\b(?:{})\b", keywords.join("|")))
                .expect("Invalid interest regex");
            (*interest, re)
        })
        .collect()
});

/// An amount: digits with optional thousands separators and a `k` suffix.
const AMOUNT: &str = r"(\d[\d,]*)(?:\s*(k|thousand))?\b";
const CURRENCY: &str = r"(?:₹|rs\.?|inr|rupees)?\s*";

/// Two amounts joined by a dash, "to" or "and". Named groups record what
/// ties the range to money: a cue word right before it, a currency marker or
/// a `k` suffix on either end.
static BUDGET_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (?P<cue>(?:budget|price|cost|spend|afford)\w*(?:\s+(?:is|of|around|about|roughly|range|:))*\s*)?
        (?P<between>between\s+)?
        (?P<cur_low>₹|\brs\.?|\binr\b)?\s*
        (?P<low>\d[\d,]*)(?:\s*(?P<k_low>k|thousand))?
        \s*(?P<sep>-|–|to|and)\s*
        (?P<cur_high>₹|\brs\.?|\binr\b)?\s*
        (?P<high>\d[\d,]*)(?:\s*(?P<k_high>k|thousand))?\b
        (?P<cur_after>\s*(?:rupees|inr)\b)?",
    )
    .expect("Invalid budget range regex")
});

static BUDGET_CEILING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"(?i)budget\D{{0,20}}?{}", AMOUNT),
        format!(r"(?i){}\s*(?:rupees?\s*|inr\s*)?budget", AMOUNT),
        format!(r"(?i)₹\s*{}", AMOUNT),
        format!(r"(?i)\brs\.?\s*{}", AMOUNT),
        format!(r"(?i){}\s*(?:rupees|inr)\b", AMOUNT),
        format!(
            r"(?i)\b(?:under|below|less than|up to|upto|within|max(?:imum)?)\s*{}{}",
            CURRENCY, AMOUNT
        ),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid budget regex"))
    .collect()
});

fn parse_amount(digits: &str, suffix: Option<&str>) -> Option<u64> {
    let cleaned: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
    let value: u64 = cleaned.parse().ok()?;
    match suffix {
        Some(_) => value.checked_mul(1000),
        None => Some(value),
    }
}

fn amount_at(caps: &Captures<'_>, digits_group: usize) -> Option<u64> {
    let digits = caps.get(digits_group)?.as_str();
    let suffix = caps.get(digits_group + 1).map(|m| m.as_str());
    parse_amount(digits, suffix)
}

// =============================================================================
// Extractor
// =============================================================================

/// Extracts interests, locations and budget cues from user messages.
#[derive(Debug, Clone)]
pub struct PreferenceExtractor {
    locations: Vec<(String, Regex)>,
}

impl Default for PreferenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceExtractor {
    /// Extractor recognising the built-in destinations only.
    pub fn new() -> Self {
        Self::with_locations(std::iter::empty::<String>())
    }

    /// Extractor recognising the built-in destinations plus `extra`
    /// (typically the distinct catalog locations).
    pub fn with_locations<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = BUILTIN_LOCATIONS
            .iter()
            .map(|s| s.to_string())
            .chain(
                extra
                    .into_iter()
                    .map(|s| s.as_ref().trim().to_lowercase())
                    .filter(|s| !s.is_empty()),
            )
            .collect();

        let locations = names
            .into_iter()
            .filter_map(|name| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&name)))
                    .ok()
                    .map(|re| (name, re))
            })
            .collect();

        Self { locations }
    }

    pub fn extract(&self, text: &str) -> ExtractedPreferences {
        let interests = INTEREST_PATTERNS
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(interest, _)| interest.to_string())
            .collect();

        let locations = self
            .locations
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(name, _)| name.clone())
            .collect();

        ExtractedPreferences {
            interests,
            locations,
            budget: extract_budget(text),
        }
    }
}

/// Find a budget in `text`.
///
/// A range counts only when it is tied to money, so "a 2-3 day trip" is
/// skipped and the ceiling patterns get their turn.
pub fn extract_budget(text: &str) -> Option<BudgetRange> {
    BUDGET_RANGE
        .captures_iter(text)
        .find_map(|caps| money_range(&caps))
        .or_else(|| {
            BUDGET_CEILING
                .iter()
                .find_map(|re| re.captures(text).and_then(|caps| amount_at(&caps, 1)))
                .map(BudgetRange::up_to)
        })
}

fn money_range(caps: &Captures<'_>) -> Option<BudgetRange> {
    let has = |name: &str| caps.name(name).is_some();
    if !["cue", "cur_low", "cur_high", "cur_after", "k_low", "k_high"]
        .iter()
        .any(|name| has(name))
    {
        return None;
    }
    if caps.name("sep").map(|m| m.as_str().eq_ignore_ascii_case("and")) == Some(true)
        && !has("between")
    {
        return None;
    }

    let k_low = caps.name("k_low").map(|m| m.as_str());
    let k_high = caps.name("k_high").map(|m| m.as_str());
    // "5-10k" applies the suffix to both ends.
    let low = parse_amount(caps.name("low")?.as_str(), k_low.or(k_high))?;
    let high = parse_amount(caps.name("high")?.as_str(), k_high)?;
    Some(BudgetRange::between(low, high))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_interests() {
        let extractor = PreferenceExtractor::new();
        let prefs = extractor.extract("Looking for a thrilling trek and a quiet spa day");
        assert_eq!(prefs.interests, set(&["adventure", "relaxation"]));

        let prefs = extractor.extract("Honeymoon at a 5 star resort");
        assert_eq!(prefs.interests, set(&["luxury", "romantic"]));
    }

    #[test]
    fn test_interest_keywords_match_whole_words() {
        let extractor = PreferenceExtractor::new();
        assert!(extractor.extract("please update me").interests.is_empty());
        assert!(extractor
            .extract("Any trips to Spain? I need space")
            .interests
            .is_empty());

        let prefs = extractor.extract("Trekking, relaxing spas and historical temples");
        assert_eq!(prefs.interests, set(&["adventure", "culture", "relaxation"]));
    }

    #[test]
    fn test_builtin_and_catalog_locations() {
        let extractor = PreferenceExtractor::with_locations(["Rishikesh", "  ", "GOA"]);
        let prefs = extractor.extract("Trips to Goa or rishikesh?");
        assert_eq!(prefs.locations, set(&["goa", "rishikesh"]));

        let prefs = PreferenceExtractor::new().extract("Something in Rishikesh");
        assert!(prefs.locations.is_empty());
    }

    #[test]
    fn test_location_matches_whole_words() {
        let prefs = PreferenceExtractor::new().extract("I love goats");
        assert!(prefs.locations.is_empty());
    }

    #[test]
    fn test_budget_ceiling_forms() {
        assert_eq!(extract_budget("my budget is 5000"), Some(BudgetRange::up_to(5000)));
        assert_eq!(extract_budget("5000 budget"), Some(BudgetRange::up_to(5000)));
        assert_eq!(extract_budget("around ₹12,500"), Some(BudgetRange::up_to(12500)));
        assert_eq!(extract_budget("rs. 800 max"), Some(BudgetRange::up_to(800)));
        assert_eq!(extract_budget("something under 20k"), Some(BudgetRange::up_to(20000)));
        assert_eq!(extract_budget("budget of 15 thousand"), Some(BudgetRange::up_to(15000)));
    }

    #[test]
    fn test_budget_range_forms() {
        assert_eq!(
            extract_budget("budget between 5000 and 10000"),
            Some(BudgetRange::between(5000, 10000))
        );
        assert_eq!(
            extract_budget("₹3000-₹8000 please"),
            Some(BudgetRange::between(3000, 8000))
        );
        assert_eq!(
            extract_budget("budget 5-10k"),
            Some(BudgetRange::between(5000, 10000))
        );
    }

    #[test]
    fn test_no_budget_without_cue() {
        assert_eq!(extract_budget("a 2-3 day trip for 4 people"), None);
        assert_eq!(extract_budget("hello there"), None);
    }

    #[test]
    fn test_range_must_be_tied_to_money() {
        assert_eq!(
            extract_budget("a 2-3 day trip, my budget is 20000"),
            Some(BudgetRange::up_to(20000))
        );
        assert_eq!(
            extract_budget("budget is 10000 and 2 people are coming"),
            Some(BudgetRange::up_to(10000))
        );
        assert_eq!(
            extract_budget("something for 5-10k for 2-3 days"),
            Some(BudgetRange::between(5000, 10000))
        );
        assert_eq!(
            extract_budget("2 to 3 nights, 4000 to 6000 rupees"),
            Some(BudgetRange::between(4000, 6000))
        );
        assert_eq!(
            extract_budget("my budget is around 5000 to 8000"),
            Some(BudgetRange::between(5000, 8000))
        );
    }

    #[test]
    fn test_empty_extraction() {
        let prefs = PreferenceExtractor::new().extract("hi!");
        assert!(prefs.is_empty());
    }
}
