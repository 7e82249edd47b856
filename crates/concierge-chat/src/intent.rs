//! Keyword-based intent classification.
//!
//! A fixed table of `{pattern -> label}` rules evaluated in priority order.
//! The first label with a matching pattern wins; anything unmatched is
//! casual chat.

use std::sync::LazyLock;

use regex::Regex;

use concierge_core::IntentLabel;

/// Exit phrases only count in short messages or as the whole message.
const EXIT_MAX_WORDS: usize = 4;

const EXIT_PHRASES: &[&str] = &[
    "bye",
    "goodbye",
    "exit",
    "quit",
    "stop",
    "that's all",
    "thats all",
    "end conversation",
    "see you",
    "thanks bye",
    "thank you bye",
];

struct IntentRules {
    clear_memory: Vec<Regex>,
    get_stats: Vec<Regex>,
    exit: Regex,
    experience_request: Vec<Regex>,
    greeting: Vec<Regex>,
}

static RULES: LazyLock<IntentRules> = LazyLock::new(|| {
    let mk = |patterns: &[&str]| -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).expect("Invalid intent regex"))
            .collect()
    };

    let exit_alternation = EXIT_PHRASES
        .iter()
        .map(|p| regex::escape(p).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");

    IntentRules {
        clear_memory: mk(&[
            r"\bclear\s+(?:my\s+|the\s+|our\s+)?(?:memory|history|conversation|chat)\b",
            r"\bforget\s+everything\b",
            r"\bstart\s+over\b",
            r"\breset\s+(?:my\s+|the\s+|our\s+)?(?:conversation|chat|memory)\b",
        ]),
        get_stats: mk(&[
            r"\bstats\b",
            r"\bstatistics\b",
            r"\bconversation\s+summary\b",
            r"\bwhat\s+do\s+you\s+know\s+about\s+me\b",
            r"\bhow\s+many\s+messages\b",
        ]),
        // Hyphens count as word characters so "non-stop" is not "stop".
        exit: Regex::new(&format!(
            r"(?i)(?:^|[^\w'-])(?:{})(?:$|[^\w'-])",
            exit_alternation
        ))
        .expect("Invalid intent regex"),
        experience_request: mk(&[
            r"\bsuggest",
            r"\brecommend",
            r"\blooking\s+for\b",
            r"\bwant\s+to\b",
            r"\binterested\s+in\b",
            r"\bthings\s+to\s+do\b",
            r"\bactivit(?:y|ies)\b",
            r"\bexperiences?\b",
            r"\badventures?\b",
            r"\btours?\b",
            r"\btrips?\b",
            r"\bgetaways?\b",
            r"\bholidays?\b",
            r"\bvacations?\b",
            r"\bplaces\s+to\s+visit\b",
            r"\bshow\s+me\b",
            r"\boptions?\b",
            r"\bplan\s+a\b",
            r"\bbook\b",
            r"\bresorts?\b",
            r"\bbeach(?:es)?\b",
            r"\btrek(?:s|king)?\b",
            r"\bcamping\b",
            r"\bhoneymoon\b",
        ]),
        greeting: mk(&[
            r"\b(?:hi|hello|hey|hiya|namaste|greetings)\b",
            r"\bgood\s+(?:morning|afternoon|evening)\b",
        ]),
    }
});

/// Map a raw message to its intent label.
pub fn classify(text: &str) -> IntentLabel {
    let rules = &*RULES;
    let any = |patterns: &[Regex]| patterns.iter().any(|re| re.is_match(text));

    if any(&rules.clear_memory) {
        return IntentLabel::ClearMemory;
    }
    if any(&rules.get_stats) {
        return IntentLabel::GetStats;
    }
    if is_exit(text) {
        return IntentLabel::Exit;
    }
    if any(&rules.experience_request) {
        return IntentLabel::ExperienceRequest;
    }
    if any(&rules.greeting) {
        return IntentLabel::Greeting;
    }
    IntentLabel::CasualChat
}

fn is_exit(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '\'')
        .to_lowercase();
    if EXIT_PHRASES.contains(&normalized.as_str()) {
        return true;
    }
    normalized.split_whitespace().count() <= EXIT_MAX_WORDS && RULES.exit.is_match(&normalized)
}
