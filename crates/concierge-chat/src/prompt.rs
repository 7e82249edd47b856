//! Prompt assembly.
//!
//! Every prompt carries the recent conversation and what is known about the
//! client. Experience prompts also carry the grounding context: the catalog
//! records the LLM may mention, and nothing else.

use std::fmt::Write as _;

use concierge_core::{CatalogHit, IntentLabel, SessionProfile};

/// Characters kept from each history turn.
const TURN_PREVIEW_CHARS: usize = 150;
/// Previously discussed items listed in a prompt.
const DISCUSSED_PREVIEW: usize = 5;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    context_turns: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PromptBuilder {
    pub fn new(context_turns: usize) -> Self {
        Self { context_turns }
    }

    /// The last `context_turns` turns, one line each.
    pub fn conversation_context(&self, profile: &SessionProfile) -> String {
        if profile.turns.is_empty() || self.context_turns == 0 {
            return "This is the start of the conversation.".to_string();
        }
        let start = profile.turns.len().saturating_sub(self.context_turns);
        let mut out = String::from("Recent conversation:\n");
        for turn in &profile.turns[start..] {
            let _ = writeln!(out, "{}: {}", turn.role.label(), truncate(&turn.text, TURN_PREVIEW_CHARS));
        }
        out.trim_end().to_string()
    }

    pub fn profile_summary(&self, profile: &SessionProfile) -> String {
        let mut lines = Vec::new();
        if !profile.interests.is_empty() {
            lines.push(format!("- Interests: {}", join(profile.interests.iter())));
        }
        if let Some(budget) = &profile.budget_hint {
            lines.push(format!("- Budget: {}", budget));
        }
        if !profile.locations.is_empty() {
            lines.push(format!("- Preferred locations: {}", join(profile.locations.iter())));
        }
        if !profile.discussed_items.is_empty() {
            let start = profile.discussed_items.len().saturating_sub(DISCUSSED_PREVIEW);
            let titles = profile.discussed_items[start..].iter().map(|d| &d.title);
            lines.push(format!("- Previously discussed: {}", join(titles)));
        }

        if lines.is_empty() {
            "No specific preferences recorded yet.".to_string()
        } else {
            format!("Known client preferences:\n{}", lines.join("\n"))
        }
    }

    /// One numbered block per retrieved record.
    pub fn grounding_context(&self, hits: &[CatalogHit]) -> String {
        let mut out = String::new();
        for (i, hit) in hits.iter().enumerate() {
            let item = &hit.item;
            let _ = write!(
                out,
                "VERIFIED EXPERIENCE {n} (Catalog ID: {id}):\n\
                 Title: {title}\n\
                 Category: {category}\n\
                 Location: {location}\n\
                 Budget: {budget}\n\
                 Description: {description}\n\
                 Match Score: {score:.1}%\n\n",
                n = i + 1,
                id = item.id,
                title = item.title,
                category = item.category,
                location = item.location,
                budget = item.budget_label(),
                description = item.description,
                score = hit.score,
            );
        }
        out.trim_end().to_string()
    }

    pub fn experience_prompt(
        &self,
        profile: &SessionProfile,
        message: &str,
        hits: &[CatalogHit],
    ) -> String {
        format!(
            "You are a friendly travel experience consultant. Recommend ONLY the verified \
experiences listed below. Never invent experiences, ids, titles, prices or locations.

{context}

{summary}

AVAILABLE EXPERIENCES:
{grounding}

Client message: \"{message}\"

Reply with JSON only, in exactly this shape:
{{
  \"conversational_intro\": \"one or two warm sentences\",
  \"experiences\": [
    {{
      \"id\": \"catalog id exactly as listed\",
      \"title\": \"title exactly as listed\",
      \"category\": \"category exactly as listed\",
      \"location\": \"location exactly as listed\",
      \"budget\": \"budget exactly as listed\",
      \"description\": \"description exactly as listed\",
      \"similarity_score\": 0.0,
      \"why_perfect\": \"one or two sentences on why this suits the client\",
      \"highlights\": [\"highlight\", \"highlight\", \"highlight\"]
    }}
  ],
  \"conversational_closing\": \"a short follow-up question\"
}}

Rules:
- Use only ids from AVAILABLE EXPERIENCES and copy title and budget verbatim.
- Tailor why_perfect to the client's stated interests, budget and locations.
- Highlights are short factual sentences drawn from the description.",
            context = self.conversation_context(profile),
            summary = self.profile_summary(profile),
            grounding = self.grounding_context(hits),
            message = message,
        )
    }

    /// Prompt for greetings, small talk and farewells. No catalog facts.
    pub fn conversation_prompt(
        &self,
        profile: &SessionProfile,
        message: &str,
        intent: IntentLabel,
    ) -> String {
        let instruction = match intent {
            IntentLabel::Greeting => {
                "Greet the client warmly. If they have chatted before, acknowledge it. \
Invite them to share what kind of experience they are looking for."
            }
            IntentLabel::Exit => {
                "The client is ending the conversation. Thank them, wish them well and \
invite them back. Do not ask a question."
            }
            _ => {
                "Respond naturally to the client. If they say thanks, acknowledge it warmly. \
Gently steer the conversation back to finding an experience they would enjoy."
            }
        };

        format!(
            "You are a friendly travel experience consultant.

{context}

{summary}

Client message: \"{message}\"

{instruction}
Keep the reply between 40 and 80 words. Plain text only. Do not recommend \
specific experiences, prices or locations; those come only from the catalog.",
            context = self.conversation_context(profile),
            summary = self.profile_summary(profile),
            message = message,
            instruction = instruction,
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}
