//! Reply composition for a single inbound message.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use concierge_catalog::CatalogStore;
use concierge_core::{
    CatalogHit, ConciergeConfig, ExperienceList, IntentLabel, Reply, Role, SessionProfile,
};
use concierge_memory::{PreferenceExtractor, SessionMemory};

use crate::error::ChatError;
use crate::llm::LlmClient;
use crate::prompt::PromptBuilder;
use crate::verify::{extract_json, verify_reply, VerifiedReply};

pub const CLEARED_MESSAGE: &str = "Conversation memory cleared! Starting fresh.";
pub const CATALOG_UNAVAILABLE_MESSAGE: &str =
    "I'm having trouble reaching our experience catalog right now. Please try again in a moment.";
pub const NO_RESULTS_MESSAGE: &str = "I couldn't find experiences matching that yet. Could you tell me \
more about the kind of activity you enjoy (adventure, relaxation, culture, nature), your preferred \
location and an approximate budget?";
pub const GREETING_FALLBACK: &str = "Hello! I'm here to help you discover verified experiences from \
our catalog. What would you like to explore today?";
pub const CASUAL_FALLBACK: &str = "I'm here to help you discover verified experiences from our \
catalog. Tell me what you enjoy and I'll find something for you!";
pub const FAREWELL_MESSAGE: &str = "Thank you for exploring experiences with me! Hope you find the \
perfect adventure. Have a wonderful day!";

/// Tunables injected into the composer.
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub top_k: usize,
    pub search_timeout: Duration,
    pub llm_timeout: Duration,
    pub context_turns: usize,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            search_timeout: Duration::from_secs(5),
            llm_timeout: Duration::from_secs(30),
            context_turns: 10,
        }
    }
}

impl ComposerSettings {
    pub fn from_config(config: &ConciergeConfig) -> Self {
        Self {
            top_k: config.catalog.top_k,
            search_timeout: Duration::from_secs(config.catalog.search_timeout_secs),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            context_turns: config.memory.context_turns,
        }
    }
}

/// A reply plus whether it belongs in the turn history.
struct Composed {
    reply: Reply,
    record: bool,
}

impl Composed {
    fn recorded(reply: Reply) -> Self {
        Self { reply, record: true }
    }

    fn fallback(reply: Reply) -> Self {
        Self {
            reply,
            record: false,
        }
    }
}

/// Builds replies from the catalog, the LLM and the session profile.
pub struct ResponseComposer {
    catalog: Arc<dyn CatalogStore>,
    llm: Arc<dyn LlmClient>,
    memory: Arc<SessionMemory>,
    extractor: PreferenceExtractor,
    prompts: PromptBuilder,
    settings: ComposerSettings,
}

impl ResponseComposer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        llm: Arc<dyn LlmClient>,
        memory: Arc<SessionMemory>,
        extractor: PreferenceExtractor,
        settings: ComposerSettings,
    ) -> Self {
        Self {
            catalog,
            llm,
            memory,
            extractor,
            prompts: PromptBuilder::new(settings.context_turns),
            settings,
        }
    }

    /// Answer `message` and update `profile`.
    ///
    /// Never fails: dependency errors become textual fallbacks. The profile
    /// is saved before returning.
    pub async fn compose(
        &self,
        profile: &mut SessionProfile,
        message: &str,
        intent: IntentLabel,
    ) -> Reply {
        info!(client_id = %profile.client_id, intent = %intent, "Composing reply");

        if intent == IntentLabel::ClearMemory {
            if let Err(e) = self.reset(profile) {
                warn!(client_id = %profile.client_id, error = %e, "Failed to persist cleared profile");
            }
            return Reply::text(intent, CLEARED_MESSAGE);
        }

        self.memory.append_turn(profile, Role::User, message);
        let extracted = self.extractor.extract(message);
        if !extracted.is_empty() {
            debug!(client_id = %profile.client_id, ?extracted, "Preferences extracted");
        }
        self.memory.merge_preferences(profile, &extracted);

        let composed = match intent {
            IntentLabel::GetStats => Composed::recorded(Reply::text(intent, self.stats_summary(profile))),
            IntentLabel::ExperienceRequest => self.experience_reply(profile, message).await,
            _ => self.conversation_reply(profile, message, intent).await,
        };

        if composed.record {
            self.memory
                .append_turn(profile, Role::Assistant, &composed.reply.message);
        }
        if let Some(list) = &composed.reply.experiences {
            self.memory.record_shown(profile, &list.experiences);
        }
        if let Err(e) = self.memory.save(profile) {
            warn!(client_id = %profile.client_id, error = %e, "Failed to save profile");
        }

        composed.reply
    }

    /// Replace `profile` with an empty one and persist it.
    ///
    /// The in-memory profile is reset even if persisting fails.
    pub fn reset(&self, profile: &mut SessionProfile) -> Result<(), ChatError> {
        let client_id = profile.client_id.clone();
        match self.memory.clear(&client_id) {
            Ok(fresh) => {
                *profile = fresh;
                Ok(())
            }
            Err(e) => {
                *profile = SessionProfile::new(client_id);
                Err(e.into())
            }
        }
    }

    async fn experience_reply(&self, profile: &SessionProfile, message: &str) -> Composed {
        let intent = IntentLabel::ExperienceRequest;

        let hits = match self.search(message).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(client_id = %profile.client_id, error = %e, "Catalog search failed");
                return Composed::recorded(Reply::text(intent, CATALOG_UNAVAILABLE_MESSAGE));
            }
        };
        info!(client_id = %profile.client_id, hits = hits.len(), "Catalog searched");

        if hits.is_empty() {
            return Composed::recorded(Reply::text(intent, NO_RESULTS_MESSAGE));
        }

        let prompt = self.prompts.experience_prompt(profile, message, &hits);
        let text = match self.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(client_id = %profile.client_id, error = %e, "Generation failed, replying from catalog");
                let grounded = VerifiedReply::from_grounding(&hits, message);
                let reply = Reply {
                    intent,
                    message: generation_fallback(&hits),
                    experiences: Some(ExperienceList {
                        experiences: grounded.cards,
                    }),
                };
                return Composed::fallback(reply);
            }
        };

        let verified = match extract_json(&text).and_then(|v| verify_reply(&v, &hits, message)) {
            Some(verified) if !verified.cards.is_empty() => verified,
            Some(verified) => {
                warn!(
                    client_id = %profile.client_id,
                    rejected = verified.rejected,
                    "No suggested experience survived verification"
                );
                VerifiedReply {
                    rejected: verified.rejected,
                    ..VerifiedReply::from_grounding(&hits, message)
                }
            }
            None => {
                warn!(client_id = %profile.client_id, "LLM reply was not structured, replying from catalog");
                VerifiedReply::from_grounding(&hits, message)
            }
        };

        Composed::recorded(Reply {
            intent,
            message: verified.message(),
            experiences: Some(ExperienceList {
                experiences: verified.cards,
            }),
        })
    }

    async fn conversation_reply(
        &self,
        profile: &SessionProfile,
        message: &str,
        intent: IntentLabel,
    ) -> Composed {
        let prompt = self.prompts.conversation_prompt(profile, message, intent);
        match self.generate(&prompt).await {
            Ok(text) => Composed::recorded(Reply::text(intent, text.trim())),
            Err(e) => {
                warn!(client_id = %profile.client_id, intent = %intent, error = %e, "Generation failed");
                let fallback = match intent {
                    IntentLabel::Greeting => GREETING_FALLBACK,
                    IntentLabel::Exit => FAREWELL_MESSAGE,
                    _ => CASUAL_FALLBACK,
                };
                Composed::fallback(Reply::text(intent, fallback))
            }
        }
    }

    fn stats_summary(&self, profile: &SessionProfile) -> String {
        let stats = self.memory.stats(profile);
        let mut parts = vec![format!(
            "We've exchanged {} messages over {} session(s).",
            stats.total_messages,
            stats.session_count.max(1)
        )];

        if !profile.interests.is_empty() {
            let interests: Vec<&str> = profile.interests.iter().map(String::as_str).collect();
            parts.push(format!("You're interested in {}.", interests.join(", ")));
        }
        if let Some(budget) = &profile.budget_hint {
            parts.push(format!("Your budget is {}.", budget));
        }
        if !profile.locations.is_empty() {
            let locations: Vec<&str> = profile.locations.iter().map(String::as_str).collect();
            parts.push(format!("Places on your list: {}.", locations.join(", ")));
        }
        if stats.previously_discussed > 0 {
            parts.push(format!(
                "We've looked at {} experience(s) together.",
                stats.previously_discussed
            ));
        }
        if parts.len() == 1 {
            parts.push("Tell me what you enjoy and I'll remember it.".to_string());
        }
        parts.join(" ")
    }

    async fn search(&self, message: &str) -> Result<Vec<CatalogHit>, ChatError> {
        match timeout(
            self.settings.search_timeout,
            self.catalog.search(message, self.settings.top_k),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(ChatError::RetrievalUnavailable(format!(
                "search timed out after {}ms",
                self.settings.search_timeout.as_millis()
            ))),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        match timeout(self.settings.llm_timeout, self.llm.generate(prompt)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ChatError::GenerationTimeout(self.settings.llm_timeout.as_secs())),
        }
    }
}

fn generation_fallback(hits: &[CatalogHit]) -> String {
    let titles: Vec<&str> = hits.iter().map(|h| h.item.title.as_str()).collect();
    format!(
        "I'm having trouble writing a detailed answer right now, but these experiences from our \
catalog match your request: {}.",
        titles.join(", ")
    )
}
