//! Test doubles for the catalog and the LLM.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use concierge_catalog::{CatalogError, CatalogStore};
use concierge_core::{CatalogHit, CatalogItem};

use crate::llm::{LlmClient, LlmError};

pub fn item(id: &str, title: &str, category: &str, location: &str, price: u64) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: title.to_string(),
        description: format!(
            "A memorable {} outing in {}. Guided by local experts who know every trail.",
            category.to_lowercase(),
            location
        ),
        category: category.to_string(),
        location: location.to_string(),
        price,
    }
}

/// Returns its items in order, scored from 90 down.
pub struct MockCatalog {
    items: Vec<CatalogItem>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            fail: false,
            delay: None,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CatalogStore for MockCatalog {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<CatalogHit>, CatalogError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CatalogError::Unavailable("index offline".to_string()));
        }
        Ok(self
            .items
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(i, item)| CatalogHit {
                item: item.clone(),
                score: 90.0 - i as f64 * 10.0,
            })
            .collect())
    }

    fn get(&self, id: &str) -> Option<CatalogItem> {
        self.items.iter().find(|i| i.id == id).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn locations(&self) -> Vec<String> {
        Vec::new()
    }

    fn model_name(&self) -> String {
        "mock".to_string()
    }
}

/// Replays canned results and records every prompt it receives. Once the
/// script runs out it answers with a fixed line.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub fn replying(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("Happy to help!".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
