//! Concierge binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Load and embed the experience catalog
//! 3. Open the profile store and session memory
//! 4. Build the LLM client, composer and conversation hub
//! 5. Serve REST + WebSocket until Ctrl-C

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use concierge_api::{start_server, AppState};
use concierge_catalog::{embedder_for_dir, CatalogStore, VectorCatalog};
use concierge_chat::{ComposerSettings, ConversationHub, GeminiClient, LlmClient, ResponseComposer};
use concierge_core::ConciergeConfig;
use concierge_memory::{open_profile_store, PreferenceExtractor, SessionMemory};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ConciergeConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();
    tracing::info!(path = %config_file.display(), "Configuration ready");

    let api_key = config.api_key()?;

    // Catalog.
    let embedder = embedder_for_dir(&config.catalog.model_dir);
    let catalog: Arc<dyn CatalogStore> = Arc::new(
        VectorCatalog::from_csv(Path::new(&config.catalog.csv_path), embedder).await?,
    );
    tracing::info!(
        items = catalog.len(),
        path = %config.catalog.csv_path,
        "Catalog loaded"
    );

    // Memory.
    let store = open_profile_store(&config)?;
    let memory = Arc::new(SessionMemory::new(store, config.memory.max_history));
    let extractor = PreferenceExtractor::with_locations(catalog.locations());
    tracing::info!(backend = %config.memory.backend, "Session memory ready");

    // Generation.
    let llm: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(api_key, &config.llm)?);
    tracing::info!(model = llm.model(), "LLM client ready");

    let composer = ResponseComposer::new(
        Arc::clone(&catalog),
        llm,
        Arc::clone(&memory),
        extractor,
        ComposerSettings::from_config(&config),
    );
    let hub = Arc::new(ConversationHub::new(memory, composer));
    let state = AppState::new(hub, catalog);

    start_server(&config, state).await?;
    tracing::info!("Concierge stopped");
    Ok(())
}
