pub mod commands;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod markdown;
pub mod terminal;

use std::sync::Arc;

use commands::admin::AdminPanel;
use commands::chat::ChatSession;
use config::{AppConfig, ConfigError};
use context::ContextSource;
use db::{Database, PolicyStore, StoreError};
use embedding::EmbeddingClient;
use llm::openai::CompletionClient;
use llm::ProviderError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
    #[error("HTTP client setup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = config::database_path()?;
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let db = Arc::new(Database::open(&db_path)?);
    let config = AppConfig::load(&db)?;

    if config.completion.api_key().is_none() {
        tracing::warn!("No OpenAI API key configured; answers and embeddings use offline fallbacks");
    }
    tracing::info!(
        db = %db_path.display(),
        strategy = %config.context_strategy,
        dimensions = ?config.embedding_dimensions,
        "Configuration loaded"
    );

    let store: Arc<dyn PolicyStore> = db.clone();
    let completion = CompletionClient::new(config.completion.clone())?;
    let embedder = EmbeddingClient::new(config.embedding.clone(), config.embedding_dimensions)?;

    let session = ChatSession::new(
        Arc::new(completion),
        ContextSource::new(config.context_strategy, store.clone()),
    )
    .with_listener(terminal::print_bot_messages);
    let admin = AdminPanel::new(store, Arc::new(embedder));

    terminal::run_loop(db, session, admin).await?;
    Ok(())
}
