use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use facturo_agent::{
    ConversationEngine, GroqClient, StructuredExtractor, TextDocumentRenderer, Transcriber,
};
use facturo_core::config::{AppConfig, ConfigError, LoadOptions};
use facturo_store::{ConversationStore, InMemoryStore, KvStore, RedisStore, StoreError};
use facturo_telegram::{LongPollRunner, RetryPolicy, TelegramApi, TransportError};

pub struct Application {
    pub config: AppConfig,
    pub runner: LongPollRunner<Arc<dyn KvStore>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage connection failed: {0}")]
    Storage(#[from] StoreError),
    #[error("telegram client setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Rejects every voice note; used when no transcription key is configured.
struct UnconfiguredTranscriber;

#[async_trait]
impl Transcriber for UnconfiguredTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Err(anyhow!("transcription service is not configured"))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let store: Arc<dyn KvStore> = match &config.storage.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            info!(backend = "redis", "storage connected");
            Arc::new(store)
        }
        None => {
            warn!(
                backend = "memory",
                "no redis url configured; conversation state is lost on restart"
            );
            Arc::new(InMemoryStore::default())
        }
    };
    let repository = ConversationStore::new(store, config.storage.history_limit);

    let (transcriber, extractor): (Arc<dyn Transcriber>, Option<Arc<dyn StructuredExtractor>>) =
        match GroqClient::from_config(&config.groq) {
            Some(client) => {
                let client = Arc::new(client);
                info!(model = %config.groq.text_model, "groq client configured");
                (client.clone(), Some(client))
            }
            None => {
                warn!("groq api key missing; voice notes are rejected and extraction is heuristic-only");
                (Arc::new(UnconfiguredTranscriber), None)
            }
        };

    let engine = ConversationEngine::new(
        repository,
        transcriber,
        extractor,
        Arc::new(TextDocumentRenderer),
        config.calendar.timezone.clone(),
    );

    let api = Arc::new(TelegramApi::from_config(&config.telegram)?);
    let runner = LongPollRunner::new(api, engine, RetryPolicy::default());

    Ok(Application { config, runner })
}
