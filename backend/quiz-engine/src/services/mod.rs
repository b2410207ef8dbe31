use std::sync::Arc;

use crate::config::EngineConfig;
use crate::store::{MongoStore, QuizStore};
use result_service::ResultService;
use session_service::SessionService;

/// Shared engine state: configuration plus the storage backend every
/// service talks to.
pub struct QuizEngine {
    pub config: EngineConfig,
    store: Arc<dyn QuizStore>,
}

impl QuizEngine {
    /// Builds an engine over an existing store. Tests hand in a
    /// `MemoryStore`; production goes through `connect`.
    pub fn new(config: EngineConfig, store: Arc<dyn QuizStore>) -> Self {
        Self { config, store }
    }

    pub async fn connect(config: EngineConfig) -> anyhow::Result<Self> {
        let store = MongoStore::connect(&config).await?;

        tracing::info!("Quiz engine ready: database={}", config.mongo_database);

        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn store(&self) -> Arc<dyn QuizStore> {
        Arc::clone(&self.store)
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(Arc::clone(&self.store), &self.config)
    }

    pub fn results(&self) -> ResultService {
        ResultService::new(Arc::clone(&self.store))
    }
}

pub mod answer_ledger;
pub mod anticheat_service;
pub mod result_service;
pub mod scoring_service;
pub mod selection_service;
pub mod session_clock;
pub mod session_service;
