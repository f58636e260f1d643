use anyhow::Context;
use fincat_core::CategoryCatalog;
use fincat_engine::{BatchConfig, BatchOrchestrator, Categorizer, HeuristicScorer, PatternMatcher};
use std::sync::Arc;

use crate::config::ServerConfig;

/// Read-only handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub categorizer: Arc<Categorizer>,
    pub batch: Arc<BatchOrchestrator>,
}

impl AppState {
    pub fn new(categorizer: Arc<Categorizer>, batch_config: BatchConfig) -> Self {
        let batch = Arc::new(BatchOrchestrator::new(Arc::clone(&categorizer), batch_config));
        Self { categorizer, batch }
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let catalog = Arc::new(CategoryCatalog::default());
        let matcher = match &config.rules_path {
            Some(path) => PatternMatcher::from_file(path, &catalog)
                .with_context(|| format!("loading pattern rules from {}", path.display()))?,
            None => PatternMatcher::default(),
        };
        tracing::info!(rules = matcher.rules().len(), "pattern rules loaded");

        let categorizer = Arc::new(Categorizer::new(catalog, matcher, HeuristicScorer));
        Ok(Self::new(categorizer, config.batch_config()))
    }
}
