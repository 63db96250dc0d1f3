use std::sync::Arc;

use db::GameStore;
use events::{EventSink, NullSink};
use oracle::testing::NullOracle;
use oracle::{LanguageOracle, OracleRequest};

use crate::config::EngineConfig;

/// Collaborators shared by every engine component.
///
/// Oracle and sink default to null objects: every decision takes its
/// fallback and events are only persisted.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn GameStore>,
    pub oracle: Arc<dyn LanguageOracle>,
    pub sink: Arc<dyn EventSink>,
    pub config: EngineConfig,
}

impl EngineContext {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            oracle: Arc::new(NullOracle),
            sink: Arc::new(NullSink),
            config: EngineConfig::default(),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn LanguageOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies the configured per-call timeout.
    pub fn prepare(&self, request: OracleRequest) -> OracleRequest {
        request.with_timeout(self.config.oracle_timeout)
    }
}
