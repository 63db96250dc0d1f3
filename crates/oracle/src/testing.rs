//! Oracles for tests and offline runs.
//!
//! [`NullOracle`] fails every call so each decision takes its fallback.
//! [`ScriptedOracle`] answers from a closure or a fixed sequence and records
//! every request it saw.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{OracleError, OracleResult};
use crate::types::OracleRequest;
use crate::LanguageOracle;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullOracle;

#[async_trait]
impl LanguageOracle for NullOracle {
    async fn complete_json(&self, request: &OracleRequest) -> OracleResult<Value> {
        Err(OracleError::provider(format!(
            "no oracle configured for {} ({})",
            request.model, request.purpose
        )))
    }
}

type Responder = dyn Fn(&OracleRequest) -> OracleResult<Value> + Send + Sync;

/// Closure-backed oracle that records requests.
#[derive(Clone)]
pub struct ScriptedOracle {
    responder: Arc<Responder>,
    latency: Duration,
    requests: Arc<Mutex<Vec<OracleRequest>>>,
}

impl ScriptedOracle {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&OracleRequest) -> OracleResult<Value> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            latency: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replies with `responses` in order, then fails every later call.
    pub fn sequence(responses: Vec<OracleResult<Value>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(OracleError::provider("script exhausted")))
        })
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageOracle for ScriptedOracle {
    async fn complete_json(&self, request: &OracleRequest) -> OracleResult<Value> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(request)
    }
}

impl std::fmt::Debug for ScriptedOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedOracle")
            .field("latency", &self.latency)
            .field("calls", &self.call_count())
            .finish()
    }
}
