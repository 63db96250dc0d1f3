//! Language oracle: the single way any agent decision gets made.
//!
//! An oracle turns a system/user prompt pair into a JSON value matching a
//! response schema. It is stateless per call; callers own retries and
//! fallbacks through [`RetryPolicy`].

pub mod client;
pub mod error;
mod parse;
pub mod retry;
pub mod testing;
pub mod types;

pub use client::{ApiStyle, HttpOracle, ProviderEndpoint};
pub use error::{OracleError, OracleResult};
pub use parse::parse_json_response;
pub use retry::{call_with_retry, RetryPolicy};
pub use types::*;

use async_trait::async_trait;

#[async_trait]
pub trait LanguageOracle: Send + Sync {
    /// Produce a JSON value for `request`, or fail with a timeout, parse or
    /// provider error.
    async fn complete_json(&self, request: &OracleRequest) -> OracleResult<serde_json::Value>;
}

/// Run `request` once and deserialize the reply into `T`.
pub async fn complete_structured<T: StructuredResponse>(
    oracle: &dyn LanguageOracle,
    request: &OracleRequest,
) -> OracleResult<T> {
    let value = oracle.complete_json(request).await?;
    serde_json::from_value(value)
        .map_err(|e| OracleError::Parse(format!("response does not match schema: {}", e)))
}
