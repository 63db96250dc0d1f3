//! Timeout and retry around oracle calls

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{OracleError, OracleResult};
use crate::types::{OracleRequest, StructuredResponse};
use crate::{complete_structured, LanguageOracle};

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Calls the oracle for `T`, each attempt bounded by `request.timeout`.
///
/// Returns the last error once the retries are exhausted; callers decide the
/// fallback.
pub async fn call_with_retry<T: StructuredResponse>(
    oracle: &dyn LanguageOracle,
    request: &OracleRequest,
    policy: RetryPolicy,
) -> OracleResult<T> {
    let mut attempt = 0;
    loop {
        let call = complete_structured::<T>(oracle, request);
        let result = match tokio::time::timeout(request.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(request.timeout)),
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(purpose = %request.purpose, attempt, "Oracle call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    purpose = %request.purpose,
                    model = %request.model,
                    error = %e,
                    "Oracle call failed, retrying ({}/{})",
                    attempt,
                    policy.max_retries
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(e) => {
                warn!(
                    purpose = %request.purpose,
                    model = %request.model,
                    error = %e,
                    attempts = attempt + 1,
                    "Oracle call failed"
                );
                return Err(e);
            }
        }
    }
}
