use std::time::Duration;

use mafia_core::DEFAULT_PROMPT_ITEMS;
use oracle::RetryPolicy;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single oracle call.
    pub oracle_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Cheatsheet items rendered into each prompt.
    pub cheatsheet_items: usize,
    /// Days after which a stalled game is abandoned.
    pub max_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            cheatsheet_items: DEFAULT_PROMPT_ITEMS,
            max_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_cheatsheet_items(mut self, items: usize) -> Self {
        self.cheatsheet_items = items;
        self
    }

    pub fn with_max_days(mut self, max_days: u32) -> Self {
        self.max_days = max_days.max(1);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }
}
