use std::time::Duration;

use crate::error::NetError;

/// Backoff schedule for [`RetryNet`](crate::RetryNet).
///
/// Attempt `n` (counting from 1) waits `base_delay * 2^(n-1)`, never more
/// than `max_delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up on the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max.max(base);
        self
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            n => {
                let factor = 2_u32.saturating_pow(n - 1);
                self.base_delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }

    /// Whether `error`, seen after `attempts` retries, deserves another try.
    pub fn allows(&self, error: &NetError, attempts: u32) -> bool {
        attempts < self.max_retries && error.is_retryable()
    }
}

/// Transport settings for [`HttpClient`](crate::HttpClient).
#[derive(Clone, Debug)]
pub struct NetOptions {
    /// Bound on whole-body fetches and on the response phase of streams.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    /// 0 disables connection pooling.
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            pool_max_idle_per_host: 4,
            user_agent: concat!("hoard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NetOptions {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
