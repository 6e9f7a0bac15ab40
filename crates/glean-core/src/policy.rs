use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

/// What a worker does after a failed snapshot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Requeue the target no matter how often it fails.
    RetryForever,
    /// Allow up to `n` retries after the first failure.
    RetryN(u32),
    /// Fail the target on its first fetch error.
    FailFast,
}

impl RetryPolicy {
    /// Whether a target that has failed `failures` times may be requeued.
    pub fn allows_retry(&self, failures: u32) -> bool {
        match self {
            RetryPolicy::RetryForever => true,
            RetryPolicy::RetryN(n) => failures <= *n,
            RetryPolicy::FailFast => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::RetryN(10)
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::RetryForever => write!(f, "forever"),
            RetryPolicy::RetryN(n) => write!(f, "{n}"),
            RetryPolicy::FailFast => write!(f, "fail-fast"),
        }
    }
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forever" => Ok(RetryPolicy::RetryForever),
            "fail-fast" | "failfast" | "0" => Ok(RetryPolicy::FailFast),
            other => other.parse::<u32>().map(RetryPolicy::RetryN).map_err(|_| {
                format!("Unknown retry policy '{s}': expected 'forever', 'fail-fast', or a count")
            }),
        }
    }
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Upper bound on a single snapshot fetch.
    pub fetch_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Threshold for targets that do not set their own.
    pub default_threshold: NonZeroUsize,
    /// Fail a target that has not converged after this many snapshots.
    /// `None` samples until convergence.
    pub max_samples: Option<u32>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            fetch_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            default_threshold: NonZeroUsize::MIN,
            max_samples: None,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_default_threshold(mut self, threshold: NonZeroUsize) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn with_max_samples(mut self, max_samples: Option<u32>) -> Self {
        self.max_samples = max_samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_forever() {
        assert!(RetryPolicy::RetryForever.allows_retry(1));
        assert!(RetryPolicy::RetryForever.allows_retry(u32::MAX));
    }

    #[test]
    fn test_retry_n_bounds_attempts() {
        let policy = RetryPolicy::RetryN(2);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn test_fail_fast() {
        assert!(!RetryPolicy::FailFast.allows_retry(1));
    }

    #[test]
    fn test_parse_retry_policy() {
        assert_eq!("forever".parse::<RetryPolicy>(), Ok(RetryPolicy::RetryForever));
        assert_eq!("Fail-Fast".parse::<RetryPolicy>(), Ok(RetryPolicy::FailFast));
        assert_eq!("0".parse::<RetryPolicy>(), Ok(RetryPolicy::FailFast));
        assert_eq!("7".parse::<RetryPolicy>(), Ok(RetryPolicy::RetryN(7)));
        assert!("sometimes".parse::<RetryPolicy>().is_err());
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::default()
            .with_workers(0)
            .with_fetch_timeout(Duration::from_millis(250))
            .with_retry_policy(RetryPolicy::FailFast)
            .with_max_samples(Some(20));

        assert_eq!(config.workers, 1);
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
        assert_eq!(config.retry_policy, RetryPolicy::FailFast);
        assert_eq!(config.default_threshold.get(), 1);
        assert_eq!(config.max_samples, Some(20));
    }
}
