use super::RetryPolicy;
use crate::error::ResolverError;
use rand::Rng;
use std::time::Duration;

/// 指数退避重试策略
///
/// 在计算出的延迟上叠加最多 10% 的随机抖动，避免大量解析器同时重连目录服务。
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    max_attempts: Option<usize>,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoffPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            base_delay,
            max_delay,
        }
    }

    pub fn unbounded(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: None,
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&self, attempt: usize, error: &ResolverError) -> bool {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return false;
        }

        error.is_retryable()
    }

    fn backoff_duration(&self, attempt: usize) -> Duration {
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(1 << attempt.min(10));
        let delay = Duration::from_millis(delay_ms).min(self.max_delay);
        let jitter_ms = delay.as_millis() as u64 / 10;
        if jitter_ms == 0 {
            return delay;
        }
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
        (delay + jitter).min(self.max_delay)
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}
