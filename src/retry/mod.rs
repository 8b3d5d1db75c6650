//! 重试策略模块
//!
//! watch 循环在目录服务出错后按策略退避，策略本身只决定等待时长和是否继续。

pub mod exponential;
pub mod fixed;

pub use exponential::ExponentialBackoffPolicy;
pub use fixed::FixedRetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{RetryConfig, RetryStrategy};
use crate::error::ResolverError;

/// 重试策略 trait
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: usize, error: &ResolverError) -> bool;
    fn backoff_duration(&self, attempt: usize) -> Duration;
    /// `None` 表示不限次数
    fn max_attempts(&self) -> Option<usize>;
}

/// 根据配置构建重试策略（不限次数，watch 循环一直运行到被关闭）
pub fn policy_from_config(config: &RetryConfig) -> Arc<dyn RetryPolicy> {
    let base = Duration::from_millis(config.base_delay_ms);
    match config.strategy {
        RetryStrategy::Fixed => Arc::new(FixedRetryPolicy::unbounded(base)),
        RetryStrategy::Exponential => Arc::new(ExponentialBackoffPolicy::unbounded(
            base,
            Duration::from_millis(config.max_delay_ms),
        )),
    }
}
