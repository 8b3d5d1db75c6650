//! 配置加载与重试策略测试

use flare_consul_resolver::retry::policy_from_config;
use flare_consul_resolver::{
    ErrorCategory, ErrorCode, ExponentialBackoffPolicy, FixedRetryPolicy, QueryScheme,
    ResolverConfig, ResolverError, RetryConfig, RetryPolicy, RetryStrategy,
};
use std::time::Duration;

#[test]
fn test_defaults() {
    let config = ResolverConfig::default();
    assert_eq!(config.address, "127.0.0.1:8500");
    assert_eq!(config.scheme, QueryScheme::Http);
    assert!(config.token.is_none());
    assert_eq!(config.wait_time(), Duration::from_secs(600));
    assert_eq!(config.fallback_poll_interval(), Duration::from_secs(10));
    assert_eq!(config.retry.strategy, RetryStrategy::Fixed);
    assert_eq!(config.retry.base_delay_ms, 500);
}

#[test]
fn test_load_from_toml_file() {
    let path = std::env::temp_dir()
        .join(format!("flare-consul-resolver-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
address = "consul.internal:8501"
scheme = "https"
token = "secret"
wait_time_secs = 120

[retry]
strategy = "exponential"
base_delay_ms = 100
"#,
    )
    .unwrap();

    let config = ResolverConfig::load_from_file(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.address, "consul.internal:8501");
    assert_eq!(config.scheme, QueryScheme::Https);
    assert_eq!(config.token.as_deref(), Some("secret"));
    assert_eq!(config.wait_time(), Duration::from_secs(120));
    // 未出现的字段使用默认值
    assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    assert_eq!(config.retry.strategy, RetryStrategy::Exponential);
    assert_eq!(config.retry.base_delay_ms, 100);
    assert_eq!(config.retry.max_delay_ms, 30_000);
}

#[test]
fn test_load_missing_file_fails() {
    assert!(ResolverConfig::load_from_file("/nonexistent/flare-consul.toml").is_err());
}

#[test]
fn test_env_overrides() {
    // 环境变量是进程级的，全部场景放在一个测试里顺序执行
    unsafe {
        std::env::set_var("CONSUL_HTTP_ADDR", "https://consul.example.com:8501/");
        std::env::set_var("CONSUL_HTTP_TOKEN", "env-token");
        std::env::remove_var("CONSUL_HTTP_SSL");
    }
    let config = ResolverConfig::default().with_env_overrides();
    assert_eq!(config.address, "consul.example.com:8501");
    assert_eq!(config.scheme, QueryScheme::Https);
    assert_eq!(config.token.as_deref(), Some("env-token"));

    unsafe {
        std::env::set_var("CONSUL_HTTP_ADDR", "10.0.0.9:8500");
        std::env::set_var("CONSUL_HTTP_TOKEN", "");
        std::env::set_var("CONSUL_HTTP_SSL", "true");
    }
    let config = ResolverConfig::default().with_env_overrides();
    assert_eq!(config.address, "10.0.0.9:8500");
    assert_eq!(config.scheme, QueryScheme::Https);
    assert!(config.token.is_none());

    unsafe {
        std::env::remove_var("CONSUL_HTTP_ADDR");
        std::env::remove_var("CONSUL_HTTP_TOKEN");
        std::env::remove_var("CONSUL_HTTP_SSL");
    }
    let config = ResolverConfig::default().with_env_overrides();
    assert_eq!(config.address, "127.0.0.1:8500");
    assert_eq!(config.scheme, QueryScheme::Http);
}

#[test]
fn test_fixed_policy() {
    let policy = FixedRetryPolicy::new(3, Duration::from_millis(500));
    let unreachable = ResolverError::DirectoryUnreachable("refused".into());

    assert_eq!(policy.backoff_duration(0), Duration::from_millis(500));
    assert_eq!(policy.backoff_duration(7), Duration::from_millis(500));
    assert!(policy.should_retry(0, &unreachable));
    assert!(!policy.should_retry(3, &unreachable));
    assert!(!policy.should_retry(0, &ResolverError::MissingServiceName));
    assert_eq!(policy.max_attempts(), Some(3));

    let unbounded = FixedRetryPolicy::unbounded(Duration::from_millis(500));
    assert!(unbounded.should_retry(10_000, &unreachable));
    assert_eq!(unbounded.max_attempts(), None);
}

#[test]
fn test_exponential_policy_grows_and_caps() {
    let policy =
        ExponentialBackoffPolicy::unbounded(Duration::from_millis(100), Duration::from_secs(2));

    let first = policy.backoff_duration(0);
    assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));

    let third = policy.backoff_duration(2);
    assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(440));

    for attempt in [5, 10, 64, usize::MAX] {
        assert!(policy.backoff_duration(attempt) <= Duration::from_secs(2));
    }
    assert!(policy.should_retry(1_000, &ResolverError::query_failed(Some(500), "boom")));
}

#[test]
fn test_policy_from_config() {
    let fixed = policy_from_config(&RetryConfig::default());
    assert_eq!(fixed.backoff_duration(4), Duration::from_millis(500));
    assert_eq!(fixed.max_attempts(), None);

    let exponential = policy_from_config(&RetryConfig {
        strategy: RetryStrategy::Exponential,
        base_delay_ms: 10,
        max_delay_ms: 50,
    });
    assert!(exponential.backoff_duration(8) <= Duration::from_millis(50));
}

#[test]
fn test_error_codes() {
    let cases = [
        (ResolverError::MissingServiceName, ErrorCode::MissingServiceName, ErrorCategory::Target),
        (
            ResolverError::UnknownResolverScheme("etcd".into()),
            ErrorCode::UnknownResolverScheme,
            ErrorCategory::Target,
        ),
        (
            ResolverError::DirectoryUnreachable("refused".into()),
            ErrorCode::DirectoryUnreachable,
            ErrorCategory::Directory,
        ),
        (ResolverError::Cancelled, ErrorCode::Cancelled, ErrorCategory::Lifecycle),
        (
            ResolverError::Registration("rejected".into()),
            ErrorCode::RegistrationFailed,
            ErrorCategory::Registration,
        ),
    ];
    for (error, code, category) in cases {
        assert_eq!(error.code(), code);
        assert_eq!(error.category(), category);
        assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
    }

    assert!(ResolverError::Cancelled.is_cancelled());
    assert!(!ResolverError::Cancelled.is_retryable());
    assert_eq!(
        ResolverError::query_failed(Some(500), "rpc error").to_string(),
        "directory query failed (status Some(500)): rpc error"
    );
}

#[test]
fn test_zero_durations_are_raised_to_one_second() {
    let config = ResolverConfig {
        wait_time_secs: 0,
        fallback_poll_interval_secs: 0,
        ..Default::default()
    };
    assert_eq!(config.wait_time(), Duration::from_secs(1));
    assert_eq!(config.fallback_poll_interval(), Duration::from_secs(1));
}
