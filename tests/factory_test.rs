//! 解析器工厂与插件注册表测试

mod common;

use common::{RecordingSink, init_tracing};
use flare_consul_resolver::{
    AddressSink, CONSUL_SCHEME, ConsulResolverBuilder, QueryScheme, ResolutionRequest,
    ResolverBuilder, ResolverConfig, ResolverError, ResolverRegistry, ResolverState, RetryConfig,
    Target,
};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> ResolverConfig {
    ResolverConfig {
        wait_time_secs: 30,
        fallback_poll_interval_secs: 1,
        retry: RetryConfig {
            base_delay_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn entry(address: &str, status: &str) -> serde_json::Value {
    json!({
        "Node": { "Address": "192.168.0.1" },
        "Service": { "Address": address, "Port": 9000 },
        "Checks": [{ "CheckID": "service:billing", "Status": status }],
    })
}

#[test]
fn test_build_errors_are_synchronous() {
    let builder = ConsulResolverBuilder::new(test_config());
    let sink: Arc<dyn AddressSink> = RecordingSink::new();

    let cases = [
        ("consul://127.0.0.1:8500/", ResolverError::MissingServiceName),
        (
            "consul://127.0.0.1:8500/billing?health=sometimes",
            ResolverError::UnsupportedHealthPolicy("sometimes".into()),
        ),
        (
            "consul://127.0.0.1:8500/billing?scheme=ftp",
            ResolverError::UnsupportedScheme("ftp".into()),
        ),
        (
            "consul://127.0.0.1:8500/billing?dc=eu",
            ResolverError::UnsupportedParameter("dc".into()),
        ),
    ];

    // 不在 tokio runtime 中：如果构建器启动了 watch，这里会 panic
    for (raw, expected) in cases {
        let target = Target::parse(raw).unwrap();
        let result = builder.build(&target, sink.clone());
        assert_eq!(result.err(), Some(expected), "target: {raw}");
    }
}

#[test]
fn test_registry_rejects_unknown_scheme() {
    let registry = ResolverRegistry::with_consul(test_config());
    let sink: Arc<dyn AddressSink> = RecordingSink::new();

    let result = registry.build("etcd://127.0.0.1:2379/billing", sink);
    assert_eq!(
        result.err(),
        Some(ResolverError::UnknownResolverScheme("etcd".into()))
    );
}

#[test]
fn test_registry_lookup_is_case_insensitive() {
    let registry = ResolverRegistry::with_consul(test_config());
    assert!(registry.get("consul").is_some());
    assert!(registry.get("CONSUL").is_some());
    assert!(registry.get("dns").is_none());

    let builder = registry.get(CONSUL_SCHEME).unwrap();
    assert_eq!(builder.scheme(), CONSUL_SCHEME);
}

#[test]
fn test_target_overrides_connection_defaults() {
    let builder = ConsulResolverBuilder::new(ResolverConfig {
        token: Some("default-token".into()),
        ..test_config()
    });

    let target =
        Target::parse("consul://consul.internal:8501/billing?scheme=https&token=t1").unwrap();
    let request = ResolutionRequest::from_target(&target).unwrap();
    let config = builder.client_config(&target, &request);
    assert_eq!(config.address, "consul.internal:8501");
    assert_eq!(config.scheme, QueryScheme::Https);
    assert_eq!(config.token.as_deref(), Some("t1"));
    assert_eq!(config.wait_time, Duration::from_secs(30));

    let target = Target::parse("consul:///billing").unwrap();
    let request = ResolutionRequest::from_target(&target).unwrap();
    let config = builder.client_config(&target, &request);
    assert_eq!(config.address, "127.0.0.1:8500");
    assert_eq!(config.scheme, QueryScheme::Http);
    assert_eq!(config.token.as_deref(), Some("default-token"));
}

#[tokio::test]
async fn test_fallback_policy_end_to_end() {
    init_tracing();
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/health/service/billing.grpc")
                .query_param_missing("index")
                .query_param_missing("passing");
            then.status(200)
                .header("X-Consul-Index", "5")
                .json_body(json!([entry("10.0.0.1", "passing"), entry("10.0.0.2", "critical")]));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/health/service/billing.grpc")
                .query_param("index", "5")
                .query_param("wait", "30s");
            then.status(200)
                .header("X-Consul-Index", "6")
                .json_body(json!([entry("10.0.0.1", "critical"), entry("10.0.0.2", "critical")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/health/service/billing.grpc")
                .query_param("index", "6");
            then.status(200)
                .header("X-Consul-Index", "6")
                .delay(Duration::from_secs(30))
                .json_body(json!([]));
        })
        .await;

    let builder = ConsulResolverBuilder::new(test_config());
    let target = Target::parse(&format!(
        "consul://{}/billing.grpc?scheme=http&health=fallbacktounhealthy",
        server.address()
    ))
    .unwrap();
    let sink = RecordingSink::new();
    let resolver = builder
        .build_resolver(&target, sink.clone() as Arc<dyn AddressSink>)
        .unwrap();
    assert_eq!(resolver.state(), ResolverState::Watching);

    sink.wait_for_updates(2).await;
    assert_eq!(
        sink.updates(),
        vec![
            vec!["10.0.0.1:9000".to_string()],
            vec!["10.0.0.1:9000".to_string(), "10.0.0.2:9000".to_string()],
        ]
    );
    assert_eq!(first.hits_async().await, 1);
    assert_eq!(second.hits_async().await, 1);

    tokio::time::timeout(Duration::from_secs(5), resolver.shutdown())
        .await
        .expect("resolver should stop while a blocking query is in flight");
    assert_eq!(resolver.state(), ResolverState::Closed);
}

#[tokio::test]
async fn test_registry_builds_running_resolver() {
    init_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/health/service/billing")
                .query_param("passing", "true")
                .query_param("tag", "blue");
            then.status(200)
                .header("X-Consul-Index", "1")
                .delay(Duration::from_millis(10))
                .json_body(json!([entry("10.0.0.1", "passing")]));
        })
        .await;

    let registry = ResolverRegistry::with_consul(test_config());
    let sink = RecordingSink::new();
    let resolver = registry
        .build(
            &format!("consul://{}/billing?tags=blue", server.address()),
            sink.clone() as Arc<dyn AddressSink>,
        )
        .unwrap();

    sink.wait_for_updates(1).await;
    assert_eq!(sink.updates()[0], vec!["10.0.0.1:9000".to_string()]);

    resolver.close();
    resolver.close();
}
