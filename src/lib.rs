//! Flare Consul Resolver
//!
//! Client-side service discovery for tonic/tower: watches Consul's health API with
//! blocking queries and feeds the current endpoint list of a service to the RPC
//! client's load balancer.
//!
//! ```ignore
//! use std::sync::Arc;
//! use flare_consul_resolver::{ResolverConfig, ResolverRegistry, ResolverDiscover};
//!
//! let registry = ResolverRegistry::with_consul(ResolverConfig::default().with_env_overrides());
//! let (discover, sink) = ResolverDiscover::new();
//! let resolver = registry.build(
//!     "consul://127.0.0.1:8500/billing.grpc?health=fallbacktounhealthy",
//!     Arc::new(sink),
//! )?;
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod retry;

// Re-exports
pub use config::{ResolverConfig, RetryConfig, RetryStrategy};
pub use error::{ErrorCategory, ErrorCode, InfraResult, ResolverError, Result};

pub use discovery::{
    AddressSink, CONSUL_SCHEME, ConsulClient, ConsulClientConfig, ConsulResolver,
    ConsulResolverBuilder, DirectoryClient, DiscoverSink, HealthPolicy, HealthQuery, HealthStatus,
    QueryOutcome, QueryScheme, ResolutionRequest, ResolvedAddress, Resolver, ResolverBuilder,
    ResolverDiscover, ResolverRegistry, ResolverState, ServiceEntry, Target, WatchArena,
    WatchCursor, WatchKey, WatchOptions, WatchSubscription, addresses_equal, feed_balance_channel,
    filter_entries,
};
pub use registry::{ConsulRegistry, ServiceRegistrar, ServiceRegistration};
pub use retry::{ExponentialBackoffPolicy, FixedRetryPolicy, RetryPolicy};
