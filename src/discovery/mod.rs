//! Consul 服务发现解析器
//!
//! 解析目标字符串，长轮询 Consul 健康查询接口，按健康策略过滤后把地址列表增量推送给
//! RPC 框架的负载均衡层。

pub mod arena;
pub mod backend;
pub mod diff;
pub mod discover;
pub mod factory;
pub mod filter;
pub mod instance;
pub mod resolver;
pub mod target;

pub use arena::{WatchArena, WatchSubscription};
pub use backend::consul::{ConsulClient, ConsulClientConfig};
pub use backend::{DirectoryClient, HealthQuery, QueryOutcome, WatchCursor};
pub use diff::addresses_equal;
pub use discover::{DiscoverSink, ResolverDiscover, feed_balance_channel};
pub use factory::{CONSUL_SCHEME, ConsulResolverBuilder, ResolverBuilder, ResolverRegistry};
pub use filter::filter_entries;
pub use instance::{HealthStatus, ResolvedAddress, ServiceEntry};
pub use resolver::{AddressSink, ConsulResolver, Resolver, ResolverState, WatchOptions};
pub use target::{HealthPolicy, QueryScheme, ResolutionRequest, Target, WatchKey};
