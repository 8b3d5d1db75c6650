//! 共享 watch
//!
//! 同一个目录服务上 (服务名, 标签集合, 健康策略) 相同的解析请求共用一个 watch 任务，
//! 按订阅者计数；最后一个订阅者释放时关闭 watch。每个 watch 的状态仍然只属于它自己的任务，
//! 这里不缓存任何节点列表。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::discovery::factory::ConsulResolverBuilder;
use crate::discovery::instance::ResolvedAddress;
use crate::discovery::resolver::{AddressSink, ConsulResolver, Resolver};
use crate::discovery::target::{ResolutionRequest, Target, WatchKey};
use crate::error::{ResolverError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ArenaKey {
    directory: String,
    token: Option<String>,
    watch: WatchKey,
}

/// 解析器共享池
#[derive(Clone)]
pub struct WatchArena {
    inner: Arc<ArenaInner>,
}

struct ArenaInner {
    builder: ConsulResolverBuilder,
    watches: Mutex<HashMap<ArenaKey, SharedWatch>>,
    next_id: AtomicU64,
}

struct SharedWatch {
    fanout: Arc<FanoutSink>,
    resolver: ConsulResolver,
}

/// 订阅句柄，drop 时退订
pub struct WatchSubscription {
    id: u64,
    key: ArenaKey,
    inner: Arc<ArenaInner>,
}

impl WatchArena {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                builder: ConsulResolverBuilder::new(config),
                watches: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// 订阅目标：复用已有的 watch，或者新建并启动一个
    ///
    /// 已有 watch 推送过地址时，新订阅者会立即收到当前地址列表。
    pub fn subscribe(&self, target: &str, sink: Arc<dyn AddressSink>) -> Result<WatchSubscription> {
        let target = Target::parse(target)?;
        let request = ResolutionRequest::from_target(&target)?;
        let client_config = self.inner.builder.client_config(&target, &request);
        let key = ArenaKey {
            directory: format!("{}://{}", client_config.scheme, client_config.address),
            token: client_config.token.clone(),
            watch: request.watch_key(),
        };
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut watches = self.inner.watches.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(shared) = watches.get(&key) {
            shared.fanout.add(id, sink);
            debug!(key = %key.watch, subscriber = id, "Joined shared Consul watch");
        } else {
            let fanout = Arc::new(FanoutSink::default());
            fanout.add(id, sink);
            let resolver = self
                .inner
                .builder
                .build_resolver(&target, fanout.clone() as Arc<dyn AddressSink>)?;
            info!(key = %key.watch, directory = %key.directory, "Started shared Consul watch");
            watches.insert(key.clone(), SharedWatch { fanout, resolver });
        }

        Ok(WatchSubscription {
            id,
            key,
            inner: self.inner.clone(),
        })
    }

    /// 当前存活的 watch 数量
    pub fn active_watches(&self) -> usize {
        self.inner.watches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl WatchSubscription {
    pub fn watch_key(&self) -> &WatchKey {
        &self.key.watch
    }

    /// 当前共享该 watch 的订阅者数量
    pub fn subscribers(&self) -> usize {
        self.inner
            .watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&self.key)
            .map(|shared| shared.fanout.len())
            .unwrap_or(0)
    }

    pub fn resolve_now(&self) {
        if let Some(shared) = self
            .inner
            .watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&self.key)
        {
            shared.resolver.resolve_now();
        }
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        let removed = {
            let mut watches = self.inner.watches.lock().unwrap_or_else(|e| e.into_inner());
            let now_empty = watches
                .get(&self.key)
                .map(|shared| shared.fanout.remove(self.id) == 0)
                .unwrap_or(false);
            if now_empty {
                watches.remove(&self.key)
            } else {
                None
            }
        };

        if let Some(shared) = removed {
            info!(key = %self.key.watch, "Last subscriber left, closing shared Consul watch");
            shared.resolver.close();
        }
    }
}

/// 把一个 watch 的推送扩散给所有订阅者
#[derive(Default)]
struct FanoutSink {
    state: Mutex<FanoutState>,
}

#[derive(Default)]
struct FanoutState {
    subscribers: Vec<(u64, Arc<dyn AddressSink>)>,
    last: Option<Vec<ResolvedAddress>>,
}

impl FanoutSink {
    fn add(&self, id: u64, sink: Arc<dyn AddressSink>) {
        // 持锁回放，保证新订阅者不会先收到新列表再收到旧列表
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = &state.last {
            sink.update_addresses(last.clone());
        }
        state.subscribers.push((id, sink));
    }

    /// 返回剩余订阅者数量
    fn remove(&self, id: u64) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.subscribers.retain(|(sid, _)| *sid != id);
        state.subscribers.len()
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).subscribers.len()
    }
}

impl AddressSink for FanoutSink {
    fn update_addresses(&self, addresses: Vec<ResolvedAddress>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for (_, sink) in &state.subscribers {
            sink.update_addresses(addresses.clone());
        }
        state.last = Some(addresses);
    }

    fn report_error(&self, error: &ResolverError) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for (_, sink) in &state.subscribers {
            sink.report_error(error);
        }
    }
}
