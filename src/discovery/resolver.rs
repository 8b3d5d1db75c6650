//! Consul 解析器状态机
//!
//! 每个解析器实例只有一个后台 watch 任务：长轮询目录服务 → 健康过滤 → 与上次推送的
//! 地址列表比较 → 变化时推送给消费者。目录服务出错时上报错误、退避后重试，
//! 直到解析器被关闭。游标和上次推送的地址列表只由 watch 任务读写。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::discovery::backend::{DirectoryClient, HealthQuery, WatchCursor};
use crate::discovery::diff::addresses_equal;
use crate::discovery::filter::filter_entries;
use crate::discovery::instance::{ResolvedAddress, ServiceEntry};
use crate::discovery::target::{HealthPolicy, ResolutionRequest};
use crate::error::ResolverError;
use crate::retry::{FixedRetryPolicy, RetryPolicy, policy_from_config};

/// 消费者接口（由 RPC 框架提供）
///
/// 两个方法都是 fire-and-forget，解析器不关心返回结果。
pub trait AddressSink: Send + Sync {
    /// 推送完整的当前地址列表
    fn update_addresses(&self, addresses: Vec<ResolvedAddress>);

    /// 上报非致命错误，消费者应继续使用上一次的地址列表
    fn report_error(&self, error: &ResolverError);
}

/// 交给插件注册表的不透明解析器句柄
pub trait Resolver: Send + Sync {
    /// 请求立即重新解析，会合并进唯一的 watch，不会产生第二个并发查询
    fn resolve_now(&self);

    /// 关闭解析器，幂等
    fn close(&self);
}

/// 解析器状态：Idle → Watching → Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Idle,
    Watching,
    Closed,
}

const STATE_IDLE: u8 = 0;
const STATE_WATCHING: u8 = 1;
const STATE_CLOSED: u8 = 2;

impl ResolverState {
    fn from_u8(v: u8) -> Self {
        match v {
            STATE_IDLE => ResolverState::Idle,
            STATE_WATCHING => ResolverState::Watching,
            _ => ResolverState::Closed,
        }
    }
}

/// 兜底轮询间隔的下限，避免配置为 0 时空转
const MIN_FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// watch 循环的运行参数
#[derive(Clone)]
pub struct WatchOptions {
    /// 只使用 `backoff_duration`；watch 循环不设重试上限
    pub retry: Arc<dyn RetryPolicy>,
    /// 目录服务没有返回索引时的兜底轮询间隔
    pub fallback_poll_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            retry: Arc::new(FixedRetryPolicy::unbounded(Duration::from_millis(500))),
            fallback_poll_interval: Duration::from_secs(10),
        }
    }
}

impl From<&ResolverConfig> for WatchOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            retry: policy_from_config(&config.retry),
            fallback_poll_interval: config.fallback_poll_interval(),
        }
    }
}

/// Consul 解析器
pub struct ConsulResolver {
    request: Arc<ResolutionRequest>,
    client: Arc<dyn DirectoryClient>,
    sink: Arc<dyn AddressSink>,
    options: WatchOptions,
    state: AtomicU8,
    // 取消令牌归解析器所有，生命周期覆盖整个 watch 任务
    cancel: CancellationToken,
    resolve_now: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConsulResolver {
    pub fn new(
        request: ResolutionRequest,
        client: Arc<dyn DirectoryClient>,
        sink: Arc<dyn AddressSink>,
        options: WatchOptions,
    ) -> Self {
        Self {
            request: Arc::new(request),
            client,
            sink,
            options,
            state: AtomicU8::new(STATE_IDLE),
            cancel: CancellationToken::new(),
            resolve_now: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    pub fn request(&self) -> &ResolutionRequest {
        &self.request
    }

    pub fn state(&self) -> ResolverState {
        ResolverState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 启动 watch 任务，只有第一次调用生效；必须在 tokio runtime 内调用
    pub fn start(&self) {
        if self
            .state
            .compare_exchange(STATE_IDLE, STATE_WATCHING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let watcher = Watcher {
            query: HealthQuery::from(self.request.as_ref()),
            policy: self.request.health_policy,
            client: self.client.clone(),
            sink: self.sink.clone(),
            retry: self.options.retry.clone(),
            fallback_poll_interval: self
                .options
                .fallback_poll_interval
                .max(MIN_FALLBACK_POLL_INTERVAL),
            cancel: self.cancel.clone(),
            resolve_now: self.resolve_now.clone(),
        };

        let handle = tokio::spawn(watcher.run());
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// 关闭并等待 watch 任务退出
    pub async fn shutdown(&self) {
        self.close();
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(
                    service = %self.request.service_name,
                    error = %e,
                    "Consul watch task ended abnormally"
                );
            }
        }
    }
}

impl Resolver for ConsulResolver {
    fn resolve_now(&self) {
        // Notify 只保留一个许可，多次调用自然合并
        self.resolve_now.notify_one();
    }

    fn close(&self) {
        let prev = self.state.swap(STATE_CLOSED, Ordering::AcqRel);
        self.cancel.cancel();
        if prev != STATE_CLOSED {
            info!(service = %self.request.service_name, "Consul resolver closed");
        }
    }
}

impl Drop for ConsulResolver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// watch 任务独占的状态
struct Watcher {
    query: HealthQuery,
    policy: HealthPolicy,
    client: Arc<dyn DirectoryClient>,
    sink: Arc<dyn AddressSink>,
    retry: Arc<dyn RetryPolicy>,
    fallback_poll_interval: Duration,
    cancel: CancellationToken,
    resolve_now: Arc<Notify>,
}

impl Watcher {
    async fn run(self) {
        let mut cursor = WatchCursor::ZERO;
        let mut last_delivered: Option<Vec<ResolvedAddress>> = None;
        let mut failures = 0usize;

        info!(
            service = %self.query.service_name,
            tags = ?self.query.tags,
            policy = ?self.policy,
            "Consul watch started"
        );

        loop {
            let sent = cursor;
            let result = self.client.query(&self.query, sent, &self.cancel).await;
            // 查询期间的 resolve_now 已经由这次查询满足，丢弃残留的许可，
            // 否则下一次错误退避会被直接跳过
            let _ = self.resolve_now.notified().now_or_never();

            let outcome = match result {
                Ok(outcome) => {
                    failures = 0;
                    outcome
                }
                Err(ResolverError::Cancelled) => break,
                Err(e) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    warn!(
                        service = %self.query.service_name,
                        cursor = %sent,
                        error = %e,
                        "Consul query failed, retrying"
                    );
                    self.sink.report_error(&e);

                    // 不设重试上限，一直退避重试到解析器关闭
                    let delay = self.retry.backoff_duration(failures);
                    failures = failures.saturating_add(1);
                    if !self.pause(delay).await {
                        break;
                    }
                    continue;
                }
            };

            // 索引回退说明目录服务状态被重置（例如 leader 切换），重新做一次非阻塞查询
            if outcome.cursor < sent {
                debug!(
                    service = %self.query.service_name,
                    sent = %sent,
                    returned = %outcome.cursor,
                    "Consul index went backwards, resetting cursor"
                );
                cursor = WatchCursor::ZERO;
                continue;
            }
            cursor = outcome.cursor;

            let addresses = to_addresses(filter_entries(outcome.entries, self.policy));
            if !addresses_equal(last_delivered.as_deref(), Some(addresses.as_slice())) {
                if self.cancel.is_cancelled() {
                    break;
                }
                info!(
                    service = %self.query.service_name,
                    cursor = %cursor,
                    count = addresses.len(),
                    "Consul addresses changed"
                );
                self.sink.update_addresses(addresses.clone());
                last_delivered = Some(addresses);
            }

            // 无法长轮询时按固定间隔重新查询，避免空转
            if cursor.is_zero() && !self.pause(self.fallback_poll_interval).await {
                break;
            }
        }

        debug!(service = %self.query.service_name, "Consul watch stopped");
    }

    /// 等待 `delay`，`resolve_now` 会提前结束等待；返回 false 表示已被取消
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.resolve_now.notified() => true,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn to_addresses(entries: Vec<ServiceEntry>) -> Vec<ResolvedAddress> {
    entries.iter().map(ServiceEntry::to_resolved_address).collect()
}
