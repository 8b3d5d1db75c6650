//! 集成测试共用的桩实现：脚本化的目录服务客户端和记录推送的消费者

#![allow(dead_code)]

use async_trait::async_trait;
use flare_consul_resolver::{
    AddressSink, DirectoryClient, FixedRetryPolicy, HealthQuery, HealthStatus, QueryOutcome,
    ResolvedAddress, ResolverError, ServiceEntry, WatchCursor, WatchOptions,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

static TRACING: Once = Once::new();

/// 安装测试用的 tracing subscriber（RUST_LOG 控制级别）
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// 脚本中的一步
pub enum Step {
    /// 返回记录和新的索引
    Reply(Vec<ServiceEntry>, u64),
    /// 返回错误
    Fail(ResolverError),
    /// 一直阻塞到被取消（模拟没有变化的长轮询）
    Hang,
    /// 先阻塞一段时间再执行内层步骤（模拟耗时的长轮询）
    Delay(Duration, Box<Step>),
}

/// 按脚本应答的目录服务客户端，脚本耗尽后一直阻塞
#[derive(Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    cursors: Mutex<Vec<u64>>,
    queries: Mutex<Vec<HealthQuery>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// 每次查询发送的游标
    pub fn cursors(&self) -> Vec<u64> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<HealthQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 等到至少发出 `n` 次查询
    pub async fn wait_for_calls(&self, n: usize) {
        wait_until(|| self.calls() >= n).await;
    }
}

#[async_trait]
impl DirectoryClient for ScriptedClient {
    async fn query(
        &self,
        query: &HealthQuery,
        cursor: WatchCursor,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, ResolverError> {
        self.cursors.lock().unwrap().push(cursor.value());
        self.queries.lock().unwrap().push(query.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Hang);
        tokio::task::yield_now().await;

        while let Step::Delay(delay, inner) = step {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(ResolverError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            step = *inner;
        }

        let result = match step {
            Step::Reply(entries, index) => Ok(QueryOutcome {
                entries,
                cursor: WatchCursor(index),
            }),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                cancel.cancelled().await;
                Err(ResolverError::Cancelled)
            }
            Step::Delay(..) => unreachable!("delays are unwrapped above"),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// 记录所有推送和错误的消费者
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<Vec<ResolvedAddress>>>,
    errors: Mutex<Vec<ResolverError>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<Vec<String>> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|list| list.iter().map(|a| a.host_port.clone()).collect())
            .collect()
    }

    pub fn errors(&self) -> Vec<ResolverError> {
        self.errors.lock().unwrap().clone()
    }

    pub async fn wait_for_updates(&self, n: usize) {
        wait_until(|| self.updates.lock().unwrap().len() >= n).await;
    }

    pub async fn wait_for_errors(&self, n: usize) {
        wait_until(|| self.errors.lock().unwrap().len() >= n).await;
    }
}

impl AddressSink for RecordingSink {
    fn update_addresses(&self, addresses: Vec<ResolvedAddress>) {
        self.updates.lock().unwrap().push(addresses);
    }

    fn report_error(&self, error: &ResolverError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// 轮询条件，最多等待 5 秒
pub async fn wait_until<F: Fn() -> bool>(cond: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

/// 测试用的 watch 参数：很短的退避和兜底轮询间隔
pub fn fast_options() -> WatchOptions {
    WatchOptions {
        retry: Arc::new(FixedRetryPolicy::unbounded(Duration::from_millis(10))),
        fallback_poll_interval: Duration::from_millis(20),
    }
}

pub fn entry(host: &str, port: u16, health: HealthStatus) -> ServiceEntry {
    ServiceEntry::new("10.0.0.1", host, port).with_health(health)
}

pub fn passing(host: &str, port: u16) -> ServiceEntry {
    entry(host, port, HealthStatus::Passing)
}
