//! Tower Discover 适配
//!
//! 解析器推送的是完整地址列表，tower 的负载均衡需要的是增量的
//! `Change::Insert` / `Change::Remove`。`DiscoverSink` 作为消费者接收列表，
//! `ResolverDiscover` 计算差量并以 `Stream` 的形式输出，从而自动实现
//! `tower::discover::Discover`。

use std::collections::{HashSet, VecDeque};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tonic::transport::Endpoint;
use tower::discover::Change;
use tracing::{debug, warn};

use crate::discovery::instance::ResolvedAddress;
use crate::discovery::resolver::AddressSink;
use crate::error::ResolverError;

/// 解析器的消费者端，把地址列表转交给 [`ResolverDiscover`]
#[derive(Clone)]
pub struct DiscoverSink {
    tx: mpsc::UnboundedSender<Vec<ResolvedAddress>>,
}

impl AddressSink for DiscoverSink {
    fn update_addresses(&self, addresses: Vec<ResolvedAddress>) {
        if self.tx.send(addresses).is_err() {
            debug!("ResolverDiscover dropped, address update discarded");
        }
    }

    fn report_error(&self, error: &ResolverError) {
        // 错误不会中断 Discover 流，balancer 继续使用上一次的地址集合
        warn!(error = %error, "Resolver reported error, keeping last known endpoints");
    }
}

/// 实现 tower::discover::Discover 的地址流
///
/// key 为 `host:port` 字符串，value 为对应的 [`ResolvedAddress`]。
pub struct ResolverDiscover {
    rx: mpsc::UnboundedReceiver<Vec<ResolvedAddress>>,
    current: HashSet<ResolvedAddress>,
    pending: VecDeque<Change<String, ResolvedAddress>>,
}

impl ResolverDiscover {
    /// 返回 (ResolverDiscover, DiscoverSink)
    /// - ResolverDiscover: 交给 tower::balance 或 [`feed_balance_channel`]
    /// - DiscoverSink: 交给解析器作为消费者
    pub fn new() -> (Self, DiscoverSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                current: HashSet::new(),
                pending: VecDeque::new(),
            },
            DiscoverSink { tx },
        )
    }

    /// 当前已经输出的地址集合
    pub fn endpoints(&self) -> impl Iterator<Item = &ResolvedAddress> {
        self.current.iter()
    }

    fn apply(&mut self, addresses: Vec<ResolvedAddress>) {
        let next: HashSet<ResolvedAddress> = addresses.into_iter().collect();

        let mut removed: Vec<&ResolvedAddress> = self.current.difference(&next).collect();
        removed.sort();
        for addr in removed {
            self.pending.push_back(Change::Remove(addr.host_port.clone()));
        }

        let mut added: Vec<&ResolvedAddress> = next.difference(&self.current).collect();
        added.sort();
        for addr in added {
            self.pending
                .push_back(Change::Insert(addr.host_port.clone(), addr.clone()));
        }

        self.current = next;
    }
}

impl Stream for ResolverDiscover {
    type Item = Result<Change<String, ResolvedAddress>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(change)));
            }
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(addresses)) => self.apply(addresses),
                Poll::Ready(None) => return Poll::Ready(None), // 解析器已关闭
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// 把地址变化转发给 tonic 的 balance channel
///
/// ```ignore
/// let (channel, tx) = tonic::transport::Channel::balance_channel::<String>(64);
/// let (discover, sink) = ResolverDiscover::new();
/// let resolver = builder.build_resolver(&target, Arc::new(sink))?;
/// tokio::spawn(feed_balance_channel(discover, tx, "http"));
/// ```
///
/// 无法构造 `Endpoint` 的地址会被跳过；balance channel 关闭后返回。
pub async fn feed_balance_channel(
    mut discover: ResolverDiscover,
    tx: mpsc::Sender<Change<String, Endpoint>>,
    scheme: &str,
) {
    while let Some(Ok(change)) = discover.next().await {
        let change = match change {
            Change::Insert(key, addr) => match Endpoint::from_shared(addr.to_uri(scheme)) {
                Ok(endpoint) => Change::Insert(key, endpoint),
                Err(e) => {
                    warn!(address = %addr, error = %e, "Skipping invalid endpoint");
                    continue;
                }
            },
            Change::Remove(key) => Change::Remove(key),
        };
        if tx.send(change).await.is_err() {
            debug!("Balance channel closed, stop feeding endpoints");
            break;
        }
    }
}
