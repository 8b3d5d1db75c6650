//! 目录服务客户端抽象

pub mod consul;

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::discovery::instance::ServiceEntry;
use crate::discovery::target::ResolutionRequest;
use crate::error::Result;

/// 目录服务的状态索引（阻塞查询游标）
///
/// 0 表示未设置：带 0 的查询立即返回当前状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchCursor(pub u64);

impl WatchCursor {
    pub const ZERO: WatchCursor = WatchCursor(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一次健康查询的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthQuery {
    pub service_name: String,
    /// 实例必须携带全部标签才会返回
    pub tags: Vec<String>,
    /// 是否要求目录服务只返回健康检查通过的实例
    pub only_healthy: bool,
}

impl From<&ResolutionRequest> for HealthQuery {
    fn from(request: &ResolutionRequest) -> Self {
        Self {
            service_name: request.service_name.clone(),
            tags: request.tags.clone(),
            only_healthy: request.only_healthy(),
        }
    }
}

/// 一次查询的结果：当前记录集合和下一次查询使用的游标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub entries: Vec<ServiceEntry>,
    pub cursor: WatchCursor,
}

/// 目录服务客户端 trait
///
/// 实现必须支持长轮询：`cursor` 非零时阻塞到目录服务索引超过 `cursor`（或到达等待上限），
/// 为零时立即返回。`cancel` 触发后必须尽快返回 [`ResolverError::Cancelled`](crate::error::ResolverError::Cancelled)。
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn query(
        &self,
        query: &HealthQuery,
        cursor: WatchCursor,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome>;
}
