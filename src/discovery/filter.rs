//! 健康过滤

use crate::discovery::instance::ServiceEntry;
use crate::discovery::target::HealthPolicy;

/// 按健康策略过滤目录服务返回的记录
///
/// `OnlyHealthy` 下目录服务已经在服务端过滤（`passing=true`），这里原样返回。
/// `PreferHealthyFallbackToAny` 下只保留 passing 的记录；如果一个都没有，
/// 原样返回全部记录，避免消费者在短暂全员不健康时拿不到任何地址。
pub fn filter_entries(entries: Vec<ServiceEntry>, policy: HealthPolicy) -> Vec<ServiceEntry> {
    match policy {
        HealthPolicy::OnlyHealthy => entries,
        HealthPolicy::PreferHealthyFallbackToAny => prefer_healthy(entries),
    }
}

fn prefer_healthy(entries: Vec<ServiceEntry>) -> Vec<ServiceEntry> {
    if !entries.iter().any(|e| e.health.is_passing()) {
        return entries;
    }
    entries.into_iter().filter(|e| e.health.is_passing()).collect()
}
