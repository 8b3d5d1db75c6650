//! 服务实例定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 健康检查状态
///
/// 聚合优先级：maintenance > critical > warning > passing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
    Maintenance,
}

impl HealthStatus {
    /// 从 Consul 的 `Status` 字段解析，未知状态按 critical 处理
    pub fn from_consul(status: &str) -> Self {
        match status {
            "passing" => HealthStatus::Passing,
            "warning" => HealthStatus::Warning,
            "maintenance" => HealthStatus::Maintenance,
            _ => HealthStatus::Critical,
        }
    }

    /// 聚合多个检查的状态；没有任何检查时视为 passing
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses
            .into_iter()
            .max()
            .unwrap_or(HealthStatus::Passing)
    }

    pub fn is_passing(&self) -> bool {
        *self == HealthStatus::Passing
    }
}

/// 目录服务返回的一条服务记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub node_address: String,
    /// 为空时以节点地址为准
    pub service_address: String,
    pub service_port: u16,
    pub health: HealthStatus,
}

impl ServiceEntry {
    pub fn new(
        node_address: impl Into<String>,
        service_address: impl Into<String>,
        service_port: u16,
    ) -> Self {
        Self {
            node_address: node_address.into(),
            service_address: service_address.into(),
            service_port,
            health: HealthStatus::Passing,
        }
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    /// 实际对外提供服务的 host
    pub fn host(&self) -> &str {
        if self.service_address.is_empty() {
            &self.node_address
        } else {
            &self.service_address
        }
    }

    pub fn to_resolved_address(&self) -> ResolvedAddress {
        ResolvedAddress::from_host_port(self.host(), self.service_port)
    }
}

/// 推送给消费者的地址，按字符串精确比较
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedAddress {
    pub host_port: String,
}

impl ResolvedAddress {
    pub fn new(host_port: impl Into<String>) -> Self {
        Self {
            host_port: host_port.into(),
        }
    }

    /// 拼接 host 和端口，IPv6 地址加方括号
    pub fn from_host_port(host: &str, port: u16) -> Self {
        let host_port = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        Self { host_port }
    }

    pub fn as_str(&self) -> &str {
        &self.host_port
    }

    /// 转换为 gRPC URI
    pub fn to_uri(&self, scheme: &str) -> String {
        format!("{}://{}", scheme, self.host_port)
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host_port)
    }
}

impl From<&str> for ResolvedAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
