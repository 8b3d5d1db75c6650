//! 服务注册
//!
//! 解析器只负责发现；服务实例自身的注册/注销通过 Consul agent API 完成，
//! 这里只提供边界上的最小实现。

pub mod consul;

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;

pub use consul::ConsulRegistry;

use crate::error::{ResolverError, Result};

/// 服务注册 Trait
#[async_trait]
pub trait ServiceRegistrar: Send + Sync {
    /// 注册服务实例，返回实例 ID
    async fn register(&self, registration: &ServiceRegistration) -> Result<String>;

    /// 注销服务实例
    async fn deregister(&self, instance_id: &str) -> Result<()>;
}

/// 一个待注册的服务实例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub meta: HashMap<String, String>,
    /// TCP 健康检查间隔
    pub check_interval: Duration,
    /// 健康检查持续失败多久后由 Consul 自动注销
    pub deregister_critical_after: Duration,
}

impl ServiceRegistration {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            tags: Vec::new(),
            meta: HashMap::new(),
            check_interval: Duration::from_secs(10),
            deregister_critical_after: Duration::from_secs(60 * 60),
        }
    }

    /// 从服务对外地址（如 `grpc://10.0.0.5:9000`）创建
    pub fn from_url(name: impl Into<String>, addr: &str) -> Result<Self> {
        let url = Url::parse(addr).map_err(|e| {
            ResolverError::Registration(format!("invalid address '{}': {}", addr, e))
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ResolverError::Registration(format!("address '{}' has no host", addr)))?;
        let port = url
            .port()
            .ok_or_else(|| ResolverError::Registration(format!("address '{}' has no port", addr)))?;
        Ok(Self::new(name, host.trim_start_matches('[').trim_end_matches(']'), port))
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// 实例 ID 由服务名和对外地址决定，同一地址重复注册会覆盖
    pub fn instance_id(&self) -> String {
        format!("{}-{}-{}", self.name, self.host, self.port)
    }

    /// TCP 健康检查的目标地址
    pub fn check_target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
