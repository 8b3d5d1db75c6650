use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::discovery::target::QueryScheme;
use crate::error::InfraResult;

/// 解析器的环境连接参数
///
/// 目标字符串中的 authority / `scheme` / `token` 会覆盖这里的默认值。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Consul agent 地址（host:port），目标未携带 authority 时使用
    pub address: String,
    pub scheme: QueryScheme,
    pub token: Option<String>,
    /// 阻塞查询的最长等待时间（秒），Consul 上限为 10 分钟
    pub wait_time_secs: u64,
    pub connect_timeout_secs: u64,
    /// 目录服务不返回索引时（无法长轮询）的兜底轮询间隔（秒）
    pub fallback_poll_interval_secs: u64,
    pub retry: RetryConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".to_string(),
            scheme: QueryScheme::Http,
            token: None,
            wait_time_secs: 600,
            connect_timeout_secs: 5,
            fallback_poll_interval_secs: 10,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// 目录服务出错后的退避配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    pub base_delay_ms: u64,
    /// 仅对 exponential 生效
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl ResolverConfig {
    pub fn load_from_file(path: &str) -> InfraResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ResolverConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// 使用 Consul 官方客户端约定的环境变量覆盖配置
    ///
    /// - `CONSUL_HTTP_ADDR`: 地址，可带 `http://` / `https://` 前缀
    /// - `CONSUL_HTTP_TOKEN`: ACL token
    /// - `CONSUL_HTTP_SSL`: `true` 时使用 https
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var("CONSUL_HTTP_ADDR") {
            let addr = addr.trim();
            if let Some(rest) = addr.strip_prefix("https://") {
                self.scheme = QueryScheme::Https;
                self.address = rest.trim_end_matches('/').to_string();
            } else if let Some(rest) = addr.strip_prefix("http://") {
                self.scheme = QueryScheme::Http;
                self.address = rest.trim_end_matches('/').to_string();
            } else if !addr.is_empty() {
                self.address = addr.to_string();
            }
        }

        if let Ok(token) = std::env::var("CONSUL_HTTP_TOKEN") {
            if !token.is_empty() {
                self.token = Some(token);
            }
        }

        if std::env::var("CONSUL_HTTP_SSL")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
        {
            self.scheme = QueryScheme::Https;
        }

        self
    }

    /// 阻塞查询等待时间，至少 1 秒（Consul 把 `wait=0s` 当作默认的 5 分钟）
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// 兜底轮询间隔，至少 1 秒
    pub fn fallback_poll_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_interval_secs.max(1))
    }
}
