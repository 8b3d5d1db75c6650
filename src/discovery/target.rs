//! 解析目标（endpoint descriptor）解析
//!
//! 目标格式：
//!
//! ```text
//! consul://127.0.0.1:8500/billing.grpc?scheme=http&tags=a,b&health=fallbacktounhealthy&token=xxx
//! ```
//!
//! path（去掉开头的一个 `/`）为服务名，query 只接受 `scheme`、`tags`、`health`、`token`，
//! 重复出现的参数以最后一次为准。

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ResolverError, Result};

/// 查询目录服务使用的协议
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryScheme {
    #[default]
    Http,
    Https,
}

impl QueryScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryScheme::Http => "http",
            QueryScheme::Https => "https",
        }
    }
}

impl fmt::Display for QueryScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryScheme {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(QueryScheme::Http),
            "https" => Ok(QueryScheme::Https),
            _ => Err(ResolverError::UnsupportedScheme(s.to_string())),
        }
    }
}

/// 健康过滤策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthPolicy {
    /// 只返回健康检查通过的实例（由目录服务端过滤）
    #[default]
    OnlyHealthy,
    /// 优先返回健康实例；一个健康实例都没有时退化为返回全部实例
    PreferHealthyFallbackToAny,
}

impl FromStr for HealthPolicy {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "healthy" => Ok(HealthPolicy::OnlyHealthy),
            "fallbacktounhealthy" => Ok(HealthPolicy::PreferHealthyFallbackToAny),
            _ => Err(ResolverError::UnsupportedHealthPolicy(s.to_string())),
        }
    }
}

/// 结构化的解析目标：scheme + authority + path + query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    /// host[:port]，`consul:///svc` 这种形式下为 `None`
    pub authority: Option<String>,
    /// 已解码
    pub path: String,
    /// 按出现顺序保存的 query 参数（已解码）
    pub query: Vec<(String, String)>,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| ResolverError::invalid_target(raw, e.to_string()))?;

        let authority = url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(|host| match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            });

        // 路径只解码一次，`billing%2Egrpc` 和 `billing.grpc` 是同一个服务
        let path = urlencoding::decode(url.path())
            .map_err(|e| {
                ResolverError::invalid_target(raw, format!("path is not UTF-8: {}", e))
            })?
            .into_owned();

        Ok(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            authority,
            path,
            query: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        })
    }
}

impl FromStr for Target {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        Target::parse(s)
    }
}

/// 一次解析请求的全部参数，构建解析器时生成一次，之后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub service_name: String,
    pub tags: Vec<String>,
    pub health_policy: HealthPolicy,
    pub token: Option<String>,
    /// 目标中显式指定的查询协议，未指定时使用配置默认值
    pub scheme: Option<QueryScheme>,
}

impl ResolutionRequest {
    pub fn from_target(target: &Target) -> Result<Self> {
        let service_name = target.path.strip_prefix('/').unwrap_or(&target.path);
        if service_name.is_empty() {
            return Err(ResolverError::MissingServiceName);
        }

        let mut request = Self {
            service_name: service_name.to_string(),
            tags: Vec::new(),
            health_policy: HealthPolicy::default(),
            token: None,
            scheme: None,
        };

        // 顺序处理，后出现的同名参数覆盖前面的
        for (key, value) in &target.query {
            match key.to_ascii_lowercase().as_str() {
                "scheme" => request.scheme = Some(value.parse()?),
                "tags" => {
                    request.tags = value
                        .split(',')
                        .filter(|tag| !tag.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "health" => request.health_policy = value.parse()?,
                "token" => request.token = Some(value.clone()),
                _ => return Err(ResolverError::UnsupportedParameter(key.clone())),
            }
        }

        Ok(request)
    }

    /// 直接从目标字符串解析
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_target(&Target::parse(raw)?)
    }

    pub fn only_healthy(&self) -> bool {
        self.health_policy == HealthPolicy::OnlyHealthy
    }

    pub fn watch_key(&self) -> WatchKey {
        let mut tags = self.tags.clone();
        tags.sort();
        tags.dedup();
        WatchKey {
            service_name: self.service_name.clone(),
            tags,
            health_policy: self.health_policy,
        }
    }
}

/// 共享 watch 的键：服务名 + 排序去重后的标签 + 健康策略
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub service_name: String,
    pub tags: Vec<String>,
    pub health_policy: HealthPolicy,
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]/{:?}",
            self.service_name,
            self.tags.join(","),
            self.health_policy
        )
    }
}
