//! Consul 目录服务客户端

use async_trait::async_trait;
use reqwest::{Client as HttpClient, IntoUrl, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::discovery::backend::{DirectoryClient, HealthQuery, QueryOutcome, WatchCursor};
use crate::discovery::instance::{HealthStatus, ServiceEntry};
use crate::discovery::target::QueryScheme;
use crate::error::{ResolverError, Result};

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";
const NODE_MAINTENANCE_CHECK: &str = "_node_maintenance";
const SERVICE_MAINTENANCE_PREFIX: &str = "_service_maintenance:";
const MIN_WAIT_TIME: Duration = Duration::from_secs(1);

/// Consul 客户端连接参数
#[derive(Debug, Clone)]
pub struct ConsulClientConfig {
    /// host:port
    pub address: String,
    pub scheme: QueryScheme,
    pub token: Option<String>,
    pub wait_time: Duration,
    pub connect_timeout: Duration,
}

impl From<&ResolverConfig> for ConsulClientConfig {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            address: config.address.clone(),
            scheme: config.scheme,
            token: config.token.clone(),
            wait_time: config.wait_time(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Consul HTTP API 客户端
#[derive(Clone)]
pub struct ConsulClient {
    http_client: HttpClient,
    base_url: String,
    token: Option<String>,
    wait_time: Duration,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulHealthEntry {
    #[serde(default)]
    Node: Option<ConsulNode>,
    Service: ConsulService,
    #[serde(default)]
    Checks: Vec<ConsulCheck>,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulNode {
    #[serde(default)]
    Address: String,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulService {
    #[serde(default)]
    Address: String,
    #[serde(default)]
    Port: u16,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulCheck {
    #[serde(default)]
    CheckID: String,
    #[serde(default)]
    Status: String,
}

impl ConsulCheck {
    fn health(&self) -> HealthStatus {
        if self.CheckID == NODE_MAINTENANCE_CHECK
            || self.CheckID.starts_with(SERVICE_MAINTENANCE_PREFIX)
        {
            return HealthStatus::Maintenance;
        }
        HealthStatus::from_consul(&self.Status)
    }
}

impl From<ConsulHealthEntry> for ServiceEntry {
    fn from(entry: ConsulHealthEntry) -> Self {
        let health = HealthStatus::aggregate(entry.Checks.iter().map(ConsulCheck::health));
        ServiceEntry {
            node_address: entry.Node.map(|n| n.Address).unwrap_or_default(),
            service_address: entry.Service.Address,
            service_port: entry.Service.Port,
            health,
        }
    }
}

impl ConsulClient {
    /// 创建新的 Consul 客户端
    pub fn new(config: ConsulClientConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ResolverError::ClientBuild(e.to_string()))?;

        let address = config.address.trim_end_matches('/');
        if address.is_empty() {
            return Err(ResolverError::ClientBuild("consul address is empty".to_string()));
        }

        let base_url = format!("{}://{}", config.scheme, address);
        Url::parse(&base_url).map_err(|e| {
            ResolverError::ClientBuild(format!("invalid consul address '{}': {}", address, e))
        })?;

        Ok(Self {
            http_client,
            base_url,
            token: config.token.filter(|t| !t.is_empty()),
            // wait=0s 会被 Consul 当作默认的 5 分钟，超出请求超时
            wait_time: config.wait_time.max(MIN_WAIT_TIME),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 阻塞查询的 HTTP 超时：Consul 会在 wait 上叠加最多 wait/16 的抖动
    fn request_timeout(&self) -> Duration {
        self.wait_time + self.wait_time / 16 + Duration::from_secs(5)
    }

    /// 服务名作为单独的路径段编码，`/`、`?` 等字符不会改变请求路径
    fn health_url(&self, service_name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ResolverError::ClientBuild(format!("invalid consul address: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ResolverError::ClientBuild("consul address has no path".to_string()))?
            .pop_if_empty()
            .extend(["v1", "health", "service", service_name]);
        Ok(url)
    }

    pub(crate) fn get(&self, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.with_token(self.http_client.get(url))
    }

    pub(crate) fn put(&self, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.with_token(self.http_client.put(url))
    }

    fn with_token(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn health_service(
        &self,
        query: &HealthQuery,
        cursor: WatchCursor,
    ) -> Result<QueryOutcome> {
        let url = self.health_url(&query.service_name)?;

        let mut params: Vec<(&str, String)> = Vec::new();
        if query.only_healthy {
            params.push(("passing", "true".to_string()));
        }
        for tag in &query.tags {
            params.push(("tag", tag.clone()));
        }
        if !cursor.is_zero() {
            params.push(("index", cursor.to_string()));
            params.push(("wait", format!("{}s", self.wait_time.as_secs())));
        }

        let resp = self
            .get(url)
            .query(&params)
            .timeout(self.request_timeout())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ResolverError::query_failed(Some(status.as_u16()), body.trim()));
        }

        // 没有索引头的响应无法用于长轮询，游标回到 0
        let index = resp
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let body = resp.bytes().await?;
        let entries: Vec<ConsulHealthEntry> = serde_json::from_slice(&body).map_err(|e| {
            ResolverError::query_failed(None, format!("invalid health response: {}", e))
        })?;

        debug!(
            service = %query.service_name,
            cursor = %cursor,
            index,
            entries = entries.len(),
            "Consul health query returned"
        );

        Ok(QueryOutcome {
            entries: entries.into_iter().map(ServiceEntry::from).collect(),
            cursor: WatchCursor(index),
        })
    }
}

#[async_trait]
impl DirectoryClient for ConsulClient {
    async fn query(
        &self,
        query: &HealthQuery,
        cursor: WatchCursor,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResolverError::Cancelled),
            result = self.health_service(query, cursor) => result,
        }
    }
}
