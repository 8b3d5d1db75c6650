//! 解析器工厂
//!
//! 从目标字符串和环境连接参数构建目录服务客户端与解析器，启动 watch 后返回；
//! `ResolverRegistry` 按 scheme 保存构建器，供 RPC 框架按目标 scheme 查找。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::discovery::backend::DirectoryClient;
use crate::discovery::backend::consul::{ConsulClient, ConsulClientConfig};
use crate::discovery::resolver::{AddressSink, ConsulResolver, Resolver, WatchOptions};
use crate::discovery::target::{ResolutionRequest, Target};
use crate::error::{ResolverError, Result};

/// 解析器在插件注册表中使用的 scheme
pub const CONSUL_SCHEME: &str = "consul";

/// 解析器构建器 trait
pub trait ResolverBuilder: Send + Sync {
    /// 该构建器负责的目标 scheme
    fn scheme(&self) -> &str;

    /// 构建并启动解析器；失败时同步返回错误且不会启动 watch
    fn build(&self, target: &Target, sink: Arc<dyn AddressSink>) -> Result<Box<dyn Resolver>>;
}

/// Consul 解析器构建器
#[derive(Debug, Clone, Default)]
pub struct ConsulResolverBuilder {
    config: ResolverConfig,
}

impl ConsulResolverBuilder {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// 目标中的 authority / scheme / token 覆盖配置中的默认值
    pub fn client_config(
        &self,
        target: &Target,
        request: &ResolutionRequest,
    ) -> ConsulClientConfig {
        let mut client_config = ConsulClientConfig::from(&self.config);
        if let Some(authority) = &target.authority {
            client_config.address = authority.clone();
        }
        if let Some(scheme) = request.scheme {
            client_config.scheme = scheme;
        }
        if let Some(token) = &request.token {
            client_config.token = Some(token.clone());
        }
        client_config
    }

    /// 构建并启动一个具体类型的解析器
    pub fn build_resolver(
        &self,
        target: &Target,
        sink: Arc<dyn AddressSink>,
    ) -> Result<ConsulResolver> {
        let request = ResolutionRequest::from_target(target)?;
        let client_config = self.client_config(target, &request);
        let client = ConsulClient::new(client_config)?;

        info!(
            service = %request.service_name,
            directory = %client.base_url(),
            tags = ?request.tags,
            policy = ?request.health_policy,
            "Building Consul resolver"
        );

        let resolver = ConsulResolver::new(
            request,
            Arc::new(client) as Arc<dyn DirectoryClient>,
            sink,
            WatchOptions::from(&self.config),
        );
        resolver.start();
        Ok(resolver)
    }
}

impl ResolverBuilder for ConsulResolverBuilder {
    fn scheme(&self) -> &str {
        CONSUL_SCHEME
    }

    fn build(&self, target: &Target, sink: Arc<dyn AddressSink>) -> Result<Box<dyn Resolver>> {
        let resolver = self.build_resolver(target, sink)?;
        Ok(Box::new(resolver))
    }
}

/// 按 scheme 索引的解析器插件注册表
#[derive(Default)]
pub struct ResolverRegistry {
    builders: RwLock<HashMap<String, Arc<dyn ResolverBuilder>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预先注册 Consul 构建器
    pub fn with_consul(config: ResolverConfig) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(ConsulResolverBuilder::new(config)));
        registry
    }

    /// 注册构建器，同一 scheme 后注册的覆盖先注册的
    pub fn register(&self, builder: Arc<dyn ResolverBuilder>) {
        let scheme = builder.scheme().to_ascii_lowercase();
        debug!(scheme = %scheme, "Resolver builder registered");
        self.builders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(scheme, builder);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn ResolverBuilder>> {
        self.builders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&scheme.to_ascii_lowercase())
            .cloned()
    }

    /// 解析目标字符串并交给对应 scheme 的构建器
    pub fn build(&self, target: &str, sink: Arc<dyn AddressSink>) -> Result<Box<dyn Resolver>> {
        let target = Target::parse(target)?;
        let builder = self
            .get(&target.scheme)
            .ok_or_else(|| ResolverError::UnknownResolverScheme(target.scheme.clone()))?;
        builder.build(&target, sink)
    }
}
