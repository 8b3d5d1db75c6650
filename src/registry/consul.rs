//! Consul 服务注册实现

use super::{ServiceRegistrar, ServiceRegistration};
use crate::discovery::backend::consul::ConsulClient;
use crate::error::{ResolverError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Consul 服务注册
pub struct ConsulRegistry {
    client: ConsulClient,
}

#[allow(non_snake_case)]
#[derive(Serialize)]
struct ConsulService {
    ID: String,
    Name: String,
    Tags: Vec<String>,
    Address: String,
    Port: u16,
    Meta: HashMap<String, String>,
    EnableTagOverride: bool,
    Check: ConsulCheck,
}

#[allow(non_snake_case)]
#[derive(Serialize)]
struct ConsulCheck {
    TCP: String,
    Interval: String,
    DeregisterCriticalServiceAfter: String,
}

impl From<&ServiceRegistration> for ConsulService {
    fn from(reg: &ServiceRegistration) -> Self {
        ConsulService {
            ID: reg.instance_id(),
            Name: reg.name.clone(),
            Tags: reg.tags.clone(),
            Address: reg.host.clone(),
            Port: reg.port,
            Meta: reg.meta.clone(),
            EnableTagOverride: true,
            Check: ConsulCheck {
                TCP: reg.check_target(),
                Interval: format!("{}s", reg.check_interval.as_secs()),
                DeregisterCriticalServiceAfter: format!(
                    "{}s",
                    reg.deregister_critical_after.as_secs()
                ),
            },
        }
    }
}

impl ConsulRegistry {
    pub fn new(client: ConsulClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceRegistrar for ConsulRegistry {
    async fn register(&self, registration: &ServiceRegistration) -> Result<String> {
        let consul_service = ConsulService::from(registration);
        let instance_id = consul_service.ID.clone();

        let url = format!("{}/v1/agent/service/register", self.client.base_url());
        let resp = self
            .client
            .put(&url)
            .json(&consul_service)
            .send()
            .await
            .map_err(|e| {
                ResolverError::Registration(format!(
                    "failed to register service with Consul: {}",
                    e
                ))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ResolverError::Registration(format!(
                "Consul rejected registration with status {}: {}",
                status,
                body.trim()
            )));
        }

        info!(
            service = %registration.name,
            instance_id = %instance_id,
            address = %registration.check_target(),
            "Service registered with Consul"
        );

        Ok(instance_id)
    }

    async fn deregister(&self, instance_id: &str) -> Result<()> {
        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.client.base_url(),
            instance_id
        );
        let resp = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(|e| {
                ResolverError::Registration(format!(
                    "failed to deregister service from Consul: {}",
                    e
                ))
            })?;

        if !resp.status().is_success() {
            return Err(ResolverError::Registration(format!(
                "Consul rejected deregistration of '{}' with status {}",
                instance_id,
                resp.status()
            )));
        }

        info!(instance_id = %instance_id, "Service deregistered from Consul");
        Ok(())
    }
}
