//! Consul 注册中心实现
//!
//! 基于 Consul HTTP API（KV、Catalog、Health）实现 `RegistryPort`。
//! 版本令牌取自响应头 `X-Consul-Index`；健康状态长轮询使用
//! `/v1/health/state/passing` 的 index + wait 阻塞查询。

use super::{RegistryPort, ServiceEndpoint, VersionToken};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// 长轮询在 `max_wait` 之外允许的网络松弛时间
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

/// Consul 注册中心客户端
pub struct ConsulRegistry {
    http_client: HttpClient,
    base_url: String,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulKvPair {
    Key: String,
    Value: Option<String>,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulHealthEntry {
    Service: ConsulServiceBlock,
}

#[allow(non_snake_case)]
#[derive(Deserialize)]
struct ConsulServiceBlock {
    Address: String,
    Port: u16,
}

impl ConsulRegistry {
    /// 创建新的 Consul 客户端
    ///
    /// `base_url` 形如 `http://127.0.0.1:8500`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, HttpClient::new())
    }

    /// 使用自定义 HTTP 客户端构造（便于设置代理、超时等）
    pub fn with_client(base_url: impl Into<String>, http_client: HttpClient) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// 从响应头提取版本令牌
    ///
    /// 头缺失时退化为 0（Consul 正常响应总是带 X-Consul-Index）
    fn consul_index(resp: &reqwest::Response) -> VersionToken {
        resp.headers()
            .get("X-Consul-Index")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(VersionToken)
            .unwrap_or_default()
    }
}

#[async_trait]
impl RegistryPort for ConsulRegistry {
    async fn list_under_prefix(
        &self,
        prefix: &str,
    ) -> Result<(HashMap<String, String>, VersionToken)> {
        let url = format!("{}/v1/kv/{}", self.base_url, prefix);
        let resp = self
            .http_client
            .get(&url)
            .query(&[("recurse", "true")])
            .send()
            .await?;
        let token = Self::consul_index(&resp);

        // 前缀下无任何 key 时 Consul 返回 404
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok((HashMap::new(), token));
        }

        let pairs: Vec<ConsulKvPair> = resp.json().await?;
        let mut kvs = HashMap::new();
        for pair in pairs {
            // 目录项（key 以 / 结尾）没有 Value
            let Some(raw) = pair.Value else { continue };
            let bytes = BASE64
                .decode(raw.as_bytes())
                .map_err(|e| SyncError::Query(format!("key {} 的值不是合法 base64: {}", pair.Key, e)))?;
            let value = String::from_utf8(bytes)
                .map_err(|e| SyncError::Query(format!("key {} 的值不是合法 UTF-8: {}", pair.Key, e)))?;
            kvs.insert(pair.Key, value);
        }
        Ok((kvs, token))
    }

    async fn list_services(&self) -> Result<HashMap<String, Vec<String>>> {
        let url = format!("{}/v1/catalog/services", self.base_url);
        let services = self.http_client.get(&url).send().await?.json().await?;
        Ok(services)
    }

    async fn list_healthy_instances(&self, service: &str) -> Result<Vec<ServiceEndpoint>> {
        let url = format!("{}/v1/health/service/{}", self.base_url, service);
        let entries: Vec<ConsulHealthEntry> = self
            .http_client
            .get(&url)
            .query(&[("passing", "true")])
            .send()
            .await?
            .json()
            .await?;

        Ok(entries
            .into_iter()
            .map(|e| ServiceEndpoint::new(e.Service.Address, e.Service.Port))
            .collect())
    }

    async fn wait_for_health_change(
        &self,
        last: VersionToken,
        max_wait: Duration,
    ) -> Result<VersionToken> {
        let url = format!("{}/v1/health/state/passing", self.base_url);
        let resp = self
            .http_client
            .get(&url)
            .query(&[
                ("index", last.0.to_string()),
                ("wait", format!("{}s", max_wait.as_secs())),
            ])
            .timeout(max_wait + LONG_POLL_SLACK)
            .send()
            .await
            .map_err(|e| SyncError::HealthWatch(e.to_string()))?;
        Ok(Self::consul_index(&resp))
    }
}
