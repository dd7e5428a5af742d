//! 注册中心访问抽象
//!
//! 定义同步核心依赖的查询面：KV 前缀列举、服务目录、
//! 健康实例查询与健康状态长轮询，由 Consul 后端实现

pub mod consul;

pub use consul::ConsulRegistry;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 变更检测令牌
///
/// 来自注册中心查询结果的不透明单调标记，只用于判断"有没有变化"，
/// 不承载业务顺序语义。令牌相同的两次查询结果内容一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionToken(pub u64);

/// 健康服务实例端点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub address: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// 转换为 HTTP URL
    pub fn to_http_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// 注册中心查询面
///
/// 由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait RegistryPort: Send + Sync {
    /// 列举前缀下的全部 KV，返回扁平映射与版本令牌
    async fn list_under_prefix(
        &self,
        prefix: &str,
    ) -> Result<(HashMap<String, String>, VersionToken)>;

    /// 列举全部服务（服务名 -> 标签列表）
    async fn list_services(&self) -> Result<HashMap<String, Vec<String>>>;

    /// 列举指定服务当前通过健康检查的实例
    async fn list_healthy_instances(&self, service: &str) -> Result<Vec<ServiceEndpoint>>;

    /// 阻塞等待健康状态变化（长轮询）
    ///
    /// 状态有变化时立即返回新令牌，否则在 `max_wait` 之后返回。
    async fn wait_for_health_change(
        &self,
        last: VersionToken,
        max_wait: Duration,
    ) -> Result<VersionToken>;
}
