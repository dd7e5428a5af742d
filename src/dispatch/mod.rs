//! 请求分发模块
//!
//! 按服务名在当前服务表快照中均匀随机挑选一个端点并转发请求。
//! 服务缺失与转发失败都转换为结构化错误信封返回：不向其他端点
//! 重试，也不把故障端点移出表（由下一次注册中心驱动的重建淘汰）。

use crate::error::{ErrorEnvelope, Result, SyncError};
use crate::service::table::SharedServiceTable;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, warn};

/// 转发后的上游响应
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    /// 上游返回的 HTTP 状态码
    pub status: u16,
    /// 上游响应体
    pub body: Vec<u8>,
}

/// 外部转发原语
///
/// 把一个请求体投递到选定上游的指定路径；传输细节
/// （连接复用、超时）由实现承担。
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, base_url: &str, path: &str, body: &[u8]) -> Result<ForwardResponse>;
}

/// 基于 reqwest 的 HTTP 转发实现
pub struct HttpForwarder {
    http_client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, base_url: &str, path: &str, body: &[u8]) -> Result<ForwardResponse> {
        // 入站请求的路径改写为目标路径后投递给选中的上游
        let url = format!("{base_url}{path}");
        let resp = self.http_client.post(&url).body(body.to_vec()).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(ForwardResponse { status, body })
    }
}

/// 路由结果
///
/// 调用方总能拿到一个良构响应：要么是上游响应，要么是错误信封。
#[derive(Debug)]
pub enum Routed {
    Ok(ForwardResponse),
    Error(ErrorEnvelope),
}

/// 请求分发器
///
/// 只持有服务表的读句柄，单次原子加载取快照，
/// 从不与进行中的重建互相阻塞。
pub struct Dispatcher {
    table: Arc<SharedServiceTable>,
    forwarder: Arc<dyn Forwarder>,
}

impl Dispatcher {
    pub fn new(table: Arc<SharedServiceTable>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self { table, forwarder }
    }

    /// 路由一次请求
    pub async fn route(&self, service: &str, path: &str, body: &[u8]) -> Routed {
        let table = self.table.load();
        let Some(endpoints) = table.get(service) else {
            warn!(service, "route failed: service not in table");
            let err = SyncError::ServiceNotFound {
                service: service.to_string(),
            };
            return Routed::Error(ErrorEnvelope::from(&err));
        };

        // 表中的服务必有至少一个端点
        let address = pick_random(endpoints);
        match self.forwarder.forward(address, path, body).await {
            Ok(resp) => Routed::Ok(resp),
            Err(cause) => {
                error!(service, address = %address, error = %cause, "forwarding failed");
                let err = SyncError::Forward {
                    service: service.to_string(),
                    address: address.clone(),
                    cause: cause.to_string(),
                };
                Routed::Error(ErrorEnvelope::from(&err))
            }
        }
    }
}

/// 均匀随机选取一个端点：不加权、不做会话粘连
fn pick_random(endpoints: &[String]) -> &String {
    let index = rand::thread_rng().gen_range(0..endpoints.len());
    &endpoints[index]
}
