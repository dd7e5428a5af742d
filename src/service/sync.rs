//! 服务同步器
//!
//! 负责服务表的初始装载（有限重试）与基于健康状态长轮询的后台刷新。
//! 注册中心不提供按服务的增量差异，刷新始终整表重建后原子发布，
//! 同一张表的刷新严格串行。

use crate::error::Result;
use crate::registry::{RegistryPort, VersionToken};
use crate::retry::{FixedRetryPolicy, run_with_retry};
use crate::service::table::{ServiceTable, SharedServiceTable};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 健康状态长轮询等待上限
const HEALTH_WAIT_CEILING: Duration = Duration::from_secs(100);

/// 长轮询或重建出错后的退避时间，避免对不可达的注册中心空转
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// 服务同步器
///
/// 独占服务表的写路径；Dispatcher 与其他读者只持有
/// `SharedServiceTable` 的读句柄。
pub struct ServiceSynchronizer {
    registry: Arc<dyn RegistryPort>,
    table: Arc<SharedServiceTable>,
}

impl ServiceSynchronizer {
    pub fn new(registry: Arc<dyn RegistryPort>) -> Self {
        Self {
            registry,
            table: Arc::new(SharedServiceTable::new()),
        }
    }

    /// 初始装载并启动后台刷新，返回服务表读句柄
    ///
    /// 整个"列举服务 + 逐个探询健康实例"序列最多重试 3 次，
    /// 任一步出错都重启整个序列；预算耗尽返回初始化错误，
    /// 调用方应中止启动。
    pub async fn start(self) -> Result<Arc<SharedServiceTable>> {
        let policy = FixedRetryPolicy::initial_load();
        let registry = self.registry.clone();

        let table = run_with_retry(&policy, move || {
            let registry = registry.clone();
            async move { build_table(registry.as_ref()).await }
        })
        .await?;

        info!(services = table.len(), "service table loaded");
        self.table.store(table);

        let handle = self.table.clone();
        self.spawn_watch_loop();
        Ok(handle)
    }

    /// 后台刷新循环
    ///
    /// 长轮询本身就是调度原语：健康状态有变化时立即返回新令牌，
    /// 否则等满上限后返回原令牌，循环里不再叠加固定轮询间隔。
    /// 令牌只在重建并发布成功之后推进，重建失败时下一轮长轮询
    /// 会立即返回并再次触发重建。
    fn spawn_watch_loop(self) {
        tokio::spawn(async move {
            let mut last = VersionToken::default();
            loop {
                match self
                    .registry
                    .wait_for_health_change(last, HEALTH_WAIT_CEILING)
                    .await
                {
                    Ok(token) if token == last => {}
                    Ok(token) => match build_table(self.registry.as_ref()).await {
                        Ok(table) => {
                            info!(
                                old = last.0,
                                new = token.0,
                                services = table.len(),
                                "service table rebuilt"
                            );
                            self.table.store(table);
                            last = token;
                        }
                        Err(e) => {
                            warn!(error = %e, "service table rebuild failed");
                            tokio::time::sleep(ERROR_BACKOFF).await;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "health watch failed");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        });
    }
}

/// 整表重建：列举全部服务名，逐个取通过健康检查的实例
///
/// 零健康实例的服务不入表（缺席，而非空列表）。
async fn build_table(registry: &dyn RegistryPort) -> Result<ServiceTable> {
    let services = registry.list_services().await?;
    let mut table = ServiceTable::new();
    for name in services.keys() {
        let instances = registry.list_healthy_instances(name).await?;
        if instances.is_empty() {
            continue;
        }
        table.insert(
            name.clone(),
            instances.iter().map(|i| i.to_http_url()).collect(),
        );
    }
    Ok(table)
}
