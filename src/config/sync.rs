//! 配置同步器
//!
//! 负责配置快照的初始加载（有限重试）与后台版本令牌巡检。
//! 检测到漂移时只发出重载信号、不做原地重绑定：活跃配置结构
//! 正被并发读取，逐字段原地改写缺乏同步保护，重载交给外部
//! 监督进程重启/重载完成。

use crate::config::bind::{BindConfig, KeyPath};
use crate::error::Result;
use crate::registry::{RegistryPort, VersionToken};
use crate::retry::{FixedRetryPolicy, run_with_retry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// 版本令牌巡检间隔
const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// 重载信号接收端
///
/// 暴露给监督进程的通知通道，值为累计重载代数，
/// 与操作系统信号（SIGHUP 之类）解耦。
#[derive(Clone)]
pub struct ReloadSignal {
    rx: watch::Receiver<u64>,
}

impl ReloadSignal {
    /// 等待下一次配置漂移通知，返回新的重载代数
    ///
    /// 同步器停止（进程关闭）后返回 `None`。
    pub async fn changed(&mut self) -> Option<u64> {
        match self.rx.changed().await {
            Ok(()) => Some(*self.rx.borrow_and_update()),
            Err(_) => None,
        }
    }

    /// 当前重载代数
    pub fn generation(&self) -> u64 {
        *self.rx.borrow()
    }
}

/// 配置同步器
///
/// 独占配置快照的写路径；读者只通过 `start` 返回的 `Arc` 持有只读视图。
pub struct ConfigSynchronizer {
    registry: Arc<dyn RegistryPort>,
    prefix: String,
    reload_tx: watch::Sender<u64>,
}

impl ConfigSynchronizer {
    pub fn new(registry: Arc<dyn RegistryPort>, prefix: impl Into<String>) -> Self {
        let (reload_tx, _) = watch::channel(0);
        Self {
            registry,
            prefix: prefix.into(),
            reload_tx,
        }
    }

    /// 订阅配置漂移通知（须在 `start` 之前调用）
    pub fn reload_signal(&self) -> ReloadSignal {
        ReloadSignal {
            rx: self.reload_tx.subscribe(),
        }
    }

    /// 初始加载并启动后台巡检
    ///
    /// 拉取 KV 快照最多尝试 3 次（固定 1 秒间隔），预算耗尽返回
    /// 初始化错误，调用方应中止启动；绑定阶段的解析错误立即致命，
    /// 不参与重试。成功后模板以 `Arc` 发布为只读快照，后台任务
    /// 在进程生命周期内持续巡检。
    pub async fn start<C>(self, mut template: C) -> Result<Arc<C>>
    where
        C: BindConfig + 'static,
    {
        let policy = FixedRetryPolicy::initial_load();
        let registry = self.registry.clone();
        let prefix = self.prefix.clone();

        let (kvs, token) = run_with_retry(&policy, move || {
            let registry = registry.clone();
            let prefix = prefix.clone();
            async move { registry.list_under_prefix(&prefix).await }
        })
        .await?;

        template.bind(&KeyPath::root(self.prefix.clone()), &kvs)?;
        info!(prefix = %self.prefix, token = token.0, keys = kvs.len(), "configuration loaded");

        let snapshot = Arc::new(template);
        self.spawn_check_loop(token);
        Ok(snapshot)
    }

    /// 后台版本巡检循环
    ///
    /// 每个周期发出一次廉价的前缀列举，只比较令牌。令牌相同不做任何事；
    /// 不同则推进令牌并发送重载信号。查询失败只记日志，下个周期继续。
    fn spawn_check_loop(self, initial: VersionToken) {
        tokio::spawn(async move {
            let mut last = initial;
            let mut ticker = tokio::time::interval(CHECK_INTERVAL);
            // interval 的第一次 tick 立即完成，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.registry.list_under_prefix(&self.prefix).await {
                    Ok((_, token)) if token == last => {}
                    Ok((_, token)) => {
                        info!(
                            old = last.0,
                            new = token.0,
                            "configuration drift detected, signaling reload"
                        );
                        last = token;
                        self.reload_tx.send_modify(|generation| *generation += 1);
                    }
                    Err(e) => warn!(error = %e, "configuration check failed"),
                }
            }
        });
    }
}
