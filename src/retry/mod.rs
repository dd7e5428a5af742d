//! 重试策略模块

pub mod fixed;

pub use fixed::FixedRetryPolicy;

use crate::error::{Result, SyncError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 重试策略 trait
pub trait RetryPolicy {
    fn should_retry(&self, attempt: usize) -> bool;
    fn backoff_duration(&self, attempt: usize) -> Duration;
    fn max_attempts(&self) -> usize;
}

/// 按策略驱动一个异步操作
///
/// 只对可重试错误（瞬时查询失败）继续尝试；致命错误立即向上传播。
/// 预算耗尽后归一为初始化失败，由调用方决定是否中止启动。
pub async fn run_with_retry<P, T, F, Fut>(policy: &P, mut op: F) -> Result<T>
where
    P: RetryPolicy,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                attempt += 1;
                if !policy.should_retry(attempt) {
                    return Err(SyncError::Initialization(format!(
                        "{} 次尝试后仍然失败: {}",
                        policy.max_attempts(),
                        err
                    )));
                }
                warn!(attempt, error = %err, "attempt failed, retrying");
                tokio::time::sleep(policy.backoff_duration(attempt)).await;
            }
        }
    }
}
