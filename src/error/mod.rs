//! 错误处理模块
//!
//! 提供统一的错误类型、按范围分组的错误代码与对外的错误信封

pub mod code;
pub mod envelope;

pub use code::ErrorCode;
pub use envelope::ErrorEnvelope;

use thiserror::Error;

/// 同步核心统一错误类型
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// 初始加载重试预算耗尽（致命，调用方应中止启动）
    #[error("初始化失败: {0}")]
    Initialization(String),

    /// 配置值解析失败（对本次 bind 调用致命，向调用方传播，不重试）
    #[error("配置解析失败 [{key}]: 值 {value:?} 无法解析为 {kind}")]
    Parse {
        key: String,
        value: String,
        kind: &'static str,
    },

    /// 注册中心查询失败（后台循环中仅记录日志，下个周期继续）
    #[error("注册中心查询失败: {0}")]
    Query(String),

    /// 健康状态长轮询失败
    #[error("健康状态监听失败: {0}")]
    HealthWatch(String),

    /// 路由目标服务不在当前服务表中
    #[error("服务不存在: {service}")]
    ServiceNotFound { service: String },

    /// 请求转发失败（端点留在表中，等待下一次注册中心驱动的重建淘汰）
    #[error("服务访问错误: servername:{service},serveraddr:{address},err:{cause}")]
    Forward {
        service: String,
        address: String,
        cause: String,
    },
}

impl SyncError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::Initialization(_) => ErrorCode::InitializationFailed,
            SyncError::Parse { .. } => ErrorCode::ParseFailed,
            SyncError::Query(_) => ErrorCode::QueryFailed,
            SyncError::HealthWatch(_) => ErrorCode::HealthWatchFailed,
            SyncError::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            SyncError::Forward { .. } => ErrorCode::ForwardingFailed,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Query(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SyncError>;
