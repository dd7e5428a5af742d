//! 错误代码定义
//!
//! 错误代码按类别分组，每个类别占用 1000 个代码范围：
//! - 1000-1999: 注册中心与路由相关错误
//! - 2000-2999: 配置绑定相关错误

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 注册中心与路由相关错误 (1000-1999)
    // ============================================================
    QueryFailed = 1000,
    InitializationFailed = 1001,
    HealthWatchFailed = 1002,
    ServiceNotFound = 1004,
    ForwardingFailed = 1005,

    // ============================================================
    // 配置绑定相关错误 (2000-2999)
    // ============================================================
    ParseFailed = 2000,
}

impl ErrorCode {
    /// 数值形式的错误代码
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::QueryFailed => "QUERY_FAILED",
            ErrorCode::InitializationFailed => "INITIALIZATION_FAILED",
            ErrorCode::HealthWatchFailed => "HEALTH_WATCH_FAILED",
            ErrorCode::ServiceNotFound => "SERVICE_NOT_FOUND",
            ErrorCode::ForwardingFailed => "FORWARDING_FAILED",
            ErrorCode::ParseFailed => "PARSE_FAILED",
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 只有后台查询类错误可重试；初始化失败与解析失败是致命错误，
    /// 路由类错误直接以信封形式返回调用方。
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::QueryFailed | ErrorCode::HealthWatchFailed)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
