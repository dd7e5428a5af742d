//! 对外错误信封
//!
//! 路由失败时返回给调用方的结构化响应体（`{error_code, message}`），
//! 调用方永远拿到一个良构响应而不是传输层错误

use super::{ErrorCode, SyncError};
use serde::{Deserialize, Serialize};

/// 应用级错误信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: u32,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: code.code(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl From<&SyncError> for ErrorEnvelope {
    fn from(err: &SyncError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}
