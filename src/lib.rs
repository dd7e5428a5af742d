//! Consul Sync Core Library
//!
//! 注册中心（Consul）与应用进程之间的客户端同步层：
//! 维护配置中心的本地快照、健康感知的服务表，
//! 并把按服务名的请求分发到当前健康的端点上。

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod retry;
pub mod service;

// Re-exports
pub use config::{
    BindConfig, BindValue, ConfigSynchronizer, ConsulSettings, KeyPath, KeyValueSet, ReloadSignal,
    bind_field, bind_nested, bind_nested_opt,
};
pub use dispatch::{Dispatcher, ForwardResponse, Forwarder, HttpForwarder, Routed};
pub use error::{ErrorCode, ErrorEnvelope, Result, SyncError};
pub use registry::{ConsulRegistry, RegistryPort, ServiceEndpoint, VersionToken};
pub use retry::{FixedRetryPolicy, RetryPolicy, run_with_retry};
pub use service::{ServiceSynchronizer, ServiceTable, SharedServiceTable};
