//! 客户端接入设置
//!
//! 进程启动时的 Consul 接入参数与本地服务身份，可从 TOML 文件加载。
//! 默认值与历史部署保持一致。

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

/// Consul 接入与本地服务身份设置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsulSettings {
    /// Consul 地址
    #[serde(default = "default_consul_addr")]
    pub consul_addr: String,
    /// 配置 KV 前缀
    #[serde(default = "default_kv_prefix")]
    pub kv_prefix: String,
    /// 本地服务地址
    #[serde(default = "default_local_addr")]
    pub local_addr: String,
    /// 本地服务端口
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// 服务名称
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// 服务实例 ID
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

fn default_consul_addr() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_kv_prefix() -> String {
    "foo".to_string()
}

fn default_local_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    9050
}

fn default_server_name() -> String {
    "hello".to_string()
}

fn default_server_id() -> String {
    "hello1".to_string()
}

impl Default for ConsulSettings {
    fn default() -> Self {
        Self {
            consul_addr: default_consul_addr(),
            kv_prefix: default_kv_prefix(),
            local_addr: default_local_addr(),
            server_port: default_server_port(),
            server_name: default_server_name(),
            server_id: default_server_id(),
        }
    }
}

impl ConsulSettings {
    /// 从 TOML 文件加载
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Initialization(format!("读取配置文件 {path} 失败: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| SyncError::Initialization(format!("解析配置文件 {path} 失败: {e}")))
    }
}
