//! 服务表
//!
//! 写侧整表替换、读侧单次原子加载：读者永远看到一张完整一致的表，
//! 不会看到一半新一半旧的中间状态，也不需要任何读锁。

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// 服务名 -> 端点 URL 列表
///
/// 不变式：表中的服务至少有一个端点，零健康实例的服务不入表。
pub type ServiceTable = HashMap<String, Vec<String>>;

/// 原子可替换的服务表
#[derive(Debug)]
pub struct SharedServiceTable {
    inner: ArcSwap<ServiceTable>,
}

impl SharedServiceTable {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(ServiceTable::new()),
        }
    }

    /// 读取当前快照
    pub fn load(&self) -> Arc<ServiceTable> {
        self.inner.load_full()
    }

    /// 整表替换
    pub fn store(&self, table: ServiceTable) {
        self.inner.store(Arc::new(table));
    }

    /// 查询某服务当前的端点列表
    pub fn endpoints(&self, service: &str) -> Option<Vec<String>> {
        self.load().get(service).cloned()
    }
}

impl Default for SharedServiceTable {
    fn default() -> Self {
        Self::new()
    }
}
