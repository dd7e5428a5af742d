//! 服务表同步模块
//!
//! 维护服务名到健康端点 URL 列表的映射，整表重建、原子替换发布

pub mod sync;
pub mod table;

pub use sync::ServiceSynchronizer;
pub use table::{ServiceTable, SharedServiceTable};
