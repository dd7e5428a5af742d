//! 配置同步模块
//!
//! 把注册中心 KV 前缀下的扁平键值绑定到调用方定义的配置结构上，
//! 并在后台巡检版本令牌、在配置漂移时发出重载信号

pub mod bind;
pub mod settings;
pub mod sync;

pub use bind::{
    BindConfig, BindValue, KeyPath, KeyValueSet, bind_field, bind_nested, bind_nested_opt,
};
pub use settings::ConsulSettings;
pub use sync::{ConfigSynchronizer, ReloadSignal};
