//! 配置绑定
//!
//! 把注册中心列举出的扁平 KV 集合绑定到调用方定义的（可嵌套）配置结构上。
//! 每个字段对应一个路径段，嵌套结构的路径段以 `/` 连接成完整 key。
//!
//! 标量类型通过 [`BindValue`] 注册一次解码方式；每个配置记录实现一次
//! [`BindConfig`]，在其中逐字段声明路径段。未声明的字段不参与绑定，
//! 即主动退出注册中心配置。

use crate::error::{Result, SyncError};
use std::collections::HashMap;

/// `/` 连接的 key 路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(String);

impl KeyPath {
    /// 以 KV 前缀作为根
    pub fn root(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// 追加一个路径段
    pub fn child(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}/{}", self.0, segment))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 扁平 KV 快照
///
/// 每次刷新从注册中心整体重建，从不局部合并
pub type KeyValueSet = HashMap<String, String>;

/// 标量值绑定能力
///
/// key 缺失时取类型零值，不是错误；解析失败对整次 bind 致命。
pub trait BindValue: Sized {
    fn bind_kv(raw: Option<&str>, key: &str) -> Result<Self>;
}

impl BindValue for String {
    fn bind_kv(raw: Option<&str>, _key: &str) -> Result<Self> {
        Ok(raw.unwrap_or_default().to_string())
    }
}

macro_rules! impl_bind_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BindValue for $ty {
                fn bind_kv(raw: Option<&str>, key: &str) -> Result<Self> {
                    match raw {
                        None => Ok(0),
                        Some(text) => text.trim().parse::<$ty>().map_err(|_| SyncError::Parse {
                            key: key.to_string(),
                            value: text.to_string(),
                            kind: stringify!($ty),
                        }),
                    }
                }
            }
        )*
    };
}

impl_bind_int!(i32, i64, u16, u32, u64, usize);

/// 配置记录绑定能力
///
/// 嵌套记录在实现中以 [`bind_nested`] 递归，路径段逐层延伸。
/// 出错时已写入的字段保持原样（不回滚）。
pub trait BindConfig: Send + Sync {
    fn bind(&mut self, path: &KeyPath, kvs: &KeyValueSet) -> Result<()>;
}

/// 绑定一个标量字段
pub fn bind_field<T: BindValue>(
    target: &mut T,
    path: &KeyPath,
    segment: &str,
    kvs: &KeyValueSet,
) -> Result<()> {
    let key = path.child(segment);
    *target = T::bind_kv(kvs.get(key.as_str()).map(String::as_str), key.as_str())?;
    Ok(())
}

/// 绑定一个嵌套记录，路径段向下延伸
pub fn bind_nested<C: BindConfig>(
    target: &mut C,
    path: &KeyPath,
    segment: &str,
    kvs: &KeyValueSet,
) -> Result<()> {
    target.bind(&path.child(segment), kvs)
}

/// 绑定可选的嵌套记录，缺省时先分配默认值
pub fn bind_nested_opt<C: BindConfig + Default>(
    target: &mut Option<C>,
    path: &KeyPath,
    segment: &str,
    kvs: &KeyValueSet,
) -> Result<()> {
    let inner = target.get_or_insert_with(C::default);
    inner.bind(&path.child(segment), kvs)
}
