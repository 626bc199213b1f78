//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存记录的抽象以及待写日志中的变更类型。

use std::fmt::Debug;

/// 尚未分配主键的记录使用的键值
pub const UNASSIGNED_KEY: i64 = 0;

/// 缓存记录trait
///
/// 记录由非零的 `i64` 主键标识，`0` 表示尚未分配。
/// 记录本身不关心如何持久化，持久化能力由 [`crate::backend`] 中的后端提供。
pub trait Record: Clone + Debug + Send + Sync + 'static {
    /// 获取记录主键
    fn id(&self) -> i64;

    /// 设置记录主键
    fn set_id(&mut self, id: i64);
}

/// 待写日志中的单条变更
///
/// 删除是一个显式的标记，而不是记录的"零值"，因此空记录与删除不会混淆。
#[derive(Debug, Clone, PartialEq)]
pub enum Change<R> {
    /// 插入或更新为给定的值
    Upsert(R),
    /// 删除标记
    Delete,
}

impl<R> Change<R> {
    /// 是否为删除标记
    pub fn is_delete(&self) -> bool {
        matches!(self, Change::Delete)
    }

    /// 变更名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Upsert(_) => "upsert",
            Change::Delete => "delete",
        }
    }
}
