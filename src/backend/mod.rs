//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 存储后端接口
//!
//! 缓存只依赖这里定义的两个trait：一次性的全表扫描，以及在事务内执行的
//! 插入、更新、删除和存在性检查。具体的查询与事务执行由后端自己负责。

pub mod sql;

use crate::error::Result;
use crate::record::Record;
use async_trait::async_trait;

pub use sql::{SeaOrmBackend, SeaOrmTransaction, SqlRecord};

/// 存储后端trait
#[async_trait]
pub trait StorageBackend<R: Record>: Send + Sync + 'static {
    /// 读取整张表，仅在缓存初始加载时调用
    async fn scan_all(&self) -> Result<Vec<R>>;

    /// 开启一个事务
    async fn begin(&self) -> Result<Box<dyn BackendTransaction<R>>>;

    /// 关闭后端连接
    async fn close(&self) -> Result<()>;
}

/// 后端事务trait
///
/// 刷新周期中的所有变更都在同一个事务中执行，任何一步失败都会导致整体回滚。
#[async_trait]
pub trait BackendTransaction<R: Record>: Send {
    /// 插入记录
    async fn insert(&mut self, record: &R) -> Result<()>;

    /// 更新记录
    async fn update(&mut self, record: &R) -> Result<()>;

    /// 按主键删除记录
    async fn delete(&mut self, id: i64) -> Result<()>;

    /// 检查主键是否已存在于后端
    async fn exists(&mut self, id: i64) -> Result<bool>;

    /// 提交事务
    async fn commit(self: Box<Self>) -> Result<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> Result<()>;
}
