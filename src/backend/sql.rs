//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于 Sea-ORM 的存储后端，支持 SQLite、MySQL 和 PostgreSQL。

use super::{BackendTransaction, StorageBackend};
use crate::config::DatabaseConfig;
use crate::database::connection_string::ensure_database_directory;
use crate::error::{CacheError, Result};
use crate::record::Record;
use crate::utils::redaction::redact_connection_string;
use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, QueryResult, Statement, TransactionTrait,
};
use secrecy::ExposeSecret;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// 可通过SQL持久化的记录
///
/// 每种记录类型自行提供全表查询、行解码以及四种持久化语句。
/// 语句中的占位符可以用 [`bind_marker`] 按数据库方言生成。
pub trait SqlRecord: Record {
    /// 全表查询语句
    fn select_all(backend: DatabaseBackend) -> Statement;

    /// 从查询结果行构造记录
    fn from_row(row: &QueryResult) -> Result<Self>;

    /// 插入语句（必须写入主键）
    fn insert_statement(&self, backend: DatabaseBackend) -> Statement;

    /// 按主键更新语句
    fn update_statement(&self, backend: DatabaseBackend) -> Statement;

    /// 按主键删除语句
    fn delete_statement(id: i64, backend: DatabaseBackend) -> Statement;

    /// 存在性查询语句，记录存在时返回至少一行
    fn exists_statement(id: i64, backend: DatabaseBackend) -> Statement;
}

/// 生成第 `index` 个（从1开始）参数占位符
pub fn bind_marker(backend: DatabaseBackend, index: usize) -> String {
    match backend {
        DatabaseBackend::Postgres => format!("${}", index),
        _ => "?".to_string(),
    }
}

/// Sea-ORM 存储后端
pub struct SeaOrmBackend<R> {
    connection: DatabaseConnection,
    _record: PhantomData<fn() -> R>,
}

impl<R: SqlRecord> SeaOrmBackend<R> {
    /// 按配置打开数据库连接
    ///
    /// SQLite 文件所在目录不存在时会自动创建。
    #[instrument(skip(config), level = "info")]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let normalized = ensure_database_directory(config.connection_string.expose_secret())?;
        let redacted = redact_connection_string(&normalized);

        let mut opt = ConnectOptions::new(normalized);
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .sqlx_logging(config.sqlx_logging);

        let connection = Database::connect(opt).await.map_err(|e| {
            CacheError::DatabaseError(format!("Failed to open database {}: {}", redacted, e))
        })?;

        info!("Connected to backing store {}", redacted);
        Ok(Self::from_connection(connection))
    }

    /// 使用已有连接构造后端
    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self {
            connection,
            _record: PhantomData,
        }
    }

    /// 底层连接
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl<R: SqlRecord> StorageBackend<R> for SeaOrmBackend<R> {
    async fn scan_all(&self) -> Result<Vec<R>> {
        let backend = self.connection.get_database_backend();
        let rows = self
            .connection
            .query_all(R::select_all(backend))
            .await
            .map_err(|e| CacheError::DatabaseError(format!("error querying records: {}", e)))?;

        debug!("Scanned {} rows from backing store", rows.len());
        rows.iter().map(R::from_row).collect()
    }

    async fn begin(&self) -> Result<Box<dyn BackendTransaction<R>>> {
        let backend = self.connection.get_database_backend();
        let txn = self.connection.begin().await?;
        Ok(Box::new(SeaOrmTransaction {
            txn,
            backend,
            _record: PhantomData,
        }))
    }

    async fn close(&self) -> Result<()> {
        self.connection.clone().close().await?;
        info!("Backing store connection closed");
        Ok(())
    }
}

/// Sea-ORM 事务
pub struct SeaOrmTransaction<R> {
    txn: DatabaseTransaction,
    backend: DatabaseBackend,
    _record: PhantomData<fn() -> R>,
}

#[async_trait]
impl<R: SqlRecord> BackendTransaction<R> for SeaOrmTransaction<R> {
    async fn insert(&mut self, record: &R) -> Result<()> {
        self.txn.execute(record.insert_statement(self.backend)).await?;
        Ok(())
    }

    async fn update(&mut self, record: &R) -> Result<()> {
        self.txn.execute(record.update_statement(self.backend)).await?;
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> Result<()> {
        self.txn
            .execute(R::delete_statement(id, self.backend))
            .await?;
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> Result<bool> {
        let row = self
            .txn
            .query_one(R::exists_statement(id, self.backend))
            .await?;
        Ok(row.is_some())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let SeaOrmTransaction { txn, .. } = *self;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let SeaOrmTransaction { txn, .. } = *self;
        txn.rollback().await?;
        Ok(())
    }
}
