//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。


use oxrecord::backend::sql::bind_marker;
use oxrecord::error::{CacheError, Result};
use oxrecord::{CacheConfig, Record, SqlRecord};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult,
    Statement,
};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 生成唯一的服务名称
#[allow(dead_code)]
pub fn generate_unique_service_name(base: &str) -> String {
    format!("{}_{}", base, uuid::Uuid::new_v4().simple())
}

/// 测试配置：给定刷新间隔（毫秒）
#[allow(dead_code)]
pub fn test_config(service: &str, flush_interval_ms: u64) -> CacheConfig {
    let mut config = CacheConfig::new("sqlite::memory:", Duration::from_millis(flush_interval_ms));
    config.service_name = generate_unique_service_name(service);
    config
}

/// 测试用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub body: String,
}

#[allow(dead_code)]
impl Note {
    pub fn new(title: &str) -> Self {
        Self {
            id: 0,
            title: title.to_string(),
            body: String::new(),
        }
    }

    pub fn with_body(title: &str, body: &str) -> Self {
        Self {
            id: 0,
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    pub fn with_id(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            body: String::new(),
        }
    }
}

impl Record for Note {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl SqlRecord for Note {
    fn select_all(backend: DatabaseBackend) -> Statement {
        Statement::from_string(backend, "SELECT id, title, body FROM notes")
    }

    fn from_row(row: &QueryResult) -> Result<Self> {
        let decode = |e: sea_orm::DbErr| CacheError::DecodeError(e.to_string());
        Ok(Self {
            id: row.try_get("", "id").map_err(decode)?,
            title: row.try_get("", "title").map_err(decode)?,
            body: row.try_get("", "body").map_err(decode)?,
        })
    }

    fn insert_statement(&self, backend: DatabaseBackend) -> Statement {
        Statement::from_sql_and_values(
            backend,
            format!(
                "INSERT INTO notes (id, title, body) VALUES ({}, {}, {})",
                bind_marker(backend, 1),
                bind_marker(backend, 2),
                bind_marker(backend, 3)
            ),
            [
                self.id.into(),
                self.title.clone().into(),
                self.body.clone().into(),
            ],
        )
    }

    fn update_statement(&self, backend: DatabaseBackend) -> Statement {
        Statement::from_sql_and_values(
            backend,
            format!(
                "UPDATE notes SET title = {}, body = {} WHERE id = {}",
                bind_marker(backend, 1),
                bind_marker(backend, 2),
                bind_marker(backend, 3)
            ),
            [
                self.title.clone().into(),
                self.body.clone().into(),
                self.id.into(),
            ],
        )
    }

    fn delete_statement(id: i64, backend: DatabaseBackend) -> Statement {
        Statement::from_sql_and_values(
            backend,
            format!("DELETE FROM notes WHERE id = {}", bind_marker(backend, 1)),
            [id.into()],
        )
    }

    fn exists_statement(id: i64, backend: DatabaseBackend) -> Statement {
        Statement::from_sql_and_values(
            backend,
            format!("SELECT 1 FROM notes WHERE id = {}", bind_marker(backend, 1)),
            [id.into()],
        )
    }
}

/// 打开单连接的内存 SQLite 数据库
///
/// 内存数据库只在同一个连接内可见，因此连接池必须固定为一个连接。
#[allow(dead_code)]
pub async fn connect_memory_sqlite() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(opt)
        .await
        .expect("failed to open in-memory sqlite")
}

/// 打开内存 SQLite 数据库并建表
#[allow(dead_code)]
pub async fn open_memory_sqlite() -> DatabaseConnection {
    let db = connect_memory_sqlite().await;
    create_notes_table(&db).await;
    db
}

/// 执行一条原始 SQL
#[allow(dead_code)]
pub async fn exec_sql(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
        .await
        .unwrap_or_else(|e| panic!("failed to execute `{}`: {}", sql, e));
}

/// 创建 notes 表
#[allow(dead_code)]
pub async fn create_notes_table(db: &DatabaseConnection) {
    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, title TEXT NOT NULL, body TEXT NOT NULL)",
    ))
    .await
    .expect("failed to create notes table");
}

/// 直接从数据库读取全部 notes，按主键排序
#[allow(dead_code)]
pub async fn read_notes(db: &DatabaseConnection) -> Vec<Note> {
    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT id, title, body FROM notes ORDER BY id",
        ))
        .await
        .expect("failed to read notes");
    rows.iter()
        .map(|row| Note::from_row(row).expect("failed to decode note"))
        .collect()
}

/// 等待条件成立，超时返回 false
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}
