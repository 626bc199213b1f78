//! oxrecord - 数据库记录写回缓存
//!
//! 在内存中保存整张表的记录，按主键有序提供读取与分页；
//! 所有写入先记录到待写日志，由后台同步器按固定间隔以单个事务批量写回数据库。
//! 刷新失败时整体回滚，变更重新入队，不会丢失也不会乱序。

#![doc(html_root_url = "https://docs.rs/oxrecord/0.1.0")]

pub use tokio;

pub mod backend;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod record;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use backend::{BackendTransaction, SeaOrmBackend, SqlRecord, StorageBackend};
pub use cache::WriteBackCache;
pub use config::{CacheConfig, DatabaseConfig, SyncConfig};
pub use error::{CacheError, Result};
pub use metrics::SyncStats;
pub use record::{Change, Record, UNASSIGNED_KEY};
pub use sync::FlushOutcome;

/// oxrecord 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
