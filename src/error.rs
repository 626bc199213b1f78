//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写回缓存的错误类型和处理机制。

use thiserror::Error;

/// 缓存系统错误类型枚举
///
/// 构造阶段的错误会直接返回给调用方；刷新阶段的错误只会被记录并在下一个周期重试。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 数据库连接错误
    #[error("Database connection error: {0}")]
    DatabaseError(String),

    /// Sea-ORM数据库错误
    #[error("Sea-ORM error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// 行数据解码失败
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// 后端错误
    #[error("Backend error: {0}")]
    BackendError(String),

    /// 刷新周期失败（已回滚并重新入队）
    #[error("Flush error: {0}")]
    FlushError(String),

    /// 关闭错误
    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// 缓存操作结果类型别名
pub type Result<T> = std::result::Result<T, CacheError>;
