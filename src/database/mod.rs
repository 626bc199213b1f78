//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 数据库连接辅助模块

pub mod connection_string;

pub use connection_string::{
    ensure_database_directory, extract_sqlite_path, is_memory_database,
    normalize_connection_string, validate_connection_string, DbType,
};
