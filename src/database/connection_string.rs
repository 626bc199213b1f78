//! 连接字符串规范化模块
//!
//! 识别 SQLite、MySQL 和 PostgreSQL 连接字符串，统一 SQLite 的路径写法，
//! 并在打开文件数据库之前创建所需的目录。

use crate::error::{CacheError, Result};
use std::path::PathBuf;

/// 数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    SQLite,
    MySQL,
    PostgreSQL,
}

impl DbType {
    /// 从连接字符串推断数据库类型，无法识别时按 SQLite 处理
    pub fn from_connection_string(s: &str) -> Self {
        let lower = s.to_lowercase();
        if lower.starts_with("mysql") {
            DbType::MySQL
        } else if lower.starts_with("postgres") {
            DbType::PostgreSQL
        } else {
            DbType::SQLite
        }
    }
}

/// 是否为 SQLite 内存数据库
pub fn is_memory_database(s: &str) -> bool {
    DbType::from_connection_string(s) == DbType::SQLite
        && (s.contains(":memory:") || s.contains("mode=memory"))
}

/// 拆分 SQLite 连接字符串的路径与参数部分
fn split_sqlite(s: &str) -> (&str, Option<&str>) {
    let body = s.strip_prefix("sqlite:").unwrap_or(s);
    match body.split_once('?') {
        Some((path, params)) => (path, Some(params)),
        None => (body, None),
    }
}

/// 规范化 SQLite 文件路径
///
/// `sqlite:///abs` 与 `sqlite://abs` 都视为绝对路径，裸文件名补成 `./name`。
fn normalize_sqlite_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("//") {
        format!("/{}", rest.trim_start_matches('/'))
    } else if path.starts_with('/') || path.starts_with("./") || path.starts_with("../") {
        path.to_string()
    } else {
        format!("./{}", path)
    }
}

/// 规范化连接字符串
///
/// ## SQLite
/// - 绝对路径: `sqlite:/absolute/path/to/db.sqlite`
/// - 相对路径: `sqlite:./relative/path/to/db.sqlite`
/// - 内存数据库: 原样保留，例如 `sqlite::memory:` 或 `sqlite:file:name?mode=memory&cache=shared`
///
/// MySQL 与 PostgreSQL 连接字符串原样返回。
pub fn normalize_connection_string(s: &str) -> String {
    if DbType::from_connection_string(s) != DbType::SQLite || is_memory_database(s) {
        return s.to_string();
    }

    let (path, params) = split_sqlite(s);
    let path = normalize_sqlite_path(path);
    match params {
        Some(params) if !params.is_empty() => format!("sqlite:{}?{}", path, params),
        _ => format!("sqlite:{}", path),
    }
}

/// 提取 SQLite 数据库文件路径
///
/// 内存数据库或非 SQLite 连接返回 None。
pub fn extract_sqlite_path(s: &str) -> Option<PathBuf> {
    if DbType::from_connection_string(s) != DbType::SQLite || is_memory_database(s) {
        return None;
    }
    let (path, _) = split_sqlite(s);
    Some(PathBuf::from(normalize_sqlite_path(path)))
}

/// 确保数据库目录存在
///
/// 返回规范化后的连接字符串。
pub fn ensure_database_directory(connection_string: &str) -> Result<String> {
    if connection_string.trim().is_empty() {
        return Err(CacheError::ConfigError(
            "Connection string cannot be empty".to_string(),
        ));
    }

    if let Some(path) = extract_sqlite_path(connection_string) {
        let full_path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };

        if let Some(parent) = full_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CacheError::DatabaseError(format!(
                        "无法创建数据库目录 {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
    }

    Ok(normalize_connection_string(connection_string))
}

/// 验证连接字符串
///
/// SQLite 文件的父路径必须是目录（不存在时会在连接时创建），MySQL 与 PostgreSQL 必须包含主机地址。
pub fn validate_connection_string(s: &str) -> std::result::Result<(), String> {
    if s.trim().is_empty() {
        return Err("Connection string cannot be empty".to_string());
    }

    match DbType::from_connection_string(s) {
        DbType::SQLite => {
            if let Some(path) = extract_sqlite_path(s) {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    if parent.exists() && !parent.is_dir() {
                        return Err(format!("父路径不是目录: {}", parent.display()));
                    }
                }
            }
            Ok(())
        }
        DbType::MySQL | DbType::PostgreSQL => {
            let without_scheme = s.split_once("://").map(|(_, rest)| rest).unwrap_or("");
            let authority = without_scheme.split('/').next().unwrap_or("");
            let host = authority.rsplit('@').next().unwrap_or("");
            if host.is_empty() {
                Err("必须指定主机地址".to_string())
            } else {
                Ok(())
            }
        }
    }
}
