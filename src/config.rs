//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写回缓存的配置结构和解析逻辑。

use crate::database::connection_string::validate_connection_string;
use crate::error::{CacheError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 缓存配置
///
/// 可以通过 TOML 加载：
///
/// ```toml
/// service_name = "notes"
///
/// [database]
/// connection_string = "sqlite:./notes.db?mode=rwc"
///
/// [sync]
/// flush_interval_ms = 1000
/// ```
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 配置版本
    pub config_version: Option<u32>,
    /// 服务名称，用于日志
    pub service_name: String,
    /// 后端数据库配置
    pub database: DatabaseConfig,
    /// 同步（刷新）配置
    pub sync: SyncConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            config_version: Some(CONFIG_VERSION),
            service_name: "oxrecord".to_string(),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// 数据库配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 连接字符串（使用 SecretString 保护）
    pub connection_string: SecretString,
    /// 连接池最大连接数
    pub max_connections: u32,
    /// 连接池最小连接数
    pub min_connections: u32,
    /// 连接超时时间（毫秒）
    pub connect_timeout_ms: u64,
    /// 是否输出 sqlx 语句日志
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("sqlite::memory:".to_string().into()),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_ms: 30_000,
            sqlx_logging: false,
        }
    }
}

/// 同步配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SyncConfig {
    /// 刷新间隔（毫秒）
    pub flush_interval_ms: u64,
    /// 待写变更达到该数量时提前触发刷新，None表示只按间隔刷新
    pub flush_threshold: Option<usize>,
    /// 关闭时是否先执行一次最终刷新
    pub flush_on_close: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1000,
            flush_threshold: None,
            flush_on_close: false,
        }
    }
}

impl SyncConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl CacheConfig {
    /// 使用给定连接字符串和刷新间隔创建配置
    pub fn new(connection_string: impl Into<String>, flush_interval: Duration) -> Self {
        let connection_string: String = connection_string.into();
        let mut config = Self::default();
        config.database.connection_string = SecretString::new(connection_string.into());
        // 超出 u64 的间隔饱和为 u64::MAX，由 validate 拒绝
        config.sync.flush_interval_ms = u64::try_from(flush_interval.as_millis()).unwrap_or(u64::MAX);
        config
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CacheError::ConfigError(e.to_string()))
    }

    /// 从 TOML 文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.service_name.is_empty() {
            return Err("Service name cannot be empty".to_string());
        }

        if self.service_name.len() > 64 {
            return Err(format!(
                "Service name '{}' exceeds maximum length of 64 characters",
                self.service_name
            ));
        }

        validate_connection_string(self.database.connection_string.expose_secret())?;

        if self.database.max_connections == 0 {
            return Err("database max_connections cannot be zero".to_string());
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(format!(
                "database min_connections ({}) must be <= max_connections ({})",
                self.database.min_connections, self.database.max_connections
            ));
        }

        if !(100..=300_000).contains(&self.database.connect_timeout_ms) {
            return Err("database connect_timeout_ms must be between 100 and 300000 ms".to_string());
        }

        if self.sync.flush_interval_ms == 0 {
            return Err("sync flush_interval_ms cannot be zero".to_string());
        }

        if self.sync.flush_interval_ms > 86_400_000 {
            return Err("sync flush_interval_ms cannot exceed 24 hours".to_string());
        }

        if let Some(threshold) = self.sync.flush_threshold {
            if threshold == 0 {
                return Err("sync flush_threshold cannot be zero".to_string());
            }
        }

        Ok(())
    }
}
