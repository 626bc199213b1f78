//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写回缓存门面。
//!
//! 所有读写只作用于内存；变更被记录到待写日志，由后台同步器按间隔批量写回后端。
//! 读取永远不会访问后端。

use crate::backend::{SeaOrmBackend, SqlRecord, StorageBackend};
use crate::config::{CacheConfig, SyncConfig};
use crate::error::{CacheError, Result};
use crate::metrics::{SyncMetrics, SyncStats};
use crate::record::{Change, Record, UNASSIGNED_KEY};
use crate::store::CacheState;
use crate::sync::{FlushOutcome, Synchronizer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 写回缓存
///
/// 同一个实例可以在多个任务间共享（例如放进 `Arc`）。记录表、索引、待写日志
/// 和主键计数器由同一把锁保护，每个操作都是原子的。
pub struct WriteBackCache<R: Record, B: StorageBackend<R>> {
    service_name: String,
    state: Arc<Mutex<CacheState<R>>>,
    backend: Arc<B>,
    synchronizer: Arc<Synchronizer<R, B>>,
    metrics: Arc<SyncMetrics>,
    sync_config: SyncConfig,
    shutdown: CancellationToken,
    sync_handle: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<R: SqlRecord> WriteBackCache<R, SeaOrmBackend<R>> {
    /// 按配置连接数据库并创建缓存
    ///
    /// # 参数
    ///
    /// * `config` - 缓存配置
    ///
    /// # 返回值
    ///
    /// 完成初始加载并已启动同步器的缓存；配置无效、连接失败或初始扫描失败时返回错误
    #[instrument(skip(config), level = "info", fields(service = %config.service_name))]
    pub async fn open(config: CacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;
        let backend = SeaOrmBackend::connect(&config.database).await?;
        Self::with_backend(backend, &config).await
    }
}

impl<R: Record, B: StorageBackend<R>> WriteBackCache<R, B> {
    /// 使用已有的后端创建缓存
    ///
    /// 从后端加载全部记录，然后启动同步器。初始扫描失败时关闭后端并返回错误。
    #[instrument(skip(backend, config), level = "info", fields(service = %config.service_name))]
    pub async fn with_backend(backend: B, config: &CacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        let backend = Arc::new(backend);
        let state = Arc::new(Mutex::new(CacheState::new()));

        if let Err(e) = Self::load_records(&state, backend.as_ref()).await {
            if let Err(close_err) = backend.close().await {
                warn!("初始加载失败后关闭后端出错: {}", close_err);
            }
            return Err(e);
        }

        let metrics = Arc::new(SyncMetrics::default());
        let synchronizer = Arc::new(Synchronizer::new(
            config.service_name.clone(),
            Arc::clone(&state),
            Arc::clone(&backend),
            Arc::clone(&metrics),
            config.sync.flush_threshold,
        ));

        let shutdown = CancellationToken::new();
        let handle = synchronizer.start(config.sync.flush_interval(), shutdown.clone());

        info!(
            "服务 {} 的写回缓存已启动，刷新间隔 {:?}",
            config.service_name,
            config.sync.flush_interval()
        );

        Ok(Self {
            service_name: config.service_name.clone(),
            state,
            backend,
            synchronizer,
            metrics,
            sync_config: config.sync.clone(),
            shutdown,
            sync_handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    /// 初始加载：持有锁扫描后端并替换记录表与索引
    async fn load_records(state: &Mutex<CacheState<R>>, backend: &B) -> Result<()> {
        let mut state = state.lock().await;
        let rows = backend.scan_all().await?;
        let count = rows.len();
        state.load(rows);
        info!(
            "从后端加载了 {} 条记录，下一个主键 {}",
            count,
            state.next_key()
        );
        Ok(())
    }

    /// 插入新记录
    ///
    /// 忽略记录上已有的主键，分配下一个主键并写回到 `record` 上。
    ///
    /// # 返回值
    ///
    /// 分配的主键；主键空间耗尽（计数器已到达 `i64::MAX`）时不写入并返回 [`UNASSIGNED_KEY`]
    #[instrument(skip(self, record), level = "debug", fields(service = %self.service_name))]
    pub async fn insert_record(&self, record: &mut R) -> i64 {
        match self
            .modify(UNASSIGNED_KEY, Change::Upsert(record.clone()))
            .await
        {
            Some(key) => {
                record.set_id(key);
                key
            }
            None => UNASSIGNED_KEY,
        }
    }

    /// 按主键读取记录的副本
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn get_record(&self, id: i64) -> Option<R> {
        self.state.lock().await.get(id).cloned()
    }

    /// 按主键升序读取一段记录
    ///
    /// # 参数
    ///
    /// * `offset` - 在有序主键中的起始位置
    /// * `limit` - 最多返回的条数
    ///
    /// # 返回值
    ///
    /// 起始位置超出范围时返回空列表；末尾不足 `limit` 条时返回剩余的全部记录
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn get_records_range(&self, offset: usize, limit: usize) -> Vec<R> {
        self.state.lock().await.range(offset, limit)
    }

    /// 以主键 `id` 写入记录
    ///
    /// 主键不存在时等同于以该主键插入；`id` 为 0 时等同于 [`insert_record`](Self::insert_record)。
    #[instrument(skip(self, record), level = "debug", fields(service = %self.service_name))]
    pub async fn update_record(&self, id: i64, mut record: R) {
        record.set_id(id);
        self.modify(id, Change::Upsert(record)).await;
    }

    /// 删除记录，记录不存在时什么都不做
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn delete_record(&self, id: i64) {
        self.modify(id, Change::Delete).await;
    }

    async fn modify(&self, key: i64, change: Change<R>) -> Option<i64> {
        let (applied, pending) = {
            let mut state = self.state.lock().await;
            let applied = state.modify(key, change);
            (applied, state.pending().len())
        };

        self.metrics.set_pending(pending);
        if applied.is_some() {
            self.synchronizer.notify_pending(pending);
        }
        applied
    }

    /// 立即执行一次刷新周期
    ///
    /// 与后台周期串行执行。失败时变更已重新入队，下个周期会再次尝试。
    /// 丢弃返回的 future（例如外层超时）不会中断已开始的周期，取走的变更不会丢失。
    pub async fn flush(&self) -> Result<FlushOutcome> {
        self.synchronizer.flush().await
    }

    /// 关闭缓存
    ///
    /// 停止同步器并等待正在进行的刷新完成，然后关闭后端。开启 `flush_on_close` 时
    /// 会在关闭后端前再刷新一次；否则未刷新的变更被丢弃。关闭后的读写仍只作用于内存。
    #[instrument(skip(self), level = "info", fields(service = %self.service_name))]
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CacheError::ShutdownError(format!(
                "cache {} is already closed",
                self.service_name
            )));
        }

        info!("正在关闭写回缓存...");
        self.shutdown.cancel();

        let mut first_error = None;

        let handle = self.sync_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                first_error = Some(CacheError::ShutdownError(format!(
                    "synchronizer task ended abnormally: {}",
                    e
                )));
            }
        }

        if self.sync_config.flush_on_close {
            debug!("关闭前执行最终刷新");
            if let Err(e) = self.synchronizer.flush().await {
                warn!("最终刷新失败: {}", e);
            }
        }

        let unflushed = self.pending_len().await;
        if unflushed > 0 {
            warn!("关闭时丢弃 {} 个未刷新的变更", unflushed);
        }

        if let Err(e) = self.backend.close().await {
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("写回缓存已关闭");
                Ok(())
            }
        }
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 缓存中的记录数
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }

    /// 待写变更数
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending().len()
    }

    /// 下一次插入将分配的主键
    pub async fn next_key(&self) -> i64 {
        self.state.lock().await.next_key()
    }

    /// 同步器指标快照
    pub fn stats(&self) -> SyncStats {
        self.metrics.snapshot()
    }

    /// Prometheus 文本格式的同步器指标
    pub fn render_metrics(&self) -> String {
        self.metrics.render(&self.service_name)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl<R: Record, B: StorageBackend<R>> Drop for WriteBackCache<R, B> {
    fn drop(&mut self) {
        // 未调用 close 时让后台任务随缓存一起退出
        self.shutdown.cancel();
    }
}
