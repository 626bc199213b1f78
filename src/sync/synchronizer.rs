//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步器：按固定间隔把待写日志以事务方式回放到后端。
//!
//! 每个刷新周期：
//! 1. 在缓存锁内取走整个待写日志，换上一个空日志；
//! 2. 在锁外开启事务，按记录顺序回放每个主键的全部变更；
//! 3. 成功则提交；任何失败（包括回放中的 panic）都回滚，并把取走的变更放回当前日志的最前面。

use super::pending::PendingLog;
use crate::backend::{BackendTransaction, StorageBackend};
use crate::error::{CacheError, Result};
use crate::metrics::SyncMetrics;
use crate::record::{Change, Record};
use crate::store::CacheState;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// 单次刷新周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// 没有待写变更，未开启事务
    Skipped,
    /// 事务已提交
    Committed {
        /// 提交的变更数
        applied: usize,
    },
}

/// 同步器
pub struct Synchronizer<R: Record, B: StorageBackend<R>> {
    service_name: String,
    state: Arc<Mutex<CacheState<R>>>,
    backend: Arc<B>,
    metrics: Arc<SyncMetrics>,
    /// 串行化刷新周期，保证失败的一代总是排在后一代之前
    flush_lock: Mutex<()>,
    /// 提前刷新触发器
    flush_trigger: Notify,
    /// 提前刷新阈值
    flush_threshold: Option<usize>,
}

impl<R: Record, B: StorageBackend<R>> Synchronizer<R, B> {
    /// 创建新的同步器
    ///
    /// # 参数
    ///
    /// * `service_name` - 服务名称
    /// * `state` - 与缓存门面共享的内存状态
    /// * `backend` - 存储后端
    /// * `metrics` - 指标
    /// * `flush_threshold` - 待写变更达到该数量时提前刷新
    pub fn new(
        service_name: String,
        state: Arc<Mutex<CacheState<R>>>,
        backend: Arc<B>,
        metrics: Arc<SyncMetrics>,
        flush_threshold: Option<usize>,
    ) -> Self {
        Self {
            service_name,
            state,
            backend,
            metrics,
            flush_lock: Mutex::new(()),
            flush_trigger: Notify::new(),
            flush_threshold,
        }
    }

    /// 启动后台刷新任务
    ///
    /// 任务在 `shutdown` 被取消后退出；正在进行的刷新周期会先执行完。
    pub fn start(self: &Arc<Self>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let sync = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("服务 {} 的同步任务收到关闭信号", sync.service_name);
                        break;
                    }
                    _ = ticker.tick() => {
                        sync.run_cycle().await;
                    }
                    _ = sync.flush_trigger.notified() => {
                        debug!("服务 {} 待写变更达到阈值，提前刷新", sync.service_name);
                        sync.run_cycle().await;
                    }
                }
            }
        })
    }

    /// 待写变更数达到阈值时唤醒后台任务
    pub fn notify_pending(&self, pending: usize) {
        if let Some(threshold) = self.flush_threshold {
            if pending >= threshold {
                self.flush_trigger.notify_one();
            }
        }
    }

    /// 后台任务的一个周期；失败已在 [`Synchronizer::flush_cycle`] 中记录，下个周期重试
    async fn run_cycle(&self) {
        if let Ok(FlushOutcome::Committed { applied }) = self.flush_cycle().await {
            debug!(
                "服务 {} 周期刷新完成，提交 {} 个变更",
                self.service_name, applied
            );
        }
    }

    /// 执行一次完整的刷新周期
    ///
    /// 周期在独立任务中运行：调用方的 future 被丢弃（超时、`select!`、任务中止）时，
    /// 周期仍会完成提交，或回滚并把取走的变更放回待写日志。
    /// 失败时错误仅返回给调用方用于报告。
    ///
    /// 回放中的 panic 依赖栈展开才能被捕获；以 `panic = "abort"` 编译时进程会直接终止。
    pub async fn flush(self: &Arc<Self>) -> Result<FlushOutcome> {
        let sync = Arc::clone(self);
        tokio::spawn(async move { sync.flush_cycle().await }.in_current_span())
            .await
            .map_err(|e| CacheError::FlushError(format!("flush task failed: {}", e)))?
    }

    /// 刷新周期本体：取走、回放、提交或重新入队
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    async fn flush_cycle(&self) -> Result<FlushOutcome> {
        let _cycle = self.flush_lock.lock().await;

        let captured = {
            let mut state = self.state.lock().await;
            let captured = state.take_pending();
            self.metrics.set_pending(0);
            captured
        };

        if captured.is_empty() {
            self.metrics.record_skipped();
            return Ok(FlushOutcome::Skipped);
        }

        let count = captured.len();
        match self.apply(&captured).await {
            Ok(()) => {
                self.metrics.record_commit(count);
                info!(
                    "服务 {} 刷新成功：{} 个主键，{} 个变更",
                    self.service_name,
                    captured.key_count(),
                    count
                );
                Ok(FlushOutcome::Committed { applied: count })
            }
            Err(e) => {
                let pending = {
                    let mut state = self.state.lock().await;
                    state.requeue_pending(captured);
                    state.pending().len()
                };
                self.metrics.set_pending(pending);
                self.metrics.record_failure(count);
                error!(
                    "服务 {} 刷新失败，已回滚并重新入队 {} 个变更: {}",
                    self.service_name, count, e
                );
                Err(e)
            }
        }
    }

    /// 在一个事务内回放整代日志
    async fn apply(&self, captured: &PendingLog<R>) -> Result<()> {
        let mut tx = self
            .backend
            .begin()
            .await
            .map_err(|e| CacheError::FlushError(format!("could not begin transaction: {}", e)))?;

        let replayed = AssertUnwindSafe(Self::replay(tx.as_mut(), captured))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(CacheError::FlushError(format!(
                    "panic during replay: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match replayed {
            Ok(()) => tx
                .commit()
                .await
                .map_err(|e| CacheError::FlushError(format!("commit failed: {}", e))),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("事务回滚失败: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// 按主键升序、每个主键内按记录顺序回放变更
    async fn replay(tx: &mut dyn BackendTransaction<R>, captured: &PendingLog<R>) -> Result<()> {
        for (&id, changes) in captured {
            for change in changes {
                match change {
                    Change::Delete => {
                        tx.delete(id).await.map_err(|e| {
                            CacheError::FlushError(format!(
                                "error deleting record with ID {}: {}",
                                id, e
                            ))
                        })?;
                        debug!("Deleted record with ID {}", id);
                    }
                    Change::Upsert(record) => {
                        let exists = tx.exists(id).await.map_err(|e| {
                            CacheError::FlushError(format!(
                                "error checking existence of record with ID {}: {}",
                                id, e
                            ))
                        })?;

                        if exists {
                            tx.update(record).await.map_err(|e| {
                                CacheError::FlushError(format!(
                                    "error updating record with ID {}: {}",
                                    id, e
                                ))
                            })?;
                            debug!("Updated record with ID {}", id);
                        } else {
                            tx.insert(record).await.map_err(|e| {
                                CacheError::FlushError(format!(
                                    "error inserting record with ID {}: {}",
                                    id, e
                                ))
                            })?;
                            debug!("Inserted new record with ID {}", id);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
