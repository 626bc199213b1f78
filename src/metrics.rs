//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步器的运行时指标。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// 同步器指标
///
/// 每个缓存实例持有一份，由刷新周期更新。
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// 实际打开事务的刷新周期数
    pub flush_cycles: AtomicU64,
    /// 提交成功的周期数
    pub committed_cycles: AtomicU64,
    /// 回滚的周期数
    pub failed_cycles: AtomicU64,
    /// 待写日志为空而跳过的周期数
    pub skipped_cycles: AtomicU64,
    /// 已提交到后端的变更数
    pub changes_applied: AtomicU64,
    /// 因回滚重新入队的变更数
    pub changes_requeued: AtomicU64,
    /// 当前待写变更数
    pub pending_changes: AtomicUsize,
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub flush_cycles: u64,
    pub committed_cycles: u64,
    pub failed_cycles: u64,
    pub skipped_cycles: u64,
    pub changes_applied: u64,
    pub changes_requeued: u64,
    pub pending_changes: usize,
}

impl SyncMetrics {
    pub fn record_skipped(&self) {
        self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self, applied: usize) {
        self.flush_cycles.fetch_add(1, Ordering::Relaxed);
        self.committed_cycles.fetch_add(1, Ordering::Relaxed);
        self.changes_applied
            .fetch_add(applied as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, requeued: usize) {
        self.flush_cycles.fetch_add(1, Ordering::Relaxed);
        self.failed_cycles.fetch_add(1, Ordering::Relaxed);
        self.changes_requeued
            .fetch_add(requeued as u64, Ordering::Relaxed);
    }

    pub fn set_pending(&self, pending: usize) {
        self.pending_changes.store(pending, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            flush_cycles: self.flush_cycles.load(Ordering::Relaxed),
            committed_cycles: self.committed_cycles.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            changes_applied: self.changes_applied.load(Ordering::Relaxed),
            changes_requeued: self.changes_requeued.load(Ordering::Relaxed),
            pending_changes: self.pending_changes.load(Ordering::Relaxed),
        }
    }

    /// 将指标格式化为 Prometheus 文本格式
    pub fn render(&self, service: &str) -> String {
        let stats = self.snapshot();
        let mut output = String::new();
        let lines = [
            ("oxrecord_flush_cycles_total", stats.flush_cycles),
            ("oxrecord_flush_committed_total", stats.committed_cycles),
            ("oxrecord_flush_failed_total", stats.failed_cycles),
            ("oxrecord_flush_skipped_total", stats.skipped_cycles),
            ("oxrecord_changes_applied_total", stats.changes_applied),
            ("oxrecord_changes_requeued_total", stats.changes_requeued),
            ("oxrecord_pending_changes", stats.pending_changes as u64),
        ];
        for (name, value) in lines {
            output.push_str(&format!("{}{{service=\"{}\"}} {}\n", name, service, value));
        }
        output
    }
}
