//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存的内存状态：记录表、有序主键索引、待写日志与主键计数器。
//! 这四部分总是在同一把锁下一起变更。

pub mod index;

use crate::record::{Change, Record, UNASSIGNED_KEY};
use crate::sync::pending::PendingLog;
use ahash::AHashMap;
use index::KeyIndex;
use tracing::{error, trace};

/// 缓存内存状态
///
/// 不变式：索引中的每个主键在记录表中恰好有一条记录，反之亦然。
#[derive(Debug)]
pub struct CacheState<R> {
    records: AHashMap<i64, R>,
    index: KeyIndex,
    pending: PendingLog<R>,
    next_key: i64,
    /// 计数器已到达 `i64::MAX` 且该主键已被占用，不能再分配新主键
    key_space_exhausted: bool,
}

impl<R> Default for CacheState<R> {
    fn default() -> Self {
        Self {
            records: AHashMap::new(),
            index: KeyIndex::new(),
            pending: PendingLog::new(),
            next_key: 1,
            key_space_exhausted: false,
        }
    }
}

impl<R: Record> CacheState<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用后端扫描结果整体替换记录表与索引
    ///
    /// 索引先按扫描顺序构建，最后统一排序；计数器设为 `max(key) + 1`（至少为 1），没有记录时为 1。
    pub fn load(&mut self, rows: Vec<R>) {
        self.records.clear();
        self.index.clear();

        for record in rows {
            let key = record.id();
            if self.records.insert(key, record).is_none() {
                self.index.push_unsorted(key);
            }
        }
        self.index.sort();
        self.next_key = 1;
        self.key_space_exhausted = false;
        if let Some(max) = self.index.max_key() {
            self.advance_counter(max);
        }
    }

    /// 保证计数器大于 `key`
    ///
    /// `key` 为 `i64::MAX` 时计数器停在 `i64::MAX` 并标记主键空间耗尽。
    fn advance_counter(&mut self, key: i64) {
        match self.next_key.max(key).checked_add(1) {
            Some(next) => self.next_key = next.max(1),
            None => {
                self.next_key = i64::MAX;
                if !self.key_space_exhausted {
                    error!("主键空间已耗尽，后续插入将被拒绝");
                }
                self.key_space_exhausted = true;
            }
        }
    }

    /// 按主键读取记录
    pub fn get(&self, key: i64) -> Option<&R> {
        self.records.get(&key)
    }

    /// 按索引位置读取一段记录，结果按主键升序
    pub fn range(&self, offset: usize, limit: usize) -> Vec<R> {
        self.index
            .range(offset, limit)
            .iter()
            .filter_map(|key| self.records.get(key).cloned())
            .collect()
    }

    /// 核心变更原语
    ///
    /// `key` 为 0 时视为插入并分配下一个主键；主键空间耗尽时拒绝插入。
    /// 删除不存在的记录是静默的空操作。返回实际作用的主键；空操作或被拒绝时返回 `None`。
    pub fn modify(&mut self, key: i64, change: Change<R>) -> Option<i64> {
        match change {
            Change::Delete => {
                if key == UNASSIGNED_KEY || self.records.remove(&key).is_none() {
                    trace!(key, "delete of absent record ignored");
                    return None;
                }
                self.index.remove(key);
                self.pending.push(key, Change::Delete);
                Some(key)
            }
            Change::Upsert(mut record) => {
                let key = if key == UNASSIGNED_KEY {
                    if self.key_space_exhausted {
                        error!("主键空间已耗尽，拒绝插入新记录");
                        return None;
                    }
                    self.next_key
                } else {
                    key
                };

                record.set_id(key);
                if !self.records.contains_key(&key) {
                    // 显式给出的主键可能超过计数器，计数器不能落后于它
                    self.advance_counter(key);
                    self.index.insert(key);
                }
                self.records.insert(key, record.clone());
                self.pending.push(key, Change::Upsert(record));
                Some(key)
            }
        }
    }

    /// 取走当前一代待写日志
    pub fn take_pending(&mut self) -> PendingLog<R> {
        self.pending.take()
    }

    /// 把刷新失败的一代日志放回最前面
    pub fn requeue_pending(&mut self, captured: PendingLog<R>) {
        self.pending.requeue_front(captured);
    }

    pub fn pending(&self) -> &PendingLog<R> {
        &self.pending
    }

    pub fn next_key(&self) -> i64 {
        self.next_key
    }

    pub fn is_key_space_exhausted(&self) -> bool {
        self.key_space_exhausted
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn keys(&self) -> &[i64] {
        self.index.as_slice()
    }
}
