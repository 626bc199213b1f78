//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了待写日志：按主键记录尚未刷新到后端的变更序列。

use crate::record::Change;
use std::collections::btree_map::{self, BTreeMap};

/// 待写日志
///
/// 每个主键对应一个按写入顺序排列的变更列表。同一主键的多次变更不会合并，
/// 回放时按记录顺序逐条执行。主键按升序遍历，回放顺序因此是确定的。
#[derive(Debug)]
pub struct PendingLog<R> {
    entries: BTreeMap<i64, Vec<Change<R>>>,
    /// 所有主键下的变更总数
    total: usize,
}

impl<R> Default for PendingLog<R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            total: 0,
        }
    }
}

impl<R> PendingLog<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条变更
    pub fn push(&mut self, key: i64, change: Change<R>) {
        self.entries.entry(key).or_default().push(change);
        self.total += 1;
    }

    /// 取走整个日志，原位置留下一个空日志
    pub fn take(&mut self) -> PendingLog<R> {
        std::mem::take(self)
    }

    /// 将刷新失败的一代日志放回当前日志的前面
    ///
    /// 对每个主键，`earlier` 中的变更排在交换之后新写入的变更之前，
    /// 原有的相对顺序保持不变。
    pub fn requeue_front(&mut self, earlier: PendingLog<R>) {
        for (key, mut changes) in earlier.entries {
            let added = changes.len();
            if let Some(newer) = self.entries.remove(&key) {
                changes.extend(newer);
            }
            self.entries.insert(key, changes);
            self.total += added;
        }
    }

    /// 某个主键下的变更
    pub fn changes(&self, key: i64) -> Option<&[Change<R>]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    /// 有待写变更的主键数量
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// 变更总数
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn iter(&self) -> btree_map::Iter<'_, i64, Vec<Change<R>>> {
        self.entries.iter()
    }
}

impl<'a, R> IntoIterator for &'a PendingLog<R> {
    type Item = (&'a i64, &'a Vec<Change<R>>);
    type IntoIter = btree_map::Iter<'a, i64, Vec<Change<R>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
