//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 有序主键索引
//!
//! 使用排序后的 `Vec<i64>` 保存所有活跃记录的主键。每次变更后整体重新排序，
//! 写入代价为 O(n log n)；记录量较大时应换成平衡树之类的有序结构，但需保持相同的排序约定。

/// 有序主键索引
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    keys: Vec<i64>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加主键但不排序
    ///
    /// 仅用于初始加载，调用方必须在加载结束后调用 [`KeyIndex::sort`]。
    pub(crate) fn push_unsorted(&mut self, key: i64) {
        self.keys.push(key);
    }

    /// 恢复升序
    pub fn sort(&mut self) {
        self.keys.sort_unstable();
    }

    /// 插入新主键并重新排序
    ///
    /// 已存在的主键不会重复插入。
    pub fn insert(&mut self, key: i64) {
        if self.position(key).is_some() {
            return;
        }
        self.keys.push(key);
        self.sort();
    }

    /// 移除主键：与末尾元素交换后删除，再重新排序
    ///
    /// 返回主键是否存在。
    pub fn remove(&mut self, key: i64) -> bool {
        match self.position(key) {
            Some(pos) => {
                self.keys.swap_remove(pos);
                self.sort();
                true
            }
            None => false,
        }
    }

    /// 二分查找主键的位置
    pub fn position(&self, key: i64) -> Option<usize> {
        self.keys.binary_search(&key).ok()
    }

    pub fn contains(&self, key: i64) -> bool {
        self.position(key).is_some()
    }

    /// 从位置 `offset` 起最多返回 `limit` 个主键
    ///
    /// `offset` 超出范围时返回空切片。
    pub fn range(&self, offset: usize, limit: usize) -> &[i64] {
        if offset >= self.keys.len() {
            return &[];
        }
        let end = self.keys.len().min(offset.saturating_add(limit));
        &self.keys[offset..end]
    }

    /// 最大主键
    pub fn max_key(&self) -> Option<i64> {
        self.keys.iter().copied().max()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.keys
    }
}
