//! 内存仓储
//!
//! 使用 DashMap 实现的高并发内存存储，适用于测试和本地开发环境。
//! 单键操作借助 DashMap 的分片锁保证原子性。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::traits::{AchievementRepositoryTrait, EarnedAchievementRepositoryTrait};
use crate::error::Result;
use crate::models::{Achievement, EarnedAchievement, EarnedFilter, EarnedKey};

/// 带插入序号的存储项
#[derive(Debug, Clone)]
struct Sequenced<T> {
    seq: u64,
    value: T,
}

/// 内存成就定义仓储
#[derive(Debug, Clone, Default)]
pub struct MemoryAchievementRepository {
    data: Arc<DashMap<Uuid, Sequenced<Achievement>>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryAchievementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按插入顺序快照，便于后续稳定排序
    fn snapshot<F>(&self, predicate: F) -> Vec<Sequenced<Achievement>>
    where
        F: Fn(&Achievement) -> bool,
    {
        let mut items: Vec<_> = self
            .data
            .iter()
            .filter(|entry| predicate(&entry.value().value))
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|item| item.seq);
        items
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }
}

#[async_trait]
impl AchievementRepositoryTrait for MemoryAchievementRepository {
    async fn find_by_aid(&self, aid: Uuid, include_disabled: bool) -> Result<Option<Achievement>> {
        Ok(self
            .data
            .get(&aid)
            .map(|entry| entry.value.clone())
            .filter(|a| include_disabled || !a.disabled))
    }

    async fn find_by_name(
        &self,
        name: &str,
        include_disabled: bool,
    ) -> Result<Option<Achievement>> {
        let mut matches = self.snapshot(|a| a.name == name && (include_disabled || !a.disabled));
        // 与 PostgreSQL 实现一致：启用的优先，其次按插入顺序
        matches.sort_by_key(|item| (item.value.disabled, item.seq));
        Ok(matches.into_iter().next().map(|item| item.value))
    }

    async fn list(
        &self,
        event: Option<String>,
        include_disabled: bool,
    ) -> Result<Vec<Achievement>> {
        let mut items = self.snapshot(|a| {
            event.as_deref().is_none_or(|e| a.event == e) && (include_disabled || !a.disabled)
        });
        // sort_by_key 是稳定排序，同分保持插入顺序
        items.sort_by_key(|item| item.value.score);
        Ok(items.into_iter().map(|item| item.value).collect())
    }

    async fn distinct_events(&self, include_disabled: bool) -> Result<BTreeSet<String>> {
        Ok(self
            .data
            .iter()
            .filter(|entry| include_disabled || !entry.value.disabled)
            .map(|entry| entry.value.event.clone())
            .collect())
    }

    async fn insert(&self, achievement: &Achievement) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.data.insert(
            achievement.aid,
            Sequenced {
                seq,
                value: achievement.clone(),
            },
        );
        Ok(())
    }

    async fn replace(&self, achievement: &Achievement) -> Result<bool> {
        match self.data.get_mut(&achievement.aid) {
            Some(mut entry) => {
                entry.value = achievement.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// 内存已获得成就仓储
#[derive(Debug, Clone, Default)]
pub struct MemoryEarnedAchievementRepository {
    data: Arc<DashMap<EarnedKey, Sequenced<EarnedAchievement>>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryEarnedAchievementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }
}

#[async_trait]
impl EarnedAchievementRepositoryTrait for MemoryEarnedAchievementRepository {
    async fn list(&self, filter: EarnedFilter) -> Result<Vec<EarnedAchievement>> {
        let mut items: Vec<_> = self
            .data
            .iter()
            .filter(|entry| filter.matches(&entry.value().value))
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|item| item.seq);
        Ok(items.into_iter().map(|item| item.value).collect())
    }

    async fn exists(&self, key: &EarnedKey) -> Result<bool> {
        Ok(self.data.contains_key(key))
    }

    async fn insert_if_absent(&self, record: &EarnedAchievement) -> Result<bool> {
        match self.data.entry(record.key()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                slot.insert(Sequenced {
                    seq,
                    value: record.clone(),
                });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &EarnedKey) -> Result<bool> {
        Ok(self.data.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[EarnedKey]) -> Result<u64> {
        let removed = keys
            .iter()
            .filter(|key| self.data.remove(*key).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn distinct_aids(&self) -> Result<Vec<Uuid>> {
        let aids: BTreeSet<Uuid> = self.data.iter().map(|entry| entry.key().aid).collect();
        Ok(aids.into_iter().collect())
    }
}
