//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Achievement, EarnedAchievement, EarnedFilter, EarnedKey};

/// 成就定义仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementRepositoryTrait: Send + Sync {
    async fn find_by_aid(&self, aid: Uuid, include_disabled: bool) -> Result<Option<Achievement>>;
    async fn find_by_name(&self, name: &str, include_disabled: bool)
    -> Result<Option<Achievement>>;
    /// 按 score 升序，同分按插入顺序
    async fn list(&self, event: Option<String>, include_disabled: bool)
    -> Result<Vec<Achievement>>;
    async fn distinct_events(&self, include_disabled: bool) -> Result<BTreeSet<String>>;
    async fn insert(&self, achievement: &Achievement) -> Result<()>;
    /// 整文档替换，返回是否命中记录
    async fn replace(&self, achievement: &Achievement) -> Result<bool>;
}

/// 已获得成就仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EarnedAchievementRepositoryTrait: Send + Sync {
    async fn list(&self, filter: EarnedFilter) -> Result<Vec<EarnedAchievement>>;
    async fn exists(&self, key: &EarnedKey) -> Result<bool>;
    /// 原子的"不存在则插入"，返回是否实际插入
    async fn insert_if_absent(&self, record: &EarnedAchievement) -> Result<bool>;
    /// 按键删除，返回是否实际删除
    async fn delete(&self, key: &EarnedKey) -> Result<bool>;
    /// 按键集合批量删除，返回删除条数
    async fn delete_many(&self, keys: &[EarnedKey]) -> Result<u64>;
    /// 至少存在一条记录的成就 ID
    async fn distinct_aids(&self) -> Result<Vec<Uuid>>;
}
