//! 已获得成就查询与批量撤销
//!
//! 单条记录的授予与撤销只由评估器完成，这里只暴露查询和批量删除。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::cache::{InvalidationCoordinator, InvalidationReason};
use crate::error::{AchievementError, Result};
use crate::models::{Achievement, EarnedAchievement, EarnedFilter, EarnedKey, Identity};
use crate::repository::{AchievementRepositoryTrait, EarnedAchievementRepositoryTrait};

/// 已获得成就存储服务
pub struct GrantStore<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    achievement_repo: Arc<AR>,
    earned_repo: Arc<ER>,
    invalidation: InvalidationCoordinator,
}

impl<AR, ER> GrantStore<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    pub fn new(
        achievement_repo: Arc<AR>,
        earned_repo: Arc<ER>,
        invalidation: InvalidationCoordinator,
    ) -> Self {
        Self {
            achievement_repo,
            earned_repo,
            invalidation,
        }
    }

    /// 按条件列出已获得记录
    pub async fn list_earned(&self, filter: EarnedFilter) -> Result<Vec<EarnedAchievement>> {
        self.earned_repo.list(filter).await
    }

    /// 已获得成就的 aid，未指定身份时跨所有身份去重
    pub async fn list_earned_aids(&self, identity: Option<&Identity>) -> Result<Vec<Uuid>> {
        let filter = EarnedFilter {
            identity: identity.cloned(),
            aid: None,
        };
        let mut seen = HashSet::new();
        let aids = self
            .earned_repo
            .list(filter)
            .await?
            .into_iter()
            .filter_map(|record| seen.insert(record.aid).then_some(record.aid))
            .collect();
        Ok(aids)
    }

    /// 至少有一条已获得记录的成就（包含已下线成就）
    pub async fn list_earned_aids_with_records(&self) -> Result<Vec<Uuid>> {
        self.earned_repo.distinct_aids().await
    }

    /// 身份已获得的成就定义，按分数升序
    pub async fn list_earned_achievements(
        &self,
        identity: &Identity,
        include_disabled: bool,
    ) -> Result<Vec<Achievement>> {
        let mut achievements = Vec::new();
        for aid in self.list_earned_aids(Some(identity)).await? {
            let achievement = self
                .achievement_repo
                .find_by_aid(aid, true)
                .await?
                .ok_or_else(|| {
                    error!(aid = %aid, identity = %identity, "已获得记录引用的成就不存在");
                    AchievementError::achievement_not_found(aid)
                })?;

            if include_disabled || !achievement.disabled {
                achievements.push(achievement);
            }
        }
        achievements.sort_by_key(|a| a.score);
        Ok(achievements)
    }

    /// 批量删除已获得记录
    ///
    /// 一次存储调用完成，有记录被删除时清空派生视图缓存
    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    pub async fn remove_many(&self, keys: &[EarnedKey]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let removed = self.earned_repo.delete_many(keys).await?;
        if removed > 0 {
            self.invalidation
                .invalidate(InvalidationReason::GrantsRemoved)
                .await?;
            info!(requested = keys.len(), removed, "已批量撤销成就记录");
        }
        Ok(removed)
    }
}
