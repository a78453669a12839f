//! 派生视图
//!
//! 经缓存区域读取的聚合查询。缓存只影响延迟，不影响结果：
//! 缓存读写失败时记录告警并直接计算。
//!
//! 每次查询开始时取一次缓存代数，读写都使用该代数下的键。

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use super::grant_store::GrantStore;
use crate::cache::InvalidationCoordinator;
use crate::error::Result;
use crate::models::{Achievement, Identity};
use crate::repository::{AchievementRepositoryTrait, EarnedAchievementRepositoryTrait};

/// 视图缓存键
struct ViewKey;

impl ViewKey {
    fn enabled(event: Option<&str>) -> String {
        match event {
            Some(event) => format!("enabled:event:{}", event),
            None => "enabled:all".to_string(),
        }
    }

    fn earned(identity: &Identity) -> String {
        format!("earned:{}", identity)
    }

    fn score(identity: &Identity) -> String {
        format!("score:{}", identity)
    }
}

/// 成就派生视图
pub struct AchievementViews<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    achievement_repo: Arc<AR>,
    grants: Arc<GrantStore<AR, ER>>,
    invalidation: InvalidationCoordinator,
}

impl<AR, ER> AchievementViews<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    pub fn new(
        achievement_repo: Arc<AR>,
        grants: Arc<GrantStore<AR, ER>>,
        invalidation: InvalidationCoordinator,
    ) -> Self {
        Self {
            achievement_repo,
            grants,
            invalidation,
        }
    }

    /// 启用中的成就列表，可按事件过滤
    pub async fn enabled_achievements(&self, event: Option<&str>) -> Result<Vec<Achievement>> {
        let key = self.current_key(&ViewKey::enabled(event));
        if let Some(cached) = self.read(&key).await {
            return Ok(cached);
        }

        let achievements = self
            .achievement_repo
            .list(event.map(str::to_string), false)
            .await?;
        self.write(&key, &achievements).await;
        Ok(achievements)
    }

    /// 身份已获得且仍启用的成就
    pub async fn earned_achievements(&self, identity: &Identity) -> Result<Vec<Achievement>> {
        let key = self.current_key(&ViewKey::earned(identity));
        if let Some(cached) = self.read(&key).await {
            return Ok(cached);
        }

        let achievements = self.grants.list_earned_achievements(identity, false).await?;
        self.write(&key, &achievements).await;
        Ok(achievements)
    }

    /// 身份的总分，只计入启用中的成就
    pub async fn score_total(&self, identity: &Identity) -> Result<i64> {
        let key = self.current_key(&ViewKey::score(identity));
        if let Some(cached) = self.read(&key).await {
            return Ok(cached);
        }

        let total: i64 = self
            .earned_achievements(identity)
            .await?
            .iter()
            .map(|a| a.score)
            .sum();
        self.write(&key, &total).await;
        Ok(total)
    }

    /// 当前代数下的缓存键，必须在计算之前取得
    fn current_key(&self, key: &str) -> String {
        InvalidationCoordinator::versioned_key(self.invalidation.generation(), key)
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.invalidation.region().get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => {
                    debug!(key = %key, "视图缓存命中");
                    Some(parsed)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "视图缓存内容无法解析，重新计算");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "读取视图缓存失败，直接查询");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "视图序列化失败，跳过缓存");
                return;
            }
        };
        if let Err(e) = self.invalidation.region().put(key, value).await {
            warn!(key = %key, error = %e, "写入视图缓存失败");
        }
    }

    /// 当前代数下缓存中的原始视图，仅用于诊断
    pub async fn cached(&self, key: &str) -> Result<Option<Value>> {
        self.invalidation.region().get(&self.current_key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheRegion, MemoryCacheRegion};
    use crate::error::AchievementError;
    use crate::models::{AchievementDefinition, EarnedAchievement};
    use crate::repository::{MemoryAchievementRepository, MemoryEarnedAchievementRepository};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct Fixture {
        achievements: Arc<MemoryAchievementRepository>,
        earned: Arc<MemoryEarnedAchievementRepository>,
        views: AchievementViews<MemoryAchievementRepository, MemoryEarnedAchievementRepository>,
    }

    fn fixture(region: Arc<dyn CacheRegion>) -> Fixture {
        let achievements = Arc::new(MemoryAchievementRepository::new());
        let earned = Arc::new(MemoryEarnedAchievementRepository::new());
        let invalidation = InvalidationCoordinator::new(region);
        let grants = Arc::new(GrantStore::new(
            achievements.clone(),
            earned.clone(),
            invalidation.clone(),
        ));
        let views = AchievementViews::new(achievements.clone(), grants, invalidation);
        Fixture {
            achievements,
            earned,
            views,
        }
    }

    async fn earn(fx: &Fixture, name: &str, score: i64, identity: &Identity) -> Achievement {
        let achievement = Achievement::from_definition(
            Uuid::new_v4(),
            AchievementDefinition::new(name, score, "submission", "p"),
        );
        fx.achievements.insert(&achievement).await.unwrap();
        fx.earned
            .insert_if_absent(&EarnedAchievement::new(achievement.aid, identity.clone()))
            .await
            .unwrap();
        achievement
    }

    #[tokio::test]
    async fn test_score_total_is_cached_until_cleared() {
        let region = Arc::new(MemoryCacheRegion::new());
        let fx = fixture(region.clone());
        let team = Identity::team("a");
        earn(&fx, "First Blood", 100, &team).await;
        earn(&fx, "Speedrun", 50, &team).await;

        assert_eq!(fx.views.score_total(&team).await.unwrap(), 150);
        assert_eq!(fx.views.cached("score:team:a").await.unwrap(), Some(serde_json::json!(150)));

        // 绕过服务直接写存储，缓存保持旧值直到被清空
        earn(&fx, "Marathon", 25, &team).await;
        assert_eq!(fx.views.score_total(&team).await.unwrap(), 150);

        region.clear_all().await.unwrap();
        assert_eq!(fx.views.score_total(&team).await.unwrap(), 175);
    }

    #[tokio::test]
    async fn test_earned_views_skip_disabled() {
        let fx = fixture(Arc::new(MemoryCacheRegion::new()));
        let user = Identity::user("u1");
        let mut retired = earn(&fx, "Retired", 40, &user).await;
        earn(&fx, "Active", 10, &user).await;
        retired.disabled = true;
        fx.achievements.replace(&retired).await.unwrap();

        let earned = fx.views.earned_achievements(&user).await.unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(fx.views.score_total(&user).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_enabled_achievements_by_event() {
        let fx = fixture(Arc::new(MemoryCacheRegion::new()));
        earn(&fx, "First Blood", 100, &Identity::team("a")).await;

        assert_eq!(fx.views.enabled_achievements(Some("submission")).await.unwrap().len(), 1);
        assert!(fx.views.enabled_achievements(Some("login")).await.unwrap().is_empty());
        assert_eq!(fx.views.enabled_achievements(None).await.unwrap().len(), 1);
    }

    /// 始终失败的缓存区域
    struct Unavailable;

    #[async_trait]
    impl CacheRegion for Unavailable {
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(AchievementError::Internal("cache offline".to_string()))
        }

        async fn put(&self, _key: &str, _value: Value) -> Result<()> {
            Err(AchievementError::Internal("cache offline".to_string()))
        }

        async fn clear_all(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_store() {
        let fx = fixture(Arc::new(Unavailable));
        let team = Identity::team("a");
        earn(&fx, "First Blood", 100, &team).await;

        assert_eq!(fx.views.score_total(&team).await.unwrap(), 100);
        assert_eq!(fx.views.earned_achievements(&team).await.unwrap().len(), 1);
    }
}
