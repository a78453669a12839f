//! 模块装配
//!
//! 按配置创建仓储、缓存区域与各服务，所有服务共享同一个缓存失效协调器。

use std::sync::Arc;

use achievement_shared::cache::Cache;
use achievement_shared::config::{AppConfig, CacheBackend};
use achievement_shared::database::Database;
use tracing::info;

use crate::cache::{CacheRegion, InvalidationCoordinator, MemoryCacheRegion, RedisCacheRegion};
use crate::error::Result;
use crate::processor::ProcessorRegistry;
use crate::repository::{
    AchievementRepository, AchievementRepositoryTrait, EarnedAchievementRepository,
    EarnedAchievementRepositoryTrait, MemoryAchievementRepository,
    MemoryEarnedAchievementRepository,
};
use crate::service::{
    AchievementService, AchievementViews, EvaluationConfig, GrantEvaluator, GrantStore,
    ReevaluationEngine,
};
use crate::settings::AchievementServiceConfig;

/// 装配完成的成就模块
pub struct AchievementModule<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    pub achievements: Arc<AchievementService<AR>>,
    pub grants: Arc<GrantStore<AR, ER>>,
    pub evaluator: Arc<GrantEvaluator<AR, ER>>,
    pub reevaluation: Arc<ReevaluationEngine<AR, ER>>,
    pub views: Arc<AchievementViews<AR, ER>>,
    pub invalidation: InvalidationCoordinator,
}

/// PostgreSQL 存储的模块
pub type PgAchievementModule = AchievementModule<AchievementRepository, EarnedAchievementRepository>;

/// 内存存储的模块，用于测试和本地开发
pub type MemoryAchievementModule =
    AchievementModule<MemoryAchievementRepository, MemoryEarnedAchievementRepository>;

impl<AR, ER> AchievementModule<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    /// 由已创建的依赖组装各服务
    pub fn assemble(
        achievement_repo: Arc<AR>,
        earned_repo: Arc<ER>,
        registry: ProcessorRegistry,
        region: Arc<dyn CacheRegion>,
        evaluation: EvaluationConfig,
    ) -> Self {
        let invalidation = InvalidationCoordinator::new(region);
        let registry = Arc::new(registry);

        let achievements = Arc::new(AchievementService::new(
            achievement_repo.clone(),
            invalidation.clone(),
        ));
        let grants = Arc::new(GrantStore::new(
            achievement_repo.clone(),
            earned_repo.clone(),
            invalidation.clone(),
        ));
        let evaluator = Arc::new(GrantEvaluator::new(
            achievement_repo.clone(),
            earned_repo,
            registry.clone(),
            invalidation.clone(),
            evaluation,
        ));
        let reevaluation = Arc::new(ReevaluationEngine::new(
            achievement_repo.clone(),
            evaluator.clone(),
            grants.clone(),
            invalidation.clone(),
        ));
        let views = Arc::new(AchievementViews::new(
            achievement_repo,
            grants.clone(),
            invalidation.clone(),
        ));

        info!(
            processors = ?registry.names(),
            max_concurrency = evaluator.config().max_concurrency,
            revocation_policy = ?evaluator.config().revocation_policy,
            "成就模块装配完成"
        );

        Self {
            achievements,
            grants,
            evaluator,
            reevaluation,
            views,
            invalidation,
        }
    }
}

impl PgAchievementModule {
    /// 连接数据库、执行迁移并按配置创建缓存区域
    pub async fn connect(
        config: &AchievementServiceConfig,
        registry: ProcessorRegistry,
    ) -> Result<Self> {
        let db = Database::connect_and_migrate(&config.app.database, &crate::MIGRATOR).await?;
        let pool = db.pool().clone();

        let region = cache_region(&config.app).await?;

        Ok(Self::assemble(
            Arc::new(AchievementRepository::new(pool.clone())),
            Arc::new(EarnedAchievementRepository::new(pool)),
            registry,
            region,
            config.evaluation.clone(),
        ))
    }
}

impl MemoryAchievementModule {
    /// 全部使用内存实现
    pub fn in_memory(registry: ProcessorRegistry, evaluation: EvaluationConfig) -> Self {
        Self::assemble(
            Arc::new(MemoryAchievementRepository::new()),
            Arc::new(MemoryEarnedAchievementRepository::new()),
            registry,
            Arc::new(MemoryCacheRegion::new()),
            evaluation,
        )
    }
}

/// 按配置创建缓存区域，Redis 后端会先做连通性检查
pub async fn cache_region(config: &AppConfig) -> Result<Arc<dyn CacheRegion>> {
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCacheRegion::new())),
        CacheBackend::Redis => {
            let cache = Cache::new(&config.redis)?;
            cache.health_check().await?;
            info!(prefix = %config.cache.key_prefix, "使用 Redis 缓存区域");
            Ok(Arc::new(RedisCacheRegion::new(
                cache,
                config.cache.key_prefix.clone(),
            )))
        }
    }
}
