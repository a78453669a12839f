//! 缓存失效协调
//!
//! 持有进程唯一的缓存区域句柄，所有有失效权限的组件共享同一个协调器。
//! 失效在触发变更的调用链内同步完成，调用返回前缓存已清空。
//!
//! 协调器同时维护缓存代数。视图键带上读取开始时的代数，失效先递增代数再清空，
//! 与失效并发的读取即使晚于清空写入，也只会落在旧代数的键上，之后的读取不会命中。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use achievement_shared::observability::metrics::record_cache_invalidation;
use tracing::debug;

use super::region::CacheRegion;
use crate::error::Result;

/// 失效原因，用于日志与指标标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    AchievementCreated,
    AchievementUpdated,
    GrantAdded,
    GrantRemoved,
    GrantsRemoved,
    ReevaluationStarted,
    ReevaluationFinished,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AchievementCreated => "achievement_created",
            Self::AchievementUpdated => "achievement_updated",
            Self::GrantAdded => "grant_added",
            Self::GrantRemoved => "grant_removed",
            Self::GrantsRemoved => "grants_removed",
            Self::ReevaluationStarted => "reevaluation_started",
            Self::ReevaluationFinished => "reevaluation_finished",
        }
    }
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 缓存失效协调器
#[derive(Clone)]
pub struct InvalidationCoordinator {
    region: Arc<dyn CacheRegion>,
    generation: Arc<AtomicU64>,
}

impl InvalidationCoordinator {
    pub fn new(region: Arc<dyn CacheRegion>) -> Self {
        Self {
            region,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 当前缓存代数
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 带代数的视图键
    pub fn versioned_key(generation: u64, key: &str) -> String {
        format!("g{}:{}", generation, key)
    }

    /// 缓存区域句柄，供派生视图读写
    pub fn region(&self) -> Arc<dyn CacheRegion> {
        Arc::clone(&self.region)
    }

    /// 递增代数并清空整个缓存区域
    ///
    /// 清空失败时代数已递增，旧键不会再被读取
    pub async fn invalidate(&self, reason: InvalidationReason) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.region.clear_all().await?;
        record_cache_invalidation(reason.as_str());
        debug!(reason = %reason, generation, "派生视图缓存已失效");
        Ok(())
    }
}
