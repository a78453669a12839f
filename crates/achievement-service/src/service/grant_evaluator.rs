//! 成就授予评估
//!
//! 针对单个 `(aid, 身份)` 调用处理器并对齐已获得记录：
//! 判定满足且无记录时插入，判定不满足且有记录时删除，其余情况不写入。
//!
//! ## 并发
//!
//! 同一键的调用通过进程内键锁串行执行，不同键之间完全并行。
//! 存储层的"不存在则插入"和"按键删除"保证跨进程时的原子性。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use achievement_shared::observability::metrics::{
    record_grant, record_processor_failure, record_revocations,
};
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{EvaluationConfig, EvaluationOutcome};
use crate::cache::{InvalidationCoordinator, InvalidationReason};
use crate::error::{AchievementError, Result};
use crate::models::{Achievement, EarnedAchievement, EarnedKey, Identity};
use crate::processor::{AchievementProcessor, EventContext, ProcessorInput, ProcessorRegistry};
use crate::repository::{AchievementRepositoryTrait, EarnedAchievementRepositoryTrait};

/// 成就授予评估器
pub struct GrantEvaluator<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    achievement_repo: Arc<AR>,
    earned_repo: Arc<ER>,
    registry: Arc<ProcessorRegistry>,
    invalidation: InvalidationCoordinator,
    config: EvaluationConfig,
    key_locks: DashMap<EarnedKey, Arc<Mutex<()>>>,
}

impl<AR, ER> GrantEvaluator<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    pub fn new(
        achievement_repo: Arc<AR>,
        earned_repo: Arc<ER>,
        registry: Arc<ProcessorRegistry>,
        invalidation: InvalidationCoordinator,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            achievement_repo,
            earned_repo,
            registry,
            invalidation,
            config,
            key_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// 仅做判定，不写入任何记录
    ///
    /// 处理器报错、超时或 panic 时返回 `Failed`，并记录日志和指标
    pub async fn evaluate(
        &self,
        achievement: &Achievement,
        processor: &dyn AchievementProcessor,
        identity: &Identity,
        context: EventContext,
    ) -> EvaluationOutcome {
        let input = ProcessorInput {
            aid: achievement.aid,
            identity: identity.clone(),
            context,
        };

        let timeout = self.config.processor_timeout();
        let guarded = AssertUnwindSafe(processor.evaluate(&input)).catch_unwind();
        match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(Ok(true))) => EvaluationOutcome::Qualified,
            Ok(Ok(Ok(false))) => EvaluationOutcome::NotQualified,
            Ok(Ok(Err(e))) => {
                let err = AchievementError::ProcessorFailed {
                    processor: processor.name().to_string(),
                    message: e.to_string(),
                };
                warn!(
                    aid = %achievement.aid,
                    identity = %identity,
                    processor = processor.name(),
                    error = %e,
                    "处理器执行失败"
                );
                record_processor_failure(processor.name(), "error");
                EvaluationOutcome::Failed(err.to_string())
            }
            Ok(Err(panic)) => {
                let message = panic_message(&*panic);
                error!(
                    aid = %achievement.aid,
                    identity = %identity,
                    processor = processor.name(),
                    panic = %message,
                    "处理器执行 panic"
                );
                record_processor_failure(processor.name(), "panic");
                EvaluationOutcome::Failed(
                    AchievementError::ProcessorFailed {
                        processor: processor.name().to_string(),
                        message: format!("panic: {}", message),
                    }
                    .to_string(),
                )
            }
            Err(_) => {
                let err = AchievementError::ProcessorTimeout {
                    processor: processor.name().to_string(),
                    timeout_ms: self.config.processor_timeout_ms,
                };
                warn!(
                    aid = %achievement.aid,
                    identity = %identity,
                    processor = processor.name(),
                    timeout_ms = self.config.processor_timeout_ms,
                    "处理器执行超时"
                );
                record_processor_failure(processor.name(), "timeout");
                EvaluationOutcome::Failed(err.to_string())
            }
        }
    }

    /// 评估并对齐单个身份的成就记录，返回对齐后的持有状态
    ///
    /// 处理器失败时不写入，返回原有状态；处理器未注册时返回 `ProcessorNotFound`
    #[instrument(skip(self, context), fields(event = %context.event))]
    pub async fn process_achievement(
        &self,
        aid: Uuid,
        identity: &Identity,
        context: EventContext,
    ) -> Result<bool> {
        let achievement = self
            .achievement_repo
            .find_by_aid(aid, true)
            .await?
            .ok_or_else(|| {
                error!(aid = %aid, "评估的成就不存在");
                AchievementError::achievement_not_found(aid)
            })?;
        let processor = self.registry.resolve(&achievement.processor)?;

        let key = EarnedKey::new(aid, identity.clone());
        let lock = self.key_locks.entry(key.clone()).or_default().value().clone();
        let result = {
            let _guard = lock.lock().await;
            self.reconcile(&achievement, processor.as_ref(), &key, context)
                .await
        };

        drop(lock);
        // 没有其他等待者时回收键锁
        self.key_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    /// 对事件绑定的全部启用成就执行评估
    ///
    /// 处理器未注册的成就记录错误后跳过，其余错误直接返回
    #[instrument(skip(self, context))]
    pub async fn process_event(
        &self,
        event: &str,
        identity: &Identity,
        context: EventContext,
    ) -> Result<Vec<(Uuid, bool)>> {
        let achievements = self
            .achievement_repo
            .list(Some(event.to_string()), false)
            .await?;

        let mut results = Vec::with_capacity(achievements.len());
        for achievement in achievements {
            match self
                .process_achievement(achievement.aid, identity, context.clone())
                .await
            {
                Ok(held) => results.push((achievement.aid, held)),
                Err(AchievementError::ProcessorNotFound(processor)) => {
                    error!(
                        aid = %achievement.aid,
                        processor = %processor,
                        "成就引用的处理器未注册，跳过"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            event = %event,
            identity = %identity,
            evaluated = results.len(),
            "事件评估完成"
        );
        Ok(results)
    }

    async fn reconcile(
        &self,
        achievement: &Achievement,
        processor: &dyn AchievementProcessor,
        key: &EarnedKey,
        context: EventContext,
    ) -> Result<bool> {
        let source = if context.reevaluation {
            "reevaluation"
        } else {
            "event"
        };
        let held = self.earned_repo.exists(key).await?;

        match self.evaluate(achievement, processor, &key.identity, context).await {
            EvaluationOutcome::Qualified if !held => {
                let record = EarnedAchievement::new(key.aid, key.identity.clone());
                if self.earned_repo.insert_if_absent(&record).await? {
                    record_grant(processor.name(), source);
                    self.invalidation
                        .invalidate(InvalidationReason::GrantAdded)
                        .await?;
                    info!(aid = %key.aid, identity = %key.identity, "成就已授予");
                }
                Ok(true)
            }
            EvaluationOutcome::NotQualified if held => {
                if self.earned_repo.delete(key).await? {
                    record_revocations(source, 1);
                    self.invalidation
                        .invalidate(InvalidationReason::GrantRemoved)
                        .await?;
                    info!(aid = %key.aid, identity = %key.identity, "成就已撤销");
                }
                Ok(false)
            }
            EvaluationOutcome::Qualified => Ok(true),
            EvaluationOutcome::NotQualified => Ok(false),
            EvaluationOutcome::Failed(reason) => {
                warn!(
                    aid = %key.aid,
                    identity = %key.identity,
                    held,
                    reason = %reason,
                    "无法判定，保留原有状态"
                );
                Ok(held)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
