//! 成就重新评估引擎
//!
//! 成就定义或处理器逻辑变化后，按当前处理器重新判定已获得记录，
//! 撤销不再满足条件的记录并清空派生视图缓存。
//!
//! ## 执行流程
//!
//! 1. 解析成就与处理器，处理器未注册时不做任何变更
//! 2. 并发判定该成就的全部持有者，并发度受 `max_concurrency` 限制
//! 3. 判定失败的身份按撤销策略归入保留或撤销
//! 4. 撤销集合通过一次批量删除完成
//!
//! 引擎本身无状态，不同成就之间互不影响。

use std::sync::Arc;
use std::time::Instant;

use achievement_shared::observability::metrics::record_reevaluation;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::dto::{
    EvaluationOutcome, FailedEvaluation, ReevaluationReport, ReevaluationSummary,
    SkippedAchievement,
};
use super::grant_evaluator::GrantEvaluator;
use super::grant_store::GrantStore;
use crate::cache::{InvalidationCoordinator, InvalidationReason};
use crate::error::{AchievementError, Result};
use crate::models::{EarnedFilter, EarnedKey, Identity};
use crate::processor::EventContext;
use crate::repository::{AchievementRepositoryTrait, EarnedAchievementRepositoryTrait};

/// 重新评估引擎
pub struct ReevaluationEngine<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    achievement_repo: Arc<AR>,
    evaluator: Arc<GrantEvaluator<AR, ER>>,
    grants: Arc<GrantStore<AR, ER>>,
    invalidation: InvalidationCoordinator,
}

impl<AR, ER> ReevaluationEngine<AR, ER>
where
    AR: AchievementRepositoryTrait,
    ER: EarnedAchievementRepositoryTrait,
{
    pub fn new(
        achievement_repo: Arc<AR>,
        evaluator: Arc<GrantEvaluator<AR, ER>>,
        grants: Arc<GrantStore<AR, ER>>,
        invalidation: InvalidationCoordinator,
    ) -> Self {
        Self {
            achievement_repo,
            evaluator,
            grants,
            invalidation,
        }
    }

    /// 重新评估单个成就的全部已获得记录
    #[instrument(skip(self))]
    pub async fn reevaluate_one(&self, aid: Uuid) -> Result<ReevaluationReport> {
        let started = Instant::now();
        let report = self.reevaluate(aid).await?;
        record_reevaluation(
            "one",
            report.revoked_count(),
            started.elapsed().as_secs_f64(),
        );
        Ok(report)
    }

    /// 重新评估所有存在已获得记录的成就（包含已下线成就）
    ///
    /// 开始前和结束后各清空一次缓存，避免读取方看到中间状态
    #[instrument(skip(self))]
    pub async fn reevaluate_all(&self) -> Result<ReevaluationSummary> {
        let started = Instant::now();
        self.invalidation
            .invalidate(InvalidationReason::ReevaluationStarted)
            .await?;

        let aids = self.grants.list_earned_aids_with_records().await?;
        info!(achievement_count = aids.len(), "开始全量重新评估");

        let mut summary = ReevaluationSummary::default();
        for aid in aids {
            match self.reevaluate(aid).await {
                Ok(report) => summary.reports.push(report),
                Err(AchievementError::ProcessorNotFound(processor)) => {
                    error!(aid = %aid, processor = %processor, "处理器未注册，跳过该成就");
                    summary.skipped.push(SkippedAchievement { aid, processor });
                }
                Err(e) => return Err(e),
            }
        }

        self.invalidation
            .invalidate(InvalidationReason::ReevaluationFinished)
            .await?;
        record_reevaluation(
            "all",
            summary.total_revoked(),
            started.elapsed().as_secs_f64(),
        );

        info!(
            reevaluated = summary.reports.len(),
            skipped = summary.skipped.len(),
            revoked = summary.total_revoked(),
            failed = summary.total_failed(),
            "全量重新评估完成"
        );
        Ok(summary)
    }

    async fn reevaluate(&self, aid: Uuid) -> Result<ReevaluationReport> {
        let achievement = self
            .achievement_repo
            .find_by_aid(aid, true)
            .await?
            .ok_or_else(|| {
                error!(aid = %aid, "重新评估的成就不存在");
                AchievementError::achievement_not_found(aid)
            })?;
        let processor = self.evaluator.registry().resolve(&achievement.processor)?;

        let holders: Vec<Identity> = self
            .grants
            .list_earned(EarnedFilter::for_aid(aid))
            .await?
            .into_iter()
            .map(|record| record.identity)
            .collect();

        let config = self.evaluator.config();
        let evaluator = self.evaluator.as_ref();
        let achievement_ref = &achievement;
        let processor_ref = processor.as_ref();

        let outcomes: Vec<(Identity, EvaluationOutcome)> = stream::iter(holders)
            .map(move |identity| async move {
                let context = EventContext::reevaluation(achievement_ref.event.as_str());
                let outcome = evaluator
                    .evaluate(achievement_ref, processor_ref, &identity, context)
                    .await;
                (identity, outcome)
            })
            .buffer_unordered(config.concurrency())
            .collect()
            .await;

        let mut report = ReevaluationReport::new(aid);
        report.evaluated = outcomes.len();
        for (identity, outcome) in outcomes {
            match outcome {
                EvaluationOutcome::Qualified => report.retained.push(identity),
                EvaluationOutcome::NotQualified => report.revoked.push(identity),
                EvaluationOutcome::Failed(reason) => {
                    if config.revocation_policy.revokes_on_failure() {
                        report.revoked.push(identity.clone());
                    } else {
                        report.retained.push(identity.clone());
                    }
                    report.failed.push(FailedEvaluation { identity, reason });
                }
            }
        }
        report.retained.sort();
        report.revoked.sort();
        report.failed.sort_by(|a, b| a.identity.cmp(&b.identity));

        let keys: Vec<EarnedKey> = report
            .revoked
            .iter()
            .map(|identity| EarnedKey::new(aid, identity.clone()))
            .collect();
        let removed = self.grants.remove_many(&keys).await?;
        if removed < keys.len() as u64 {
            debug!(
                aid = %aid,
                expected = keys.len(),
                removed,
                "部分记录已被并发撤销"
            );
        }

        info!(
            aid = %aid,
            processor = %achievement.processor,
            evaluated = report.evaluated,
            retained = report.retained.len(),
            revoked = report.revoked.len(),
            failed = report.failed.len(),
            "成就重新评估完成"
        );
        Ok(report)
    }
}
