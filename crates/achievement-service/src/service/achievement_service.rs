//! 成就定义服务
//!
//! 负责成就定义的查询、创建与更新。所有写操作先经 schema 校验，
//! 成功落库后同步清空派生视图缓存。

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::cache::{InvalidationCoordinator, InvalidationReason};
use crate::error::{AchievementError, Result};
use crate::models::{Achievement, AchievementDefinition, AchievementSelector, SelectorKey};
use crate::repository::AchievementRepositoryTrait;
use crate::schema::{AchievementSchema, merge_document};

/// 成就定义服务
pub struct AchievementService<AR>
where
    AR: AchievementRepositoryTrait,
{
    achievement_repo: Arc<AR>,
    invalidation: InvalidationCoordinator,
    /// 串行化进程内的写操作，名称唯一检查与写入之间不被其他写入穿插
    write_lock: Mutex<()>,
}

impl<AR> AchievementService<AR>
where
    AR: AchievementRepositoryTrait,
{
    pub fn new(achievement_repo: Arc<AR>, invalidation: InvalidationCoordinator) -> Self {
        Self {
            achievement_repo,
            invalidation,
            write_lock: Mutex::new(()),
        }
    }

    // ==================== 查询 ====================

    /// 按 aid 或名称获取成就
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        selector: &AchievementSelector,
        include_disabled: bool,
    ) -> Result<Achievement> {
        let found = match selector.key()? {
            SelectorKey::Aid(aid) => self.achievement_repo.find_by_aid(aid, include_disabled).await?,
            SelectorKey::Name(name) => {
                self.achievement_repo
                    .find_by_name(name, include_disabled)
                    .await?
            }
        };

        found.ok_or_else(|| {
            error!(selector = %selector, include_disabled, "成就不存在");
            AchievementError::achievement_not_found(selector)
        })
    }

    /// 列出成就，按分数升序
    pub async fn list(&self, event: Option<&str>, include_disabled: bool) -> Result<Vec<Achievement>> {
        self.achievement_repo
            .list(event.map(str::to_string), include_disabled)
            .await
    }

    /// 列出去重后的事件类型
    pub async fn list_distinct_events(&self, include_disabled: bool) -> Result<BTreeSet<String>> {
        self.achievement_repo.distinct_events(include_disabled).await
    }

    // ==================== 写入 ====================

    /// 由定义文档创建成就
    #[instrument(skip(self, document))]
    pub async fn create(&self, document: Value) -> Result<Achievement> {
        let definition = AchievementSchema::validate(&document)?;

        let _guard = self.write_lock.lock().await;
        self.ensure_name_available(&definition, None).await?;

        let achievement = Achievement::from_definition(Uuid::new_v4(), definition);
        self.achievement_repo.insert(&achievement).await?;
        self.invalidation
            .invalidate(InvalidationReason::AchievementCreated)
            .await?;

        info!(
            aid = %achievement.aid,
            name = %achievement.name,
            event = %achievement.event,
            processor = %achievement.processor,
            "成就已创建"
        );
        Ok(achievement)
    }

    /// 由强类型定义创建成就，与文档创建走同一校验路径
    pub async fn create_definition(&self, definition: AchievementDefinition) -> Result<Achievement> {
        self.create(serde_json::to_value(definition)?).await
    }

    /// 以顶层字段覆盖方式更新成就
    ///
    /// 合并后的完整文档重新校验，`aid` 保持不变
    #[instrument(skip(self, patch))]
    pub async fn update(&self, aid: Uuid, patch: Value) -> Result<Achievement> {
        let Value::Object(patch) = patch else {
            return Err(AchievementError::validation("$", "更新内容必须是 JSON 对象"));
        };

        let _guard = self.write_lock.lock().await;
        let current = self.require(aid).await?;

        let merged = merge_document(current.to_document()?, &patch);
        let definition = AchievementSchema::validate(&Value::Object(merged))?;
        self.ensure_name_available(&definition, Some(aid)).await?;

        let updated = Achievement::from_definition(aid, definition);
        if !self.achievement_repo.replace(&updated).await? {
            error!(aid = %aid, "成就在更新过程中消失");
            return Err(AchievementError::achievement_not_found(aid));
        }
        self.invalidation
            .invalidate(InvalidationReason::AchievementUpdated)
            .await?;

        info!(
            aid = %aid,
            fields = ?patch.keys().collect::<Vec<_>>(),
            disabled = updated.disabled,
            "成就已更新"
        );
        Ok(updated)
    }

    /// 上线或下线成就
    pub async fn set_disabled(&self, aid: Uuid, disabled: bool) -> Result<Achievement> {
        self.update(aid, json!({ "disabled": disabled })).await
    }

    // ==================== 内部方法 ====================

    /// 获取成就（包含已下线），不存在视为数据不一致
    async fn require(&self, aid: Uuid) -> Result<Achievement> {
        self.achievement_repo
            .find_by_aid(aid, true)
            .await?
            .ok_or_else(|| {
                error!(aid = %aid, "成就不存在");
                AchievementError::achievement_not_found(aid)
            })
    }

    /// 启用状态的定义不得与其他启用成就重名
    async fn ensure_name_available(
        &self,
        definition: &AchievementDefinition,
        own_aid: Option<Uuid>,
    ) -> Result<()> {
        if definition.disabled {
            return Ok(());
        }

        match self.achievement_repo.find_by_name(&definition.name, false).await? {
            Some(existing) if Some(existing.aid) != own_aid => Err(AchievementError::Conflict {
                name: definition.name.clone(),
            }),
            _ => Ok(()),
        }
    }
}
