//! 成就定义仓储
//!
//! 基于 PostgreSQL 的成就定义数据访问

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::AchievementRepositoryTrait;
use crate::error::{AchievementError, Result};
use crate::models::Achievement;

/// 启用成就名称唯一索引冲突转换为业务冲突
fn map_name_conflict(err: sqlx::Error, name: &str) -> AchievementError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        return AchievementError::Conflict {
            name: name.to_string(),
        };
    }
    AchievementError::Database(err)
}

/// 成就定义仓储
///
/// `disabled` 过滤统一写成 `($n OR disabled = FALSE)`，由参数决定是否包含已下线成就
pub struct AchievementRepository {
    pool: PgPool,
}

impl AchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 按 aid 获取成就
    pub async fn find_by_aid(
        &self,
        aid: Uuid,
        include_disabled: bool,
    ) -> Result<Option<Achievement>> {
        let achievement = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT aid, name, score, event, processor, hidden, image, disabled
            FROM achievements
            WHERE aid = $1 AND ($2 OR disabled = FALSE)
            "#,
        )
        .bind(aid)
        .bind(include_disabled)
        .fetch_optional(&self.pool)
        .await?;

        Ok(achievement)
    }

    /// 按名称获取成就
    ///
    /// 同名的已下线成就可能有多条，取最早插入的一条
    pub async fn find_by_name(
        &self,
        name: &str,
        include_disabled: bool,
    ) -> Result<Option<Achievement>> {
        let achievement = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT aid, name, score, event, processor, hidden, image, disabled
            FROM achievements
            WHERE name = $1 AND ($2 OR disabled = FALSE)
            ORDER BY disabled ASC, seq ASC
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(include_disabled)
        .fetch_optional(&self.pool)
        .await?;

        Ok(achievement)
    }

    /// 列出成就，可按事件过滤
    pub async fn list(
        &self,
        event: Option<String>,
        include_disabled: bool,
    ) -> Result<Vec<Achievement>> {
        let achievements = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT aid, name, score, event, processor, hidden, image, disabled
            FROM achievements
            WHERE ($1::TEXT IS NULL OR event = $1) AND ($2 OR disabled = FALSE)
            ORDER BY score ASC, seq ASC
            "#,
        )
        .bind(event)
        .bind(include_disabled)
        .fetch_all(&self.pool)
        .await?;

        Ok(achievements)
    }

    /// 列出去重后的事件类型
    pub async fn distinct_events(&self, include_disabled: bool) -> Result<BTreeSet<String>> {
        let events: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT event
            FROM achievements
            WHERE ($1 OR disabled = FALSE)
            "#,
        )
        .bind(include_disabled)
        .fetch_all(&self.pool)
        .await?;

        Ok(events.into_iter().map(|(event,)| event).collect())
    }

    // ==================== 写入操作 ====================

    /// 插入新成就
    pub async fn insert(&self, achievement: &Achievement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO achievements (aid, name, score, event, processor, hidden, image, disabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(achievement.aid)
        .bind(&achievement.name)
        .bind(achievement.score)
        .bind(&achievement.event)
        .bind(&achievement.processor)
        .bind(achievement.hidden)
        .bind(&achievement.image)
        .bind(achievement.disabled)
        .execute(&self.pool)
        .await
        .map_err(|e| map_name_conflict(e, &achievement.name))?;

        Ok(())
    }

    /// 整文档替换（保留 aid 与插入顺序）
    pub async fn replace(&self, achievement: &Achievement) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE achievements
            SET name = $2, score = $3, event = $4, processor = $5,
                hidden = $6, image = $7, disabled = $8
            WHERE aid = $1
            "#,
        )
        .bind(achievement.aid)
        .bind(&achievement.name)
        .bind(achievement.score)
        .bind(&achievement.event)
        .bind(&achievement.processor)
        .bind(achievement.hidden)
        .bind(&achievement.image)
        .bind(achievement.disabled)
        .execute(&self.pool)
        .await
        .map_err(|e| map_name_conflict(e, &achievement.name))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AchievementRepositoryTrait for AchievementRepository {
    async fn find_by_aid(&self, aid: Uuid, include_disabled: bool) -> Result<Option<Achievement>> {
        self.find_by_aid(aid, include_disabled).await
    }

    async fn find_by_name(
        &self,
        name: &str,
        include_disabled: bool,
    ) -> Result<Option<Achievement>> {
        self.find_by_name(name, include_disabled).await
    }

    async fn list(
        &self,
        event: Option<String>,
        include_disabled: bool,
    ) -> Result<Vec<Achievement>> {
        self.list(event, include_disabled).await
    }

    async fn distinct_events(&self, include_disabled: bool) -> Result<BTreeSet<String>> {
        self.distinct_events(include_disabled).await
    }

    async fn insert(&self, achievement: &Achievement) -> Result<()> {
        self.insert(achievement).await
    }

    async fn replace(&self, achievement: &Achievement) -> Result<bool> {
        self.replace(achievement).await
    }
}
