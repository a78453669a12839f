//! 已获得成就仓储
//!
//! 基于 PostgreSQL 的已获得记录数据访问，依赖 `(aid, identity_kind, identity_id)`
//! 唯一约束保证同一身份不会重复持有同一成就

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::EarnedAchievementRepositoryTrait;
use crate::error::Result;
use crate::models::{EarnedAchievement, EarnedFilter, EarnedKey, Identity};

/// 数据库行结构
#[derive(Debug, sqlx::FromRow)]
struct EarnedRow {
    aid: Uuid,
    identity_kind: String,
    identity_id: String,
    earned_at: DateTime<Utc>,
}

impl TryFrom<EarnedRow> for EarnedAchievement {
    type Error = crate::error::AchievementError;

    fn try_from(row: EarnedRow) -> Result<Self> {
        Ok(Self {
            aid: row.aid,
            identity: Identity::from_parts(&row.identity_kind, row.identity_id)?,
            earned_at: row.earned_at,
        })
    }
}

/// 已获得成就仓储
pub struct EarnedAchievementRepository {
    pool: PgPool,
}

impl EarnedAchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 按条件列出已获得记录
    pub async fn list(&self, filter: EarnedFilter) -> Result<Vec<EarnedAchievement>> {
        let kind = filter.identity.as_ref().map(|i| i.kind());
        let id = filter.identity.as_ref().map(|i| i.id().to_string());

        let rows = sqlx::query_as::<_, EarnedRow>(
            r#"
            SELECT aid, identity_kind, identity_id, earned_at
            FROM earned_achievements
            WHERE ($1::TEXT IS NULL OR (identity_kind = $1 AND identity_id = $2))
              AND ($3::UUID IS NULL OR aid = $3)
            ORDER BY id ASC
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(filter.aid)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EarnedAchievement::try_from).collect()
    }

    /// 检查记录是否存在
    pub async fn exists(&self, key: &EarnedKey) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM earned_achievements
                WHERE aid = $1 AND identity_kind = $2 AND identity_id = $3
            )
            "#,
        )
        .bind(key.aid)
        .bind(key.identity.kind())
        .bind(key.identity.id())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// 至少存在一条记录的成就 ID
    pub async fn distinct_aids(&self) -> Result<Vec<Uuid>> {
        let aids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT aid FROM earned_achievements
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(aids.into_iter().map(|(aid,)| aid).collect())
    }

    // ==================== 写入操作 ====================

    /// 不存在则插入
    ///
    /// 依赖唯一约束，并发插入同一键时只有一个成功
    pub async fn insert_if_absent(&self, record: &EarnedAchievement) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO earned_achievements (aid, identity_kind, identity_id, earned_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (aid, identity_kind, identity_id) DO NOTHING
            "#,
        )
        .bind(record.aid)
        .bind(record.identity.kind())
        .bind(record.identity.id())
        .bind(record.earned_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 按键删除
    pub async fn delete(&self, key: &EarnedKey) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM earned_achievements
            WHERE aid = $1 AND identity_kind = $2 AND identity_id = $3
            "#,
        )
        .bind(key.aid)
        .bind(key.identity.kind())
        .bind(key.identity.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 批量删除
    ///
    /// 将键集合展开为三个并行数组，单条语句完成删除
    pub async fn delete_many(&self, keys: &[EarnedKey]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let aids: Vec<Uuid> = keys.iter().map(|k| k.aid).collect();
        let kinds: Vec<String> = keys.iter().map(|k| k.identity.kind().to_string()).collect();
        let ids: Vec<String> = keys.iter().map(|k| k.identity.id().to_string()).collect();

        let result = sqlx::query(
            r#"
            DELETE FROM earned_achievements e
            USING UNNEST($1::UUID[], $2::TEXT[], $3::TEXT[]) AS k(aid, identity_kind, identity_id)
            WHERE e.aid = k.aid
              AND e.identity_kind = k.identity_kind
              AND e.identity_id = k.identity_id
            "#,
        )
        .bind(&aids)
        .bind(&kinds)
        .bind(&ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EarnedAchievementRepositoryTrait for EarnedAchievementRepository {
    async fn list(&self, filter: EarnedFilter) -> Result<Vec<EarnedAchievement>> {
        self.list(filter).await
    }

    async fn exists(&self, key: &EarnedKey) -> Result<bool> {
        self.exists(key).await
    }

    async fn insert_if_absent(&self, record: &EarnedAchievement) -> Result<bool> {
        self.insert_if_absent(record).await
    }

    async fn delete(&self, key: &EarnedKey) -> Result<bool> {
        self.delete(key).await
    }

    async fn delete_many(&self, keys: &[EarnedKey]) -> Result<u64> {
        self.delete_many(keys).await
    }

    async fn distinct_aids(&self) -> Result<Vec<Uuid>> {
        self.distinct_aids().await
    }
}
