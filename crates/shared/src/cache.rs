//! Redis 缓存管理模块
//!
//! 提供 Redis 连接管理和派生视图缓存所需的基础操作封装。

use crate::config::RedisConfig;
use crate::error::{Result, SharedError};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(SharedError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(SharedError::from)
    }

    /// 获取值
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    /// 设置值
    ///
    /// `ttl` 为 None 时不设置过期时间，由显式失效负责清理
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value)?;

        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, serialized, ttl.as_secs()).await?;
            }
            None => {
                let _: () = conn.set(key, serialized).await?;
            }
        }
        Ok(())
    }

    /// 批量删除（按模式）
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count: u64 = conn.del(keys).await?;
        Ok(count)
    }
}

/// 缓存键生成器
///
/// 所有派生视图键都挂在同一前缀下，便于整体清空
pub struct CacheKey;

impl CacheKey {
    pub fn scoped(prefix: &str, key: &str) -> String {
        format!("{}:{}", prefix, key)
    }

    /// 匹配前缀下全部键的模式
    pub fn region_pattern(prefix: &str) -> String {
        format!("{}:*", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(
            CacheKey::scoped("achievement:view", "list:all"),
            "achievement:view:list:all"
        );
        assert_eq!(
            CacheKey::region_pattern("achievement:view"),
            "achievement:view:*"
        );
    }

    #[test]
    fn test_cache_client_creation_is_lazy() {
        // Client::open 只解析 URL，不建立连接
        let cache = Cache::new(&RedisConfig::default());
        assert!(cache.is_ok());
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_set_get_delete_pattern() {
        let config = RedisConfig {
            url: std::env::var("TEST_REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/1".to_string()),
        };
        let cache = Cache::new(&config).unwrap();

        cache
            .set("test:view:a", &serde_json::json!({"score": 100}), None)
            .await
            .unwrap();
        let value: Option<serde_json::Value> = cache.get("test:view:a").await.unwrap();
        assert_eq!(value.unwrap()["score"], 100);

        let removed = cache.delete_pattern("test:view:*").await.unwrap();
        assert!(removed >= 1);
        let value: Option<serde_json::Value> = cache.get("test:view:a").await.unwrap();
        assert!(value.is_none());
    }
}
