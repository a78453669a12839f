//! 缓存区域实现
//!
//! - `MemoryCacheRegion`: 进程内 DashMap
//! - `RedisCacheRegion`: 基于共享 Redis 客户端，所有键挂在同一前缀下

use std::sync::Arc;

use achievement_shared::cache::{Cache, CacheKey};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// 缓存区域接口
///
/// 只支持整体清空，不提供单键失效
#[async_trait]
pub trait CacheRegion: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn put(&self, key: &str, value: Value) -> Result<()>;
    async fn clear_all(&self) -> Result<()>;
}

/// 进程内缓存区域
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheRegion {
    entries: Arc<DashMap<String, Value>>,
}

impl MemoryCacheRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheRegion for MemoryCacheRegion {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Redis 缓存区域
///
/// 视图不设置过期时间，生命周期完全由 `clear_all` 控制
#[derive(Clone)]
pub struct RedisCacheRegion {
    cache: Cache,
    prefix: String,
}

impl RedisCacheRegion {
    pub fn new(cache: Cache, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl CacheRegion for RedisCacheRegion {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = self.cache.get(&CacheKey::scoped(&self.prefix, key)).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.cache
            .set(&CacheKey::scoped(&self.prefix, key), &value, None)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let removed = self
            .cache
            .delete_pattern(&CacheKey::region_pattern(&self.prefix))
            .await?;
        debug!(prefix = %self.prefix, removed, "Redis 缓存区域已清空");
        Ok(())
    }
}
