//! 处理器注册表
//!
//! 启动时集中注册全部处理器，按名称路由。成就定义只保存处理器名，
//! 评估时才解析为具体实例。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::contract::AchievementProcessor;
use crate::error::{AchievementError, Result};

/// 处理器注册表
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn AchievementProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器
    ///
    /// 同名处理器会被替换
    pub fn register(&mut self, processor: Arc<dyn AchievementProcessor>) -> &mut Self {
        let name = processor.name().to_string();
        if self.processors.contains_key(&name) {
            warn!(processor = %name, "处理器重复注册，旧实例将被替换");
        } else {
            debug!(processor = %name, "注册成就处理器");
        }
        self.processors.insert(name, processor);
        self
    }

    /// 按名称解析处理器
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AchievementProcessor>> {
        self.processors
            .get(name)
            .cloned()
            .ok_or_else(|| AchievementError::ProcessorNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// 已注册的处理器名，按字典序
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}
