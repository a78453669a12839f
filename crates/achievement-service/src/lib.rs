//! 成就服务
//!
//! 管理成就定义与已获得记录，负责成就的授予、撤销与重新评估。
//!
//! ## 核心功能
//!
//! - **成就定义**：创建、更新、上下线成就，定义经 schema 校验
//! - **授予评估**：调用处理器判定身份是否满足条件，对齐已获得记录
//! - **重新评估**：成就或处理器变化后重新判定全部持有者，撤销失效记录
//! - **缓存失效**：任何定义或记录的变更同步清空派生视图缓存
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `schema`: 成就定义校验
//! - `repository`: 仓储层（PostgreSQL 与内存实现）
//! - `processor`: 处理器 trait 与注册表
//! - `cache`: 缓存区域与失效协调
//! - `service`: 业务服务层
//! - `settings`: 服务配置
//! - `bootstrap`: 模块装配

pub mod bootstrap;
pub mod cache;
pub mod error;
pub mod models;
pub mod processor;
pub mod repository;
pub mod schema;
pub mod service;
pub mod settings;

pub use bootstrap::{AchievementModule, MemoryAchievementModule, PgAchievementModule};
pub use cache::{CacheRegion, InvalidationCoordinator, MemoryCacheRegion, RedisCacheRegion};
pub use error::{AchievementError, FieldViolation, Result};
pub use models::*;
pub use processor::{AchievementProcessor, EventContext, FnProcessor, ProcessorInput, ProcessorRegistry};
pub use service::{
    AchievementService, AchievementViews, EvaluationConfig, EvaluationOutcome, GrantEvaluator,
    GrantStore, ReevaluationEngine, ReevaluationReport, ReevaluationSummary, RevocationPolicy, dto,
};
pub use settings::AchievementServiceConfig;

/// 数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
