//! 数据访问层
//!
//! 提供成就定义与已获得记录的数据访问接口，封装存储细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - PostgreSQL 实现使用 SQLx 进行类型安全的数据库操作
//! - 内存实现基于 DashMap，用于测试和本地开发
//! - 定义 trait 接口以支持 mock 测试

mod achievement_repo;
mod earned_repo;
mod memory;
mod traits;

pub use achievement_repo::AchievementRepository;
pub use earned_repo::EarnedAchievementRepository;
pub use memory::{MemoryAchievementRepository, MemoryEarnedAchievementRepository};
pub use traits::*;
