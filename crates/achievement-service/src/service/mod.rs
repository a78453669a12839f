//! 服务层
//!
//! 实现成就业务逻辑，协调仓储层、处理器与缓存失效。
//!
//! ## 模块结构
//!
//! - `dto`: 评估结果与重新评估报告
//! - `achievement_service`: 成就定义的查询与维护
//! - `grant_store`: 已获得记录的查询与批量撤销
//! - `grant_evaluator`: 单个身份的判定与记录对齐
//! - `reevaluation`: 单个或全部成就的重新评估
//! - `views`: 经缓存读取的派生视图

pub mod achievement_service;
pub mod dto;
pub mod grant_evaluator;
pub mod grant_store;
pub mod reevaluation;
pub mod views;

pub use achievement_service::AchievementService;
pub use dto::*;
pub use grant_evaluator::GrantEvaluator;
pub use grant_store::GrantStore;
pub use reevaluation::ReevaluationEngine;
pub use views::AchievementViews;
