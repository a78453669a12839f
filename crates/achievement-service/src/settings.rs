//! 成就服务配置
//!
//! 在共享的 `AppConfig` 之上增加 `evaluation` 配置段，加载顺序与环境变量
//! 覆盖规则同共享配置（如 `ACHIEVEMENT_EVALUATION__MAX_CONCURRENCY=16`）。

use achievement_shared::config::{AppConfig, layered};
use config::ConfigError;
use serde::Deserialize;

use crate::service::EvaluationConfig;

/// 服务名，同时决定 `config/{service_name}.toml` 文件名
pub const SERVICE_NAME: &str = "achievement-service";

/// 成就服务配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AchievementServiceConfig {
    #[serde(flatten)]
    pub app: AppConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl AchievementServiceConfig {
    /// 从配置文件和环境变量加载
    pub fn load() -> Result<Self, ConfigError> {
        layered(SERVICE_NAME)?.try_deserialize()
    }
}
