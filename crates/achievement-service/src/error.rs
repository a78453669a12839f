//! 成就服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use achievement_shared::error::SharedError;
use serde::Serialize;
use thiserror::Error;

/// 字段级校验失败信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 成就服务错误类型
#[derive(Debug, Error)]
pub enum AchievementError {
    // === 调用方错误 ===
    #[error("参数错误: {0}")]
    InvalidArgument(String),

    #[error("成就定义校验失败: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("成就名称已存在: {name}")]
    Conflict { name: String },

    // === 数据一致性错误 ===
    #[error("记录未找到: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    // === 处理器错误 ===
    #[error("处理器未注册: {0}")]
    ProcessorNotFound(String),

    #[error("处理器执行失败: processor={processor}, {message}")]
    ProcessorFailed { processor: String, message: String },

    #[error("处理器执行超时: processor={processor}, timeout_ms={timeout_ms}")]
    ProcessorTimeout { processor: String, timeout_ms: u64 },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("基础设施错误: {0}")]
    Infra(#[from] SharedError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 成就服务 Result 类型别名
pub type Result<T> = std::result::Result<T, AchievementError>;

impl AchievementError {
    /// 单字段校验失败的便捷构造
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn achievement_not_found(key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: "achievement",
            key: key.to_string(),
        }
    }

    /// 是否为严重错误
    ///
    /// 调用方理应已确认实体存在，出现 NotFound 说明数据不一致，不应被吞掉后继续执行
    pub fn is_severe(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Internal(_))
    }

    /// 是否为处理器执行层面的失败（可按撤销策略降级处理）
    pub fn is_processor_failure(&self) -> bool {
        matches!(
            self,
            Self::ProcessorFailed { .. } | Self::ProcessorTimeout { .. }
        )
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ProcessorNotFound(_) => "PROCESSOR_NOT_FOUND",
            Self::ProcessorFailed { .. } => "PROCESSOR_FAILED",
            Self::ProcessorTimeout { .. } => "PROCESSOR_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Infra(_) => "INFRA_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
