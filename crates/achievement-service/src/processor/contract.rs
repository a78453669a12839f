//! 处理器 Trait 定义
//!
//! 处理器是纯判定逻辑：读取外部状态，返回身份是否满足条件，
//! 不直接写入已获得成就记录。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Identity;

/// 触发评估的事件上下文
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// 事件类型标签
    pub event: String,
    /// 事件携带的业务数据，由处理器自行解释
    #[serde(default)]
    pub payload: Value,
    /// 是否由重新评估发起，而非实时事件
    #[serde(default)]
    pub reevaluation: bool,
}

impl EventContext {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            reevaluation: false,
        }
    }

    /// 重新评估时使用的上下文，不携带事件数据
    pub fn reevaluation(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: Value::Null,
            reevaluation: true,
        }
    }
}

/// 处理器输入
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorInput {
    pub aid: Uuid,
    pub identity: Identity,
    pub context: EventContext,
}

/// 成就处理器 Trait
///
/// # 约定
///
/// - 同一外部状态下多次调用结果相同
/// - 不得修改已获得成就记录，授予与撤销由评估器统一完成
/// - 返回 `Err` 表示无法判定，调用方按撤销策略处理
///
/// # 示例
///
/// ```ignore
/// struct FirstBlood {
///     solves: Arc<SolveLog>,
/// }
///
/// #[async_trait]
/// impl AchievementProcessor for FirstBlood {
///     fn name(&self) -> &str {
///         "first_blood"
///     }
///
///     async fn evaluate(&self, input: &ProcessorInput) -> Result<bool> {
///         Ok(self.solves.first_solver().await? == Some(input.identity.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait AchievementProcessor: Send + Sync {
    /// 注册名，与成就定义中的 `processor` 字段对应
    fn name(&self) -> &str;

    /// 判定身份当前是否满足成就条件
    async fn evaluate(&self, input: &ProcessorInput) -> Result<bool>;
}

type Predicate = dyn Fn(&ProcessorInput) -> Result<bool> + Send + Sync;

/// 以闭包实现的处理器
///
/// 适用于不需要异步 IO 的简单判定
pub struct FnProcessor {
    name: String,
    predicate: Box<Predicate>,
}

impl FnProcessor {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ProcessorInput) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    /// 恒定返回给定结果
    pub fn constant(name: impl Into<String>, qualified: bool) -> Self {
        Self::new(name, move |_| Ok(qualified))
    }
}

impl fmt::Debug for FnProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AchievementProcessor for FnProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, input: &ProcessorInput) -> Result<bool> {
        (self.predicate)(input)
    }
}
