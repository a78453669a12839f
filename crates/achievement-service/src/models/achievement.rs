//! 成就定义实体
//!
//! 成就由存储层分配 `aid`，客户端只提交不含标识的定义文档。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AchievementError, Result};

/// 成就定义
///
/// 持久化后的完整记录，`aid` 创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Achievement {
    pub aid: Uuid,
    /// 展示名称，启用中的成就之间唯一
    pub name: String,
    /// 分值
    pub score: i64,
    /// 触发评估的事件类型标签
    pub event: String,
    /// 处理器注册名
    pub processor: String,
    /// 是否对未获得者隐藏
    pub hidden: bool,
    /// 图片路径
    pub image: String,
    /// 下线后不参与常规查询与事件评估
    pub disabled: bool,
}

impl Achievement {
    /// 由已校验的定义生成完整记录
    pub fn from_definition(aid: Uuid, definition: AchievementDefinition) -> Self {
        Self {
            aid,
            name: definition.name,
            score: definition.score,
            event: definition.event,
            processor: definition.processor,
            hidden: definition.hidden,
            image: definition.image,
            disabled: definition.disabled,
        }
    }

    /// 去掉 `aid` 后的定义文档，用于更新时的合并与重新校验
    pub fn to_document(&self) -> Result<Map<String, Value>> {
        let definition = AchievementDefinition {
            name: self.name.clone(),
            score: self.score,
            event: self.event.clone(),
            processor: self.processor.clone(),
            hidden: self.hidden,
            image: self.image.clone(),
            disabled: self.disabled,
        };

        match serde_json::to_value(definition)? {
            Value::Object(map) => Ok(map),
            other => Err(AchievementError::Internal(format!(
                "成就定义序列化结果不是对象: {}",
                other
            ))),
        }
    }
}

/// 成就定义（输入形态）
///
/// 字段级约束由 `validator` 派生，类型与必填检查在 `schema` 模块完成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AchievementDefinition {
    #[validate(length(min = 1, message = "成就名称不能为空"))]
    pub name: String,
    #[validate(range(min = 0, message = "分数必须是非负整数"))]
    pub score: i64,
    #[validate(length(min = 1, message = "事件类型不能为空"))]
    pub event: String,
    #[validate(length(min = 1, message = "处理器名称不能为空"))]
    pub processor: String,
    pub hidden: bool,
    pub image: String,
    #[serde(default)]
    pub disabled: bool,
}

impl AchievementDefinition {
    pub fn new(
        name: impl Into<String>,
        score: i64,
        event: impl Into<String>,
        processor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            score,
            event: event.into(),
            processor: processor.into(),
            hidden: false,
            image: String::new(),
            disabled: false,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// 单个成就的查询条件
///
/// `aid` 与 `name` 必须且只能提供一个
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementSelector {
    pub aid: Option<Uuid>,
    pub name: Option<String>,
}

/// 校验后的查询键
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKey<'a> {
    Aid(Uuid),
    Name(&'a str),
}

impl AchievementSelector {
    pub fn by_aid(aid: Uuid) -> Self {
        Self {
            aid: Some(aid),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            aid: None,
            name: Some(name.into()),
        }
    }

    pub fn key(&self) -> Result<SelectorKey<'_>> {
        match (&self.aid, &self.name) {
            (Some(aid), None) => Ok(SelectorKey::Aid(*aid)),
            (None, Some(name)) => Ok(SelectorKey::Name(name)),
            (Some(_), Some(_)) => Err(AchievementError::InvalidArgument(
                "aid 与 name 只能提供一个".to_string(),
            )),
            (None, None) => Err(AchievementError::InvalidArgument(
                "必须提供 aid 或 name".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for AchievementSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.aid, &self.name) {
            (Some(aid), _) => write!(f, "aid={}", aid),
            (None, Some(name)) => write!(f, "name={}", name),
            (None, None) => write!(f, "<empty>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_requires_exactly_one_key() {
        let aid = Uuid::new_v4();
        assert_eq!(
            AchievementSelector::by_aid(aid).key().unwrap(),
            SelectorKey::Aid(aid)
        );
        assert_eq!(
            AchievementSelector::by_name("First Blood").key().unwrap(),
            SelectorKey::Name("First Blood")
        );

        let both = AchievementSelector {
            aid: Some(aid),
            name: Some("First Blood".to_string()),
        };
        assert!(matches!(
            both.key(),
            Err(AchievementError::InvalidArgument(_))
        ));
        assert!(matches!(
            AchievementSelector::default().key(),
            Err(AchievementError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_document_omits_aid() {
        let achievement = Achievement::from_definition(
            Uuid::new_v4(),
            AchievementDefinition::new("First Blood", 100, "submission", "first_blood")
                .with_image("/img/first_blood.png"),
        );

        let doc = achievement.to_document().unwrap();
        assert!(!doc.contains_key("aid"));
        assert_eq!(doc["name"], "First Blood");
        assert_eq!(doc["score"], 100);
        assert_eq!(doc["disabled"], false);
    }

    #[test]
    fn test_definition_constraints() {
        let valid = AchievementDefinition::new("First Blood", 0, "submission", "first_blood");
        assert!(valid.validate().is_ok());

        let negative = AchievementDefinition::new("First Blood", -1, "submission", "first_blood");
        assert!(negative.validate().is_err());

        let unnamed = AchievementDefinition::new("", 10, "submission", "first_blood");
        assert!(unnamed.validate().is_err());
    }
}
