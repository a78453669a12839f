//! 成就定义校验
//!
//! 校验分两步：
//! 1. 按字段规则表检查文档结构（必填、类型、禁止出现的字段、未知字段）
//! 2. 反序列化为 `AchievementDefinition` 后由 `validator` 检查取值约束
//!
//! 所有失败都以字段级的 `FieldViolation` 汇总返回，不在第一个错误处中断。

use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{AchievementError, FieldViolation, Result};
use crate::models::AchievementDefinition;

/// 字段类型约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// 输入中不允许出现
    Forbidden,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Forbidden => false,
        }
    }
}

/// 单个字段的校验规则
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// 类型不符或出现禁止字段时的提示
    pub message: &'static str,
}

impl FieldRule {
    const fn required(field: &'static str, field_type: FieldType, message: &'static str) -> Self {
        Self {
            field,
            field_type,
            required: true,
            message,
        }
    }

    const fn optional(field: &'static str, field_type: FieldType, message: &'static str) -> Self {
        Self {
            field,
            field_type,
            required: false,
            message,
        }
    }
}

/// 成就定义的字段规则表
pub const ACHIEVEMENT_RULES: &[FieldRule] = &[
    FieldRule::required("name", FieldType::String, "成就名称必须是字符串"),
    FieldRule::required("score", FieldType::Integer, "分数必须是非负整数"),
    FieldRule::required("event", FieldType::String, "事件类型必须是字符串"),
    FieldRule::required("processor", FieldType::String, "处理器名称必须是字符串"),
    FieldRule::required("hidden", FieldType::Boolean, "隐藏状态必须是布尔值"),
    FieldRule::required("image", FieldType::String, "图片路径必须是字符串"),
    FieldRule::optional("disabled", FieldType::Boolean, "下线状态必须是布尔值"),
    FieldRule::optional("aid", FieldType::Forbidden, "不允许为成就指定 aid"),
    FieldRule::optional("_id", FieldType::Forbidden, "成就不应携带存储层内部 id"),
];

/// 成就定义 schema
pub struct AchievementSchema;

impl AchievementSchema {
    /// 校验定义文档并转换为强类型定义
    pub fn validate(document: &Value) -> Result<AchievementDefinition> {
        let Value::Object(map) = document else {
            return Err(AchievementError::validation(
                "$",
                "成就定义必须是 JSON 对象",
            ));
        };

        let violations = Self::check_structure(map);
        if !violations.is_empty() {
            return Err(AchievementError::Validation(violations));
        }

        let definition: AchievementDefinition = serde_json::from_value(document.clone())
            .map_err(|e| AchievementError::validation("$", e.to_string()))?;

        definition
            .validate()
            .map_err(|errors| AchievementError::Validation(Self::flatten(&errors)))?;

        Ok(definition)
    }

    /// 按规则表检查结构，返回全部违规项
    pub fn check_structure(map: &Map<String, Value>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        for rule in ACHIEVEMENT_RULES {
            match map.get(rule.field) {
                None if rule.required => {
                    violations.push(FieldViolation::new(rule.field, "缺少必填字段"));
                }
                None => {}
                Some(value) if !rule.field_type.accepts(value) => {
                    violations.push(FieldViolation::new(rule.field, rule.message));
                }
                Some(_) => {}
            }
        }

        for key in map.keys() {
            if !ACHIEVEMENT_RULES.iter().any(|rule| rule.field == key) {
                violations.push(FieldViolation::new(key.as_str(), "未知字段"));
            }
        }

        violations
    }

    /// 将 validator 的错误结构展开为字段级违规列表
    fn flatten(errors: &ValidationErrors) -> Vec<FieldViolation> {
        let mut violations: Vec<FieldViolation> = errors
            .errors()
            .iter()
            .flat_map(|(field, kind)| match kind {
                ValidationErrorsKind::Field(items) => items
                    .iter()
                    .map(|e| {
                        let message = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        FieldViolation::new(field.to_string(), message)
                    })
                    .collect::<Vec<_>>(),
                _ => vec![FieldViolation::new(field.to_string(), "嵌套结构校验失败")],
            })
            .collect();

        // HashMap 迭代顺序不稳定，排序后便于日志比对
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        violations
    }
}

/// 将 `patch` 的顶层字段覆盖到 `base` 上
///
/// 嵌套值整体替换，不做深度合并
pub fn merge_document(mut base: Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    for (key, value) in patch {
        base.insert(key.clone(), value.clone());
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "name": "First Blood",
            "score": 100,
            "event": "submission",
            "processor": "first_blood",
            "hidden": false,
            "image": "/img/first_blood.png"
        })
    }

    fn fields(err: AchievementError) -> Vec<String> {
        match err {
            AchievementError::Validation(v) => v.into_iter().map(|f| f.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_document() {
        let definition = AchievementSchema::validate(&valid_document()).unwrap();
        assert_eq!(definition.name, "First Blood");
        assert_eq!(definition.score, 100);
        assert!(!definition.disabled);
    }

    #[test]
    fn test_disabled_is_optional_but_typed() {
        let mut doc = valid_document();
        doc["disabled"] = json!(true);
        assert!(AchievementSchema::validate(&doc).unwrap().disabled);

        doc["disabled"] = json!("yes");
        assert_eq!(fields(AchievementSchema::validate(&doc).unwrap_err()), vec!["disabled"]);
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let doc = json!({ "name": "First Blood" });
        let mut missing = fields(AchievementSchema::validate(&doc).unwrap_err());
        missing.sort();
        assert_eq!(
            missing,
            vec!["event", "hidden", "image", "processor", "score"]
        );
    }

    #[test]
    fn test_forbidden_identifiers() {
        let mut doc = valid_document();
        doc["aid"] = json!("0d6c2f0e-0000-0000-0000-000000000000");
        doc["_id"] = json!(1);

        let mut rejected = fields(AchievementSchema::validate(&doc).unwrap_err());
        rejected.sort();
        assert_eq!(rejected, vec!["_id", "aid"]);
    }

    #[test]
    fn test_negative_score_keeps_field_message() {
        let mut doc = valid_document();
        doc["score"] = json!(-5);

        match AchievementSchema::validate(&doc).unwrap_err() {
            AchievementError::Validation(v) => {
                assert_eq!(v.len(), 1);
                assert_eq!(v[0].field, "score");
                assert_eq!(v[0].message, "分数必须是非负整数");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_types() {
        let mut doc = valid_document();
        doc["score"] = json!(1.5);
        doc["hidden"] = json!("false");
        doc["image"] = json!(false);

        let mut rejected = fields(AchievementSchema::validate(&doc).unwrap_err());
        rejected.sort();
        assert_eq!(rejected, vec!["hidden", "image", "score"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut doc = valid_document();
        doc["points"] = json!(10);
        assert_eq!(fields(AchievementSchema::validate(&doc).unwrap_err()), vec!["points"]);
    }

    #[test]
    fn test_empty_name_rejected_by_constraint() {
        let mut doc = valid_document();
        doc["name"] = json!("");
        assert_eq!(fields(AchievementSchema::validate(&doc).unwrap_err()), vec!["name"]);
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(fields(AchievementSchema::validate(&json!([1, 2])).unwrap_err()), vec!["$"]);
    }

    #[test]
    fn test_merge_document_replaces_top_level() {
        let base = valid_document().as_object().unwrap().clone();
        let patch = json!({ "score": 250, "disabled": true });
        let merged = merge_document(base, patch.as_object().unwrap());

        assert_eq!(merged["score"], 250);
        assert_eq!(merged["disabled"], true);
        assert_eq!(merged["name"], "First Blood");
    }
}
