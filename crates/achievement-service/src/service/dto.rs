//! 服务层数据传输对象
//!
//! 评估结果、重新评估报告以及评估相关配置

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Identity;

/// 单次处理器判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// 满足条件
    Qualified,
    /// 不满足条件
    NotQualified,
    /// 处理器报错或超时，无法判定
    Failed(String),
}

impl EvaluationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// 处理器失败时对已有记录的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// 无法判定时保留已有记录
    #[default]
    FailOpen,
    /// 无法判定时视为不满足条件，撤销已有记录
    FailClosed,
}

impl RevocationPolicy {
    /// 判定失败的身份是否应被撤销
    pub fn revokes_on_failure(&self) -> bool {
        matches!(self, Self::FailClosed)
    }
}

/// 评估配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// 单个成就重新评估时的最大并发判定数
    pub max_concurrency: usize,
    /// 单次处理器调用超时（毫秒）
    pub processor_timeout_ms: u64,
    pub revocation_policy: RevocationPolicy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            processor_timeout_ms: 5000,
            revocation_policy: RevocationPolicy::FailOpen,
        }
    }
}

impl EvaluationConfig {
    pub fn processor_timeout(&self) -> Duration {
        Duration::from_millis(self.processor_timeout_ms)
    }

    /// 并发度至少为 1
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

/// 判定失败的身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEvaluation {
    pub identity: Identity,
    pub reason: String,
}

/// 单个成就的重新评估报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReevaluationReport {
    pub aid: Uuid,
    /// 参与评估的已获得记录数
    pub evaluated: usize,
    /// 保留的身份
    pub retained: Vec<Identity>,
    /// 被撤销的身份
    pub revoked: Vec<Identity>,
    /// 判定失败的身份，按撤销策略归入保留或撤销
    pub failed: Vec<FailedEvaluation>,
}

impl ReevaluationReport {
    pub fn new(aid: Uuid) -> Self {
        Self {
            aid,
            evaluated: 0,
            retained: Vec::new(),
            revoked: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn revoked_count(&self) -> u64 {
        self.revoked.len() as u64
    }
}

/// 因处理器未注册而跳过的成就
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAchievement {
    pub aid: Uuid,
    pub processor: String,
}

/// 全量重新评估汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReevaluationSummary {
    pub reports: Vec<ReevaluationReport>,
    pub skipped: Vec<SkippedAchievement>,
}

impl ReevaluationSummary {
    pub fn total_revoked(&self) -> u64 {
        self.reports.iter().map(ReevaluationReport::revoked_count).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed.len()).sum()
    }

    pub fn report(&self, aid: Uuid) -> Option<&ReevaluationReport> {
        self.reports.iter().find(|r| r.aid == aid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_config_defaults() {
        let config = EvaluationConfig::default();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.processor_timeout(), Duration::from_secs(5));
        assert_eq!(config.revocation_policy, RevocationPolicy::FailOpen);
    }

    #[test]
    fn test_evaluation_config_partial_deserialize() {
        let config: EvaluationConfig = serde_json::from_value(serde_json::json!({
            "revocation_policy": "fail_closed",
            "max_concurrency": 0
        }))
        .unwrap();
        assert!(config.revocation_policy.revokes_on_failure());
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.processor_timeout_ms, 5000);
    }

    #[test]
    fn test_summary_totals() {
        let aid = Uuid::new_v4();
        let mut report = ReevaluationReport::new(aid);
        report.revoked = vec![Identity::team("b"), Identity::team("c")];
        report.failed.push(FailedEvaluation {
            identity: Identity::team("d"),
            reason: "timeout".to_string(),
        });

        let summary = ReevaluationSummary {
            reports: vec![report, ReevaluationReport::new(Uuid::new_v4())],
            skipped: Vec::new(),
        };
        assert_eq!(summary.total_revoked(), 2);
        assert_eq!(summary.total_failed(), 1);
        assert!(summary.report(aid).is_some());
    }
}
