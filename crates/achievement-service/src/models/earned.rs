//! 已获得成就记录
//!
//! 每条记录以 `(aid, 身份)` 为键，身份为团队或用户之一。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AchievementError, Result};

/// 成就持有者身份
///
/// 序列化为 `{"tid": ...}` 或 `{"uid": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identity {
    #[serde(rename = "tid")]
    Team(String),
    #[serde(rename = "uid")]
    User(String),
}

impl Identity {
    pub fn team(tid: impl Into<String>) -> Self {
        Self::Team(tid.into())
    }

    pub fn user(uid: impl Into<String>) -> Self {
        Self::User(uid.into())
    }

    /// 存储层使用的身份类型标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Team(_) => "team",
            Self::User(_) => "user",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Team(id) | Self::User(id) => id,
        }
    }

    /// 由存储层的 (kind, id) 还原身份
    pub fn from_parts(kind: &str, id: impl Into<String>) -> Result<Self> {
        match kind {
            "team" => Ok(Self::Team(id.into())),
            "user" => Ok(Self::User(id.into())),
            other => Err(AchievementError::Internal(format!(
                "未知的身份类型: {}",
                other
            ))),
        }
    }

    /// 由可选的 tid/uid 构造，二者至多提供一个
    pub fn from_ids(tid: Option<&str>, uid: Option<&str>) -> Result<Option<Self>> {
        match (tid, uid) {
            (Some(_), Some(_)) => Err(AchievementError::InvalidArgument(
                "tid 与 uid 只能提供一个".to_string(),
            )),
            (Some(tid), None) => Ok(Some(Self::team(tid))),
            (None, Some(uid)) => Ok(Some(Self::user(uid))),
            (None, None) => Ok(None),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// 已获得记录的主键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EarnedKey {
    pub aid: Uuid,
    #[serde(flatten)]
    pub identity: Identity,
}

impl EarnedKey {
    pub fn new(aid: Uuid, identity: Identity) -> Self {
        Self { aid, identity }
    }
}

/// 已获得成就记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedAchievement {
    pub aid: Uuid,
    #[serde(flatten)]
    pub identity: Identity,
    pub earned_at: DateTime<Utc>,
}

impl EarnedAchievement {
    pub fn new(aid: Uuid, identity: Identity) -> Self {
        Self {
            aid,
            identity,
            earned_at: Utc::now(),
        }
    }

    pub fn key(&self) -> EarnedKey {
        EarnedKey::new(self.aid, self.identity.clone())
    }
}

/// 已获得记录的查询条件，各条件之间为 AND 关系
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EarnedFilter {
    pub identity: Option<Identity>,
    pub aid: Option<Uuid>,
}

impl EarnedFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            aid: None,
        }
    }

    pub fn for_aid(aid: Uuid) -> Self {
        Self {
            identity: None,
            aid: Some(aid),
        }
    }

    pub fn with_aid(mut self, aid: Uuid) -> Self {
        self.aid = Some(aid);
        self
    }

    pub fn matches(&self, record: &EarnedAchievement) -> bool {
        let identity_ok = self
            .identity
            .as_ref()
            .is_none_or(|identity| *identity == record.identity);
        let aid_ok = self.aid.is_none_or(|aid| aid == record.aid);
        identity_ok && aid_ok
    }
}
