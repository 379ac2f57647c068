//! 审计事件数据模型
//!
//! GraphQL 返回的节点是扁平结构（所有字段可选），`RawAuditNode` 原样承接；
//! 进入流水线前按 taxonomy 给出的形状解码为 `EventDetails` 的某个变体，
//! 这样"某类事件是否带权限变更"就是类型问题，而不是运行时判空。

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::taxonomy::{self, Shape};

/// 执行操作的主体（GraphQL `Actor` 接口）
#[derive(Debug, Clone, PartialEq)]
pub enum Actor {
    Bot {
        login: String,
    },
    Organization {
        login: Option<String>,
        name: Option<String>,
    },
    User {
        login: String,
        /// 显示名（用户未设置时为 null）
        name: Option<String>,
    },
    /// 未识别的 `__typename`（如 Mannequin），原样保留供导出
    Unknown(serde_json::Value),
}

/// 已知主体类型的线上形状
#[derive(Serialize, Deserialize)]
#[serde(tag = "__typename")]
enum KnownActor {
    Bot {
        login: String,
    },
    Organization {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        login: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    User {
        login: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl From<KnownActor> for Actor {
    fn from(actor: KnownActor) -> Self {
        match actor {
            KnownActor::Bot { login } => Actor::Bot { login },
            KnownActor::Organization { login, name } => Actor::Organization { login, name },
            KnownActor::User { login, name } => Actor::User { login, name },
        }
    }
}

impl Serialize for Actor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let known = match self {
            Actor::Unknown(value) => return value.serialize(serializer),
            Actor::Bot { login } => KnownActor::Bot {
                login: login.clone(),
            },
            Actor::Organization { login, name } => KnownActor::Organization {
                login: login.clone(),
                name: name.clone(),
            },
            Actor::User { login, name } => KnownActor::User {
                login: login.clone(),
                name: name.clone(),
            },
        };
        known.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value.get("__typename").and_then(serde_json::Value::as_str) {
            Some("Bot") | Some("Organization") | Some("User") => KnownActor::deserialize(value)
                .map(Actor::from)
                .map_err(de::Error::custom),
            _ => Ok(Actor::Unknown(value)),
        }
    }
}

impl Actor {
    pub fn user(login: impl Into<String>, name: Option<&str>) -> Self {
        Actor::User {
            login: login.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn bot(login: impl Into<String>) -> Self {
        Actor::Bot {
            login: login.into(),
        }
    }

    pub fn organization(name: impl Into<String>) -> Self {
        Actor::Organization {
            login: None,
            name: Some(name.into()),
        }
    }
}

/// 被邀请方：尚未注册 GitHub 账号时只有邮箱
#[derive(Debug, Clone, PartialEq)]
pub enum Invitee {
    Email(String),
    Account(Option<Actor>),
}

/// 线上的扁平审计节点
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuditNode {
    pub id: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub blocked_user: Option<Actor>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub merge_type: Option<String>,
    #[serde(default)]
    pub oauth_application_name: Option<String>,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub permission_was: Option<String>,
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub user: Option<Actor>,
    #[serde(default)]
    pub visibility: Option<String>,
}

/// 按事件形状区分的载荷
///
/// 字符串字段缺失时取空串，与 GitHub 对已删除实体返回 null 的行为保持宽容；
/// 只有合并策略保留 `Option`，因为它的缺失本身有语义（见 `is_noop`）。
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetails {
    OauthApplication {
        actor: Option<Actor>,
        application: String,
        organization: String,
    },
    OrgSetting {
        actor: Option<Actor>,
        organization: String,
    },
    OrgMember {
        actor: Option<Actor>,
        user: Option<Actor>,
        organization: String,
    },
    OrgInvite {
        actor: Option<Actor>,
        invitee: Invitee,
        organization: String,
    },
    OrgBlockUser {
        actor: Option<Actor>,
        blocked_user: Option<Actor>,
        organization: String,
    },
    OrgUpdateMember {
        actor: Option<Actor>,
        user: Option<Actor>,
        organization: String,
        permission_was: String,
        permission: String,
    },
    RepoVisibility {
        actor: Option<Actor>,
        repository: String,
        visibility: String,
    },
    RepoLifecycle {
        actor: Option<Actor>,
        repository: String,
    },
    RepoMember {
        actor: Option<Actor>,
        user: Option<Actor>,
        repository: String,
    },
    RepoMergeSetting {
        actor: Option<Actor>,
        repository: String,
        merge_type: Option<String>,
    },
    TeamMember {
        actor: Option<Actor>,
        user: Option<Actor>,
        team: String,
    },
    TeamRepository {
        actor: Option<Actor>,
        team: String,
        repository: String,
    },
    /// taxonomy 不认识的事件
    Unknown,
}

impl EventDetails {
    /// 按 taxonomy 指定的形状解码扁平节点
    pub fn decode(shape: Shape, node: &RawAuditNode) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let actor = node.actor.clone();

        match shape {
            Shape::OauthApplication => EventDetails::OauthApplication {
                actor,
                application: text(&node.oauth_application_name),
                organization: text(&node.organization_name),
            },
            Shape::OrgSetting => EventDetails::OrgSetting {
                actor,
                organization: text(&node.organization_name),
            },
            Shape::OrgMember => EventDetails::OrgMember {
                actor,
                user: node.user.clone(),
                organization: text(&node.organization_name),
            },
            Shape::OrgInvite => {
                let invitee = match node.email.clone().filter(|e| !e.is_empty()) {
                    Some(email) => Invitee::Email(email),
                    None => Invitee::Account(node.user.clone()),
                };
                EventDetails::OrgInvite {
                    actor,
                    invitee,
                    organization: text(&node.organization_name),
                }
            }
            Shape::OrgBlockUser => EventDetails::OrgBlockUser {
                actor,
                blocked_user: node.blocked_user.clone(),
                organization: text(&node.organization_name),
            },
            Shape::OrgUpdateMember => EventDetails::OrgUpdateMember {
                actor,
                user: node.user.clone(),
                organization: text(&node.organization_name),
                permission_was: text(&node.permission_was),
                permission: text(&node.permission),
            },
            Shape::RepoVisibility => EventDetails::RepoVisibility {
                actor,
                repository: text(&node.repository_name),
                visibility: text(&node.visibility),
            },
            Shape::RepoLifecycle => EventDetails::RepoLifecycle {
                actor,
                repository: text(&node.repository_name),
            },
            Shape::RepoMember => EventDetails::RepoMember {
                actor,
                user: node.user.clone(),
                repository: text(&node.repository_name),
            },
            Shape::RepoMergeSetting => EventDetails::RepoMergeSetting {
                actor,
                repository: text(&node.repository_name),
                merge_type: node.merge_type.clone().filter(|m| !m.is_empty()),
            },
            Shape::TeamMember => EventDetails::TeamMember {
                actor,
                user: node.user.clone(),
                team: text(&node.team_name),
            },
            Shape::TeamRepository => EventDetails::TeamRepository {
                actor,
                team: text(&node.team_name),
                repository: text(&node.repository_name),
            },
        }
    }

    /// 执行者
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            EventDetails::OauthApplication { actor, .. }
            | EventDetails::OrgSetting { actor, .. }
            | EventDetails::OrgMember { actor, .. }
            | EventDetails::OrgInvite { actor, .. }
            | EventDetails::OrgBlockUser { actor, .. }
            | EventDetails::OrgUpdateMember { actor, .. }
            | EventDetails::RepoVisibility { actor, .. }
            | EventDetails::RepoLifecycle { actor, .. }
            | EventDetails::RepoMember { actor, .. }
            | EventDetails::RepoMergeSetting { actor, .. }
            | EventDetails::TeamMember { actor, .. }
            | EventDetails::TeamRepository { actor, .. } => actor.as_ref(),
            EventDetails::Unknown => None,
        }
    }

    /// 是否为系统自动产生的空变更
    ///
    /// 新建仓库时 GitHub 会附带一条合并策略为 null 的 `repo.change_merge_setting`。
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            EventDetails::RepoMergeSetting {
                merge_type: None,
                ..
            }
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EventDetails::Unknown)
    }
}

/// 一条审计事件
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// 全局唯一且跨拉取稳定的 ID，是唯一的身份键
    pub id: String,
    /// 事件类型标签，如 `repo.create`
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
    pub details: EventDetails,
    /// 收到的原始节点（导出时原样输出）
    pub raw: RawAuditNode,
}

impl AuditEvent {
    /// 解码线上节点
    ///
    /// `createdAt` 缺失或不是 RFC 3339 视为响应格式错误。
    pub fn from_node(node: RawAuditNode) -> Result<Self> {
        let id = node.id.clone();
        let created_at = node
            .created_at
            .as_deref()
            .ok_or_else(|| anyhow!("audit entry {} has no createdAt", id))?;
        let occurred_at = DateTime::parse_from_rfc3339(created_at)
            .with_context(|| format!("audit entry {} has invalid createdAt '{}'", id, created_at))?
            .with_timezone(&Utc);
        let kind = node.action.clone().unwrap_or_default();

        let details = match taxonomy::entry_for(&kind) {
            Some(entry) => EventDetails::decode(entry.shape, &node),
            None => EventDetails::Unknown,
        };

        Ok(Self {
            id,
            kind,
            occurred_at,
            details,
            raw: node,
        })
    }
}
