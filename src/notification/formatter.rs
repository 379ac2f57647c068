//! 告警格式化 - 将审计事件转换为可读的 Slack 消息
//!
//! - 主体标签：`bot *login*` / `org *name*` / `user *login* (显示名)`
//! - 句首位置用大写变体（`Bot` / `Org` / `User`）
//! - 枚举值（可见性、权限、合并策略）统一小写
//! - 最终文本带可读时间戳，前后留空行

use chrono::{DateTime, Utc};
use tracing::error;

use crate::github::event::{Actor, AuditEvent, EventDetails, Invitee};
use crate::taxonomy::{self, Arg, Case};

/// 时间戳格式，如 `Monday 02 Mar 2020 10:15:00 UTC`
pub const TIMESTAMP_FORMAT: &str = "%A %d %b %Y %H:%M:%S %Z";

/// 不发告警的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// taxonomy 中没有此类型
    UnknownKind,
    /// 系统自动产生的空变更
    NoOp,
    /// 模板参数无法从载荷中取得（表配置错误）
    Unresolvable(Arg),
}

/// 格式化后的告警
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// 可读时间戳
    pub timestamp: String,
    /// 告警正文（不含时间戳）
    pub body: String,
}

impl Alert {
    /// 发送到聊天渠道的完整文本
    pub fn text(&self) -> String {
        wrap_alert(&self.timestamp, &self.body)
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Alert(Alert),
    Suppressed(SuppressReason),
}

/// 渲染主体标签
pub fn actor_label(actor: Option<&Actor>, case: Case) -> String {
    let upper = case == Case::Upper;
    match actor {
        Some(Actor::Bot { login }) => {
            format!("{} *{}*", if upper { "Bot" } else { "bot" }, login)
        }
        Some(Actor::Organization { login, name }) => {
            let name = name.as_deref().or(login.as_deref()).unwrap_or_default();
            format!("{} *{}*", if upper { "Org" } else { "org" }, name)
        }
        Some(Actor::User { login, name }) => {
            let label = format!("{} *{}*", if upper { "User" } else { "user" }, login);
            match name.as_deref().filter(|n| !n.is_empty()) {
                Some(name) => format!("{} ({})", label, name),
                None => label,
            }
        }
        Some(Actor::Unknown(_)) | None => {
            let label = if upper { "Unknown actor" } else { "unknown actor" };
            label.to_string()
        }
    }
}

/// 被邀请方标签：有邮箱时只显示邮箱，不带类型前缀
pub fn invitee_label(invitee: &Invitee, case: Case) -> String {
    match invitee {
        Invitee::Email(email) => format!("*{}*", email),
        Invitee::Account(actor) => actor_label(actor.as_ref(), case),
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// 包装告警：斜体时间戳 + 正文 + 空行
pub fn wrap_alert(timestamp: &str, body: &str) -> String {
    format!("_{}_\n{}\n\n", timestamp, body)
}

/// 从载荷中取出模板参数
fn resolve(details: &EventDetails, arg: Arg) -> Option<String> {
    use EventDetails as D;

    match arg {
        Arg::Actor(case) => match details {
            D::Unknown => None,
            _ => Some(actor_label(details.actor(), case)),
        },
        Arg::User(case) => match details {
            D::OrgMember { user, .. }
            | D::OrgUpdateMember { user, .. }
            | D::RepoMember { user, .. }
            | D::TeamMember { user, .. } => Some(actor_label(user.as_ref(), case)),
            _ => None,
        },
        Arg::BlockedUser(case) => match details {
            D::OrgBlockUser { blocked_user, .. } => Some(actor_label(blocked_user.as_ref(), case)),
            _ => None,
        },
        Arg::Invitee => match details {
            D::OrgInvite { invitee, .. } => Some(invitee_label(invitee, Case::Lower)),
            _ => None,
        },
        Arg::Organization => match details {
            D::OauthApplication { organization, .. }
            | D::OrgSetting { organization, .. }
            | D::OrgMember { organization, .. }
            | D::OrgInvite { organization, .. }
            | D::OrgBlockUser { organization, .. }
            | D::OrgUpdateMember { organization, .. } => Some(organization.clone()),
            _ => None,
        },
        Arg::Repository => match details {
            D::RepoVisibility { repository, .. }
            | D::RepoLifecycle { repository, .. }
            | D::RepoMember { repository, .. }
            | D::RepoMergeSetting { repository, .. }
            | D::TeamRepository { repository, .. } => Some(repository.clone()),
            _ => None,
        },
        Arg::Team => match details {
            D::TeamMember { team, .. } | D::TeamRepository { team, .. } => Some(team.clone()),
            _ => None,
        },
        Arg::Application => match details {
            D::OauthApplication { application, .. } => Some(application.clone()),
            _ => None,
        },
        Arg::Visibility => match details {
            D::RepoVisibility { visibility, .. } => Some(visibility.to_lowercase()),
            _ => None,
        },
        Arg::PermissionWas => match details {
            D::OrgUpdateMember { permission_was, .. } => Some(permission_was.to_lowercase()),
            _ => None,
        },
        Arg::Permission => match details {
            D::OrgUpdateMember { permission, .. } => Some(permission.to_lowercase()),
            _ => None,
        },
        Arg::MergeType => match details {
            D::RepoMergeSetting { merge_type, .. } => merge_type.as_deref().map(str::to_lowercase),
            _ => None,
        },
    }
}

/// 告警格式化器
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertFormatter;

impl AlertFormatter {
    pub fn new() -> Self {
        Self
    }

    /// 分类事件：生成告警，或给出不发告警的原因
    pub fn classify(&self, event: &AuditEvent) -> Classification {
        let entry = match taxonomy::entry_for(&event.kind) {
            Some(entry) if !event.details.is_unknown() => entry,
            _ => return Classification::Suppressed(SuppressReason::UnknownKind),
        };

        if event.details.is_noop() {
            return Classification::Suppressed(SuppressReason::NoOp);
        }

        let mut values = Vec::with_capacity(entry.args.len());
        for arg in entry.args {
            match resolve(&event.details, *arg) {
                Some(value) => values.push(value),
                None => {
                    error!(
                        id = %event.id,
                        kind = %event.kind,
                        arg = ?arg,
                        "Template argument not available for event shape"
                    );
                    return Classification::Suppressed(SuppressReason::Unresolvable(*arg));
                }
            }
        }

        Classification::Alert(Alert {
            timestamp: format_timestamp(&event.occurred_at),
            body: taxonomy::fill_template(entry.template, &values),
        })
    }

    /// 完整告警文本，不发告警时为 `None`
    pub fn format(&self, event: &AuditEvent) -> Option<String> {
        match self.classify(event) {
            Classification::Alert(alert) => Some(alert.text()),
            Classification::Suppressed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::event::RawAuditNode;
    use crate::taxonomy::entries;
    use chrono::TimeZone;

    fn event(kind: &str, details: EventDetails) -> AuditEvent {
        AuditEvent {
            id: "AE_1".to_string(),
            kind: kind.to_string(),
            occurred_at: Utc.with_ymd_and_hms(2020, 3, 2, 10, 15, 0).unwrap(),
            details,
            raw: RawAuditNode::default(),
        }
    }

    fn alice() -> Option<Actor> {
        Some(Actor::user("alice", Some("Alice Smith")))
    }

    fn body(event: &AuditEvent) -> String {
        match AlertFormatter::new().classify(event) {
            Classification::Alert(alert) => alert.body,
            other => panic!("expected alert for {}, got {:?}", event.kind, other),
        }
    }

    #[test]
    fn test_user_label() {
        let actor = Actor::user("alice", Some("Alice Smith"));
        assert_eq!(actor_label(Some(&actor), Case::Lower), "user *alice* (Alice Smith)");
        assert_eq!(actor_label(Some(&actor), Case::Upper), "User *alice* (Alice Smith)");

        let actor = Actor::user("bob", None);
        assert_eq!(actor_label(Some(&actor), Case::Lower), "user *bob*");

        let actor = Actor::user("bob", Some(""));
        assert_eq!(actor_label(Some(&actor), Case::Upper), "User *bob*");
    }

    #[test]
    fn test_bot_and_org_labels() {
        let bot = Actor::bot("depbot");
        assert_eq!(actor_label(Some(&bot), Case::Lower), "bot *depbot*");
        assert_eq!(actor_label(Some(&bot), Case::Upper), "Bot *depbot*");

        let org = Actor::organization("ACME");
        assert_eq!(actor_label(Some(&org), Case::Lower), "org *ACME*");
        assert_eq!(actor_label(Some(&org), Case::Upper), "Org *ACME*");

        let org = Actor::Organization {
            login: Some("acme".to_string()),
            name: None,
        };
        assert_eq!(actor_label(Some(&org), Case::Lower), "org *acme*");
    }

    #[test]
    fn test_missing_actor_label() {
        assert_eq!(actor_label(None, Case::Upper), "Unknown actor");
        assert_eq!(actor_label(Some(&Actor::Unknown(serde_json::json!({"__typename": "Mannequin"}))), Case::Lower), "unknown actor");
    }

    #[test]
    fn test_invitee_email_has_no_prefix() {
        let invitee = Invitee::Email("new@example.com".to_string());
        assert_eq!(invitee_label(&invitee, Case::Upper), "*new@example.com*");
    }

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2020, 3, 2, 9, 5, 7).unwrap();
        assert_eq!(format_timestamp(&at), "Monday 02 Mar 2020 09:05:07 UTC");
    }

    #[test]
    fn test_repo_create_alert() {
        let e = event(
            "repo.create",
            EventDetails::RepoVisibility {
                actor: Some(Actor::user("alice", None)),
                repository: "demo".to_string(),
                visibility: "PUBLIC".to_string(),
            },
        );
        assert_eq!(body(&e), "User *alice* created repo *demo* with visibility *public*.");

        let text = AlertFormatter::new().format(&e).unwrap();
        assert_eq!(
            text,
            "_Monday 02 Mar 2020 10:15:00 UTC_\nUser *alice* created repo *demo* with visibility *public*.\n\n"
        );
    }

    #[test]
    fn test_update_member_lowercases_permissions() {
        let e = event(
            "org.update_member",
            EventDetails::OrgUpdateMember {
                actor: Some(Actor::bot("depbot")),
                user: alice(),
                organization: "acme".to_string(),
                permission_was: "READ".to_string(),
                permission: "ADMIN".to_string(),
            },
        );
        assert_eq!(
            body(&e),
            "Bot *depbot* changed the role of user *alice* (Alice Smith) from *read* to *admin* in organisation *acme*."
        );
    }

    #[test]
    fn test_block_user_puts_blocked_user_first() {
        let e = event(
            "org.block_user",
            EventDetails::OrgBlockUser {
                actor: alice(),
                blocked_user: Some(Actor::user("troll", None)),
                organization: "acme".to_string(),
            },
        );
        assert_eq!(
            body(&e),
            "User *troll* was blocked by user *alice* (Alice Smith) in organisation *acme*."
        );
    }

    #[test]
    fn test_invite_by_email() {
        let e = event(
            "org.invite_member",
            EventDetails::OrgInvite {
                actor: alice(),
                invitee: Invitee::Email("new@example.com".to_string()),
                organization: "acme".to_string(),
            },
        );
        assert_eq!(
            body(&e),
            "User *alice* (Alice Smith) invited new *new@example.com* to join organisation *acme*."
        );
    }

    #[test]
    fn test_org_setting_and_oauth_alerts() {
        let e = event(
            "org.disable_two_factor_requirement",
            EventDetails::OrgSetting {
                actor: Some(Actor::organization("ACME")),
                organization: "acme".to_string(),
            },
        );
        assert_eq!(
            body(&e),
            "Two-factor authentication was disabled for organisation *acme* by org *ACME*."
        );

        let e = event(
            "oauth_application.create",
            EventDetails::OauthApplication {
                actor: alice(),
                application: "Deployer".to_string(),
                organization: "acme".to_string(),
            },
        );
        assert_eq!(
            body(&e),
            "New OAuth app *Deployer* was created within organisation *acme* by user *alice* (Alice Smith)."
        );
    }

    #[test]
    fn test_team_repository_alert() {
        let e = event(
            "team.remove_repository",
            EventDetails::TeamRepository {
                actor: alice(),
                team: "platform".to_string(),
                repository: "acme/infra".to_string(),
            },
        );
        assert_eq!(
            body(&e),
            "User *alice* (Alice Smith) removed control from team *platform* of repository *acme/infra*."
        );
    }

    #[test]
    fn test_merge_setting_suppressed_without_type() {
        let e = event(
            "repo.change_merge_setting",
            EventDetails::RepoMergeSetting {
                actor: alice(),
                repository: "demo".to_string(),
                merge_type: None,
            },
        );
        assert_eq!(
            AlertFormatter::new().classify(&e),
            Classification::Suppressed(SuppressReason::NoOp)
        );
        assert!(AlertFormatter::new().format(&e).is_none());

        let e = event(
            "repo.change_merge_setting",
            EventDetails::RepoMergeSetting {
                actor: alice(),
                repository: "demo".to_string(),
                merge_type: Some("SQUASH".to_string()),
            },
        );
        assert_eq!(
            body(&e),
            "User *alice* (Alice Smith) changed the merge setting of repo *demo* to *squash*."
        );
    }

    #[test]
    fn test_unknown_kind_suppressed() {
        let e = event("repo.config.disable_anonymous_git_access", EventDetails::Unknown);
        assert_eq!(
            AlertFormatter::new().classify(&e),
            Classification::Suppressed(SuppressReason::UnknownKind)
        );
    }

    #[test]
    fn test_shape_mismatch_is_unresolvable() {
        let e = event(
            "repo.create",
            EventDetails::TeamMember {
                actor: alice(),
                user: None,
                team: "t".to_string(),
            },
        );
        assert_eq!(
            AlertFormatter::new().classify(&e),
            Classification::Suppressed(SuppressReason::Unresolvable(Arg::Repository))
        );
    }

    #[test]
    fn test_every_entry_renders_from_its_shape() {
        // 每个表项都能从自己的形状取到全部参数
        for entry in entries() {
            let raw = RawAuditNode {
                id: "AE_x".to_string(),
                action: Some(entry.kind.to_string()),
                actor: alice(),
                blocked_user: Some(Actor::user("troll", None)),
                created_at: Some("2020-03-02T10:15:00Z".to_string()),
                merge_type: Some("MERGE".to_string()),
                oauth_application_name: Some("app".to_string()),
                organization_name: Some("acme".to_string()),
                permission: Some("ADMIN".to_string()),
                permission_was: Some("READ".to_string()),
                repository_name: Some("demo".to_string()),
                team_name: Some("team".to_string()),
                user: Some(Actor::user("bob", None)),
                visibility: Some("PRIVATE".to_string()),
                ..Default::default()
            };
            let e = AuditEvent::from_node(raw).unwrap();
            let text = body(&e);
            assert!(!text.contains("{}"), "{} left a placeholder", entry.kind);
            assert!(text.starts_with(char::is_uppercase), "{}: {}", entry.kind, text);
        }
    }
}
