//! 组织审计日志查询与分页
//!
//! `fetch_all` 从日志起点开始逐页拉取，直到 `hasNextPage` 为 false。
//! 任何一页失败都会丢弃已拉取的结果，不存在"部分成功"。

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use super::event::{AuditEvent, RawAuditNode};

/// 每页条数（GitHub 上限）
pub const PAGE_SIZE: u32 = 100;

/// 审计日志 GraphQL 查询
///
/// 每个已知事件类型一个内联片段；主体字段共用 `actorFields` / `userFields`。
pub const AUDIT_LOG_QUERY: &str = r#"
query GitHubAuditEntries($login: String!, $after: String, $first: Int!) {
  organization(login: $login) {
    auditLog(first: $first, after: $after) {
      totalCount
      pageInfo {
        startCursor
        endCursor
        hasNextPage
        hasPreviousPage
      }
      nodes {
        ... on Node {
          id
        }
        ... on AuditEntry {
          action
          actor { ...actorFields }
          createdAt
          user { ...userFields }
        }
        ... on OauthApplicationCreateAuditEntry {
          oauthApplicationName
          organizationName
        }
        ... on OrgAddBillingManagerAuditEntry {
          organizationName
        }
        ... on OrgAddMemberAuditEntry {
          organizationName
        }
        ... on OrgBlockUserAuditEntry {
          blockedUser { ...userFields }
          organizationName
        }
        ... on OrgCreateAuditEntry {
          organizationName
        }
        ... on OrgDisableSamlAuditEntry {
          organizationName
        }
        ... on OrgDisableTwoFactorRequirementAuditEntry {
          organizationName
        }
        ... on OrgEnableOauthAppRestrictionsAuditEntry {
          organizationName
        }
        ... on OrgEnableSamlAuditEntry {
          organizationName
        }
        ... on OrgEnableTwoFactorRequirementAuditEntry {
          organizationName
        }
        ... on OrgInviteMemberAuditEntry {
          email
          organizationName
        }
        ... on OrgOauthAppAccessApprovedAuditEntry {
          oauthApplicationName
          organizationName
        }
        ... on OrgOauthAppAccessDeniedAuditEntry {
          oauthApplicationName
          organizationName
        }
        ... on OrgOauthAppAccessRequestedAuditEntry {
          oauthApplicationName
          organizationName
        }
        ... on OrgRemoveBillingManagerAuditEntry {
          organizationName
        }
        ... on OrgRemoveMemberAuditEntry {
          organizationName
        }
        ... on OrgRemoveOutsideCollaboratorAuditEntry {
          organizationName
        }
        ... on OrgRestoreMemberAuditEntry {
          organizationName
        }
        ... on OrgUpdateMemberAuditEntry {
          organizationName
          permission
          permissionWas
        }
        ... on RepoAccessAuditEntry {
          repositoryName
          visibility
        }
        ... on RepoAddMemberAuditEntry {
          repositoryName
        }
        ... on RepoArchivedAuditEntry {
          repositoryName
        }
        ... on RepoChangeMergeSettingAuditEntry {
          mergeType
          repositoryName
        }
        ... on RepoCreateAuditEntry {
          repositoryName
          visibility
        }
        ... on RepoDestroyAuditEntry {
          repositoryName
        }
        ... on RepoRemoveMemberAuditEntry {
          repositoryName
        }
        ... on TeamAddMemberAuditEntry {
          teamName
        }
        ... on TeamAddRepositoryAuditEntry {
          repositoryName
          teamName
        }
        ... on TeamRemoveMemberAuditEntry {
          teamName
        }
        ... on TeamRemoveRepositoryAuditEntry {
          repositoryName
          teamName
        }
      }
    }
  }
}
fragment userFields on User {
  __typename
  login
  name
}
fragment actorFields on AuditEntryActor {
  __typename
  ... on Bot {
    login
  }
  ... on User {
    ...userFields
  }
  ... on Organization {
    login
    name
  }
}
"#;

/// 分页信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub start_cursor: Option<String>,
    #[serde(default)]
    pub end_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub has_previous_page: bool,
}

/// 一页审计日志
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogPage {
    #[serde(default)]
    pub total_count: u64,
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<RawAuditNode>,
}

/// 审计日志数据源
///
/// `after` 为 `None` 时从日志起点开始。
pub trait AuditLogSource {
    fn fetch_page(&self, login: &str, after: Option<&str>) -> Result<AuditLogPage>;
}

/// 拉取组织的全部审计事件（按页返回顺序）
pub fn fetch_all<S>(source: &S, login: &str) -> Result<Vec<AuditEvent>>
where
    S: AuditLogSource + ?Sized,
{
    let mut events = Vec::new();
    let mut after: Option<String> = None;
    let mut page_number = 0usize;

    loop {
        page_number += 1;
        let page = source
            .fetch_page(login, after.as_deref())
            .with_context(|| {
                format!(
                    "Failed to fetch audit log entries for organisation {} (page {})",
                    login, page_number
                )
            })?;

        debug!(
            organisation = %login,
            page = page_number,
            nodes = page.nodes.len(),
            has_next = page.page_info.has_next_page,
            "Fetched audit log page"
        );

        for node in page.nodes {
            events.push(AuditEvent::from_node(node)?);
        }

        if !page.page_info.has_next_page {
            break;
        }

        match page.page_info.end_cursor {
            Some(cursor) if !cursor.is_empty() => after = Some(cursor),
            _ => {
                return Err(anyhow!(
                    "Audit log page {} reports more pages but has no end cursor",
                    page_number
                ))
            }
        }
    }

    info!(
        organisation = %login,
        pages = page_number,
        events = events.len(),
        "Fetched audit log"
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy;
    use std::cell::RefCell;

    /// 按预设页序列返回的数据源，记录每次请求的游标
    struct ScriptedSource {
        pages: Vec<Result<AuditLogPage>>,
        calls: RefCell<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<AuditLogPage>>) -> Self {
            Self {
                pages,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl AuditLogSource for ScriptedSource {
        fn fetch_page(&self, _login: &str, after: Option<&str>) -> Result<AuditLogPage> {
            let index = self.calls.borrow().len();
            self.calls.borrow_mut().push(after.map(str::to_string));
            match self.pages.get(index) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(e)) => Err(anyhow!("{}", e)),
                None => Err(anyhow!("no more scripted pages")),
            }
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> AuditLogPage {
        AuditLogPage {
            total_count: 0,
            page_info: PageInfo {
                end_cursor: next.map(str::to_string),
                has_next_page: next.is_some(),
                ..Default::default()
            },
            nodes: ids
                .iter()
                .map(|id| RawAuditNode {
                    id: id.to_string(),
                    action: Some("repo.destroy".to_string()),
                    created_at: Some("2020-03-02T10:15:00Z".to_string()),
                    repository_name: Some("demo".to_string()),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_fetch_all_concatenates_pages_in_order() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["a", "b"], Some("c1"))),
            Ok(page(&["c"], Some("c2"))),
            Ok(page(&["d", "e"], None)),
        ]);

        let events = fetch_all(&source, "acme").unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(
            *source.calls.borrow(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[test]
    fn test_single_empty_page() {
        let source = ScriptedSource::new(vec![Ok(page(&[], None))]);
        assert!(fetch_all(&source, "acme").unwrap().is_empty());
        assert_eq!(source.calls.borrow().len(), 1);
    }

    #[test]
    fn test_failure_discards_partial_results() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["a"], Some("c1"))),
            Err(anyhow!("connection reset")),
        ]);
        let err = fetch_all(&source, "acme").unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("page 2"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_missing_end_cursor_is_error() {
        let mut broken = page(&["a"], None);
        broken.page_info.has_next_page = true;
        let source = ScriptedSource::new(vec![Ok(broken)]);
        let err = fetch_all(&source, "acme").unwrap_err();
        assert!(err.to_string().contains("no end cursor"));
        assert_eq!(source.calls.borrow().len(), 1);
    }

    #[test]
    fn test_undecodable_node_is_error() {
        let mut bad = page(&["a"], None);
        bad.nodes[0].created_at = None;
        let source = ScriptedSource::new(vec![Ok(bad)]);
        assert!(fetch_all(&source, "acme").is_err());
    }

    #[test]
    fn test_page_deserializes() {
        let json = r#"{
            "totalCount": 2,
            "pageInfo": {"startCursor": "s", "endCursor": null, "hasNextPage": false, "hasPreviousPage": false},
            "nodes": [{"id": "AE_1", "action": "org.create", "createdAt": "2020-03-02T10:15:00Z"}]
        }"#;
        let page: AuditLogPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_count, 2);
        assert!(page.page_info.end_cursor.is_none());
        assert_eq!(page.nodes.len(), 1);
    }

    /// `repo.change_merge_setting` → `RepoChangeMergeSettingAuditEntry`
    fn graphql_type(kind: &str) -> String {
        let mut name: String = kind
            .split(|c| c == '.' || c == '_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect();
        name.push_str("AuditEntry");
        name
    }

    #[test]
    fn test_query_covers_every_known_kind() {
        for entry in taxonomy::entries() {
            let fragment = format!("... on {} {{", graphql_type(entry.kind));
            assert!(
                AUDIT_LOG_QUERY.contains(&fragment),
                "query has no fragment for {}",
                entry.kind
            );
        }
    }

    #[test]
    fn test_query_braces_balanced() {
        let open = AUDIT_LOG_QUERY.matches('{').count();
        let close = AUDIT_LOG_QUERY.matches('}').count();
        assert_eq!(open, close);
    }
}
