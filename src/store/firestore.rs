//! Firestore 存储（REST API）
//!
//! 文档路径：`projects/{project}/databases/(default)/documents/{collection}/{id}`，
//! 字段 `timestamp`、`action` 均为 `stringValue`。与早期部署写入的文档兼容。
//! 认证令牌来自 `credentials::TokenProvider`。

use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::credentials::TokenProvider;
use super::{IdempotencyStore, StoredDocument};
use crate::config::FirestoreSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StringValue {
    #[serde(rename = "stringValue", default)]
    string_value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocumentFields {
    #[serde(default)]
    timestamp: StringValue,
    #[serde(default)]
    action: StringValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: DocumentFields,
}

impl From<&StoredDocument> for FirestoreDocument {
    fn from(doc: &StoredDocument) -> Self {
        FirestoreDocument {
            fields: DocumentFields {
                timestamp: StringValue {
                    string_value: doc.timestamp.clone(),
                },
                action: StringValue {
                    string_value: doc.action.clone(),
                },
            },
        }
    }
}

impl From<FirestoreDocument> for StoredDocument {
    fn from(doc: FirestoreDocument) -> Self {
        StoredDocument {
            timestamp: doc.fields.timestamp.string_value,
            action: doc.fields.action.string_value,
        }
    }
}

/// Firestore 存储
#[derive(Debug)]
pub struct FirestoreStore {
    client: reqwest::blocking::Client,
    settings: FirestoreSettings,
    tokens: TokenProvider,
}

impl FirestoreStore {
    pub fn new(settings: FirestoreSettings) -> Result<Self> {
        if settings.project.is_empty() {
            return Err(anyhow!("Firestore project is required"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;
        let tokens = TokenProvider::from_auth(&settings.auth, settings.timeout_secs)?;

        Ok(Self {
            client,
            settings,
            tokens,
        })
    }

    /// 文档 URL（ID 按路径段编码）
    pub fn document_url(&self, id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.settings.base_url)
            .with_context(|| format!("Invalid Firestore URL '{}'", self.settings.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Firestore URL cannot be a base: {}", self.settings.base_url))?
            .pop_if_empty()
            .extend([
                "projects",
                self.settings.project.as_str(),
                "databases",
                "(default)",
                "documents",
                self.settings.collection.as_str(),
                id,
            ]);
        Ok(url)
    }
}

impl IdempotencyStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let url = self.document_url(id)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(self.tokens.access_token()?)
            .send()
            .with_context(|| format!("Firestore lookup failed for {}", id))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(id = %id, "Firestore document not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Firestore lookup for {} returned {}: {}",
                id,
                status,
                body.trim()
            ));
        }

        let document: FirestoreDocument = response
            .json()
            .with_context(|| format!("Invalid Firestore document for {}", id))?;
        Ok(Some(document.into()))
    }

    fn put(&self, id: &str, document: &StoredDocument) -> Result<()> {
        let url = self.document_url(id)?;
        let response = self
            .client
            .patch(url)
            .bearer_auth(self.tokens.access_token()?)
            .json(&FirestoreDocument::from(document))
            .send()
            .with_context(|| format!("Firestore write failed for {}", id))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Firestore write for {} returned {}: {}",
                id,
                status,
                body.trim()
            ));
        }
        debug!(id = %id, action = %document.action, "Firestore document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FirestoreAuth, DEFAULT_COLLECTION, DEFAULT_FIRESTORE_URL};

    fn settings() -> FirestoreSettings {
        FirestoreSettings {
            base_url: DEFAULT_FIRESTORE_URL.to_string(),
            project: "audit-proj".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            auth: FirestoreAuth::AccessToken("ya29.token".to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_document_url() {
        let store = FirestoreStore::new(settings()).unwrap();
        let url = store.document_url("AE_1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/audit-proj/databases/(default)/documents/github-auditor/AE_1"
        );
    }

    #[test]
    fn test_document_url_encodes_id() {
        let store = FirestoreStore::new(settings()).unwrap();
        let url = store.document_url("a/b c").unwrap();
        assert!(url.as_str().ends_with("/github-auditor/a%2Fb%20c"));
    }

    #[test]
    fn test_unreadable_credentials_fail_at_open() {
        let mut s = settings();
        s.auth = FirestoreAuth::ServiceAccountFile("/nonexistent/key.json".into());
        let err = FirestoreStore::new(s).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/key.json"));
    }

    #[test]
    fn test_requires_project() {
        let mut s = settings();
        s.project = String::new();
        assert!(FirestoreStore::new(s).is_err());
    }

    #[test]
    fn test_document_wire_shape() {
        let doc = StoredDocument {
            timestamp: "Monday 02 Mar 2020 10:15:00 UTC".to_string(),
            action: "repo.create".to_string(),
        };
        let json = serde_json::to_value(FirestoreDocument::from(&doc)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fields": {
                    "timestamp": {"stringValue": "Monday 02 Mar 2020 10:15:00 UTC"},
                    "action": {"stringValue": "repo.create"}
                }
            })
        );

        let parsed: FirestoreDocument = serde_json::from_value(serde_json::json!({
            "name": "projects/p/databases/(default)/documents/github-auditor/AE_1",
            "fields": {
                "timestamp": {"stringValue": "Monday 02 Mar 2020 10:15:00 UTC"},
                "action": {"stringValue": "repo.create"}
            },
            "createTime": "2020-03-02T10:15:05Z"
        }))
        .unwrap();
        assert_eq!(StoredDocument::from(parsed), doc);
    }
}
